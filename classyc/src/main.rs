use anyhow::{anyhow, Context, Result};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use classy::emit::write_complete_file;
use classy::samples::{self, Sample};
use log::info;
use mipsvm::{parse_listing, AsmProgram, MipsEmulator};
use std::path::Path;
use std::{fs, process};

const DEFAULT_MAX_STEPS: &str = "1000000";

fn find_sample(name: &str) -> Result<Sample> {
    samples::find(name)
        .ok_or_else(|| anyhow!("No sample program named {:?}; see `classyc list`", name))
}

fn build_listing(name: &str) -> Result<AsmProgram> {
    let sample = find_sample(name)?;
    classy::compile(&sample.program()).with_context(|| format!("Failed compiling {}", name))
}

fn load_listing(path: &str) -> Result<AsmProgram> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed reading {}", path))?;
    parse_listing(&text).map_err(|msg| anyhow!("Failed parsing {}: {}", path, msg))
}

fn execute(listing: AsmProgram, matches: &ArgMatches) -> Result<String> {
    let max_steps: usize = matches
        .value_of("max-steps")
        .unwrap_or(DEFAULT_MAX_STEPS)
        .parse()
        .context("--max-steps must be a non-negative integer")?;
    let mut emulator =
        MipsEmulator::new(listing).map_err(|msg| anyhow!("Failed loading program: {}", msg))?;
    let result = if matches.is_present("profile") {
        let result = emulator.run_profiled(max_steps);
        eprintln!("{}", emulator.profiler_stats());
        result
    } else {
        emulator.run(max_steps)
    };
    result.map_err(|msg| anyhow!("Program failed: {}", msg))
}

fn run_command(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        ("list", _) => {
            for sample in samples::all() {
                println!("{:<12}{}", sample.name, sample.description);
            }
        }
        ("build", Some(sub)) => {
            let name = sub.value_of("program").unwrap_or_default();
            let listing = build_listing(name)?;
            match sub.value_of("output") {
                Some(path) => {
                    write_complete_file(&listing, Path::new(path))?;
                    info!("wrote {} to {}", name, path);
                }
                None => print!("{}", listing),
            }
        }
        ("run", Some(sub)) => {
            let listing = build_listing(sub.value_of("program").unwrap_or_default())?;
            print!("{}", execute(listing, sub)?);
        }
        ("exec", Some(sub)) => {
            let listing = load_listing(sub.value_of("input").unwrap_or_default())?;
            print!("{}", execute(listing, sub)?);
        }
        (other, _) => return Err(anyhow!("Unknown command {:?}", other)),
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let max_steps = Arg::with_name("max-steps")
        .long("max-steps")
        .takes_value(true)
        .default_value(DEFAULT_MAX_STEPS)
        .help("Give up after executing this many instructions");
    let profile = Arg::with_name("profile")
        .long("profile")
        .help("Print per-function call and step counts to stderr");
    let program = Arg::with_name("program")
        .required(true)
        .help("Name of a bundled sample program");

    let matches = App::new("classyc")
        .about("Compiles classy programs to MIPS assembly and runs them")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(SubCommand::with_name("list").about("Lists the bundled sample programs"))
        .subcommand(
            SubCommand::with_name("build")
                .about("Compiles a sample program to an assembly listing")
                .arg(program.clone())
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .takes_value(true)
                        .help("Write the listing here instead of stdout"),
                ),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("Compiles a sample program and runs it in the emulator")
                .arg(program)
                .arg(max_steps.clone())
                .arg(profile.clone()),
        )
        .subcommand(
            SubCommand::with_name("exec")
                .about("Runs an assembly listing in the emulator")
                .arg(
                    Arg::with_name("input")
                        .required(true)
                        .short("i")
                        .takes_value(true),
                )
                .arg(max_steps)
                .arg(profile),
        )
        .get_matches();

    if let Err(err) = run_command(&matches) {
        eprintln!("Error: {:?}", err);
        process::exit(1);
    }
}
