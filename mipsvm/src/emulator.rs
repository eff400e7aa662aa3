use super::instruction::{AsmProgram, DataEntry, Instruction, Label, Register, Syscall, TextEntry};
use log::{debug, trace};
use std::collections::HashMap;

pub const TEXT_BASE: u32 = 0x0040_0000;
pub const DATA_BASE: u32 = 0x1001_0000;
pub const HEAP_BASE: u32 = 0x1004_0000;
pub const STACK_TOP: u32 = 0x7fff_effc;
const WORD: u32 = 4;

type LabelTable = bimap::BiMap<String, u32>;

fn align_word(bytes: u32) -> u32 {
    (bytes + WORD - 1) / WORD * WORD
}

struct FuncStats {
    num_calls: u64,
    num_steps: u64,
}

struct Profiler {
    function_stats: HashMap<u32, FuncStats>,
}

impl Profiler {
    fn new() -> Profiler {
        Profiler {
            function_stats: HashMap::new(),
        }
    }

    fn stats_mut(&mut self, function: u32) -> &mut FuncStats {
        self.function_stats.entry(function).or_insert(FuncStats {
            num_calls: 0,
            num_steps: 0,
        })
    }

    fn count_function_step(&mut self, function: u32) {
        self.stats_mut(function).num_steps += 1;
    }

    fn count_function_call(&mut self, function: u32) {
        self.stats_mut(function).num_calls += 1;
    }
}

pub struct MipsEmulator {
    instructions: Vec<Instruction>,
    label_table: LabelTable,
    // addresses of text labels, ascending, for attributing steps to functions
    text_labels: Vec<u32>,
    strings: HashMap<u32, String>,
    registers: [i32; 32],
    memory: HashMap<u32, i32>,
    pc: u32,
    heap_end: u32,
    output: String,
    step_counter: usize,
    profiler: Profiler,
}

impl MipsEmulator {
    pub fn new(program: AsmProgram) -> Result<MipsEmulator, String> {
        let mut label_table: LabelTable = bimap::BiMap::new();
        let mut strings: HashMap<u32, String> = HashMap::new();
        let mut pending_words: Vec<(u32, Label)> = Vec::new();

        let mut address = DATA_BASE;
        for entry in program.data.into_iter() {
            match entry {
                DataEntry::Label(label) => insert_label(&mut label_table, label, address)?,
                DataEntry::Asciiz(s) => {
                    let size = align_word(s.len() as u32 + 1);
                    strings.insert(address, s);
                    address += size;
                }
                DataEntry::Word(label) => {
                    pending_words.push((address, label));
                    address += WORD;
                }
            }
        }

        let mut instructions: Vec<Instruction> = Vec::new();
        let mut text_labels: Vec<u32> = Vec::new();
        let mut address = TEXT_BASE;
        for entry in program.text.into_iter() {
            match entry {
                TextEntry::Label(label) => {
                    insert_label(&mut label_table, label, address)?;
                    text_labels.push(address);
                }
                TextEntry::Instruction(instruction) => {
                    instructions.push(instruction);
                    address += WORD;
                }
                TextEntry::Comment(_) => {}
            }
        }

        let mut memory: HashMap<u32, i32> = HashMap::new();
        for (address, label) in pending_words {
            let target = resolve(&label_table, &label)?;
            memory.insert(address, target as i32);
        }
        for instruction in instructions.iter() {
            match instruction {
                Instruction::La(_, label) | Instruction::J(label) | Instruction::Jal(label) => {
                    resolve(&label_table, label)?;
                }
                _ => {}
            }
        }

        let pc = resolve(&label_table, &Label::new("main"))?;
        let mut registers = [0; 32];
        registers[Register::Sp.index()] = STACK_TOP as i32;
        debug!(
            "loaded {} instructions, {} labels",
            instructions.len(),
            label_table.len()
        );
        Ok(MipsEmulator {
            instructions,
            label_table,
            text_labels,
            strings,
            registers,
            memory,
            pc,
            heap_end: HEAP_BASE,
            output: String::new(),
            step_counter: 0,
            profiler: Profiler::new(),
        })
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn register(&self, register: Register) -> i32 {
        self.registers[register.index()]
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn label_address(&self, name: &str) -> Option<u32> {
        self.label_table.get_by_left(name).copied()
    }

    pub fn label_at(&self, address: u32) -> Option<&str> {
        self.label_table.get_by_right(&address).map(|s| &s[..])
    }

    fn set_register(&mut self, register: Register, value: i32) {
        // writes to $zero are discarded
        if register != Register::Zero {
            self.registers[register.index()] = value;
        }
    }

    fn effective_address(&self, offset: i32, base: Register) -> u32 {
        (self.register(base) as u32).wrapping_add(offset as u32)
    }

    pub fn load_word(&self, address: u32) -> Result<i32, String> {
        if address % WORD != 0 {
            return Err(format!("unaligned load from {:#010x}", address));
        }
        Ok(self.memory.get(&address).copied().unwrap_or(0))
    }

    fn store_word(&mut self, address: u32, value: i32) -> Result<(), String> {
        if address % WORD != 0 {
            return Err(format!("unaligned store to {:#010x}", address));
        }
        if address < DATA_BASE {
            return Err(format!("store to read-only address {:#010x}", address));
        }
        self.memory.insert(address, value);
        Ok(())
    }

    fn next_instruction(&self) -> Result<&Instruction, String> {
        let offset = self.pc.wrapping_sub(TEXT_BASE);
        if self.pc < TEXT_BASE || offset % WORD != 0 {
            return Err(format!("pc {:#010x} is outside the text segment", self.pc));
        }
        self.instructions
            .get((offset / WORD) as usize)
            .ok_or_else(|| format!("pc {:#010x} is past the end of the program", self.pc))
    }

    fn jump_target(&self, label: &Label) -> u32 {
        *self
            .label_table
            .get_by_left(label.name())
            .expect("labels are resolved when the program is loaded")
    }

    fn exec_syscall(&mut self) -> Result<Option<i32>, String> {
        let code = self.register(Register::V0);
        let syscall =
            Syscall::from_code(code).ok_or_else(|| format!("unknown syscall {}", code))?;
        let a0 = self.register(Register::A0);
        match syscall {
            Syscall::PrintInt => {
                self.output.push_str(&a0.to_string());
            }
            Syscall::PrintString => {
                let s = self
                    .strings
                    .get(&(a0 as u32))
                    .ok_or_else(|| format!("no string at {:#010x}", a0 as u32))?;
                self.output.push_str(s);
            }
            Syscall::Allocate => {
                if a0 < 0 {
                    return Err(format!("cannot allocate {} bytes", a0));
                }
                // The heap grows up towards the stack and may not reach it.
                let block = self.heap_end;
                self.heap_end = block
                    .checked_add(align_word(a0 as u32))
                    .filter(|&end| end <= self.register(Register::Sp) as u32)
                    .ok_or_else(|| format!("cannot allocate {} bytes", a0))?;
                self.set_register(Register::V0, block as i32);
            }
            Syscall::Exit => return Ok(Some(0)),
        }
        Ok(None)
    }

    /// Executes one instruction, returning the exit code once the program exits.
    pub fn step(&mut self) -> Result<Option<i32>, String> {
        self.step_counter += 1;
        let instruction = self.next_instruction()?.clone();
        trace!("{:#010x}: {}", self.pc, instruction);
        let mut next_pc = self.pc + WORD;
        match &instruction {
            Instruction::Li(rd, value) => self.set_register(*rd, *value),
            Instruction::Move(rd, rs) => self.set_register(*rd, self.register(*rs)),
            Instruction::La(rd, label) => {
                let address = self.jump_target(label);
                self.set_register(*rd, address as i32);
            }
            Instruction::Lw(rt, offset, base) => {
                let address = self.effective_address(*offset, *base);
                let value = self
                    .load_word(address)
                    .map_err(|e| format!("failed step {}: {}", instruction, e))?;
                self.set_register(*rt, value);
            }
            Instruction::Sw(rt, offset, base) => {
                let address = self.effective_address(*offset, *base);
                self.store_word(address, self.register(*rt))
                    .map_err(|e| format!("failed step {}: {}", instruction, e))?;
            }
            Instruction::Addi(rd, rs, value) => {
                self.set_register(*rd, self.register(*rs).wrapping_add(*value))
            }
            Instruction::J(label) => next_pc = self.jump_target(label),
            Instruction::Jal(label) => {
                self.set_register(Register::Ra, next_pc as i32);
                next_pc = self.jump_target(label);
            }
            Instruction::Jr(rs) => next_pc = self.register(*rs) as u32,
            Instruction::Jalr(rs) => {
                let target = self.register(*rs) as u32;
                self.set_register(Register::Ra, next_pc as i32);
                next_pc = target;
            }
            Instruction::Syscall => {
                if let Some(code) = self
                    .exec_syscall()
                    .map_err(|e| format!("failed step {}: {}", instruction, e))?
                {
                    return Ok(Some(code));
                }
            }
        }
        self.pc = next_pc;
        Ok(None)
    }

    pub fn run(&mut self, max_steps: usize) -> Result<String, String> {
        loop {
            if let Some(code) = self.step().map_err(|e| format!("{}\n{}", e, self.debug()))? {
                debug!("program exited with {} after {} steps", code, self.step_counter);
                return Ok(self.output.clone());
            }
            if self.step_counter > max_steps {
                return Err(format!(
                    "Program failed to finish within {} steps",
                    max_steps
                ));
            }
        }
    }

    fn current_function(&self) -> Option<u32> {
        match self.text_labels.binary_search(&self.pc) {
            Ok(index) => Some(self.text_labels[index]),
            Err(0) => None,
            Err(index) => Some(self.text_labels[index - 1]),
        }
    }

    pub fn profile_step(&mut self) {
        if let Some(function) = self.current_function() {
            self.profiler.count_function_step(function);
        }
        let callee = match self.next_instruction() {
            Ok(Instruction::Jal(label)) => Some(self.jump_target(label)),
            Ok(Instruction::Jalr(rs)) => Some(self.register(*rs) as u32),
            _ => None,
        };
        if let Some(callee) = callee {
            self.profiler.count_function_call(callee);
        }
    }

    pub fn run_profiled(&mut self, max_steps: usize) -> Result<String, String> {
        loop {
            self.profile_step();
            if let Some(_) = self.step().map_err(|e| format!("{}\n{}", e, self.debug()))? {
                return Ok(self.output.clone());
            }
            if self.step_counter > max_steps {
                return Err(format!(
                    "Program failed to finish within {} steps",
                    max_steps
                ));
            }
        }
    }

    pub fn debug(&self) -> String {
        use std::fmt::Write;
        let mut s = String::new();
        writeln!(&mut s, "Step: {}", self.step_counter).unwrap();
        writeln!(
            &mut s,
            "PC: {:#010x} ({})",
            self.pc,
            self.current_function()
                .and_then(|function| self.label_at(function))
                .unwrap_or("Unknown Function")
        )
        .unwrap();
        for register in [
            Register::V0,
            Register::A0,
            Register::T0,
            Register::T1,
            Register::Sp,
            Register::Ra,
        ]
        .iter()
        {
            writeln!(&mut s, "{}: {:#010x}", register, self.register(*register)).unwrap();
        }
        writeln!(&mut s, "Next Instruction: {:?}", self.next_instruction().ok()).unwrap();
        s
    }

    pub fn profiler_stats(&self) -> String {
        let mut stats = self.profiler.function_stats.iter().collect::<Vec<_>>();
        stats.sort_by_key(|(_function, stats)| stats.num_steps);
        let total_steps: u64 = stats.iter().map(|(_, stats)| stats.num_steps).sum();
        let top = format!(
            "{:<30} {:>10} {:>10} {:>10} {:>10}",
            "function", "calls", "steps", "steps/call", "% steps"
        );
        let body = stats
            .iter()
            .map(|(function, stats)| {
                format!(
                    "{:.<30} {:>10} {:>10} {:>10} {:>10.2}%",
                    self.label_at(**function).unwrap_or("UNKNOWN_FUNC"),
                    stats.num_calls,
                    stats.num_steps,
                    if stats.num_calls > 0 {
                        stats.num_steps / stats.num_calls
                    } else {
                        0
                    },
                    stats.num_steps as f64 / total_steps as f64 * 100.0
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!("{}\n{}", top, body)
    }
}

fn insert_label(label_table: &mut LabelTable, label: Label, address: u32) -> Result<(), String> {
    if label_table.contains_left(label.name()) {
        return Err(format!("label {:?} declared twice", label.name()));
    }
    if let Some(existing) = label_table.get_by_right(&address) {
        return Err(format!(
            "labels {:?} and {:?} share address {:#010x}",
            existing,
            label.name(),
            address
        ));
    }
    label_table.insert(label.name().to_string(), address);
    Ok(())
}

fn resolve(label_table: &LabelTable, label: &Label) -> Result<u32, String> {
    label_table
        .get_by_left(label.name())
        .copied()
        .ok_or_else(|| format!("undefined label {:?}", label.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asmparser::parse_listing;

    fn load(listing: &str) -> MipsEmulator {
        let _ = env_logger::builder().is_test(true).try_init();
        MipsEmulator::new(parse_listing(listing).unwrap()).unwrap()
    }

    mod loading {
        use super::*;

        #[test]
        fn data_layout() {
            let vm = load(
                "
.data
newline:
    .asciiz \"\\n\"
$Foo_vtable:
    .word Foo_bar
    .word main
.text
main:
    li $v0, 10
    syscall
Foo_bar:
    jr $ra
",
            );
            assert_eq!(vm.label_address("newline"), Some(DATA_BASE));
            assert_eq!(
                vm.label_address("$Foo_vtable"),
                Some(DATA_BASE + 4),
                "a one character string occupies a single word"
            );
            assert_eq!(vm.label_address("main"), Some(TEXT_BASE));
            assert_eq!(vm.label_address("Foo_bar"), Some(TEXT_BASE + 8));
            assert_eq!(vm.load_word(DATA_BASE + 4), Ok((TEXT_BASE + 8) as i32));
            assert_eq!(vm.load_word(DATA_BASE + 8), Ok(TEXT_BASE as i32));
            assert_eq!(vm.label_at(TEXT_BASE + 8), Some("Foo_bar"));
            assert_eq!(vm.pc(), TEXT_BASE);
            assert_eq!(vm.register(Register::Sp), STACK_TOP as i32);
        }

        #[test]
        fn undefined_labels() {
            let program = parse_listing(".text\nmain:\n    jal nowhere\n").unwrap();
            assert_eq!(
                MipsEmulator::new(program).err(),
                Some("undefined label \"nowhere\"".to_string())
            );
            let program = parse_listing(".text\nstart:\n    syscall\n").unwrap();
            assert_eq!(
                MipsEmulator::new(program).err(),
                Some("undefined label \"main\"".to_string()),
                "programs need an entry point"
            );
        }

        #[test]
        fn duplicate_labels() {
            let program =
                parse_listing(".text\nmain:\n    syscall\nmain:\n    syscall\n").unwrap();
            assert_eq!(
                MipsEmulator::new(program).err(),
                Some("label \"main\" declared twice".to_string())
            );
        }
    }

    mod execution {
        use super::*;

        #[test]
        fn print_and_exit() {
            let mut vm = load(
                "
.data
newline:
    .asciiz \"\\n\"
.text
main:
    li $a0, 42
    li $v0, 1
    syscall
    li $v0, 4
    la $a0, newline
    syscall
    li $v0, 10
    syscall
",
            );
            assert_eq!(vm.run(100), Ok("42\n".to_string()));
        }

        #[test]
        fn stack_push_pop() {
            let mut vm = load(
                "
.text
main:
    li $t0, 7
    addi $sp, $sp, -4
    sw $t0, 0($sp)
    li $t0, 0
    lw $a0, 0($sp)
    addi $sp, $sp, 4
    li $v0, 1
    syscall
    li $v0, 10
    syscall
",
            );
            assert_eq!(vm.run(100), Ok("7".to_string()));
            assert_eq!(vm.register(Register::Sp), STACK_TOP as i32);
            assert_eq!(vm.load_word(STACK_TOP - 4), Ok(7));
        }

        #[test]
        fn calls_return_to_caller() {
            let mut vm = load(
                "
.text
main:
    jal seven
    move $a0, $v0
    la $t0, eight
    jalr $t0
    addi $a0, $v0, 0
    li $v0, 1
    syscall
    li $v0, 10
    syscall
seven:
    li $v0, 7
    jr $ra
eight:
    li $v0, 8
    jr $ra
",
            );
            assert_eq!(vm.run(100), Ok("8".to_string()));
        }

        #[test]
        fn allocation_is_word_aligned() {
            let mut vm = load(
                "
.text
main:
    li $a0, 6
    li $v0, 9
    syscall
    move $t0, $v0
    li $a0, 4
    li $v0, 9
    syscall
    li $v0, 10
    syscall
",
            );
            vm.run(100).unwrap();
            assert_eq!(vm.register(Register::T0), HEAP_BASE as i32);
            assert_eq!(vm.register(Register::V0), (HEAP_BASE + 8) as i32);
        }

        #[test]
        fn zero_register_is_constant() {
            let mut vm = load(".text\nmain:\n    li $zero, 5\n    li $v0, 10\n    syscall\n");
            vm.run(10).unwrap();
            assert_eq!(vm.register(Register::Zero), 0);
        }

        #[test]
        fn faults() {
            let mut vm = load(".text\nmain:\n    li $t0, 2\n    lw $t1, 0($t0)\n");
            assert!(vm.run(10).unwrap_err().starts_with("failed step lw $t1, 0($t0): unaligned load"));

            let mut vm = load(".text\nmain:\n    li $v0, 99\n    syscall\n");
            assert!(vm.run(10).unwrap_err().contains("unknown syscall 99"));

            let mut vm = load(".text\nmain:\n    li $t0, 0\n");
            assert!(vm
                .run(10)
                .unwrap_err()
                .starts_with("pc 0x00400004 is past the end of the program"));

            let mut vm = load(
                "
.text
main:
    li $a0, 0x7fffffff
    li $v0, 9
    syscall
    li $a0, 0x7fffffff
    li $v0, 9
    syscall
    li $v0, 10
    syscall
",
            );
            let err = vm.run(20).unwrap_err();
            assert!(err.contains("cannot allocate 2147483647 bytes"), "{}", err);
            assert_eq!(vm.register(Register::V0), 9, "nothing was allocated");

            let mut vm = load(".text\nmain:\n    j main\n");
            assert_eq!(
                vm.run(50),
                Err("Program failed to finish within 50 steps".to_string())
            );
        }

        #[test]
        fn profiling() {
            let mut vm = load(
                "
.text
main:
    jal helper
    jal helper
    li $v0, 10
    syscall
helper:
    jr $ra
",
            );
            vm.run_profiled(100).unwrap();
            let stats = vm.profiler_stats();
            assert!(stats.contains("helper"), "{}", stats);
            assert!(stats.contains("main"), "{}", stats);
        }
    }
}
