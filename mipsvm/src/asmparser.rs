use super::instruction::{AsmProgram, DataEntry, Instruction, Label, Register, TextEntry};
use std::convert::TryFrom;

#[derive(PartialEq, Copy, Clone, Debug)]
enum Section {
    Data,
    Text,
}

#[derive(PartialEq, Clone, Debug)]
enum Line {
    None,
    Section(Section),
    Label(Label),
    Data(DataEntry),
    Instruction(Instruction),
}

fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if c == '#' {
            return &line[..index];
        }
    }
    line
}

fn unescape(s: &str) -> Result<String, String> {
    let mut result = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some(other) => return Err(format!("Invalid escape sequence \\{}", other)),
            None => return Err("Unterminated escape sequence".to_string()),
        }
    }
    Ok(result)
}

fn parse_register(s: &str) -> Result<Register, String> {
    Register::from_name(s.trim()).ok_or_else(|| format!("Invalid register {:?}", s.trim()))
}

fn parse_immediate(s: &str) -> Result<i32, String> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = s.strip_prefix("-0x") {
        i64::from_str_radix(hex, 16).ok().map(|value| -value)
    } else {
        s.parse::<i64>().ok()
    };
    parsed
        .and_then(|value| i32::try_from(value).ok())
        .ok_or_else(|| format!("Invalid immediate {:?}", s))
}

fn parse_label(s: &str) -> Result<Label, String> {
    let s = s.trim();
    let valid = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.');
    if valid {
        Ok(Label::new(s))
    } else {
        Err(format!("Invalid label {:?}", s))
    }
}

/// Parses `offset(base)` memory operands.
fn parse_address(s: &str) -> Result<(i32, Register), String> {
    let s = s.trim();
    let open = s
        .find('(')
        .ok_or_else(|| format!("Invalid address {:?}", s))?;
    let close = s
        .strip_suffix(')')
        .ok_or_else(|| format!("Invalid address {:?}", s))?;
    let offset = if open == 0 {
        0
    } else {
        parse_immediate(&s[..open])?
    };
    let base = parse_register(&close[open + 1..])?;
    Ok((offset, base))
}

fn expect_operands<'a>(
    mnemonic: &str,
    operands: &'a [&'a str],
    count: usize,
) -> Result<&'a [&'a str], String> {
    if operands.len() == count {
        Ok(operands)
    } else {
        Err(format!(
            "{:?} expects {} operands, found {}",
            mnemonic,
            count,
            operands.len()
        ))
    }
}

fn parse_instruction(mnemonic: &str, rest: &str) -> Result<Instruction, String> {
    let operands: Vec<&str> = if rest.trim().is_empty() {
        Vec::new()
    } else {
        rest.split(',').map(|operand| operand.trim()).collect()
    };
    let instruction = match mnemonic {
        "li" => {
            let ops = expect_operands(mnemonic, &operands, 2)?;
            Instruction::Li(parse_register(ops[0])?, parse_immediate(ops[1])?)
        }
        "move" => {
            let ops = expect_operands(mnemonic, &operands, 2)?;
            Instruction::Move(parse_register(ops[0])?, parse_register(ops[1])?)
        }
        "la" => {
            let ops = expect_operands(mnemonic, &operands, 2)?;
            Instruction::La(parse_register(ops[0])?, parse_label(ops[1])?)
        }
        "lw" | "sw" => {
            let ops = expect_operands(mnemonic, &operands, 2)?;
            let rt = parse_register(ops[0])?;
            let (offset, base) = parse_address(ops[1])?;
            if mnemonic == "lw" {
                Instruction::Lw(rt, offset, base)
            } else {
                Instruction::Sw(rt, offset, base)
            }
        }
        "addi" | "addiu" => {
            let ops = expect_operands(mnemonic, &operands, 3)?;
            Instruction::Addi(
                parse_register(ops[0])?,
                parse_register(ops[1])?,
                parse_immediate(ops[2])?,
            )
        }
        "j" | "jal" => {
            let ops = expect_operands(mnemonic, &operands, 1)?;
            let label = parse_label(ops[0])?;
            if mnemonic == "j" {
                Instruction::J(label)
            } else {
                Instruction::Jal(label)
            }
        }
        "jr" | "jalr" => {
            let ops = expect_operands(mnemonic, &operands, 1)?;
            let register = parse_register(ops[0])?;
            if mnemonic == "jr" {
                Instruction::Jr(register)
            } else {
                Instruction::Jalr(register)
            }
        }
        "syscall" => {
            expect_operands(mnemonic, &operands, 0)?;
            Instruction::Syscall
        }
        _ => return Err(format!("Unknown instruction {:?}", mnemonic)),
    };
    Ok(instruction)
}

fn parse_directive(directive: &str, rest: &str) -> Result<Line, String> {
    match directive {
        ".data" => Ok(Line::Section(Section::Data)),
        ".text" => Ok(Line::Section(Section::Text)),
        ".globl" => Ok(Line::None),
        ".word" => Ok(Line::Data(DataEntry::Word(parse_label(rest)?))),
        ".asciiz" => {
            let rest = rest.trim();
            let inner = rest
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .ok_or_else(|| format!("Invalid string literal {}", rest))?;
            Ok(Line::Data(DataEntry::Asciiz(unescape(inner)?)))
        }
        _ => Err(format!("Unknown directive {:?}", directive)),
    }
}

fn parse_line(line: &str) -> Result<Line, String> {
    let line = strip_comment(line).trim();
    if line.is_empty() {
        return Ok(Line::None);
    }
    if let Some(name) = line.strip_suffix(':') {
        return Ok(Line::Label(parse_label(name)?));
    }
    let (head, rest) = match line.find(char::is_whitespace) {
        Some(index) => (&line[..index], &line[index..]),
        None => (line, ""),
    };
    if head.starts_with('.') {
        parse_directive(head, rest)
    } else {
        parse_instruction(head, rest).map(Line::Instruction)
    }
}

/// Reads a listing in the format written by `AsmProgram`'s `Display` impl.
pub fn parse_listing(listing: &str) -> Result<AsmProgram, String> {
    let mut program = AsmProgram::default();
    let mut section = Section::Text;
    for (number, line) in listing.lines().enumerate() {
        let parsed =
            parse_line(line).map_err(|e| format!("line {}: {}: {}", number + 1, e, line.trim()))?;
        match (parsed, section) {
            (Line::None, _) => {}
            (Line::Section(next), _) => section = next,
            (Line::Label(label), Section::Data) => program.data.push(DataEntry::Label(label)),
            (Line::Label(label), Section::Text) => program.text.push(TextEntry::Label(label)),
            (Line::Data(entry), Section::Data) => program.data.push(entry),
            (Line::Instruction(instruction), Section::Text) => {
                program.text.push(TextEntry::Instruction(instruction))
            }
            (Line::Data(_), Section::Text) => {
                return Err(format!(
                    "line {}: data directive in text section: {}",
                    number + 1,
                    line.trim()
                ))
            }
            (Line::Instruction(_), Section::Data) => {
                return Err(format!(
                    "line {}: instruction in data section: {}",
                    number + 1,
                    line.trim()
                ))
            }
        }
    }
    Ok(program)
}
