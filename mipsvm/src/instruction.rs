use std::fmt;

pub const INDENT: &str = "\t";

#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug)]
pub enum Register {
    Zero,
    At,
    V0,
    V1,
    A0,
    A1,
    A2,
    A3,
    T0,
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
    T7,
    S0,
    S1,
    S2,
    S3,
    S4,
    S5,
    S6,
    S7,
    T8,
    T9,
    K0,
    K1,
    Gp,
    Sp,
    Fp,
    Ra,
}

pub const REGISTERS: [Register; 32] = [
    Register::Zero,
    Register::At,
    Register::V0,
    Register::V1,
    Register::A0,
    Register::A1,
    Register::A2,
    Register::A3,
    Register::T0,
    Register::T1,
    Register::T2,
    Register::T3,
    Register::T4,
    Register::T5,
    Register::T6,
    Register::T7,
    Register::S0,
    Register::S1,
    Register::S2,
    Register::S3,
    Register::S4,
    Register::S5,
    Register::S6,
    Register::S7,
    Register::T8,
    Register::T9,
    Register::K0,
    Register::K1,
    Register::Gp,
    Register::Sp,
    Register::Fp,
    Register::Ra,
];

impl Register {
    /// Position in the register file, which is also the hardware register number.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_name(name: &str) -> Option<Register> {
        let name = name.strip_prefix('$')?;
        REGISTERS
            .iter()
            .find(|register| register.bare_name() == name)
            .copied()
    }

    fn bare_name(self) -> String {
        format!("{:?}", self).to_lowercase()
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.bare_name())
    }
}

#[derive(Eq, Hash, PartialEq, Clone, Debug)]
pub struct Label(String);

impl Label {
    pub fn new(name: impl Into<String>) -> Label {
        Label(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Service numbers understood by the `syscall` instruction, selected through `$v0`.
#[derive(PartialEq, Copy, Clone, Debug)]
pub enum Syscall {
    PrintInt,
    PrintString,
    Allocate,
    Exit,
}

impl Syscall {
    pub fn code(self) -> i32 {
        match self {
            Syscall::PrintInt => 1,
            Syscall::PrintString => 4,
            Syscall::Allocate => 9,
            Syscall::Exit => 10,
        }
    }

    pub fn from_code(code: i32) -> Option<Syscall> {
        match code {
            1 => Some(Syscall::PrintInt),
            4 => Some(Syscall::PrintString),
            9 => Some(Syscall::Allocate),
            10 => Some(Syscall::Exit),
            _ => None,
        }
    }
}

#[derive(PartialEq, Clone, Debug)]
pub enum Instruction {
    // register loads
    Li(Register, i32),
    Move(Register, Register),
    La(Register, Label),

    // memory
    Lw(Register, i32, Register),
    Sw(Register, i32, Register),

    // arithmetic
    Addi(Register, Register, i32),

    // control flow
    J(Label),
    Jal(Label),
    Jr(Register),
    Jalr(Register),

    Syscall,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Li(rd, value) => write!(f, "li {}, {}", rd, value),
            Instruction::Move(rd, rs) => write!(f, "move {}, {}", rd, rs),
            Instruction::La(rd, label) => write!(f, "la {}, {}", rd, label),
            Instruction::Lw(rt, offset, base) => write!(f, "lw {}, {}({})", rt, offset, base),
            Instruction::Sw(rt, offset, base) => write!(f, "sw {}, {}({})", rt, offset, base),
            Instruction::Addi(rd, rs, value) => write!(f, "addi {}, {}, {}", rd, rs, value),
            Instruction::J(label) => write!(f, "j {}", label),
            Instruction::Jal(label) => write!(f, "jal {}", label),
            Instruction::Jr(rs) => write!(f, "jr {}", rs),
            Instruction::Jalr(rs) => write!(f, "jalr {}", rs),
            Instruction::Syscall => f.write_str("syscall"),
        }
    }
}

#[derive(PartialEq, Clone, Debug)]
pub enum TextEntry {
    Label(Label),
    Instruction(Instruction),
    Comment(String),
}

impl fmt::Display for TextEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextEntry::Label(label) => write!(f, "{}:", label),
            TextEntry::Instruction(instruction) => write!(f, "{}{}", INDENT, instruction),
            TextEntry::Comment(comment) => write!(f, "{}# {}", INDENT, comment),
        }
    }
}

#[derive(PartialEq, Clone, Debug)]
pub enum DataEntry {
    Label(Label),
    Asciiz(String),
    Word(Label),
}

impl fmt::Display for DataEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataEntry::Label(label) => write!(f, "{}:", label),
            DataEntry::Asciiz(s) => write!(f, "{}.asciiz \"{}\"", INDENT, s.escape_default()),
            DataEntry::Word(label) => write!(f, "{}.word {}", INDENT, label),
        }
    }
}

#[derive(PartialEq, Clone, Debug, Default)]
pub struct AsmProgram {
    pub data: Vec<DataEntry>,
    pub text: Vec<TextEntry>,
}

impl AsmProgram {
    pub fn new(data: Vec<DataEntry>, text: Vec<TextEntry>) -> AsmProgram {
        AsmProgram { data, text }
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.text.iter().filter_map(|entry| match entry {
            TextEntry::Instruction(instruction) => Some(instruction),
            _ => None,
        })
    }
}

impl fmt::Display for AsmProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ".data")?;
        for entry in self.data.iter() {
            writeln!(f, "{}", entry)?;
        }
        writeln!(f, ".text")?;
        for entry in self.text.iter() {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_names() {
        assert_eq!(Register::Sp.to_string(), "$sp");
        assert_eq!(Register::T0.to_string(), "$t0");
        assert_eq!(Register::from_name("$ra"), Some(Register::Ra));
        assert_eq!(Register::from_name("$zero"), Some(Register::Zero));
        assert_eq!(Register::from_name("ra"), None, "registers need a $ prefix");
        assert_eq!(Register::from_name("$t10"), None);
    }

    #[test]
    fn test_register_numbers() {
        for (number, register) in REGISTERS.iter().enumerate() {
            assert_eq!(register.index(), number);
        }
        assert_eq!(Register::Sp.index(), 29);
        assert_eq!(Register::Ra.index(), 31);
    }

    #[test]
    fn test_instruction_display() {
        assert_eq!(
            Instruction::Lw(Register::T0, 4, Register::Sp).to_string(),
            "lw $t0, 4($sp)"
        );
        assert_eq!(
            Instruction::Sw(Register::T1, -8, Register::Sp).to_string(),
            "sw $t1, -8($sp)"
        );
        assert_eq!(
            Instruction::Addi(Register::Sp, Register::Sp, -4).to_string(),
            "addi $sp, $sp, -4"
        );
        assert_eq!(
            Instruction::La(Register::T0, Label::new("$Base_vtable")).to_string(),
            "la $t0, $Base_vtable"
        );
        assert_eq!(Instruction::Jalr(Register::T0).to_string(), "jalr $t0");
        assert_eq!(Instruction::Syscall.to_string(), "syscall");
    }

    #[test]
    fn test_syscall_codes() {
        for syscall in [
            Syscall::PrintInt,
            Syscall::PrintString,
            Syscall::Allocate,
            Syscall::Exit,
        ]
        .iter()
        {
            assert_eq!(Syscall::from_code(syscall.code()), Some(*syscall));
        }
        assert_eq!(Syscall::from_code(11), None);
    }

    #[test]
    fn test_program_display() {
        let program = AsmProgram::new(
            vec![
                DataEntry::Label(Label::new("newline")),
                DataEntry::Asciiz("\n".to_string()),
                DataEntry::Label(Label::new("$Foo_vtable")),
                DataEntry::Word(Label::new("Foo_bar")),
            ],
            vec![
                TextEntry::Label(Label::new("main")),
                TextEntry::Comment("exit".to_string()),
                TextEntry::Instruction(Instruction::Li(Register::V0, 10)),
                TextEntry::Instruction(Instruction::Syscall),
            ],
        );
        assert_eq!(
            program.to_string(),
            ".data\nnewline:\n\t.asciiz \"\\n\"\n$Foo_vtable:\n\t.word Foo_bar\n\
             .text\nmain:\n\t# exit\n\tli $v0, 10\n\tsyscall\n"
        );
        assert_eq!(program.instructions().count(), 2);
    }
}
