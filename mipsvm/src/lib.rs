//! The target machine for the `classy` compiler: a word-addressed subset of the
//! MIPS32 instruction set, its textual listing format, and an emulator that
//! runs listings the way SPIM would.

mod asmparser;
mod emulator;
mod instruction;

pub use asmparser::parse_listing;
pub use emulator::{MipsEmulator, DATA_BASE, HEAP_BASE, STACK_TOP, TEXT_BASE};
pub use instruction::{
    AsmProgram, DataEntry, Instruction, Label, Register, Syscall, TextEntry, INDENT, REGISTERS,
};
