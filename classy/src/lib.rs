//! Compiler for a small class-based object language with single inheritance,
//! virtual methods and erased generics, targeting the `mipsvm` machine.

pub mod ast;
mod class_table;
mod codegen;
pub mod emit;
mod error;
mod frame;
mod layout;
mod resolve;
pub mod samples;
pub mod typechecker;

pub use class_table::ClassTable;
pub use codegen::CodeGenerator;
pub use error::TypeError;
pub use frame::{FrameSlot, ResetPoint, VariableTable};
pub use layout::{Layouts, WORD_SIZE};
pub use resolve::{find_method, try_find_method, FoundMethod};
pub use typechecker::typecheck_program;

use anyhow::{Context, Result};
use ast::Program;
use mipsvm::AsmProgram;

/// Typechecks `program` and compiles it to a complete listing.
pub fn compile(program: &Program) -> Result<AsmProgram> {
    typecheck_program(program).context("Program failed to typecheck")?;
    compile_unchecked(program)
}

/// Compiles a program whose class annotations are already filled in.
pub fn compile_unchecked(program: &Program) -> Result<AsmProgram> {
    let classes = ClassTable::new(program)?;
    let mut generator = CodeGenerator::new(&classes);
    generator.compile_program(program);
    Ok(generator.into_program())
}
