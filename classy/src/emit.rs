use crate::ast::{ClassName, MethodName};
use crate::class_table::ClassTable;
use crate::layout::Layouts;
use crate::resolve::find_method;
use anyhow::{Context, Result};
use mipsvm::{AsmProgram, DataEntry, Label};
use std::fs;
use std::io::Write;
use std::path::Path;

pub fn main_label() -> Label {
    Label::new("main")
}

pub fn newline_label() -> Label {
    Label::new("newline")
}

pub fn constructor_label(class: &ClassName) -> Label {
    Label::new(format!("new_{}", class))
}

pub fn method_label(class: &ClassName, method: &MethodName) -> Label {
    Label::new(format!("{}_{}", class, method))
}

pub fn vtable_label(class: &ClassName) -> Label {
    Label::new(format!("${}_vtable", class))
}

/// The static data of a compiled program: the newline string used by
/// `print`, then one vtable per class that has virtual methods.
pub fn data_section(classes: &ClassTable, layouts: &Layouts) -> Vec<DataEntry> {
    let mut data = vec![
        DataEntry::Label(newline_label()),
        DataEntry::Asciiz("\n".to_string()),
    ];
    for class in classes.iter() {
        let slots = layouts.vtable_slots(class.name());
        if slots.is_empty() {
            continue;
        }
        data.push(DataEntry::Label(vtable_label(class.name())));
        for method in slots {
            let found = find_method(classes, class.name(), method);
            data.push(DataEntry::Word(method_label(&found.implementing_class, method)));
        }
    }
    data
}

pub fn write_complete_file(program: &AsmProgram, output_path: &Path) -> Result<()> {
    let mut file = fs::File::create(output_path).with_context(|| {
        format!(
            "Failed to create output file {}",
            output_path.to_string_lossy()
        )
    })?;
    write!(file, "{}", program).context("Failed writing to output file")?;
    Ok(())
}
