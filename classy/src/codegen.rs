use crate::ast::{
    ClassDefinition, ClassName, Exp, FieldAccess, Lhs, MethodCallStmt, NewStmt, Program, Stmt,
    VarDec,
};
use crate::class_table::ClassTable;
use crate::emit::{
    constructor_label, data_section, main_label, method_label, newline_label, vtable_label,
};
use crate::frame::{FrameSlot, VariableTable};
use crate::layout::{Layouts, WORD_SIZE};
use crate::resolve::find_method;
use log::debug;
use mipsvm::{AsmProgram, Instruction, Label, Register, Syscall, TextEntry};

/// Lowers a checked program to stack-machine code. Every value lives in a
/// stack slot tracked by `variables`; registers only hold values between a
/// load and the store or call that consumes them.
pub struct CodeGenerator<'a> {
    classes: &'a ClassTable<'a>,
    layouts: Layouts,
    variables: VariableTable,
    text: Vec<TextEntry>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(classes: &'a ClassTable<'a>) -> CodeGenerator<'a> {
        CodeGenerator {
            classes,
            layouts: Layouts::new(classes),
            variables: VariableTable::new(),
            text: Vec::new(),
        }
    }

    pub fn layouts(&self) -> &Layouts {
        &self.layouts
    }

    pub fn text(&self) -> &[TextEntry] {
        &self.text
    }

    /// The generated text together with the program's static data.
    pub fn into_program(self) -> AsmProgram {
        AsmProgram::new(data_section(self.classes, &self.layouts), self.text)
    }

    fn emit(&mut self, instruction: Instruction) {
        self.text.push(TextEntry::Instruction(instruction));
    }

    fn label(&mut self, label: Label) {
        self.text.push(TextEntry::Label(label));
    }

    fn push(&mut self, register: Register) {
        self.emit(Instruction::Addi(Register::Sp, Register::Sp, -WORD_SIZE));
        self.emit(Instruction::Sw(register, 0, Register::Sp));
    }

    pub fn compile_program(&mut self, program: &Program) {
        self.compile_entry_point(program.entry_point());
        let classes = self.classes;
        for class in classes.iter() {
            self.compile_class(class);
        }
    }

    fn compile_entry_point(&mut self, body: &Stmt) {
        assert!(self.variables.is_empty(), "frame not empty entering main");
        debug!("compiling entry point");
        self.label(main_label());
        self.compile_statement(None, body);
        self.variables.clear();
        self.emit(Instruction::Li(Register::V0, Syscall::Exit.code()));
        self.emit(Instruction::Syscall);
    }

    fn compile_class(&mut self, class: &ClassDefinition) {
        let constructor = class.constructor();
        self.compile_function(
            class.name(),
            constructor_label(class.name()),
            constructor.params(),
            constructor.body(),
        );
        for method in class.methods().iter() {
            self.compile_function(
                class.name(),
                method_label(class.name(), method.name()),
                method.params(),
                method.body(),
            );
        }
    }

    /// On entry the caller has pushed `this` and then each argument in order,
    /// so the frame is seeded in that order before `$ra` is saved.
    fn compile_function(&mut self, class: &ClassName, label: Label, params: &[VarDec], body: &Stmt) {
        assert!(
            self.variables.is_empty(),
            "frame not empty entering {}",
            label
        );
        debug!("compiling {}", label);
        self.label(label);
        self.variables.push_variable(FrameSlot::This, WORD_SIZE);
        for param in params {
            self.variables
                .push_variable(FrameSlot::Named(param.variable().clone()), WORD_SIZE);
        }
        self.push(Register::Ra);
        self.variables
            .push_variable(FrameSlot::ReturnAddress, WORD_SIZE);

        self.compile_statement(Some(class), body);

        let ra_offset = self.variables.variable_offset(&FrameSlot::ReturnAddress);
        let frame_size = self.variables.total_size_of_all_variables();
        self.emit(Instruction::Lw(Register::Ra, ra_offset, Register::Sp));
        self.emit(Instruction::Addi(Register::Sp, Register::Sp, frame_size));
        self.emit(Instruction::Jr(Register::Ra));
        self.variables.clear();
    }

    /// `for_class` is the class whose constructor or method is being
    /// compiled, or `None` for the entry point.
    pub fn compile_statement(&mut self, for_class: Option<&ClassName>, stmt: &Stmt) {
        match stmt {
            Stmt::New(new) => self.compile_new(new),
            Stmt::MethodCall(call) => self.compile_method_call(call),
            Stmt::Super(params) => self.compile_super(for_class, params),
            Stmt::Print(exp) => {
                self.compile_exp(exp, Register::A0);
                self.emit(Instruction::Li(Register::V0, Syscall::PrintInt.code()));
                self.emit(Instruction::Syscall);
                self.emit(Instruction::Li(Register::V0, Syscall::PrintString.code()));
                self.emit(Instruction::La(Register::A0, newline_label()));
                self.emit(Instruction::Syscall);
            }
            Stmt::Return(Some(exp)) => self.compile_exp(exp, Register::V0),
            Stmt::Return(None) => self.emit(Instruction::Li(Register::V0, 0)),
            Stmt::Assign(lhs, exp) => {
                self.compile_exp(exp, Register::T0);
                self.put_lhs_address(lhs, Register::T1);
                self.emit(Instruction::Sw(Register::T0, 0, Register::T1));
            }
            Stmt::Sequence(first, second) => {
                self.compile_statement(for_class, first);
                self.compile_statement(for_class, second);
            }
            Stmt::Empty => {}
        }
    }

    fn compile_new(&mut self, stmt: &NewStmt) {
        let class = stmt.class();
        self.emit(Instruction::Li(Register::A0, self.layouts.size_of(class)));
        self.emit(Instruction::Li(Register::V0, Syscall::Allocate.code()));
        self.emit(Instruction::Syscall);
        if let Some(vtable_pointer) = self.layouts.vtable_pointer_offset(class) {
            self.emit(Instruction::La(Register::T0, vtable_label(class)));
            self.emit(Instruction::Sw(Register::T0, vtable_pointer, Register::V0));
        }
        self.push(Register::V0);
        self.variables.push_variable(
            FrameSlot::Named(stmt.vardec().variable().clone()),
            WORD_SIZE,
        );

        let reset_point = self.variables.make_reset_point();
        self.push(Register::V0);
        self.variables.push_dummy(WORD_SIZE);
        self.compile_params(stmt.params(), Register::T0);
        self.emit(Instruction::Jal(constructor_label(class)));
        self.variables.reset_to(reset_point);
    }

    fn compile_method_call(&mut self, stmt: &MethodCallStmt) {
        let on_class = match stmt.on_class() {
            Some(class) => class,
            None => panic!("call to {} has no receiver class annotation", stmt.name()),
        };

        let reset_point = self.variables.make_reset_point();
        self.compile_exp(stmt.exp(), Register::T0);
        self.push(Register::T0);
        self.variables.push_dummy(WORD_SIZE);
        // $t0 still holds the receiver for dispatch
        self.compile_params(stmt.params(), Register::T1);

        let found = find_method(self.classes, on_class, stmt.name());
        if found.is_virtual {
            let vtable_pointer = match self.layouts.vtable_pointer_offset(on_class) {
                Some(offset) => offset,
                None => panic!("virtual call on {} which has no vtable", on_class),
            };
            let slot = match self.layouts.method_offset(on_class, stmt.name()) {
                Some(offset) => offset,
                None => panic!("no vtable slot for {} on {}", stmt.name(), on_class),
            };
            self.emit(Instruction::Lw(Register::T0, vtable_pointer, Register::T0));
            self.emit(Instruction::Lw(Register::T0, slot, Register::T0));
            self.emit(Instruction::Jalr(Register::T0));
        } else {
            self.emit(Instruction::Jal(method_label(
                &found.implementing_class,
                stmt.name(),
            )));
        }
        self.variables.reset_to(reset_point);

        self.push(Register::V0);
        self.variables.push_variable(
            FrameSlot::Named(stmt.vardec().variable().clone()),
            WORD_SIZE,
        );
    }

    fn compile_super(&mut self, for_class: Option<&ClassName>, params: &[Exp]) {
        let class = match for_class {
            Some(class) => class,
            None => panic!("super outside of a constructor"),
        };
        let parent = match self.classes.superclass_of(class) {
            Some(parent) => parent.name(),
            None => panic!("super in {} which has no superclass", class),
        };

        let reset_point = self.variables.make_reset_point();
        let this_offset = self.variables.variable_offset(&FrameSlot::This);
        self.emit(Instruction::Lw(Register::T0, this_offset, Register::Sp));
        self.push(Register::T0);
        self.variables.push_dummy(WORD_SIZE);
        self.compile_params(params, Register::T0);
        self.emit(Instruction::Jal(constructor_label(parent)));
        self.variables.reset_to(reset_point);
    }

    /// Stores arguments below the stack pointer in order, then moves the
    /// stack pointer past all of them at once. The callee accounts for them.
    fn compile_params(&mut self, params: &[Exp], temp: Register) {
        for (index, param) in params.iter().enumerate() {
            self.compile_exp(param, temp);
            let offset = -WORD_SIZE * (index as i32 + 1);
            self.emit(Instruction::Sw(temp, offset, Register::Sp));
        }
        if !params.is_empty() {
            let size = WORD_SIZE * params.len() as i32;
            self.emit(Instruction::Addi(Register::Sp, Register::Sp, -size));
        }
    }

    fn compile_exp(&mut self, exp: &Exp, dest: Register) {
        match exp {
            Exp::Int(value) => self.emit(Instruction::Li(dest, *value)),
            Exp::Lhs(lhs) => self.compile_lhs(lhs, dest),
        }
    }

    /// Loads the value of `lhs` into `dest`.
    fn compile_lhs(&mut self, lhs: &Lhs, dest: Register) {
        match lhs {
            Lhs::Variable(variable) => {
                let offset = self
                    .variables
                    .variable_offset(&FrameSlot::Named(variable.clone()));
                self.emit(Instruction::Lw(dest, offset, Register::Sp));
            }
            Lhs::This => {
                let offset = self.variables.variable_offset(&FrameSlot::This);
                self.emit(Instruction::Lw(dest, offset, Register::Sp));
            }
            Lhs::FieldAccess(access) => {
                self.compile_lhs(access.lhs(), dest);
                let offset = self.field_offset(access);
                self.emit(Instruction::Lw(dest, offset, dest));
            }
        }
    }

    /// Puts the address `lhs` names into `dest`.
    fn put_lhs_address(&mut self, lhs: &Lhs, dest: Register) {
        match lhs {
            Lhs::Variable(variable) => {
                let offset = self
                    .variables
                    .variable_offset(&FrameSlot::Named(variable.clone()));
                self.emit(Instruction::Addi(dest, Register::Sp, offset));
            }
            Lhs::This => {
                let offset = self.variables.variable_offset(&FrameSlot::This);
                self.emit(Instruction::Addi(dest, Register::Sp, offset));
            }
            Lhs::FieldAccess(access) => {
                self.compile_lhs(access.lhs(), dest);
                let offset = self.field_offset(access);
                self.emit(Instruction::Addi(dest, dest, offset));
            }
        }
    }

    fn field_offset(&self, access: &FieldAccess) -> i32 {
        match access.lhs_class() {
            Some(class) => self.layouts.field_offset(class, access.field()),
            None => panic!(
                "access to field {} has no base class annotation",
                access.field()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Constructor, Extends, MethodDefinition, Type};
    use mipsvm::Instruction::*;
    use mipsvm::Register::*;

    fn program(classes: Vec<ClassDefinition>) -> Program {
        Program::new(classes, Stmt::Empty)
    }

    fn annotated_field(lhs: Lhs, field: &str, class: &str) -> Lhs {
        let lhs = Lhs::field(lhs, field);
        if let Lhs::FieldAccess(access) = &lhs {
            access.set_lhs_class(ClassName::new(class));
        }
        lhs
    }

    fn annotated_call(stmt: Stmt, class: &str) -> Stmt {
        if let Stmt::MethodCall(call) = &stmt {
            call.set_on_class(ClassName::new(class));
        }
        stmt
    }

    fn instructions(generator: &CodeGenerator) -> Vec<Instruction> {
        generator
            .text()
            .iter()
            .filter_map(|entry| match entry {
                TextEntry::Instruction(instruction) => Some(instruction.clone()),
                _ => None,
            })
            .collect()
    }

    fn point_class() -> ClassDefinition {
        ClassDefinition::new(
            "Point",
            None,
            vec![VarDec::new(Type::Int, "x"), VarDec::new(Type::Int, "y")],
            Constructor::new(vec![], Stmt::Empty),
            vec![],
        )
    }

    fn animal_classes() -> Vec<ClassDefinition> {
        vec![
            ClassDefinition::new(
                "Animal",
                None,
                vec![],
                Constructor::new(vec![], Stmt::Empty),
                vec![
                    MethodDefinition::new(
                        true,
                        Type::Int,
                        "legs",
                        vec![],
                        Stmt::ret(Some(Exp::int(4))),
                    ),
                    MethodDefinition::new(
                        false,
                        Type::Int,
                        "id",
                        vec![VarDec::new(Type::Int, "n")],
                        Stmt::ret(Some(Exp::var("n"))),
                    ),
                ],
            ),
            ClassDefinition::new(
                "Bird",
                Some(Extends::new("Animal", vec![])),
                vec![],
                Constructor::new(vec![], Stmt::super_call(vec![])),
                vec![MethodDefinition::new(
                    true,
                    Type::Int,
                    "legs",
                    vec![],
                    Stmt::ret(Some(Exp::int(2))),
                )],
            ),
        ]
    }

    mod statements {
        use super::*;

        #[test]
        fn test_print_literal() {
            let program = program(vec![]);
            let classes = ClassTable::new(&program).unwrap();
            let mut generator = CodeGenerator::new(&classes);
            generator.compile_statement(None, &Stmt::print(Exp::int(7)));
            assert_eq!(
                instructions(&generator),
                vec![
                    Li(A0, 7),
                    Li(V0, 1),
                    Instruction::Syscall,
                    Li(V0, 4),
                    La(A0, Label::new("newline")),
                    Instruction::Syscall,
                ]
            );
        }

        #[test]
        fn test_new_without_vtable() {
            let program = program(vec![point_class()]);
            let classes = ClassTable::new(&program).unwrap();
            let mut generator = CodeGenerator::new(&classes);
            generator.compile_statement(
                None,
                &Stmt::construct(VarDec::new(Type::class("Point"), "p"), "Point", vec![], vec![]),
            );
            assert_eq!(
                instructions(&generator),
                vec![
                    Li(A0, 8),
                    Li(V0, 9),
                    Instruction::Syscall,
                    Addi(Sp, Sp, -4),
                    Sw(V0, 0, Sp),
                    Addi(Sp, Sp, -4),
                    Sw(V0, 0, Sp),
                    Jal(Label::new("new_Point")),
                ]
            );
            assert_eq!(
                generator
                    .variables
                    .variable_offset(&FrameSlot::Named(crate::ast::Variable::new("p"))),
                0
            );
            assert_eq!(generator.variables.total_size_of_all_variables(), 4);
        }

        #[test]
        fn test_new_with_vtable_and_params() {
            let program = program(animal_classes());
            let classes = ClassTable::new(&program).unwrap();
            let mut generator = CodeGenerator::new(&classes);
            generator.compile_statement(
                None,
                &Stmt::seq(vec![
                    Stmt::construct(VarDec::new(Type::class("Bird"), "b"), "Bird", vec![], vec![]),
                    Stmt::construct(
                        VarDec::new(Type::class("Animal"), "a"),
                        "Animal",
                        vec![],
                        vec![Exp::int(3), Exp::var("b")],
                    ),
                ]),
            );
            let code = instructions(&generator);
            assert_eq!(
                &code[3..5],
                &[La(T0, Label::new("$Bird_vtable")), Sw(T0, 0, V0)]
            );
            assert_eq!(
                &code[10..],
                &[
                    Li(A0, 4),
                    Li(V0, 9),
                    Instruction::Syscall,
                    La(T0, Label::new("$Animal_vtable")),
                    Sw(T0, 0, V0),
                    Addi(Sp, Sp, -4),
                    Sw(V0, 0, Sp),
                    Addi(Sp, Sp, -4),
                    Sw(V0, 0, Sp),
                    Li(T0, 3),
                    Sw(T0, -4, Sp),
                    // b sits below a and the constructor's `this`
                    Lw(T0, 8, Sp),
                    Sw(T0, -8, Sp),
                    Addi(Sp, Sp, -8),
                    Jal(Label::new("new_Animal")),
                ]
            );
        }

        #[test]
        fn test_virtual_call() {
            let program = program(animal_classes());
            let classes = ClassTable::new(&program).unwrap();
            let mut generator = CodeGenerator::new(&classes);
            generator
                .variables
                .push_variable(FrameSlot::Named(crate::ast::Variable::new("a")), WORD_SIZE);
            generator.compile_statement(
                None,
                &annotated_call(
                    Stmt::call(VarDec::new(Type::Int, "n"), Exp::var("a"), "legs", vec![], vec![]),
                    "Animal",
                ),
            );
            assert_eq!(
                instructions(&generator),
                vec![
                    Lw(T0, 0, Sp),
                    Addi(Sp, Sp, -4),
                    Sw(T0, 0, Sp),
                    Lw(T0, 0, T0),
                    Lw(T0, 0, T0),
                    Jalr(T0),
                    Addi(Sp, Sp, -4),
                    Sw(V0, 0, Sp),
                ]
            );
            assert_eq!(generator.variables.total_size_of_all_variables(), 8);
        }

        #[test]
        fn test_non_virtual_call_uses_implementing_class() {
            let program = program(animal_classes());
            let classes = ClassTable::new(&program).unwrap();
            let mut generator = CodeGenerator::new(&classes);
            generator
                .variables
                .push_variable(FrameSlot::Named(crate::ast::Variable::new("b")), WORD_SIZE);
            generator.compile_statement(
                None,
                &annotated_call(
                    Stmt::call(
                        VarDec::new(Type::Int, "n"),
                        Exp::var("b"),
                        "id",
                        vec![],
                        vec![Exp::int(5)],
                    ),
                    "Bird",
                ),
            );
            assert_eq!(
                instructions(&generator),
                vec![
                    Lw(T0, 0, Sp),
                    Addi(Sp, Sp, -4),
                    Sw(T0, 0, Sp),
                    Li(T1, 5),
                    Sw(T1, -4, Sp),
                    Addi(Sp, Sp, -4),
                    Jal(Label::new("Animal_id")),
                    Addi(Sp, Sp, -4),
                    Sw(V0, 0, Sp),
                ]
            );
        }

        #[test]
        fn test_field_assignment_and_read() {
            let program = program(vec![point_class()]);
            let classes = ClassTable::new(&program).unwrap();
            let mut generator = CodeGenerator::new(&classes);
            generator
                .variables
                .push_variable(FrameSlot::Named(crate::ast::Variable::new("p")), WORD_SIZE);
            generator.compile_statement(
                None,
                &Stmt::seq(vec![
                    Stmt::assign(annotated_field(Lhs::var("p"), "y", "Point"), Exp::int(9)),
                    Stmt::print(Exp::Lhs(annotated_field(Lhs::var("p"), "y", "Point"))),
                ]),
            );
            assert_eq!(
                &instructions(&generator)[..6],
                &[
                    Li(T0, 9),
                    Lw(T1, 0, Sp),
                    Addi(T1, T1, 4),
                    Sw(T0, 0, T1),
                    Lw(A0, 0, Sp),
                    Lw(A0, 4, A0),
                ]
            );
        }

        #[test]
        fn test_return() {
            let program = program(vec![]);
            let classes = ClassTable::new(&program).unwrap();
            let mut generator = CodeGenerator::new(&classes);
            generator.compile_statement(None, &Stmt::ret(None));
            generator.compile_statement(None, &Stmt::ret(Some(Exp::int(3))));
            assert_eq!(instructions(&generator), vec![Li(V0, 0), Li(V0, 3)]);
        }

        #[test]
        #[should_panic(expected = "has no receiver class annotation")]
        fn test_unannotated_call_panics() {
            let program = program(animal_classes());
            let classes = ClassTable::new(&program).unwrap();
            let mut generator = CodeGenerator::new(&classes);
            generator.compile_statement(
                None,
                &Stmt::call(VarDec::new(Type::Int, "n"), Exp::int(0), "legs", vec![], vec![]),
            );
        }
    }

    mod functions {
        use super::*;

        #[test]
        fn test_method_frame() {
            let classes = vec![ClassDefinition::new(
                "Calc",
                None,
                vec![],
                Constructor::new(vec![], Stmt::Empty),
                vec![MethodDefinition::new(
                    false,
                    Type::Int,
                    "second",
                    vec![VarDec::new(Type::Int, "a"), VarDec::new(Type::Int, "b")],
                    Stmt::ret(Some(Exp::var("b"))),
                )],
            )];
            let program = program(classes);
            let table = ClassTable::new(&program).unwrap();
            let mut generator = CodeGenerator::new(&table);
            generator.compile_program(&program);
            assert!(generator.variables.is_empty());
            let text = generator.text().to_vec();
            let start = text
                .iter()
                .position(|entry| entry == &TextEntry::Label(Label::new("Calc_second")))
                .unwrap();
            assert_eq!(
                &text[start + 1..],
                &[
                    TextEntry::Instruction(Addi(Sp, Sp, -4)),
                    TextEntry::Instruction(Sw(Ra, 0, Sp)),
                    TextEntry::Instruction(Lw(V0, 4, Sp)),
                    TextEntry::Instruction(Lw(Ra, 0, Sp)),
                    TextEntry::Instruction(Addi(Sp, Sp, 16)),
                    TextEntry::Instruction(Jr(Ra)),
                ]
            );
        }

        #[test]
        fn test_program_shape() {
            let program = program(animal_classes());
            let table = ClassTable::new(&program).unwrap();
            let mut generator = CodeGenerator::new(&table);
            generator.compile_program(&program);
            let labels: Vec<String> = generator
                .text()
                .iter()
                .filter_map(|entry| match entry {
                    TextEntry::Label(label) => Some(label.name().to_string()),
                    _ => None,
                })
                .collect();
            assert_eq!(
                labels,
                vec![
                    "main",
                    "new_Animal",
                    "Animal_legs",
                    "Animal_id",
                    "new_Bird",
                    "Bird_legs"
                ]
            );
            let listing = generator.into_program();
            assert_eq!(listing.data.len(), 2 + 2 + 2);
        }

        #[test]
        fn test_super_call_passes_this() {
            let program = program(animal_classes());
            let table = ClassTable::new(&program).unwrap();
            let mut generator = CodeGenerator::new(&table);
            generator.compile_class(table.get(&ClassName::new("Bird")));
            let code = instructions(&generator);
            assert_eq!(
                &code[..8],
                &[
                    Addi(Sp, Sp, -4),
                    Sw(Ra, 0, Sp),
                    Lw(T0, 4, Sp),
                    Addi(Sp, Sp, -4),
                    Sw(T0, 0, Sp),
                    Jal(Label::new("new_Animal")),
                    Lw(Ra, 0, Sp),
                    Addi(Sp, Sp, 8),
                ]
            );
        }
    }
}
