use getset::Getters;
use std::cell::OnceCell;
use std::fmt;

macro_rules! name_type {
    ($name:ident) => {
        #[derive(Eq, Hash, PartialEq, PartialOrd, Ord, Clone, Debug)]
        pub struct $name(String);

        impl $name {
            pub fn new(name: impl Into<String>) -> $name {
                $name(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

name_type!(ClassName);
name_type!(MethodName);
name_type!(Variable);
name_type!(TypeVariable);

#[derive(Getters, Eq, Hash, PartialEq, Clone, Debug)]
pub struct ClassType {
    #[getset(get = "pub")]
    name: ClassName,

    #[getset(get = "pub")]
    types: Vec<Type>,
}

impl ClassType {
    pub fn new(name: ClassName, types: Vec<Type>) -> ClassType {
        ClassType { name, types }
    }
}

#[derive(Eq, Hash, PartialEq, Clone, Debug)]
pub enum Type {
    Int,
    Void,
    Class(ClassType),
    Variable(TypeVariable),
}

impl Type {
    /// A class type without type arguments.
    pub fn class(name: &str) -> Type {
        Type::Class(ClassType::new(ClassName::new(name), Vec::new()))
    }

    pub fn generic(name: &str, types: Vec<Type>) -> Type {
        Type::Class(ClassType::new(ClassName::new(name), types))
    }

    pub fn variable(name: &str) -> Type {
        Type::Variable(TypeVariable::new(name))
    }

    pub fn as_class(&self) -> Option<&ClassType> {
        if let Type::Class(class_type) = self {
            Some(class_type)
        } else {
            None
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => f.write_str("int"),
            Type::Void => f.write_str("void"),
            Type::Variable(variable) => write!(f, "{}", variable),
            Type::Class(class_type) => {
                write!(f, "{}", class_type.name)?;
                if !class_type.types.is_empty() {
                    let types: Vec<String> =
                        class_type.types.iter().map(|t| t.to_string()).collect();
                    write!(f, "<{}>", types.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Getters, Eq, Hash, PartialEq, Clone, Debug)]
pub struct VarDec {
    #[getset(get = "pub")]
    ty: Type,

    #[getset(get = "pub")]
    variable: Variable,
}

impl VarDec {
    pub fn new(ty: Type, variable: &str) -> VarDec {
        VarDec {
            ty,
            variable: Variable::new(variable),
        }
    }
}

#[derive(PartialEq, Clone, Debug)]
pub enum Exp {
    Int(i32),
    Lhs(Lhs),
}

impl Exp {
    pub fn int(value: i32) -> Exp {
        Exp::Int(value)
    }

    pub fn var(name: &str) -> Exp {
        Exp::Lhs(Lhs::var(name))
    }

    pub fn this() -> Exp {
        Exp::Lhs(Lhs::This)
    }

    pub fn field(lhs: Lhs, field: &str) -> Exp {
        Exp::Lhs(Lhs::field(lhs, field))
    }
}

#[derive(PartialEq, Clone, Debug)]
pub enum Lhs {
    Variable(Variable),
    This,
    FieldAccess(FieldAccess),
}

impl Lhs {
    pub fn var(name: &str) -> Lhs {
        Lhs::Variable(Variable::new(name))
    }

    pub fn field(lhs: Lhs, field: &str) -> Lhs {
        Lhs::FieldAccess(FieldAccess {
            lhs: Box::new(lhs),
            field: Variable::new(field),
            lhs_class: OnceCell::new(),
        })
    }

    /// `this.<field>`
    pub fn this_field(field: &str) -> Lhs {
        Lhs::field(Lhs::This, field)
    }
}

#[derive(Getters, PartialEq, Clone, Debug)]
pub struct FieldAccess {
    #[getset(get = "pub")]
    lhs: Box<Lhs>,

    #[getset(get = "pub")]
    field: Variable,

    // static class of `lhs`, filled in by the typechecker
    lhs_class: OnceCell<ClassName>,
}

impl FieldAccess {
    pub fn lhs_class(&self) -> Option<&ClassName> {
        self.lhs_class.get()
    }

    pub fn set_lhs_class(&self, class: ClassName) {
        if let Err(class) = self.lhs_class.set(class) {
            debug_assert_eq!(self.lhs_class.get(), Some(&class));
        }
    }
}

#[derive(Getters, PartialEq, Clone, Debug)]
pub struct NewStmt {
    #[getset(get = "pub")]
    vardec: VarDec,

    #[getset(get = "pub")]
    class: ClassName,

    #[getset(get = "pub")]
    types: Vec<Type>,

    #[getset(get = "pub")]
    params: Vec<Exp>,
}

#[derive(Getters, PartialEq, Clone, Debug)]
pub struct MethodCallStmt {
    #[getset(get = "pub")]
    vardec: VarDec,

    #[getset(get = "pub")]
    exp: Exp,

    #[getset(get = "pub")]
    name: MethodName,

    #[getset(get = "pub")]
    types: Vec<Type>,

    #[getset(get = "pub")]
    params: Vec<Exp>,

    // static class of `exp`, filled in by the typechecker
    on_class: OnceCell<ClassName>,
}

impl MethodCallStmt {
    pub fn on_class(&self) -> Option<&ClassName> {
        self.on_class.get()
    }

    pub fn set_on_class(&self, class: ClassName) {
        if let Err(class) = self.on_class.set(class) {
            debug_assert_eq!(self.on_class.get(), Some(&class));
        }
    }
}

#[derive(PartialEq, Clone, Debug)]
pub enum Stmt {
    New(NewStmt),
    MethodCall(MethodCallStmt),
    Print(Exp),
    Return(Option<Exp>),
    Assign(Lhs, Exp),
    Super(Vec<Exp>),
    Sequence(Box<Stmt>, Box<Stmt>),
    Empty,
}

impl Stmt {
    /// `<vardec> = new <class><types>(<params>)`
    pub fn construct(vardec: VarDec, class: &str, types: Vec<Type>, params: Vec<Exp>) -> Stmt {
        Stmt::New(NewStmt {
            vardec,
            class: ClassName::new(class),
            types,
            params,
        })
    }

    /// `<vardec> = <exp>.<name><types>(<params>)`
    pub fn call(
        vardec: VarDec,
        exp: Exp,
        name: &str,
        types: Vec<Type>,
        params: Vec<Exp>,
    ) -> Stmt {
        Stmt::MethodCall(MethodCallStmt {
            vardec,
            exp,
            name: MethodName::new(name),
            types,
            params,
            on_class: OnceCell::new(),
        })
    }

    pub fn print(exp: Exp) -> Stmt {
        Stmt::Print(exp)
    }

    pub fn ret(exp: Option<Exp>) -> Stmt {
        Stmt::Return(exp)
    }

    pub fn assign(lhs: Lhs, exp: Exp) -> Stmt {
        Stmt::Assign(lhs, exp)
    }

    pub fn super_call(params: Vec<Exp>) -> Stmt {
        Stmt::Super(params)
    }

    /// Right-nested sequence of `stmts`, or `Empty` when there are none.
    pub fn seq(stmts: Vec<Stmt>) -> Stmt {
        let mut iter = stmts.into_iter().rev();
        match iter.next() {
            None => Stmt::Empty,
            Some(last) => iter.fold(last, |rest, stmt| {
                Stmt::Sequence(Box::new(stmt), Box::new(rest))
            }),
        }
    }

    /// The non-empty statements of a sequence, in execution order.
    pub fn flatten(&self) -> Vec<&Stmt> {
        let mut result = Vec::new();
        self.flatten_into(&mut result);
        result
    }

    fn flatten_into<'a>(&'a self, result: &mut Vec<&'a Stmt>) {
        match self {
            Stmt::Sequence(first, second) => {
                first.flatten_into(result);
                second.flatten_into(result);
            }
            Stmt::Empty => {}
            _ => result.push(self),
        }
    }
}

#[derive(Getters, PartialEq, Clone, Debug)]
pub struct Constructor {
    #[getset(get = "pub")]
    params: Vec<VarDec>,

    #[getset(get = "pub")]
    body: Stmt,
}

impl Constructor {
    pub fn new(params: Vec<VarDec>, body: Stmt) -> Constructor {
        Constructor { params, body }
    }
}

#[derive(Getters, PartialEq, Clone, Debug)]
pub struct MethodDefinition {
    #[getset(get = "pub")]
    is_virtual: bool,

    #[getset(get = "pub")]
    type_variables: Vec<TypeVariable>,

    #[getset(get = "pub")]
    return_type: Type,

    #[getset(get = "pub")]
    name: MethodName,

    #[getset(get = "pub")]
    params: Vec<VarDec>,

    #[getset(get = "pub")]
    body: Stmt,
}

impl MethodDefinition {
    pub fn new(
        is_virtual: bool,
        return_type: Type,
        name: &str,
        params: Vec<VarDec>,
        body: Stmt,
    ) -> MethodDefinition {
        MethodDefinition {
            is_virtual,
            type_variables: Vec::new(),
            return_type,
            name: MethodName::new(name),
            params,
            body,
        }
    }

    pub fn with_type_variables(mut self, type_variables: &[&str]) -> MethodDefinition {
        self.type_variables = type_variables.iter().map(|v| TypeVariable::new(*v)).collect();
        self
    }
}

#[derive(Getters, PartialEq, Clone, Debug)]
pub struct Extends {
    #[getset(get = "pub")]
    name: ClassName,

    #[getset(get = "pub")]
    types: Vec<Type>,
}

impl Extends {
    pub fn new(name: &str, types: Vec<Type>) -> Extends {
        Extends {
            name: ClassName::new(name),
            types,
        }
    }

    pub fn as_class_type(&self) -> ClassType {
        ClassType::new(self.name.clone(), self.types.clone())
    }
}

#[derive(Getters, PartialEq, Clone, Debug)]
pub struct ClassDefinition {
    #[getset(get = "pub")]
    name: ClassName,

    #[getset(get = "pub")]
    type_variables: Vec<TypeVariable>,

    #[getset(get = "pub")]
    extends: Option<Extends>,

    #[getset(get = "pub")]
    fields: Vec<VarDec>,

    #[getset(get = "pub")]
    constructor: Constructor,

    #[getset(get = "pub")]
    methods: Vec<MethodDefinition>,
}

impl ClassDefinition {
    pub fn new(
        name: &str,
        extends: Option<Extends>,
        fields: Vec<VarDec>,
        constructor: Constructor,
        methods: Vec<MethodDefinition>,
    ) -> ClassDefinition {
        ClassDefinition {
            name: ClassName::new(name),
            type_variables: Vec::new(),
            extends,
            fields,
            constructor,
            methods,
        }
    }

    pub fn with_type_variables(mut self, type_variables: &[&str]) -> ClassDefinition {
        self.type_variables = type_variables.iter().map(|v| TypeVariable::new(*v)).collect();
        self
    }

    pub fn superclass(&self) -> Option<&ClassName> {
        self.extends.as_ref().map(|extends| &extends.name)
    }

    pub fn method(&self, name: &MethodName) -> Option<&MethodDefinition> {
        self.methods.iter().find(|method| &method.name == name)
    }

    /// The type of `this` inside the class: the class applied to its own type variables.
    pub fn this_type(&self) -> ClassType {
        ClassType::new(
            self.name.clone(),
            self.type_variables
                .iter()
                .cloned()
                .map(Type::Variable)
                .collect(),
        )
    }
}

#[derive(Getters, PartialEq, Clone, Debug)]
pub struct Program {
    #[getset(get = "pub")]
    classes: Vec<ClassDefinition>,

    #[getset(get = "pub")]
    entry_point: Stmt,
}

impl Program {
    pub fn new(classes: Vec<ClassDefinition>, entry_point: Stmt) -> Program {
        Program {
            classes,
            entry_point,
        }
    }
}
