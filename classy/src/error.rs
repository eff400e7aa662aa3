use crate::ast::{ClassName, MethodName, Type, TypeVariable, Variable};
use thiserror::Error;

/// Reasons a program is rejected before code generation.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum TypeError {
    #[error("duplicate class name: {0}")]
    DuplicateClass(ClassName),

    #[error("no such class defined: {0}")]
    UnknownClass(ClassName),

    #[error("cyclic inheritance involving {0}")]
    CyclicInheritance(ClassName),

    #[error("duplicate type variable introduced: {0}")]
    DuplicateTypeVariable(TypeVariable),

    #[error("type variable not in scope: {0}")]
    TypeVariableNotInScope(TypeVariable),

    #[error("{class} expects {expected} type arguments, received {found}")]
    TypeArityMismatch {
        class: String,
        expected: usize,
        found: usize,
    },

    #[error("duplicate method name: {0}")]
    DuplicateMethod(MethodName),

    #[error("duplicate variable name: {0}")]
    DuplicateVariable(Variable),

    #[error("instance variable {0} is already declared by an ancestor")]
    FieldRedeclared(Variable),

    #[error("no instance variable defined: {0}")]
    NoSuchField(Variable),

    #[error("no such method: {0}")]
    NoSuchMethod(MethodName),

    #[error("variable not in scope: {0}")]
    NoSuchVariable(Variable),

    #[error("redefinition of variable: {0}")]
    RedefinedVariable(Variable),

    #[error("this used outside of a class")]
    ThisOutsideClass,

    #[error("cannot assign to this")]
    AssignToThis,

    #[error("expected a class type, got: {0}")]
    ExpectedClassType(Type),

    #[error("{sub} is not compatible with {base}")]
    IncompatibleTypes { base: Type, sub: Type },

    #[error("expected {expected} parameters, received {found}")]
    ParamArityMismatch { expected: usize, found: usize },

    #[error("print can only print integers, got: {0}")]
    PrintNonInt(Type),

    #[error("virtual disagreement on method {0}")]
    VirtualMismatch(MethodName),

    #[error("method {0} does not match the signature of the method it overrides")]
    OverrideSignatureMismatch(MethodName),

    #[error("base class constructors cannot call super")]
    SuperInBaseClass,

    #[error("subclass constructors must begin with super")]
    MissingSuper,

    #[error("super may only appear as the first statement of a subclass constructor")]
    MisplacedSuper,

    #[error("return in constructor")]
    ReturnInConstructor,

    #[error("return in entry point")]
    ReturnInEntryPoint,

    #[error("method {0} must end with return")]
    MissingReturn(MethodName),

    #[error("method {0} returns before its last statement")]
    EarlyReturn(MethodName),

    #[error("non-void return needs a value of type {0}")]
    MissingReturnValue(Type),
}
