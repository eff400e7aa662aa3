use crate::ast::{ClassType, Type, TypeVariable, VarDec, Variable};
use crate::error::TypeError;
use std::collections::{HashMap, HashSet};

/// What is visible while checking one function body.
#[derive(Clone, Debug)]
pub struct TypeEnvironment {
    in_scope: HashSet<TypeVariable>,
    variables: HashMap<Variable, Type>,
    this_type: Option<ClassType>,
}

impl TypeEnvironment {
    pub fn new(in_scope: HashSet<TypeVariable>, this_type: Option<ClassType>) -> TypeEnvironment {
        TypeEnvironment {
            in_scope,
            variables: HashMap::new(),
            this_type,
        }
    }

    pub fn in_scope(&self) -> &HashSet<TypeVariable> {
        &self.in_scope
    }

    pub fn lookup(&self, variable: &Variable) -> Result<&Type, TypeError> {
        self.variables
            .get(variable)
            .ok_or_else(|| TypeError::NoSuchVariable(variable.clone()))
    }

    pub fn this_type(&self) -> Result<&ClassType, TypeError> {
        self.this_type.as_ref().ok_or(TypeError::ThisOutsideClass)
    }

    pub fn add_variable(&mut self, vardec: &VarDec) -> Result<(), TypeError> {
        if self.variables.contains_key(vardec.variable()) {
            return Err(TypeError::RedefinedVariable(vardec.variable().clone()));
        }
        self.variables
            .insert(vardec.variable().clone(), vardec.ty().clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variables() {
        let mut env = TypeEnvironment::new(HashSet::new(), None);
        let x = Variable::new("x");
        assert_eq!(env.lookup(&x), Err(TypeError::NoSuchVariable(x.clone())));
        env.add_variable(&VarDec::new(Type::Int, "x")).unwrap();
        assert_eq!(env.lookup(&x), Ok(&Type::Int));
        assert_eq!(
            env.add_variable(&VarDec::new(Type::class("Foo"), "x")),
            Err(TypeError::RedefinedVariable(x))
        );
    }

    #[test]
    fn test_this() {
        let env = TypeEnvironment::new(HashSet::new(), None);
        assert_eq!(env.this_type(), Err(TypeError::ThisOutsideClass));
        let foo = ClassType::new(crate::ast::ClassName::new("Foo"), vec![]);
        let env = TypeEnvironment::new(HashSet::new(), Some(foo.clone()));
        assert_eq!(env.this_type(), Ok(&foo));
    }
}
