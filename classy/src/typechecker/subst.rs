use crate::ast::{ClassType, Type, TypeVariable};
use crate::error::TypeError;
use std::collections::HashMap;
use std::fmt;

/// A mapping from type variables to the types they stand for.
/// Variables without a mapping are left as they are.
#[derive(Default, PartialEq, Clone, Debug)]
pub struct Substitution {
    mapping: HashMap<TypeVariable, Type>,
}

impl Substitution {
    pub fn identity() -> Substitution {
        Substitution::default()
    }

    /// Binds `variables` to `types` pairwise. `owner` names whatever declared
    /// the variables, for the arity error.
    pub fn new(
        variables: &[TypeVariable],
        types: &[Type],
        owner: impl fmt::Display,
    ) -> Result<Substitution, TypeError> {
        if variables.len() != types.len() {
            return Err(TypeError::TypeArityMismatch {
                class: owner.to_string(),
                expected: variables.len(),
                found: types.len(),
            });
        }
        Ok(Substitution {
            mapping: variables
                .iter()
                .cloned()
                .zip(types.iter().cloned())
                .collect(),
        })
    }

    /// Adds the bindings of `other`, which win over existing ones.
    pub fn extend(mut self, other: Substitution) -> Substitution {
        self.mapping.extend(other.mapping);
        self
    }

    pub fn apply(&self, ty: &Type) -> Type {
        match ty {
            Type::Int | Type::Void => ty.clone(),
            Type::Variable(variable) => self
                .mapping
                .get(variable)
                .cloned()
                .unwrap_or_else(|| ty.clone()),
            Type::Class(class_type) => Type::Class(self.apply_class(class_type)),
        }
    }

    pub fn apply_class(&self, class_type: &ClassType) -> ClassType {
        ClassType::new(
            class_type.name().clone(),
            class_type.types().iter().map(|t| self.apply(t)).collect(),
        )
    }
}
