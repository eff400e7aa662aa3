mod env;
mod subst;

pub use env::TypeEnvironment;
pub use subst::Substitution;

use crate::ast::{
    ClassDefinition, ClassName, ClassType, Exp, Lhs, MethodCallStmt, MethodDefinition,
    MethodName, NewStmt, Program, Stmt, Type, TypeVariable, VarDec, Variable,
};
use crate::class_table::ClassTable;
use crate::error::TypeError;
use crate::resolve::try_find_method;
use log::debug;
use std::collections::HashSet;

/// Checks `program` and fills in the class annotations the code generator
/// relies on.
pub fn typecheck_program(program: &Program) -> Result<(), TypeError> {
    let classes = ClassTable::new(program)?;
    let checker = Typechecker { classes };
    checker.check_inheritance()?;
    for class in checker.classes.iter() {
        checker.check_class(class)?;
    }
    checker.check_entry_point(program.entry_point())
}

/// Where a statement sits, which decides what `return` and `super` mean.
struct StmtContext<'c> {
    return_type: Option<&'c Type>,
    super_params: Option<&'c [Type]>,
}

impl<'c> StmtContext<'c> {
    fn top_level() -> StmtContext<'c> {
        StmtContext {
            return_type: None,
            super_params: None,
        }
    }
}

struct Typechecker<'a> {
    classes: ClassTable<'a>,
}

fn is_return(stmt: &&Stmt) -> bool {
    matches!(stmt, Stmt::Return(_))
}

fn is_super(stmt: &&Stmt) -> bool {
    matches!(stmt, Stmt::Super(_))
}

fn unique_type_variables(variables: &[TypeVariable]) -> Result<HashSet<TypeVariable>, TypeError> {
    let mut seen = HashSet::new();
    for variable in variables {
        if !seen.insert(variable.clone()) {
            return Err(TypeError::DuplicateTypeVariable(variable.clone()));
        }
    }
    Ok(seen)
}

fn unique_variables(vardecs: &[VarDec]) -> Result<(), TypeError> {
    let mut seen = HashSet::new();
    for vardec in vardecs {
        if !seen.insert(vardec.variable()) {
            return Err(TypeError::DuplicateVariable(vardec.variable().clone()));
        }
    }
    Ok(())
}

impl<'a> Typechecker<'a> {
    fn class(&self, name: &ClassName) -> Result<&'a ClassDefinition, TypeError> {
        self.classes
            .lookup(name)
            .ok_or_else(|| TypeError::UnknownClass(name.clone()))
    }

    /// Every superclass exists and no chain loops back on itself. Nothing
    /// that walks superclass chains may run before this passes.
    fn check_inheritance(&self) -> Result<(), TypeError> {
        for class in self.classes.iter() {
            if let Some(parent) = class.superclass() {
                self.class(parent)?;
            }
        }
        for class in self.classes.iter() {
            let mut seen = HashSet::new();
            let mut current = Some(class);
            while let Some(c) = current {
                if !seen.insert(c.name()) {
                    return Err(TypeError::CyclicInheritance(class.name().clone()));
                }
                current = c.superclass().and_then(|parent| self.classes.lookup(parent));
            }
        }
        Ok(())
    }

    fn check_type(&self, in_scope: &HashSet<TypeVariable>, ty: &Type) -> Result<(), TypeError> {
        match ty {
            Type::Int | Type::Void => Ok(()),
            Type::Variable(variable) => {
                if in_scope.contains(variable) {
                    Ok(())
                } else {
                    Err(TypeError::TypeVariableNotInScope(variable.clone()))
                }
            }
            Type::Class(class_type) => {
                let class = self.class(class_type.name())?;
                if class.type_variables().len() != class_type.types().len() {
                    return Err(TypeError::TypeArityMismatch {
                        class: class.name().to_string(),
                        expected: class.type_variables().len(),
                        found: class_type.types().len(),
                    });
                }
                for ty in class_type.types() {
                    self.check_type(in_scope, ty)?;
                }
                Ok(())
            }
        }
    }

    /// The direct superclass of `class_type`, with the subclass's type
    /// arguments substituted into the `extends` clause.
    fn as_supertype(&self, class_type: &ClassType) -> Result<Option<ClassType>, TypeError> {
        let class = self.class(class_type.name())?;
        match class.extends() {
            None => Ok(None),
            Some(extends) => {
                let subst =
                    Substitution::new(class.type_variables(), class_type.types(), class.name())?;
                Ok(Some(subst.apply_class(&extends.as_class_type())))
            }
        }
    }

    /// Walks up from `class_type` to the specialised form of `ancestor`.
    fn specialize_to(
        &self,
        class_type: &ClassType,
        ancestor: &ClassName,
    ) -> Result<ClassType, TypeError> {
        let mut current = class_type.clone();
        while current.name() != ancestor {
            current = match self.as_supertype(&current)? {
                Some(parent) => parent,
                None => return Err(TypeError::UnknownClass(ancestor.clone())),
            };
        }
        Ok(current)
    }

    /// Checks that a value of type `sub` can be stored where `base` is expected.
    fn check_assignable(&self, base: &Type, sub: &Type) -> Result<(), TypeError> {
        if base == sub {
            return Ok(());
        }
        if let (Type::Class(base_class), Type::Class(sub_class)) = (base, sub) {
            let mut current = self.as_supertype(sub_class)?;
            while let Some(class_type) = current {
                if &class_type == base_class {
                    return Ok(());
                }
                current = self.as_supertype(&class_type)?;
            }
        }
        Err(TypeError::IncompatibleTypes {
            base: base.clone(),
            sub: sub.clone(),
        })
    }

    fn field_type(&self, class_type: &ClassType, field: &Variable) -> Result<Type, TypeError> {
        let mut current = Some(class_type.clone());
        while let Some(class_type) = current {
            let class = self.class(class_type.name())?;
            if let Some(vardec) = class.fields().iter().find(|f| f.variable() == field) {
                let subst =
                    Substitution::new(class.type_variables(), class_type.types(), class.name())?;
                return Ok(subst.apply(vardec.ty()));
            }
            current = self.as_supertype(&class_type)?;
        }
        Err(TypeError::NoSuchField(field.clone()))
    }

    /// The method `name` as seen from `class_type`, with the substitution for
    /// the class variables of whichever ancestor defines it.
    fn find_method(
        &self,
        class_type: &ClassType,
        name: &MethodName,
    ) -> Result<(&'a MethodDefinition, Substitution), TypeError> {
        let found = try_find_method(&self.classes, class_type.name(), name)
            .ok_or_else(|| TypeError::NoSuchMethod(name.clone()))?;
        let owner = self.specialize_to(class_type, &found.implementing_class)?;
        let owner_class = self.class(owner.name())?;
        let subst =
            Substitution::new(owner_class.type_variables(), owner.types(), owner_class.name())?;
        Ok((found.definition, subst))
    }

    fn check_class(&self, class: &'a ClassDefinition) -> Result<(), TypeError> {
        debug!("typechecking class {}", class.name());
        let in_scope = unique_type_variables(class.type_variables())?;
        if let Some(extends) = class.extends() {
            self.check_type(&in_scope, &Type::Class(extends.as_class_type()))?;
        }

        let mut method_names = HashSet::new();
        for method in class.methods() {
            if !method_names.insert(method.name()) {
                return Err(TypeError::DuplicateMethod(method.name().clone()));
            }
        }

        unique_variables(class.fields())?;
        for field in class.fields() {
            self.check_type(&in_scope, field.ty())?;
            if let Some(parent) = class.superclass() {
                let redeclared = self.classes.ancestors(parent).any(|ancestor| {
                    ancestor
                        .fields()
                        .iter()
                        .any(|f| f.variable() == field.variable())
                });
                if redeclared {
                    return Err(TypeError::FieldRedeclared(field.variable().clone()));
                }
            }
        }

        self.check_constructor(class, &in_scope)?;
        for method in class.methods() {
            self.check_method(class, &in_scope, method)?;
        }
        Ok(())
    }

    fn check_constructor(
        &self,
        class: &ClassDefinition,
        in_scope: &HashSet<TypeVariable>,
    ) -> Result<(), TypeError> {
        let constructor = class.constructor();
        unique_variables(constructor.params())?;
        for param in constructor.params() {
            self.check_type(in_scope, param.ty())?;
        }

        let stmts = constructor.body().flatten();
        if stmts.iter().any(is_return) {
            return Err(TypeError::ReturnInConstructor);
        }
        let super_params: Option<Vec<Type>> = match class.extends() {
            None => {
                if stmts.iter().any(is_super) {
                    return Err(TypeError::SuperInBaseClass);
                }
                None
            }
            Some(extends) => {
                match stmts.first() {
                    Some(Stmt::Super(_)) => {}
                    _ => return Err(TypeError::MissingSuper),
                }
                if stmts[1..].iter().any(is_super) {
                    return Err(TypeError::MisplacedSuper);
                }
                let parent = self.class(extends.name())?;
                let subst =
                    Substitution::new(parent.type_variables(), extends.types(), parent.name())?;
                Some(
                    parent
                        .constructor()
                        .params()
                        .iter()
                        .map(|param| subst.apply(param.ty()))
                        .collect(),
                )
            }
        };

        let mut env = TypeEnvironment::new(in_scope.clone(), Some(class.this_type()));
        for param in constructor.params() {
            env.add_variable(param)?;
        }
        let context = StmtContext {
            return_type: None,
            super_params: super_params.as_deref(),
        };
        self.check_stmt(&mut env, &context, constructor.body())
    }

    fn check_virtual(&self, class: &ClassDefinition, method: &MethodDefinition) -> Result<(), TypeError> {
        let parent = match class.superclass() {
            Some(parent) => parent,
            None => return Ok(()),
        };
        for ancestor in self.classes.ancestors(parent) {
            if let Some(overridden) = ancestor.method(method.name()) {
                if overridden.is_virtual() != method.is_virtual() {
                    return Err(TypeError::VirtualMismatch(method.name().clone()));
                }
            }
        }
        Ok(())
    }

    /// An override keeps the parameter and return types of the nearest
    /// definition above it, seen through the `extends` clauses.
    fn check_override(&self, class: &ClassDefinition, method: &MethodDefinition) -> Result<(), TypeError> {
        let parent = match self.as_supertype(&class.this_type())? {
            Some(parent) => parent,
            None => return Ok(()),
        };
        if try_find_method(&self.classes, parent.name(), method.name()).is_none() {
            return Ok(());
        }
        let (overridden, class_subst) = self.find_method(&parent, method.name())?;
        let mismatch = || TypeError::OverrideSignatureMismatch(method.name().clone());
        if overridden.params().len() != method.params().len()
            || overridden.type_variables().len() != method.type_variables().len()
        {
            return Err(mismatch());
        }

        let own_variables: Vec<Type> = method
            .type_variables()
            .iter()
            .cloned()
            .map(Type::Variable)
            .collect();
        let subst = class_subst.extend(Substitution::new(
            overridden.type_variables(),
            &own_variables,
            overridden.name(),
        )?);
        let params_match = overridden
            .params()
            .iter()
            .zip(method.params())
            .all(|(theirs, ours)| &subst.apply(theirs.ty()) == ours.ty());
        if !params_match || &subst.apply(overridden.return_type()) != method.return_type() {
            return Err(mismatch());
        }
        Ok(())
    }

    fn check_method(
        &self,
        class: &ClassDefinition,
        class_scope: &HashSet<TypeVariable>,
        method: &MethodDefinition,
    ) -> Result<(), TypeError> {
        let mut in_scope = class_scope.clone();
        for variable in unique_type_variables(method.type_variables())? {
            if !in_scope.insert(variable.clone()) {
                return Err(TypeError::DuplicateTypeVariable(variable));
            }
        }
        self.check_virtual(class, method)?;
        self.check_override(class, method)?;

        unique_variables(method.params())?;
        for param in method.params() {
            self.check_type(&in_scope, param.ty())?;
        }
        self.check_type(&in_scope, method.return_type())?;

        let stmts = method.body().flatten();
        match stmts.split_last() {
            Some((Stmt::Return(_), rest)) => {
                if rest.iter().any(is_return) {
                    return Err(TypeError::EarlyReturn(method.name().clone()));
                }
            }
            _ => return Err(TypeError::MissingReturn(method.name().clone())),
        }
        if stmts.iter().any(is_super) {
            return Err(TypeError::MisplacedSuper);
        }

        let mut env = TypeEnvironment::new(in_scope, Some(class.this_type()));
        for param in method.params() {
            env.add_variable(param)?;
        }
        let context = StmtContext {
            return_type: Some(method.return_type()),
            super_params: None,
        };
        self.check_stmt(&mut env, &context, method.body())
    }

    fn check_entry_point(&self, body: &Stmt) -> Result<(), TypeError> {
        debug!("typechecking entry point");
        let stmts = body.flatten();
        if stmts.iter().any(is_return) {
            return Err(TypeError::ReturnInEntryPoint);
        }
        if stmts.iter().any(is_super) {
            return Err(TypeError::MisplacedSuper);
        }
        let mut env = TypeEnvironment::new(HashSet::new(), None);
        self.check_stmt(&mut env, &StmtContext::top_level(), body)
    }

    fn check_stmt(
        &self,
        env: &mut TypeEnvironment,
        context: &StmtContext,
        stmt: &Stmt,
    ) -> Result<(), TypeError> {
        match stmt {
            Stmt::New(new) => self.check_new(env, new),
            Stmt::MethodCall(call) => self.check_method_call(env, call),
            Stmt::Print(exp) => match self.exp_type(env, exp)? {
                Type::Int => Ok(()),
                other => Err(TypeError::PrintNonInt(other)),
            },
            Stmt::Return(exp) => {
                let return_type = context.return_type.unwrap_or(&Type::Void);
                match exp {
                    None if return_type == &Type::Void => Ok(()),
                    None => Err(TypeError::MissingReturnValue(return_type.clone())),
                    Some(exp) => {
                        let ty = self.exp_type(env, exp)?;
                        self.check_assignable(return_type, &ty)
                    }
                }
            }
            Stmt::Assign(lhs, exp) => {
                if let Lhs::This = lhs {
                    return Err(TypeError::AssignToThis);
                }
                let target = self.lhs_type(env, lhs)?;
                let value = self.exp_type(env, exp)?;
                self.check_assignable(&target, &value)
            }
            Stmt::Super(params) => match context.super_params {
                Some(expected) => self.check_params(env, expected, params),
                None => Err(TypeError::MisplacedSuper),
            },
            Stmt::Sequence(first, second) => {
                self.check_stmt(env, context, first)?;
                self.check_stmt(env, context, second)
            }
            Stmt::Empty => Ok(()),
        }
    }

    fn check_new(&self, env: &mut TypeEnvironment, new: &NewStmt) -> Result<(), TypeError> {
        let class = self.class(new.class())?;
        let created = Type::Class(ClassType::new(new.class().clone(), new.types().clone()));
        self.check_type(env.in_scope(), &created)?;
        let subst = Substitution::new(class.type_variables(), new.types(), class.name())?;
        let expected: Vec<Type> = class
            .constructor()
            .params()
            .iter()
            .map(|param| subst.apply(param.ty()))
            .collect();
        self.check_params(env, &expected, new.params())?;

        self.check_type(env.in_scope(), new.vardec().ty())?;
        self.check_assignable(new.vardec().ty(), &created)?;
        env.add_variable(new.vardec())
    }

    fn check_method_call(
        &self,
        env: &mut TypeEnvironment,
        call: &MethodCallStmt,
    ) -> Result<(), TypeError> {
        let receiver = match self.exp_type(env, call.exp())? {
            Type::Class(class_type) => class_type,
            other => return Err(TypeError::ExpectedClassType(other)),
        };
        call.set_on_class(receiver.name().clone());

        let (method, class_subst) = self.find_method(&receiver, call.name())?;
        for ty in call.types() {
            self.check_type(env.in_scope(), ty)?;
        }
        let subst = class_subst.extend(Substitution::new(
            method.type_variables(),
            call.types(),
            method.name(),
        )?);
        let expected: Vec<Type> = method
            .params()
            .iter()
            .map(|param| subst.apply(param.ty()))
            .collect();
        self.check_params(env, &expected, call.params())?;

        let result = subst.apply(method.return_type());
        self.check_type(env.in_scope(), call.vardec().ty())?;
        self.check_assignable(call.vardec().ty(), &result)?;
        env.add_variable(call.vardec())
    }

    fn check_params(
        &self,
        env: &TypeEnvironment,
        expected: &[Type],
        params: &[Exp],
    ) -> Result<(), TypeError> {
        if expected.len() != params.len() {
            return Err(TypeError::ParamArityMismatch {
                expected: expected.len(),
                found: params.len(),
            });
        }
        for (ty, param) in expected.iter().zip(params) {
            let actual = self.exp_type(env, param)?;
            self.check_assignable(ty, &actual)?;
        }
        Ok(())
    }

    fn exp_type(&self, env: &TypeEnvironment, exp: &Exp) -> Result<Type, TypeError> {
        match exp {
            Exp::Int(_) => Ok(Type::Int),
            Exp::Lhs(lhs) => self.lhs_type(env, lhs),
        }
    }

    fn lhs_type(&self, env: &TypeEnvironment, lhs: &Lhs) -> Result<Type, TypeError> {
        match lhs {
            Lhs::Variable(variable) => env.lookup(variable).map(Type::clone),
            Lhs::This => env.this_type().map(|this| Type::Class(this.clone())),
            Lhs::FieldAccess(access) => {
                let base = match self.lhs_type(env, access.lhs())? {
                    Type::Class(class_type) => class_type,
                    other => return Err(TypeError::ExpectedClassType(other)),
                };
                access.set_lhs_class(base.name().clone());
                self.field_type(&base, access.field())
            }
        }
    }
}
