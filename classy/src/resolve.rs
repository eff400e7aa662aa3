use crate::ast::{ClassName, MethodDefinition, MethodName};
use crate::class_table::ClassTable;

/// The nearest definition of a method, as seen from some class.
#[derive(PartialEq, Clone, Debug)]
pub struct FoundMethod<'a> {
    pub is_virtual: bool,
    /// The class whose code runs for a direct call.
    pub implementing_class: ClassName,
    pub definition: &'a MethodDefinition,
}

/// Searches `on_class` and then each superclass for `name`.
pub fn try_find_method<'a>(
    classes: &ClassTable<'a>,
    on_class: &ClassName,
    name: &MethodName,
) -> Option<FoundMethod<'a>> {
    classes.ancestors(on_class).find_map(|class| {
        class.method(name).map(|definition| FoundMethod {
            is_virtual: *definition.is_virtual(),
            implementing_class: class.name().clone(),
            definition,
        })
    })
}

/// Like `try_find_method`, for programs that have already been checked.
pub fn find_method<'a>(
    classes: &ClassTable<'a>,
    on_class: &ClassName,
    name: &MethodName,
) -> FoundMethod<'a> {
    match try_find_method(classes, on_class, name) {
        Some(found) => found,
        None => panic!("no method {} on class {} or its ancestors", name, on_class),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassDefinition, Constructor, Extends, Program, Stmt, Type};

    fn method(name: &str, is_virtual: bool) -> MethodDefinition {
        MethodDefinition::new(is_virtual, Type::Void, name, vec![], Stmt::ret(None))
    }

    fn program() -> Program {
        Program::new(
            vec![
                ClassDefinition::new(
                    "Base",
                    None,
                    vec![],
                    Constructor::new(vec![], Stmt::Empty),
                    vec![method("speak", true), method("id", false)],
                ),
                ClassDefinition::new(
                    "Mid",
                    Some(Extends::new("Base", vec![])),
                    vec![],
                    Constructor::new(vec![], Stmt::super_call(vec![])),
                    vec![method("speak", true)],
                ),
                ClassDefinition::new(
                    "Leaf",
                    Some(Extends::new("Mid", vec![])),
                    vec![],
                    Constructor::new(vec![], Stmt::super_call(vec![])),
                    vec![],
                ),
            ],
            Stmt::Empty,
        )
    }

    #[test]
    fn test_own_method() {
        let program = program();
        let classes = ClassTable::new(&program).unwrap();
        let found = find_method(&classes, &ClassName::new("Mid"), &MethodName::new("speak"));
        assert!(found.is_virtual);
        assert_eq!(found.implementing_class, ClassName::new("Mid"));
    }

    #[test]
    fn test_nearest_ancestor_wins() {
        let program = program();
        let classes = ClassTable::new(&program).unwrap();
        let speak = find_method(&classes, &ClassName::new("Leaf"), &MethodName::new("speak"));
        assert_eq!(speak.implementing_class, ClassName::new("Mid"));
        let id = find_method(&classes, &ClassName::new("Leaf"), &MethodName::new("id"));
        assert!(!id.is_virtual);
        assert_eq!(id.implementing_class, ClassName::new("Base"));
        assert_eq!(id.definition.name(), &MethodName::new("id"));
    }

    #[test]
    fn test_missing_method() {
        let program = program();
        let classes = ClassTable::new(&program).unwrap();
        assert_eq!(
            try_find_method(&classes, &ClassName::new("Base"), &MethodName::new("fly")),
            None
        );
    }

    #[test]
    #[should_panic(expected = "no method fly on class Leaf")]
    fn test_find_missing_method_panics() {
        let program = program();
        let classes = ClassTable::new(&program).unwrap();
        find_method(&classes, &ClassName::new("Leaf"), &MethodName::new("fly"));
    }
}
