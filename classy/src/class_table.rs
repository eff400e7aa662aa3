use crate::ast::{ClassDefinition, ClassName, Program};
use crate::error::TypeError;
use std::collections::{HashMap, HashSet};

/// Class definitions of a program, keyed by name.
pub struct ClassTable<'a> {
    classes: HashMap<ClassName, &'a ClassDefinition>,
    order: Vec<&'a ClassDefinition>,
}

impl<'a> ClassTable<'a> {
    pub fn new(program: &'a Program) -> Result<ClassTable<'a>, TypeError> {
        let mut classes = HashMap::new();
        let mut order = Vec::new();
        for class in program.classes().iter() {
            if classes.insert(class.name().clone(), class).is_some() {
                return Err(TypeError::DuplicateClass(class.name().clone()));
            }
            order.push(class);
        }
        Ok(ClassTable { classes, order })
    }

    pub fn lookup(&self, name: &ClassName) -> Option<&'a ClassDefinition> {
        self.classes.get(name).copied()
    }

    /// Panics if `name` is not defined; callers only ask for checked names.
    pub fn get(&self, name: &ClassName) -> &'a ClassDefinition {
        match self.lookup(name) {
            Some(class) => class,
            None => panic!("no class named {} in class table", name),
        }
    }

    pub fn superclass_of(&self, name: &ClassName) -> Option<&'a ClassDefinition> {
        self.get(name).superclass().map(|parent| self.get(parent))
    }

    /// Classes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &'a ClassDefinition> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `name` followed by each of its superclasses, nearest first.
    pub fn ancestors(&self, name: &ClassName) -> Ancestors<'_, 'a> {
        Ancestors {
            table: self,
            next: Some(self.get(name)),
        }
    }

    /// Every class, with each superclass appearing before its subclasses.
    /// The inheritance graph must already be known to be acyclic.
    pub fn parents_first(&self) -> Vec<&'a ClassDefinition> {
        let mut visited = HashSet::new();
        let mut result = Vec::with_capacity(self.order.len());
        for class in self.order.iter() {
            let mut chain: Vec<&'a ClassDefinition> = self
                .ancestors(class.name())
                .take_while(|c| !visited.contains(c.name()))
                .collect();
            chain.reverse();
            for c in chain {
                visited.insert(c.name().clone());
                result.push(c);
            }
        }
        result
    }
}

pub struct Ancestors<'t, 'a> {
    table: &'t ClassTable<'a>,
    next: Option<&'a ClassDefinition>,
}

impl<'t, 'a> Iterator for Ancestors<'t, 'a> {
    type Item = &'a ClassDefinition;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.superclass().map(|parent| self.table.get(parent));
        Some(current)
    }
}
