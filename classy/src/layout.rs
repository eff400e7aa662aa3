use crate::ast::{ClassName, MethodName, Variable};
use crate::class_table::ClassTable;
use log::debug;
use std::collections::HashMap;

/// Every int and reference occupies one machine word.
pub const WORD_SIZE: i32 = 4;

/// Instance storage and vtable shape of one class.
#[derive(PartialEq, Clone, Debug)]
pub struct ClassLayout {
    size: i32,
    field_offsets: HashMap<Variable, i32>,
    vtable_slots: Vec<MethodName>,
    vtable_pointer_offset: Option<i32>,
}

impl ClassLayout {
    fn root() -> ClassLayout {
        ClassLayout {
            size: 0,
            field_offsets: HashMap::new(),
            vtable_slots: Vec::new(),
            vtable_pointer_offset: None,
        }
    }
}

/// Layouts for every class of a program, computed once with each superclass
/// laid out before its subclasses.
#[derive(Debug)]
pub struct Layouts {
    layouts: HashMap<ClassName, ClassLayout>,
}

impl Layouts {
    pub fn new(classes: &ClassTable) -> Layouts {
        let mut layouts: HashMap<ClassName, ClassLayout> = HashMap::new();
        let root = ClassLayout::root();
        for class in classes.parents_first() {
            let parent = match class.superclass() {
                Some(name) => &layouts[name],
                None => &root,
            };
            let mut layout = parent.clone();

            for method in class.methods().iter().filter(|m| *m.is_virtual()) {
                if !layout.vtable_slots.contains(method.name()) {
                    layout.vtable_slots.push(method.name().clone());
                }
            }

            // the first class in a chain with virtual methods reserves a word
            // for the vtable pointer at the start of its own region
            if layout.vtable_pointer_offset.is_none() && !layout.vtable_slots.is_empty() {
                layout.vtable_pointer_offset = Some(layout.size);
                layout.size += WORD_SIZE;
            }

            for field in class.fields().iter() {
                layout
                    .field_offsets
                    .insert(field.variable().clone(), layout.size);
                layout.size += WORD_SIZE;
            }

            debug!(
                "layout {}: size {}, vtable pointer {:?}, slots {:?}",
                class.name(),
                layout.size,
                layout.vtable_pointer_offset,
                layout.vtable_slots
            );
            layouts.insert(class.name().clone(), layout);
        }
        Layouts { layouts }
    }

    fn layout(&self, class: &ClassName) -> &ClassLayout {
        match self.layouts.get(class) {
            Some(layout) => layout,
            None => panic!("no layout for class {}", class),
        }
    }

    /// Bytes of heap storage an instance of `class` needs.
    pub fn size_of(&self, class: &ClassName) -> i32 {
        self.layout(class).size
    }

    /// Byte offset of `field` within an instance of `class`. Inherited fields
    /// keep the offset assigned by the declaring ancestor.
    pub fn field_offset(&self, class: &ClassName, field: &Variable) -> i32 {
        match self.layout(class).field_offsets.get(field) {
            Some(offset) => *offset,
            None => panic!("class {} has no field {}", class, field),
        }
    }

    pub fn vtable_slots(&self, class: &ClassName) -> &[MethodName] {
        &self.layout(class).vtable_slots
    }

    pub fn has_vtable(&self, class: &ClassName) -> bool {
        !self.vtable_slots(class).is_empty()
    }

    /// Byte offset of `method`'s entry in the vtable of `class`.
    pub fn method_offset(&self, class: &ClassName, method: &MethodName) -> Option<i32> {
        self.vtable_slots(class)
            .iter()
            .position(|slot| slot == method)
            .map(|index| index as i32 * WORD_SIZE)
    }

    /// Where instances of `class` keep their vtable pointer, if they have one.
    pub fn vtable_pointer_offset(&self, class: &ClassName) -> Option<i32> {
        self.layout(class).vtable_pointer_offset
    }
}
