use crate::ast::Variable;
use crate::layout::WORD_SIZE;

/// Something the code generator has pushed onto the machine stack.
#[derive(Eq, PartialEq, Clone, Debug)]
pub enum FrameSlot {
    This,
    ReturnAddress,
    Named(Variable),
    /// An anonymous temporary, never looked up by name.
    Dummy,
}

#[derive(PartialEq, Clone, Debug)]
struct FrameEntry {
    slot: FrameSlot,
    size: i32,
}

/// A saved frame height to roll temporary pushes back to.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub struct ResetPoint(usize);

/// Mirrors the shape of the machine stack while a function body is compiled,
/// so every slot can be addressed relative to the current `$sp`.
#[derive(Default, Debug)]
pub struct VariableTable {
    entries: Vec<FrameEntry>,
}

impl VariableTable {
    pub fn new() -> VariableTable {
        VariableTable::default()
    }

    pub fn push_variable(&mut self, slot: FrameSlot, size: i32) {
        assert!(
            size > 0 && size % WORD_SIZE == 0,
            "frame slot size {} is not a whole number of words",
            size
        );
        self.entries.push(FrameEntry { slot, size });
    }

    pub fn push_dummy(&mut self, size: i32) {
        self.push_variable(FrameSlot::Dummy, size);
    }

    /// Distance in bytes from the current stack top to `slot`, i.e. the sum
    /// of the sizes of everything pushed after it.
    pub fn variable_offset(&self, slot: &FrameSlot) -> i32 {
        assert!(slot != &FrameSlot::Dummy, "dummy slots have no offset");
        let mut offset = 0;
        for entry in self.entries.iter().rev() {
            if &entry.slot == slot {
                return offset;
            }
            offset += entry.size;
        }
        panic!("{:?} is not on the stack", slot);
    }

    pub fn make_reset_point(&self) -> ResetPoint {
        ResetPoint(self.entries.len())
    }

    pub fn reset_to(&mut self, point: ResetPoint) {
        assert!(
            point.0 <= self.entries.len(),
            "reset point {} is above the frame height {}",
            point.0,
            self.entries.len()
        );
        self.entries.truncate(point.0);
    }

    pub fn total_size_of_all_variables(&self) -> i32 {
        self.entries.iter().map(|entry| entry.size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
