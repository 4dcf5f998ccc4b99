//! Per-resolution pointer state: one slot per pointer seen in the log.

use std::collections::BTreeMap;

use tzindex_ast::Node;
use tzindex_storage::BigMapDiff;

/// Where a temporary pointer came from and what it holds.
#[derive(Debug, Clone, Default)]
pub(crate) struct ChainLink {
    /// `None` for a fresh allocation (end of chain).
    pub source: Option<i64>,
    pub path: Option<String>,
    pub key_type: Option<Node>,
    pub value_type: Option<Node>,
}

#[derive(Debug, Default)]
struct Slot {
    link: Option<ChainLink>,
    /// Records touched in this operation group. `None` once discarded, or
    /// for pointers never allocated or copied into here.
    records: Option<Vec<BigMapDiff>>,
}

#[derive(Debug, Default)]
pub(crate) struct PointerArena {
    slots: Vec<Slot>,
    index: BTreeMap<i64, usize>,
}

impl PointerArena {
    fn slot_mut(&mut self, ptr: i64) -> &mut Slot {
        let next = self.slots.len();
        let idx = *self.index.entry(ptr).or_insert(next);
        if idx == next {
            self.slots.push(Slot::default());
        }
        &mut self.slots[idx]
    }

    fn slot(&self, ptr: i64) -> Option<&Slot> {
        self.index.get(&ptr).map(|&idx| &self.slots[idx])
    }

    /// Register a pointer with an empty record set.
    pub fn open(&mut self, ptr: i64, link: ChainLink) {
        let slot = self.slot_mut(ptr);
        slot.link = Some(link);
        slot.records = Some(Vec::new());
    }

    pub fn link(&self, ptr: i64) -> Option<&ChainLink> {
        self.slot(ptr).and_then(|s| s.link.as_ref())
    }

    pub fn set_link(&mut self, ptr: i64, link: ChainLink) {
        self.slot_mut(ptr).link = Some(link);
    }

    pub fn set_path(&mut self, ptr: i64, path: &str) {
        if let Some(link) = self.slot_mut(ptr).link.as_mut() {
            link.path = Some(path.to_string());
        }
    }

    pub fn records(&self, ptr: i64) -> Option<&[BigMapDiff]> {
        self.slot(ptr).and_then(|s| s.records.as_deref())
    }

    pub fn push(&mut self, ptr: i64, record: BigMapDiff) {
        self.slot_mut(ptr)
            .records
            .get_or_insert_with(Vec::new)
            .push(record);
    }

    /// Mark the pointer's record set as present even when empty.
    pub fn touch(&mut self, ptr: i64) {
        self.slot_mut(ptr).records.get_or_insert_with(Vec::new);
    }

    pub fn discard(&mut self, ptr: i64) {
        if let Some(&idx) = self.index.get(&ptr) {
            self.slots[idx].records = None;
        }
    }
}
