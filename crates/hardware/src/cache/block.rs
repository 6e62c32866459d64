//! Cache block records.
//!
//! Blocks live in flat arenas owned by their tag store. The
//! fully-associative block links into an MRU-to-LRU chain through
//! `Option<usize>` indices into the same arena; the set-associative block
//! instead remembers its (set, way) position and last-touched tick.

use crate::common::{Addr, Tick};

/// Block of the fully-associative tag store.
#[derive(Debug, Clone, Default)]
pub struct FaBlock {
    /// Tag. For the fully-associative store this is the aligned address.
    pub tag: Addr,
    /// The block holds live data.
    pub valid: bool,
    /// The block was modified since it was filled.
    pub dirty: bool,
    /// Arena index of the more recently used neighbour.
    pub prev: Option<usize>,
    /// Arena index of the less recently used neighbour.
    pub next: Option<usize>,
}

impl FaBlock {
    /// Fills an invalid block with `tag`.
    pub fn insert(&mut self, tag: Addr) {
        debug_assert!(!self.valid, "inserting into a valid block");
        self.tag = tag;
        self.valid = true;
    }

    /// Drops the block's data. Clearing dirty is the caller's job so the
    /// eviction address can still be regenerated first.
    pub fn invalidate(&mut self) {
        debug_assert!(self.valid, "invalidating an invalid block");
        self.valid = false;
    }
}

/// Block of the set-associative tag store.
#[derive(Debug, Clone, Default)]
pub struct SetWayBlock {
    /// Tag bits above the set index.
    pub tag: Addr,
    /// The block holds live data.
    pub valid: bool,
    /// The block was modified since it was filled.
    pub dirty: bool,
    /// Last tick the block was touched; the set-LRU victim key.
    pub when_touched: Tick,
    /// Set this block belongs to.
    pub set: usize,
    /// Way within the set.
    pub way: usize,
}

impl SetWayBlock {
    /// Fills an invalid block with `tag`.
    pub fn insert(&mut self, tag: Addr) {
        debug_assert!(!self.valid, "inserting into a valid block");
        self.tag = tag;
        self.valid = true;
    }

    /// Drops the block's data.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }
}
