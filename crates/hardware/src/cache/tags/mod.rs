//! Tag stores and replacement policies.
//!
//! A tag store maps aligned addresses to blocks and exposes three
//! operations: `access_block`, `insert_block`, and `re_initialise`. The
//! concrete layout is picked at cache construction and dispatched through
//! [`TagStore`]; call sites never know which variant they hold.

/// Fully-associative LRU store.
pub mod fa_lru;

/// Replacement policy helpers.
pub mod policies;

/// Set-associative LRU store.
pub mod set_assoc;

pub use fa_lru::FaLruTags;
pub use set_assoc::SetAssocTags;

use crate::common::{Addr, Tick};

/// Policy-parametric tag store.
#[derive(Debug)]
pub enum TagStore {
    /// Fully-associative LRU with hash-accelerated lookup.
    FaLru(FaLruTags),
    /// Set-associative LRU.
    SetAssocLru(SetAssocTags),
}

impl TagStore {
    /// Builds the store a cache level asked for. An associativity of zero
    /// selects the fully-associative layout.
    pub fn build(size_bytes: u64, block_size: u64, assoc: usize) -> Self {
        if assoc == 0 {
            Self::FaLru(FaLruTags::new(size_bytes, block_size))
        } else {
            Self::SetAssocLru(SetAssocTags::new(size_bytes, block_size, assoc))
        }
    }

    /// Looks up `addr`, promoting on hit and marking dirty when `modify`.
    /// Returns the hit flag and the block-aligned address.
    pub fn access_block(&mut self, addr: Addr, modify: bool, clk: Tick) -> (bool, Addr) {
        match self {
            Self::FaLru(t) => t.access_block(addr, modify, clk),
            Self::SetAssocLru(t) => t.access_block(addr, modify, clk),
        }
    }

    /// Fills a victim block with `addr`. Returns the eviction address
    /// when the victim was valid and dirty.
    pub fn insert_block(&mut self, addr: Addr, modify: bool, clk: Tick) -> Option<Addr> {
        match self {
            Self::FaLru(t) => t.insert_block(addr, modify, clk),
            Self::SetAssocLru(t) => t.insert_block(addr, modify, clk),
        }
    }

    /// Masks `addr` to its block boundary.
    pub fn block_align(&self, addr: Addr) -> Addr {
        match self {
            Self::FaLru(t) => t.block_align(addr),
            Self::SetAssocLru(t) => t.block_align(addr),
        }
    }

    /// Number of valid blocks.
    pub fn num_valid(&self) -> usize {
        match self {
            Self::FaLru(t) => t.num_valid(),
            Self::SetAssocLru(t) => t.num_valid(),
        }
    }

    /// Restores the freshly constructed state.
    pub fn re_initialise(&mut self) {
        match self {
            Self::FaLru(t) => t.re_initialise(),
            Self::SetAssocLru(t) => t.re_initialise(),
        }
    }
}
