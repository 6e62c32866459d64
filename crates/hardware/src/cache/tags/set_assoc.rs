//! Set-associative tag store.
//!
//! Blocks live in one flat arena; set `s` occupies the contiguous ways
//! `s * assoc .. (s + 1) * assoc`. The set index is taken just above the
//! block offset, the tag above the set index, and eviction addresses are
//! regenerated from the victim's tag and set.

use crate::cache::block::SetWayBlock;
use crate::cache::tags::policies::set_lru::SetLru;
use crate::common::{Addr, Tick};

/// Set-associative LRU tag store.
#[derive(Debug)]
pub struct SetAssocTags {
    blocks: Vec<SetWayBlock>,
    assoc: usize,
    num_sets: usize,
    set_shift: u32,
    set_mask: Addr,
    tag_shift: u32,
    block_mask: Addr,
    policy: SetLru,
}

impl SetAssocTags {
    /// Creates a store of `size_bytes / block_size` blocks split into
    /// `assoc`-way sets.
    pub fn new(size_bytes: u64, block_size: u64, assoc: usize) -> Self {
        let num_blocks = (size_bytes / block_size).max(1) as usize;
        let assoc = assoc.clamp(1, num_blocks);
        let num_sets = num_blocks / assoc;
        let set_shift = block_size.trailing_zeros();
        let tag_shift = set_shift + (num_sets as u64).trailing_zeros();

        let mut tags = Self {
            blocks: vec![SetWayBlock::default(); num_sets * assoc],
            assoc,
            num_sets,
            set_shift,
            set_mask: num_sets as Addr - 1,
            tag_shift,
            block_mask: block_size - 1,
            policy: SetLru,
        };
        tags.init_positions();
        tags
    }

    fn init_positions(&mut self) {
        for i in 0..self.blocks.len() {
            self.blocks[i].set = i / self.assoc;
            self.blocks[i].way = i % self.assoc;
        }
    }

    /// Associativity of the store.
    pub fn assoc(&self) -> usize {
        self.assoc
    }

    /// Number of sets.
    pub fn num_sets(&self) -> usize {
        self.num_sets
    }

    /// Number of valid blocks across all sets.
    pub fn num_valid(&self) -> usize {
        self.blocks.iter().filter(|b| b.valid).count()
    }

    /// Masks `addr` to its block boundary.
    pub fn block_align(&self, addr: Addr) -> Addr {
        addr & !self.block_mask
    }

    fn extract_set(&self, addr: Addr) -> usize {
        ((addr >> self.set_shift) & self.set_mask) as usize
    }

    fn extract_tag(&self, addr: Addr) -> Addr {
        addr >> self.tag_shift
    }

    fn regenerate_addr(&self, blk: &SetWayBlock) -> Addr {
        (blk.tag << self.tag_shift) | ((blk.set as Addr) << self.set_shift)
    }

    fn set_range(&self, set: usize) -> std::ops::Range<usize> {
        set * self.assoc..(set + 1) * self.assoc
    }

    fn find_block(&self, aligned: Addr) -> Option<usize> {
        let tag = self.extract_tag(aligned);
        let range = self.set_range(self.extract_set(aligned));
        self.blocks[range.clone()]
            .iter()
            .position(|blk| blk.valid && blk.tag == tag)
            .map(|way| range.start + way)
    }

    /// Looks up `addr`; a hit refreshes `when_touched` and, when
    /// `modify`, marks the block dirty. Returns the hit flag and the
    /// aligned address.
    pub fn access_block(&mut self, addr: Addr, modify: bool, clk: Tick) -> (bool, Addr) {
        let aligned = self.block_align(addr);

        let Some(idx) = self.find_block(aligned) else {
            return (false, aligned);
        };
        let blk = &mut self.blocks[idx];
        self.policy.upgrade(blk, clk);
        if modify {
            blk.dirty = true;
        }
        (true, aligned)
    }

    /// Fills the set's victim way with `addr`. Returns the regenerated
    /// eviction address when the victim was valid and dirty.
    pub fn insert_block(&mut self, addr: Addr, modify: bool, clk: Tick) -> Option<Addr> {
        let set = self.extract_set(addr);
        let range = self.set_range(set);
        let (wb_required, way) = self.policy.find_victim(&self.blocks[range.clone()]);
        let idx = range.start + way;

        let wb_addr = wb_required.then(|| {
            debug_assert!(self.blocks[idx].dirty);
            self.regenerate_addr(&self.blocks[idx])
        });
        if self.blocks[idx].valid {
            self.blocks[idx].invalidate();
            self.blocks[idx].dirty = false;
            self.policy.downgrade(&mut self.blocks[idx]);
        }

        let tag = self.extract_tag(addr);
        self.blocks[idx].insert(tag);
        if modify {
            self.blocks[idx].dirty = true;
        }
        self.policy.upgrade(&mut self.blocks[idx], clk);

        wb_addr
    }

    /// Restores the freshly constructed state.
    pub fn re_initialise(&mut self) {
        for blk in &mut self.blocks {
            blk.valid = false;
            blk.dirty = false;
            blk.tag = 0;
            blk.when_touched = 0;
        }
        self.init_positions();
    }
}
