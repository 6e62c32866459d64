//! Fully-associative tag store with hash-accelerated lookup.
//!
//! Blocks live in a flat arena; recency is the index chain maintained by
//! [`FaLru`]. An auxiliary map from tag to arena index makes lookup O(1).
//! The map holds an entry exactly when the block is valid.

use std::collections::HashMap;

use crate::cache::block::FaBlock;
use crate::cache::tags::policies::fa_lru::{Chain, FaLru};
use crate::common::{Addr, Tick};

/// Fully-associative LRU tag store.
#[derive(Debug)]
pub struct FaLruTags {
    blocks: Vec<FaBlock>,
    chain: Chain,
    tag_hash: HashMap<Addr, usize>,
    block_mask: Addr,
    policy: FaLru,
}

impl FaLruTags {
    /// Creates a store of `size_bytes / block_size` blocks.
    pub fn new(size_bytes: u64, block_size: u64) -> Self {
        let num_blocks = (size_bytes / block_size).max(1) as usize;
        let mut tags = Self {
            blocks: vec![FaBlock::default(); num_blocks],
            chain: Chain {
                head: 0,
                tail: num_blocks - 1,
            },
            tag_hash: HashMap::new(),
            block_mask: block_size - 1,
            policy: FaLru,
        };
        tags.init_chain();
        tags
    }

    fn init_chain(&mut self) {
        let n = self.blocks.len();
        for (i, blk) in self.blocks.iter_mut().enumerate() {
            blk.prev = i.checked_sub(1);
            blk.next = if i + 1 < n { Some(i + 1) } else { None };
        }
        self.chain = Chain { head: 0, tail: n - 1 };
    }

    /// Number of blocks in the arena.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Number of valid blocks. Always equals the lookup map's size.
    pub fn num_valid(&self) -> usize {
        debug_assert_eq!(
            self.tag_hash.len(),
            self.blocks.iter().filter(|b| b.valid).count()
        );
        self.tag_hash.len()
    }

    /// Masks `addr` to its block boundary.
    pub fn block_align(&self, addr: Addr) -> Addr {
        addr & !self.block_mask
    }

    /// The tag of a fully-associative block is its aligned address.
    fn extract_tag(&self, addr: Addr) -> Addr {
        self.block_align(addr)
    }

    fn find_block(&self, aligned: Addr) -> Option<usize> {
        self.tag_hash.get(&aligned).copied().inspect(|&idx| {
            debug_assert!(self.blocks[idx].valid);
            debug_assert_eq!(self.blocks[idx].tag, aligned);
        })
    }

    /// Looks up `addr`; a hit promotes the block and, when `modify`,
    /// marks it dirty. Returns the hit flag and the aligned address.
    pub fn access_block(&mut self, addr: Addr, modify: bool, clk: Tick) -> (bool, Addr) {
        let _ = clk; // Recency is positional for the FA chain.
        let aligned = self.block_align(addr);

        let Some(idx) = self.find_block(aligned) else {
            return (false, aligned);
        };
        self.policy.upgrade(&mut self.blocks, &mut self.chain, idx);
        if modify {
            self.blocks[idx].dirty = true;
        }
        (true, aligned)
    }

    /// Fills the victim block with `addr`. Returns the eviction address
    /// when the victim was valid and dirty.
    pub fn insert_block(&mut self, addr: Addr, modify: bool, clk: Tick) -> Option<Addr> {
        let _ = clk;
        let (wb_required, victim) = self.policy.find_victim(&self.blocks, self.chain);

        let wb_addr = wb_required.then(|| self.blocks[victim].tag);
        if self.blocks[victim].valid {
            self.invalidate(victim);
        }

        let tag = self.extract_tag(addr);
        self.blocks[victim].insert(tag);
        if modify {
            self.blocks[victim].dirty = true;
        }
        self.policy.upgrade(&mut self.blocks, &mut self.chain, victim);
        let _ = self.tag_hash.insert(tag, victim);

        wb_addr
    }

    /// Drops a block from the store and the lookup map, and demotes it to
    /// the tail.
    fn invalidate(&mut self, idx: usize) {
        let removed = self.tag_hash.remove(&self.blocks[idx].tag);
        debug_assert!(removed.is_some());
        self.blocks[idx].invalidate();
        self.blocks[idx].dirty = false;
        self.policy.downgrade(&mut self.blocks, &mut self.chain, idx);
    }

    /// Restores the freshly constructed state.
    pub fn re_initialise(&mut self) {
        for blk in &mut self.blocks {
            blk.valid = false;
            blk.dirty = false;
            blk.tag = 0;
        }
        self.tag_hash.clear();
        self.init_chain();
    }

    /// Arena indices from head to tail, for chain integrity checks.
    pub fn chain_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.blocks.len());
        let mut cursor = Some(self.chain.head);
        while let Some(idx) = cursor {
            order.push(idx);
            cursor = self.blocks[idx].next;
        }
        order
    }
}
