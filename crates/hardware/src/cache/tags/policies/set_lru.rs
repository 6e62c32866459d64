//! Set-associative LRU replacement.

use crate::cache::block::SetWayBlock;
use crate::common::Tick;

/// Set-associative LRU keyed on `when_touched`.
#[derive(Debug, Default)]
pub struct SetLru;

impl SetLru {
    /// Refreshes a touched block.
    pub fn upgrade(&self, blk: &mut SetWayBlock, clk: Tick) {
        blk.when_touched = clk;
    }

    /// Resets an invalidated block's recency.
    pub fn downgrade(&self, blk: &mut SetWayBlock) {
        blk.when_touched = 0;
    }

    /// Selects the victim way of one set: the first invalid way if any,
    /// otherwise the way with the smallest `when_touched`. Ties go to the
    /// lowest way index. Also reports whether eviction needs a
    /// write-back.
    pub fn find_victim(&self, set: &[SetWayBlock]) -> (bool, usize) {
        debug_assert!(!set.is_empty());

        if let Some(way) = set.iter().position(|blk| !blk.valid) {
            return (false, way);
        }

        let mut victim = 0;
        for (way, blk) in set.iter().enumerate() {
            if blk.when_touched < set[victim].when_touched {
                victim = way;
            }
        }
        (set[victim].dirty, victim)
    }
}
