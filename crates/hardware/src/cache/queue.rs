//! Deferred-address queue used as MSHR file and write-back buffer.
//!
//! A [`CacheQueue`] holds a small fixed-capacity set of block-aligned
//! addresses, each with a ready tick and an in-flight flag. The MSHR
//! instance tracks outstanding misses and coalesces repeat accesses; the
//! write-back instance holds dirty evictions awaiting dispatch.
//!
//! Enumeration order for [`CacheQueue::get_ready_entry`] is the insertion
//! order of allocation, so entries that became ready on the same tick
//! drain oldest first.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::common::{Addr, Tick};

/// Allocation into a full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deferred queue capacity exceeded")]
pub struct CapacityExceeded;

/// Fixed-capacity deferred-address queue.
#[derive(Debug)]
pub struct CacheQueue {
    capacity: usize,
    /// Insertion order of the live entries.
    entries: Vec<Addr>,
    when_ready: HashMap<Addr, Tick>,
    on_board: HashSet<Addr>,
    dirty: HashSet<Addr>,
    eips: HashMap<Addr, Addr>,
}

impl CacheQueue {
    /// Creates a queue holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
            when_ready: HashMap::new(),
            on_board: HashSet::new(),
            dirty: HashSet::new(),
            eips: HashMap::new(),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the queue is at capacity.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Allocates `addr` with the given ready tick.
    ///
    /// Allocation is idempotent: if the address is already queued the
    /// call reports a coalescing hit (`Ok(true)`) and changes nothing.
    /// A new address lands at the back of the enumeration order.
    ///
    /// # Errors
    ///
    /// [`CapacityExceeded`] when a new address would overflow the queue.
    pub fn allocate(&mut self, addr: Addr, when_ready: Tick) -> Result<bool, CapacityExceeded> {
        if self.when_ready.contains_key(&addr) {
            return Ok(true);
        }
        if self.is_full() {
            return Err(CapacityExceeded);
        }
        self.entries.push(addr);
        let _ = self.when_ready.insert(addr, when_ready);
        Ok(false)
    }

    /// Removes `addr` and all of its per-entry state.
    pub fn de_allocate(&mut self, addr: Addr) {
        let pos = self.entries.iter().position(|&a| a == addr);
        debug_assert!(pos.is_some(), "de-allocating an address not in the queue");
        if let Some(pos) = pos {
            let _ = self.entries.remove(pos);
            let _ = self.when_ready.remove(&addr);
            let _ = self.on_board.remove(&addr);
            let _ = self.dirty.remove(&addr);
            let _ = self.eips.remove(&addr);
        }
    }

    /// Marks `addr` in-flight so enumeration skips it.
    pub fn entry_on_board(&mut self, addr: Addr) {
        debug_assert!(self.when_ready.contains_key(&addr));
        let _ = self.on_board.insert(addr);
    }

    /// First entry, in allocation order, whose ready tick has passed and
    /// which is not in flight.
    pub fn get_ready_entry(&self, clk: Tick) -> Option<Addr> {
        self.entries
            .iter()
            .copied()
            .find(|addr| self.when_ready[addr] <= clk && !self.on_board.contains(addr))
    }

    /// Whether `addr` is queued, in flight or not.
    pub fn is_in_queue(&self, addr: Addr) -> bool {
        self.when_ready.contains_key(&addr)
    }

    /// Whether `addr` is queued and not yet in flight.
    pub fn is_in_queue_not_on_board(&self, addr: Addr) -> bool {
        self.is_in_queue(addr) && !self.on_board.contains(&addr)
    }

    /// Marks the entry dirty-on-fill. Used when a WRITE coalesces into a
    /// pending miss.
    pub fn mark_dirty(&mut self, addr: Addr) {
        debug_assert!(self.when_ready.contains_key(&addr));
        let _ = self.dirty.insert(addr);
    }

    /// Whether the entry will fill dirty.
    pub fn is_dirty(&self, addr: Addr) -> bool {
        self.dirty.contains(&addr)
    }

    /// Records the first-touch instruction pointer for an entry.
    pub fn record_eip(&mut self, addr: Addr, eip: Addr) {
        let _ = self.eips.insert(addr, eip);
    }

    /// First-touch instruction pointer of an entry, when known.
    pub fn eip_of(&self, addr: Addr) -> Option<Addr> {
        self.eips.get(&addr).copied()
    }

    /// Drops every entry, restoring the constructed state.
    pub fn re_initialise(&mut self) {
        self.entries.clear();
        self.when_ready.clear();
        self.on_board.clear();
        self.dirty.clear();
        self.eips.clear();
    }
}
