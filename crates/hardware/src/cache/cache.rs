//! Level-generic cache engine.
//!
//! One [`Cache`] models any level of the stack: per-core L1D, shared L2
//! or L3, or the write-only eDRAM in front of main memory. It owns a tag
//! store, an MSHR file, and a write-back buffer, and is advanced by the
//! hierarchy one tick at a time.
//!
//! A request offered through [`Cache::send`] observes one of the outcomes
//! of [`SendOutcome`]: a tag hit, a reclaim from the write-back buffer, a
//! coalesce into a pending miss, a freshly allocated miss, a forwarded
//! read (write-only mode), or a refusal. Refused requests mutate nothing;
//! the caller retries on a later tick.
//!
//! The cache never calls its neighbours. Each tick returns the request it
//! completed (if any) and the deferred transfer it wants to push
//! downstream; the hierarchy routes both and confirms accepted transfers
//! with [`Cache::downstream_accepted`]. Fills arrive through
//! [`Cache::mshr_complete`], which reports `false` while a full
//! write-back buffer blocks the insertion, and is then re-driven.

use std::collections::VecDeque;

use tracing::trace;

use crate::cache::queue::CacheQueue;
use crate::cache::tags::TagStore;
use crate::common::{Addr, Request, Requester, Tick};
use crate::common::request::AccessKind;
use crate::config::{CacheLevel, Config};
use crate::sim::stats::Stats;

/// What a cache does with reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Caches reads and writes.
    Normal,
    /// Caches writes only; reads are forwarded to the next level.
    WriteOnly,
}

/// Where the next level lives. The off-chip boundary ticks the next
/// level at the frequency ratio and demotes write-backs to plain writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextLevelKind {
    /// Next level is another on-chip cache.
    OnChip,
    /// Next level is the off-chip memory system.
    OffChip,
}

/// Outcome a request observes from [`Cache::send`].
#[derive(Debug)]
pub enum SendOutcome {
    /// Valid block found in the tag store.
    Hit,
    /// Served by reclaiming a not-yet-in-flight write-back entry.
    WbReclaim,
    /// WRITE-BACK from a higher level absorbed into the array.
    WritebackDone,
    /// Rode an existing MSHR entry for the same block.
    Coalesced,
    /// New MSHR entry allocated; the miss will fire downstream.
    MissQueued,
    /// Write-only level: the read must go to the next level instead.
    /// The hierarchy forwards the carried request.
    Forward(Request),
    /// MSHR or write-back buffer full, or arbitration refused the core.
    /// Nothing was mutated.
    Blocked,
}

impl SendOutcome {
    /// Whether the level took responsibility for the request.
    pub fn accepted(&self) -> bool {
        !matches!(self, Self::Blocked)
    }
}

/// What one tick produced.
#[derive(Debug)]
pub struct TickOutput {
    /// Request that finished at this level this tick.
    pub completed: Option<Request>,
    /// Deferred transfer to offer to the next level: an MSHR read or a
    /// write-back.
    pub downstream: Option<Request>,
    /// Whether the next level ticks this cycle.
    pub tick_next: bool,
}

/// Round-robin arbitration state of a shared level.
#[derive(Debug)]
struct Arbitrator {
    num_clients: usize,
    selected_client: usize,
}

/// Construction parameters a cache cannot read from the config alone.
#[derive(Debug, Clone, Copy)]
pub struct CacheParams {
    /// Which configured level this cache instantiates.
    pub level: CacheLevel,
    /// This cache's index in the hierarchy, used to tag MSHR reads.
    pub level_idx: usize,
    /// Owning core for private levels; `None` for shared levels.
    pub core_id: Option<usize>,
    /// Whether the next level is on-chip or the memory system.
    pub next_level: NextLevelKind,
    /// First level of the stack; its tick never cascades.
    pub core_boundary: bool,
    /// Rotate among this many cores, refusing the others each tick.
    pub arbitrate_clients: Option<usize>,
}

/// One cache level.
#[derive(Debug)]
pub struct Cache {
    name: &'static str,
    level_idx: usize,
    core_id: Option<usize>,
    clk: Tick,
    mode: CacheMode,
    next_level: NextLevelKind,
    core_boundary: bool,
    tags: TagStore,
    mshr_queue: CacheQueue,
    wb_queue: CacheQueue,
    tag_lookup_latency: Tick,
    nclks_to_tick_next_level: u64,
    arbitrator: Option<Arbitrator>,
    /// Hits (and completed fills) waiting out the tag-lookup latency.
    pending_commits: VecDeque<Request>,
    /// Requests riding an outstanding miss, released by its fill.
    pending_fills: Vec<Request>,
    num_hits: u64,
    num_misses: u64,
    num_loads: u64,
    num_evicts: u64,
}

impl Cache {
    /// Builds one cache level from its configured geometry.
    pub fn new(cfg: &Config, params: CacheParams) -> Self {
        let info = cfg.cache(params.level);
        let nclks = match params.next_level {
            NextLevelKind::OnChip => 1,
            NextLevelKind::OffChip => cfg.nclks_per_mem_tick(),
        };
        Self {
            name: params.level.name(),
            level_idx: params.level_idx,
            core_id: params.core_id,
            clk: 0,
            mode: if info.write_only {
                CacheMode::WriteOnly
            } else {
                CacheMode::Normal
            },
            next_level: params.next_level,
            core_boundary: params.core_boundary,
            tags: TagStore::build(info.size_kb * 1024, cfg.block_size, info.assoc),
            mshr_queue: CacheQueue::new(info.num_mshrs),
            wb_queue: CacheQueue::new(info.num_wb_entries),
            tag_lookup_latency: info.tag_lookup_latency,
            nclks_to_tick_next_level: nclks.max(1),
            arbitrator: params.arbitrate_clients.map(|num_clients| Arbitrator {
                num_clients,
                selected_client: 0,
            }),
            pending_commits: VecDeque::new(),
            pending_fills: Vec::new(),
            num_hits: 0,
            num_misses: 0,
            num_loads: 0,
            num_evicts: 0,
        }
    }

    /// Hierarchy index this cache was constructed with.
    pub fn level_idx(&self) -> usize {
        self.level_idx
    }

    /// Whether both deferred queues still have room.
    fn blocked(&self) -> bool {
        self.mshr_queue.is_full() || self.wb_queue.is_full()
    }

    /// Offers a request to this level.
    pub fn send(&mut self, mut req: Request) -> SendOutcome {
        if let Some(arb) = &self.arbitrator {
            if req.core_id != arb.selected_client {
                return SendOutcome::Blocked;
            }
        }

        // Step one: tag lookup.
        let (hit, aligned) = self.tags.access_block(req.addr, req.modifies(), self.clk);
        if hit {
            trace!(level = self.name, addr = aligned, "hit");
            self.complete_as_hit(req);
            return SendOutcome::Hit;
        }

        // Step two: data consistency. A block sitting in the write-back
        // buffer can serve the request directly; reclaim it before it
        // drains downstream.
        if self.wb_queue.is_in_queue_not_on_board(aligned) {
            trace!(level = self.name, addr = aligned, "write-back reclaim");
            self.wb_queue.de_allocate(aligned);
            if let Some(wb_addr) = self.tags.insert_block(aligned, true, self.clk) {
                let slot = self.wb_queue.allocate(wb_addr, self.clk);
                debug_assert!(slot.is_ok(), "reclaim freed a write-back slot");
            }
            self.complete_as_hit(req);
            return SendOutcome::WbReclaim;
        }

        // Step three: an eviction from a higher level allocates directly,
        // bypassing the MSHR file. It carries dirty data by definition.
        if req.kind == AccessKind::WriteBack {
            if self.wb_queue.is_full() {
                return SendOutcome::Blocked;
            }
            if let Some(wb_addr) = self.tags.insert_block(aligned, true, self.clk) {
                let slot = self.wb_queue.allocate(wb_addr, self.clk);
                debug_assert!(slot.is_ok());
            }
            return SendOutcome::WritebackDone;
        }

        // Step four: demand reads and writes.
        match self.mode {
            CacheMode::Normal => self.accept_miss(req, aligned),
            CacheMode::WriteOnly => {
                if self.blocked() {
                    return SendOutcome::Blocked;
                }
                match req.kind {
                    AccessKind::Write => self.accept_miss(req, aligned),
                    AccessKind::Read => {
                        // Reads bypass this level entirely.
                        req.addr = aligned;
                        SendOutcome::Forward(req)
                    }
                    AccessKind::WriteBack => unreachable!("handled above"),
                }
            }
        }
    }

    /// Books a hit (or reclaim) for completion after the lookup latency.
    fn complete_as_hit(&mut self, mut req: Request) {
        self.num_hits += 1;
        req.begin_exe = self.clk;
        req.end_exe = self.clk + self.tag_lookup_latency;
        self.pending_commits.push_back(req);
    }

    /// Allocates (or coalesces into) an MSHR entry for a demand miss.
    fn accept_miss(&mut self, mut req: Request, aligned: Addr) -> SendOutcome {
        if self.blocked() {
            return SendOutcome::Blocked;
        }

        let outcome = match self
            .mshr_queue
            .allocate(aligned, self.clk + self.tag_lookup_latency)
        {
            Ok(true) => {
                trace!(level = self.name, addr = aligned, "mshr coalesce");
                self.num_hits += 1;
                SendOutcome::Coalesced
            }
            Ok(false) => {
                self.num_misses += 1;
                if let Some(eip) = req.eip {
                    self.mshr_queue.record_eip(aligned, eip);
                }
                SendOutcome::MissQueued
            }
            // Unreachable behind the blocked() gate; refuse rather than
            // lose the request if the contract is ever broken.
            Err(_) => return SendOutcome::Blocked,
        };

        if req.kind == AccessKind::Write {
            self.mshr_queue.mark_dirty(aligned);
        }
        req.begin_exe = self.clk;
        self.pending_fills.push(req);
        outcome
    }

    /// Delivers a fill for the aligned address of a fired MSHR entry.
    ///
    /// Returns `false`, changing nothing, while the write-back buffer is
    /// too full to absorb a possible eviction; the hierarchy re-drives
    /// the completion on a later tick.
    pub fn mshr_complete(&mut self, addr: Addr) -> bool {
        let aligned = self.tags.block_align(addr);
        if self.wb_queue.is_full() {
            return false;
        }

        let fill_dirty = self.mshr_queue.is_dirty(aligned);
        self.mshr_queue.de_allocate(aligned);
        if let Some(wb_addr) = self.tags.insert_block(aligned, fill_dirty, self.clk) {
            let slot = self.wb_queue.allocate(wb_addr, self.clk);
            debug_assert!(slot.is_ok(), "write-back room was checked above");
        }

        // Release every request that was riding this miss.
        let mut i = 0;
        while i < self.pending_fills.len() {
            if self.tags.block_align(self.pending_fills[i].addr) == aligned {
                let mut freed = self.pending_fills.remove(i);
                freed.end_exe = self.clk;
                self.pending_commits.push_back(freed);
            } else {
                i += 1;
            }
        }
        true
    }

    /// Advances the level one tick.
    pub fn tick(&mut self) -> TickOutput {
        let completed = self.serve_pending_commit();
        let downstream = self.next_transfer();
        let tick_next =
            !self.core_boundary && self.clk % self.nclks_to_tick_next_level == 0;

        if let Some(arb) = &mut self.arbitrator {
            arb.selected_client = (arb.selected_client + 1) % arb.num_clients;
        }
        self.clk += 1;

        TickOutput {
            completed,
            downstream,
            tick_next,
        }
    }

    /// Completes the oldest pending commit whose time has passed.
    fn serve_pending_commit(&mut self) -> Option<Request> {
        if let Some(front) = self.pending_commits.front() {
            if front.end_exe <= self.clk {
                return self.pending_commits.pop_front();
            }
        }
        None
    }

    /// Picks the deferred transfer to push downstream this tick: a ready
    /// write-back when the buffer is full or no MSHR is ready, otherwise
    /// a ready MSHR read.
    fn next_transfer(&mut self) -> Option<Request> {
        let wb_ready = self.wb_queue.get_ready_entry(self.clk);
        let mshr_ready = self.mshr_queue.get_ready_entry(self.clk);

        match (wb_ready, mshr_ready) {
            (Some(wb), _) if self.wb_queue.is_full() => Some(self.make_wb_request(wb)),
            (Some(wb), None) => Some(self.make_wb_request(wb)),
            (_, Some(mshr)) => Some(self.make_mshr_request(mshr)),
            (None, None) => None,
        }
    }

    fn make_wb_request(&self, addr: Addr) -> Request {
        // At the off-chip boundary evictions become ordinary writes; the
        // memory system has no write-back buffer to absorb them into.
        let kind = match self.next_level {
            NextLevelKind::OnChip => AccessKind::WriteBack,
            NextLevelKind::OffChip => AccessKind::Write,
        };
        let mut req = Request::new(addr, kind);
        req.core_id = self.core_id.unwrap_or(0);
        req.eip = self.wb_queue.eip_of(addr);
        req
    }

    fn make_mshr_request(&self, addr: Addr) -> Request {
        let mut req =
            Request::with_requester(addr, AccessKind::Read, Requester::Level(self.level_idx));
        req.core_id = self.core_id.unwrap_or(0);
        req.eip = self.mshr_queue.eip_of(addr);
        req
    }

    /// Confirms that the next level accepted this tick's downstream
    /// transfer: MSHR reads go in flight, write-backs leave the buffer.
    pub fn downstream_accepted(&mut self, kind: AccessKind, addr: Addr) {
        match kind {
            AccessKind::Read => {
                self.mshr_queue.entry_on_board(addr);
                self.num_loads += 1;
            }
            AccessKind::Write | AccessKind::WriteBack => {
                self.wb_queue.de_allocate(addr);
                self.num_evicts += 1;
            }
        }
    }

    /// Books a read the write-only level pushed through to the next
    /// level.
    pub fn note_read_forwarded(&mut self) {
        self.num_misses += 1;
        self.num_loads += 1;
    }

    /// Outstanding work at this level only; the hierarchy adds the
    /// downstream levels.
    pub fn pending_requests(&self) -> usize {
        self.pending_commits.len()
            + self.pending_fills.len()
            + self.mshr_queue.len()
            + self.wb_queue.len()
    }

    /// Number of valid blocks currently held.
    pub fn num_valid_blocks(&self) -> usize {
        self.tags.num_valid()
    }

    /// Restores the freshly constructed state.
    pub fn re_initialise(&mut self) {
        self.clk = 0;
        self.tags.re_initialise();
        self.mshr_queue.re_initialise();
        self.wb_queue.re_initialise();
        self.pending_commits.clear();
        self.pending_fills.clear();
        self.num_hits = 0;
        self.num_misses = 0;
        self.num_loads = 0;
        self.num_evicts = 0;
        if let Some(arb) = &mut self.arbitrator {
            arb.selected_client = 0;
        }
    }

    /// Registers this level's counters.
    pub fn register_stats(&self, stats: &mut Stats) {
        let name = match self.core_id {
            Some(id) => format!("Core-{id}-{}", self.name),
            None => self.name.to_string(),
        };

        stats.register(format!("{name}: Number of hits"), self.num_hits);
        stats.register(format!("{name}: Number of misses"), self.num_misses);
        let total = self.num_hits + self.num_misses;
        let ratio = if total == 0 {
            0.0
        } else {
            self.num_hits as f64 / total as f64
        };
        stats.register(format!("{name}: Hit ratio"), format!("{ratio:.6}"));
        stats.register(format!("{name}: Number of Loads"), self.num_loads);
        stats.register(format!("{name}: Number of Evictions"), self.num_evicts);
    }
}
