//! The assembled memory hierarchy.
//!
//! Owns the per-core L1D caches, the shared on-chip levels, and the main
//! memory, advances them in topological order every tick, and routes
//! traffic between them:
//!
//! - **Downstream:** deferred transfers (MSHR reads, write-backs) move
//!   from a level to the next; refusals leave the entry where it was and
//!   it retries on a later tick.
//! - **Upstream:** completions route to their requester. A fill refused
//!   by a full write-back buffer parks in a retry queue and is re-driven
//!   at the start of every tick.
//!
//! Shared levels tick in a cascade: the first shared level ticks every
//! cycle, each further level when its predecessor says so, and the
//! memory system at the configured on-chip to off-chip ratio.

use std::collections::VecDeque;

use crate::cache::{Cache, CacheParams, NextLevelKind, SendOutcome};
use crate::common::request::AccessKind;
use crate::common::{Addr, Request, Requester};
use crate::config::{CacheLevel, Config};
use crate::pcm::{HybridMemory, MemorySystem};
use crate::sim::probe::RequestProbe;
use crate::sim::stats::Stats;

/// The main memory behind the cache stack.
pub enum MainMemory {
    /// A single PCM system.
    Pcm(MemorySystem),
    /// A DRAM partner next to the PCM.
    Hybrid(HybridMemory),
}

impl MainMemory {
    fn send(&mut self, req: Request) -> Result<(), Request> {
        match self {
            Self::Pcm(m) => m.send(req),
            Self::Hybrid(m) => m.send(req),
        }
    }

    fn tick(&mut self) -> Vec<Request> {
        match self {
            Self::Pcm(m) => m.tick(),
            Self::Hybrid(m) => m.tick(),
        }
    }

    fn pending_requests(&self) -> usize {
        match self {
            Self::Pcm(m) => m.pending_requests(),
            Self::Hybrid(m) => m.pending_requests(),
        }
    }

    fn re_initialise(&mut self) {
        match self {
            Self::Pcm(m) => m.re_initialise(),
            Self::Hybrid(m) => m.re_initialise(),
        }
    }

    fn register_stats(&self, stats: &mut Stats) {
        match self {
            Self::Pcm(m) => m.register_stats(stats),
            Self::Hybrid(m) => m.register_stats(stats),
        }
    }
}

/// The cache stack plus main memory.
pub struct Hierarchy {
    l1ds: Vec<Cache>,
    shared: Vec<Cache>,
    memory: MainMemory,
    /// Completions refused by a full write-back buffer, re-driven each
    /// tick.
    retry_fills: VecDeque<Request>,
    /// Optional CSV sink for requests completed by the main memory.
    probe: Option<RequestProbe>,
    clk: u64,
    /// Memory tick ratio used when no shared level exists to cascade.
    mem_ratio: u64,
}

impl Hierarchy {
    /// Assembles the hierarchy for `num_cores` cores. Shared levels (L2,
    /// L3, eDRAM) exist when their configured size is non-zero; the last
    /// one owns the off-chip boundary. With a DRAM configuration the
    /// main memory is the hybrid arrangement.
    pub fn new(dram_cfg: Option<&Config>, pcm_cfg: &Config, num_cores: usize) -> Self {
        let shared_levels: Vec<CacheLevel> = [CacheLevel::L2, CacheLevel::L3, CacheLevel::Edram]
            .into_iter()
            .filter(|&lvl| pcm_cfg.cache(lvl).size_kb > 0)
            .collect();
        let n_shared = shared_levels.len();

        let l1ds = (0..num_cores)
            .map(|i| {
                Cache::new(
                    pcm_cfg,
                    CacheParams {
                        level: CacheLevel::L1D,
                        level_idx: i,
                        core_id: Some(i),
                        next_level: if n_shared == 0 {
                            NextLevelKind::OffChip
                        } else {
                            NextLevelKind::OnChip
                        },
                        core_boundary: true,
                        arbitrate_clients: None,
                    },
                )
            })
            .collect();

        let shared = shared_levels
            .iter()
            .enumerate()
            .map(|(j, &lvl)| {
                Cache::new(
                    pcm_cfg,
                    CacheParams {
                        level: lvl,
                        level_idx: num_cores + j,
                        core_id: None,
                        next_level: if j + 1 == n_shared {
                            NextLevelKind::OffChip
                        } else {
                            NextLevelKind::OnChip
                        },
                        core_boundary: false,
                        // The first shared level arbitrates among cores.
                        arbitrate_clients: (j == 0).then_some(num_cores.max(1)),
                    },
                )
            })
            .collect();

        let memory = match dram_cfg {
            Some(dram) => MainMemory::Hybrid(HybridMemory::new(dram, pcm_cfg)),
            None => MainMemory::Pcm(MemorySystem::new(pcm_cfg)),
        };

        Self {
            l1ds,
            shared,
            memory,
            retry_fills: VecDeque::new(),
            probe: None,
            clk: 0,
            mem_ratio: pcm_cfg.nclks_per_mem_tick(),
        }
    }

    /// Attaches a per-request probe; every request completed by the
    /// main memory is recorded to it.
    pub fn attach_request_probe(&mut self, probe: RequestProbe) {
        self.probe = Some(probe);
    }

    /// Number of cores the hierarchy was built for.
    pub fn num_cores(&self) -> usize {
        self.l1ds.len()
    }

    /// Mutable access to one core's L1D, for the core to send into.
    pub fn l1d_mut(&mut self, core_id: usize) -> &mut Cache {
        &mut self.l1ds[core_id]
    }

    /// One core's L1D.
    pub fn l1d(&self, core_id: usize) -> &Cache {
        &self.l1ds[core_id]
    }

    /// The shared levels, outermost last.
    pub fn shared_levels(&self) -> &[Cache] {
        &self.shared
    }

    fn cache_mut(&mut self, level_idx: usize) -> &mut Cache {
        if level_idx < self.l1ds.len() {
            &mut self.l1ds[level_idx]
        } else {
            &mut self.shared[level_idx - self.l1ds.len()]
        }
    }

    /// Offers a request to a core's L1D, resolving write-only
    /// forwarding. Returns whether the hierarchy took the request.
    pub fn send_core_request(&mut self, core_id: usize, req: Request) -> bool {
        match self.l1ds[core_id].send(req) {
            SendOutcome::Forward(forwarded) => {
                let accepted = self.send_down_from(0, forwarded);
                if accepted {
                    self.l1ds[core_id].note_read_forwarded();
                }
                accepted
            }
            outcome => outcome.accepted(),
        }
    }

    /// Sends a request into the shared chain starting at `start`,
    /// following write-only forwards down to the memory system.
    fn send_down_from(&mut self, start: usize, req: Request) -> bool {
        let mut forwarded_by: Vec<usize> = Vec::new();
        let mut idx = start;
        let mut req = req;

        let accepted = loop {
            if idx >= self.shared.len() {
                break self.memory.send(req).is_ok();
            }
            match self.shared[idx].send(req) {
                SendOutcome::Forward(next) => {
                    forwarded_by.push(idx);
                    req = next;
                    idx += 1;
                }
                outcome => break outcome.accepted(),
            }
        };

        if accepted {
            for i in forwarded_by {
                self.shared[i].note_read_forwarded();
            }
        }
        accepted
    }

    /// Routes a downstream transfer from the cache at `source_level`,
    /// confirming it on acceptance.
    fn push_downstream(&mut self, source_level: usize, req: Request) {
        let (addr, kind) = (req.addr, req.kind);
        let start = if source_level < self.l1ds.len() {
            0
        } else {
            source_level - self.l1ds.len() + 1
        };
        if self.send_down_from(start, req) {
            self.cache_mut(source_level).downstream_accepted(kind, addr);
        }
    }

    /// Delivers one completion. Returns `false` when the receiving MSHR
    /// could not take it (write-back buffer full).
    fn deliver_completion(&mut self, req: &Request, fills: &mut Vec<(usize, Addr)>) -> bool {
        match req.requester {
            Requester::None => true,
            Requester::Core(core) => {
                if req.kind == AccessKind::Read {
                    fills.push((core, req.addr));
                }
                true
            }
            Requester::Level(level) => self.cache_mut(level).mshr_complete(req.addr),
        }
    }

    fn handle_completion(&mut self, req: Request, fills: &mut Vec<(usize, Addr)>) {
        if !self.deliver_completion(&req, fills) {
            self.retry_fills.push_back(req);
        }
    }

    /// Advances the whole hierarchy one on-chip tick. Returns the core
    /// fills that completed, for the cores' windows.
    pub fn tick(&mut self) -> Vec<(usize, Addr)> {
        let mut fills = Vec::new();
        self.clk += 1;

        // Re-drive completions blocked by back-pressure.
        for _ in 0..self.retry_fills.len() {
            if let Some(req) = self.retry_fills.pop_front() {
                self.handle_completion(req, &mut fills);
            }
        }

        // Private L1Ds.
        for i in 0..self.l1ds.len() {
            let out = self.l1ds[i].tick();
            if let Some(req) = out.completed {
                self.handle_completion(req, &mut fills);
            }
            if let Some(req) = out.downstream {
                self.push_downstream(i, req);
            }
        }

        // Shared chain, cascading into the memory system.
        let mut cascade = true;
        for j in 0..self.shared.len() {
            if !cascade {
                break;
            }
            let out = self.shared[j].tick();
            cascade = out.tick_next;
            if let Some(req) = out.completed {
                self.handle_completion(req, &mut fills);
            }
            if let Some(req) = out.downstream {
                self.push_downstream(self.l1ds.len() + j, req);
            }
        }

        let tick_memory = if self.shared.is_empty() {
            (self.clk - 1) % self.mem_ratio == 0
        } else {
            cascade
        };
        if tick_memory {
            for req in self.memory.tick() {
                let probe_died = match &mut self.probe {
                    Some(probe) => probe.record(&req).is_err(),
                    None => false,
                };
                if probe_died {
                    // A dead sink stays dead; drop it and move on.
                    self.probe = None;
                }
                self.handle_completion(req, &mut fills);
            }
        }

        fills
    }

    /// Flushes the attached probe, if any.
    pub fn flush_probe(&mut self) {
        if let Some(probe) = &mut self.probe {
            let _ = probe.flush();
        }
    }

    /// Outstanding work across the stack, the memory system, and the
    /// completion retry queue.
    pub fn pending_requests(&self) -> usize {
        let caches: usize = self
            .l1ds
            .iter()
            .chain(self.shared.iter())
            .map(Cache::pending_requests)
            .sum();
        caches + self.memory.pending_requests() + self.retry_fills.len()
    }

    /// Restores the freshly constructed state.
    pub fn re_initialise(&mut self) {
        for cache in self.l1ds.iter_mut().chain(self.shared.iter_mut()) {
            cache.re_initialise();
        }
        self.memory.re_initialise();
        self.retry_fills.clear();
        self.clk = 0;
    }

    /// Registers every component's counters.
    pub fn register_stats(&self, stats: &mut Stats) {
        for cache in self.l1ds.iter().chain(self.shared.iter()) {
            cache.register_stats(stats);
        }
        self.memory.register_stats(stats);
    }
}
