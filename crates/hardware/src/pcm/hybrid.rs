//! Hybrid DRAM plus PCM main memory.
//!
//! When two configuration files are supplied, the first describes a DRAM
//! partner and the second the PCM main memory. The physical rank space
//! is split: addresses whose PCM-decoded rank falls in the DRAM half are
//! re-decoded with the DRAM field widths, shifted down to the DRAM rank
//! space, and routed to the DRAM system. Everything else goes to PCM.

use crate::common::Request;
use crate::config::{Config, ControllerKind};
use crate::pcm::decoder::Field;
use crate::pcm::memory_system::MemorySystem;
use crate::sim::stats::Stats;

/// DRAM and PCM systems behind one send/tick surface.
pub struct HybridMemory {
    dram: MemorySystem,
    pcm: MemorySystem,
    base_rank_id_dram: u64,
}

impl HybridMemory {
    /// Builds both halves. DRAM channels run FR-FCFS; PCM channels run
    /// the PALP scheduler.
    pub fn new(dram_cfg: &Config, pcm_cfg: &Config) -> Self {
        Self {
            dram: MemorySystem::with_kind(dram_cfg, ControllerKind::FrFcfs),
            pcm: MemorySystem::with_kind(pcm_cfg, ControllerKind::Palp),
            base_rank_id_dram: dram_cfg.num_of_ranks / 2,
        }
    }

    /// Routes a request to the half that owns its rank.
    ///
    /// # Errors
    ///
    /// Hands the request back when the target channel's queue is full.
    pub fn send(&mut self, mut req: Request) -> Result<(), Request> {
        let pcm_vec = self.pcm.decoder().decode(req.addr);
        if pcm_vec.rank() as u64 >= self.base_rank_id_dram {
            // DRAM half: re-decode with the DRAM widths and shift the
            // rank down into the DRAM rank space.
            let mut dram_vec = self.dram.decoder().decode(req.addr);
            let rank = dram_vec.field(Field::Rank);
            dram_vec.set_field(Field::Rank, rank.saturating_sub(self.base_rank_id_dram));
            req.addr_vec = dram_vec;
            self.dram.route(req)
        } else {
            req.addr_vec = pcm_vec;
            self.pcm.route(req)
        }
    }

    /// Ticks both halves, gathering their completions.
    pub fn tick(&mut self) -> Vec<Request> {
        let mut completed = self.dram.tick();
        completed.extend(self.pcm.tick());
        completed
    }

    /// Requests queued or in service across both halves.
    pub fn pending_requests(&self) -> usize {
        self.dram.pending_requests() + self.pcm.pending_requests()
    }

    /// Restores the freshly constructed state.
    pub fn re_initialise(&mut self) {
        self.dram.re_initialise();
        self.pcm.re_initialise();
    }

    /// Registers both halves' counters.
    pub fn register_stats(&self, stats: &mut Stats) {
        self.dram.register_stats(stats);
        self.pcm.register_stats(stats);
    }
}
