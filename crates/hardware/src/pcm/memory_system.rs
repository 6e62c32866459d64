//! Channel fan-out over the main memory.
//!
//! The memory system decodes each incoming address into array
//! coordinates and forwards the request to the controller owning its
//! channel. `send` refuses (handing the request back) exactly when that
//! channel's queue is full; `tick` advances every controller and gathers
//! the completions they fired.

use tracing::info;

use crate::common::Request;
use crate::config::{Config, ControllerKind};
use crate::pcm::controller::{ChannelController, build_controller};
use crate::pcm::decoder::AddrDecoder;
use crate::sim::stats::Stats;

/// One memory technology: controllers fanned out over channels.
pub struct MemorySystem {
    controllers: Vec<Box<dyn ChannelController>>,
    decoder: AddrDecoder,
}

impl MemorySystem {
    /// Builds the memory system with the configured controller type.
    pub fn new(cfg: &Config) -> Self {
        Self::with_kind(cfg, cfg.mem_controller_type)
    }

    /// Builds the memory system with an explicit controller type. The
    /// hybrid arrangement uses this to give each half its own scheduler.
    pub fn with_kind(cfg: &Config, kind: ControllerKind) -> Self {
        let controllers = (0..cfg.num_of_channels as usize)
            .map(|id| build_controller(kind, id, cfg))
            .collect();
        info!(
            controller = ?kind,
            channels = cfg.num_of_channels,
            size_gb = cfg.size_in_gb(),
            "memory system"
        );
        Self {
            controllers,
            decoder: AddrDecoder::from_config(cfg),
        }
    }

    /// The decoder built from this memory's geometry.
    pub fn decoder(&self) -> &AddrDecoder {
        &self.decoder
    }

    /// Decodes the address and enqueues the request at its channel.
    ///
    /// # Errors
    ///
    /// Hands the request back when the channel's queue is full; the
    /// caller retries on a later tick.
    pub fn send(&mut self, mut req: Request) -> Result<(), Request> {
        req.addr_vec = self.decoder.decode(req.addr);
        self.route(req)
    }

    /// Enqueues an already-decoded request at its channel.
    ///
    /// # Errors
    ///
    /// Hands the request back when the channel's queue is full.
    pub fn route(&mut self, req: Request) -> Result<(), Request> {
        let channel = req.addr_vec.channel();
        debug_assert!(channel < self.controllers.len());
        self.controllers[channel].enqueue(req)
    }

    /// Ticks every controller, returning the completions they fired.
    pub fn tick(&mut self) -> Vec<Request> {
        self.controllers
            .iter_mut()
            .filter_map(|ctrl| ctrl.tick())
            .collect()
    }

    /// Requests queued or in service across all channels.
    pub fn pending_requests(&self) -> usize {
        self.controllers.iter().map(|c| c.pending_requests()).sum()
    }

    /// Restores the freshly constructed state.
    pub fn re_initialise(&mut self) {
        for ctrl in &mut self.controllers {
            ctrl.re_initialise();
        }
    }

    /// Registers every channel's counters.
    pub fn register_stats(&self, stats: &mut Stats) {
        for ctrl in &self.controllers {
            ctrl.register_stats(stats);
        }
    }
}
