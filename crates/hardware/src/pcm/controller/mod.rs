//! Channel controllers.
//!
//! Every channel of the memory system is owned by one controller. All
//! controllers share the same surface: `enqueue` a decoded request
//! (handing it back when the queue is full), `tick` once per controller
//! clock returning the request completed this tick, and report the work
//! still queued. The scheduler behind that surface is chosen by the
//! configuration:
//!
//! 1. **Baseline:** FCFS and FR-FCFS over one shared queue.
//! 2. **PLP:** Base, PALP-R, and PALP, pairing requests across partitions
//!    of one bank under power and starvation bounds.
//! 3. **LASER:** CP-Static, LASER-1, and LASER-2, managing per-bank read
//!    and write charge pumps.

/// Baseline FCFS and FR-FCFS schedulers.
pub mod fcfs;

/// Charge-pump-aware schedulers.
pub mod laser;

/// Partition-level-parallelism schedulers.
pub mod plp;

pub use fcfs::{BaselineController, BaselinePolicy};
pub use laser::{CpStatus, LaserController, LaserVariant};
pub use plp::{PlpController, PlpVariant};

use crate::common::Request;
use crate::config::{Config, ControllerKind};
use crate::sim::stats::Stats;

/// Capacity of every controller's request queue.
pub const QUEUE_CAPACITY: usize = 64;

/// One channel's scheduler.
pub trait ChannelController {
    /// Accepts a decoded request, or hands it back when the queue is
    /// full so the caller can retry on a later tick.
    fn enqueue(&mut self, req: Request) -> Result<(), Request>;

    /// Advances one controller tick. Returns the request whose
    /// completion fired this tick, if any.
    fn tick(&mut self) -> Option<Request>;

    /// Requests queued or in service.
    fn pending_requests(&self) -> usize;

    /// Restores the freshly constructed state.
    fn re_initialise(&mut self);

    /// Registers this channel's counters.
    fn register_stats(&self, stats: &mut Stats);
}

/// Builds the controller for channel `id`. The lookup is fixed at
/// process start; nothing mutates it afterwards.
pub fn build_controller(
    kind: ControllerKind,
    id: usize,
    cfg: &Config,
) -> Box<dyn ChannelController> {
    match kind {
        ControllerKind::Fcfs => {
            Box::new(BaselineController::new(id, cfg, BaselinePolicy::Fcfs))
        }
        ControllerKind::FrFcfs => {
            Box::new(BaselineController::new(id, cfg, BaselinePolicy::FrFcfs))
        }
        ControllerKind::PlpBase => Box::new(PlpController::new(id, cfg, PlpVariant::Base)),
        ControllerKind::Palp => Box::new(PlpController::new(id, cfg, PlpVariant::Palp)),
        ControllerKind::PalpR => Box::new(PlpController::new(id, cfg, PlpVariant::PalpR)),
        ControllerKind::CpStatic => {
            Box::new(LaserController::new(id, cfg, LaserVariant::CpStatic))
        }
        ControllerKind::Laser1 => Box::new(LaserController::new(id, cfg, LaserVariant::Laser1)),
        ControllerKind::Laser2 => Box::new(LaserController::new(id, cfg, LaserVariant::Laser2)),
        // Hybrid is a memory-system-level arrangement; its two halves
        // name concrete schedulers of their own.
        ControllerKind::Hybrid => {
            Box::new(BaselineController::new(id, cfg, BaselinePolicy::FrFcfs))
        }
    }
}
