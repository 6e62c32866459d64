//! Memory request record.
//!
//! A [`Request`] is the unit of work that flows from a core through the
//! cache stack into a memory controller. It carries the timing fields the
//! controllers fill in (`queue_arrival`, `begin_exe`, `end_exe`), the
//! decoded address vector produced by the memory system, and the
//! scheduling-only state used by the partition-level-parallelism (PLP)
//! schedulers (`order_id`, pairing flags).
//!
//! Completion does not go through a stored callback. Each request names
//! its [`Requester`]; the hierarchy routes finished requests back to that
//! requester and re-drives notifications that report back-pressure.

use super::{Addr, Tick};
use crate::pcm::decoder::DecodedAddr;

/// Kind of memory access a request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    /// Demand read of one cache block.
    Read,
    /// Demand write of one cache block.
    Write,
    /// Eviction of a dirty block from a higher cache level. Never
    /// allocates an MSHR at the receiving level.
    WriteBack,
}

/// Who is notified when a request completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requester {
    /// Nobody. Used by write-backs, which are fire-and-forget.
    None,
    /// A core's retirement window; fills mark matching slots ready.
    Core(usize),
    /// A cache level, by hierarchy index; the fill completes its MSHR.
    Level(usize),
}

/// Parallel combination a paired PLP request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairKind {
    /// Two reads serviced in parallel on two partitions of one bank.
    ReadRead,
    /// One read serviced under the shadow of a write.
    ReadWrite,
}

/// One memory reference travelling through the hierarchy.
#[derive(Debug, Clone)]
pub struct Request {
    /// Physical address. The receiving cache aligns it to its block size.
    pub addr: Addr,
    /// Access kind.
    pub kind: AccessKind,
    /// Core the reference originated from.
    pub core_id: usize,
    /// First-touch instruction pointer, when the trace provides one.
    pub eip: Option<Addr>,
    /// Who to notify on completion.
    pub requester: Requester,
    /// Address split into array coordinates, filled in by the memory
    /// system before the request reaches a channel controller.
    pub addr_vec: DecodedAddr,
    /// Tick the request entered a controller queue.
    pub queue_arrival: Tick,
    /// Tick the request began execution.
    pub begin_exe: Tick,
    /// Tick the request completes. Always greater than `begin_exe` once
    /// scheduled.
    pub end_exe: Tick,
    /// Queue-age counter maintained by the PLP and LASER schedulers. A
    /// negative value marks a back-logged request.
    pub order_id: i32,
    /// Pairing state, set when a PLP scheduler couples this request with
    /// a partner on a different partition of the same bank.
    pub pair_kind: Option<PairKind>,
    /// This request is the master of its pair.
    pub is_master: bool,
    /// This request is the slave of its pair.
    pub is_slave: bool,
}

impl Request {
    /// Creates a request with no requester to notify.
    pub fn new(addr: Addr, kind: AccessKind) -> Self {
        Self::with_requester(addr, kind, Requester::None)
    }

    /// Creates a request that notifies `requester` on completion.
    pub fn with_requester(addr: Addr, kind: AccessKind, requester: Requester) -> Self {
        Self {
            addr,
            kind,
            core_id: 0,
            eip: None,
            requester,
            addr_vec: DecodedAddr::default(),
            queue_arrival: 0,
            begin_exe: 0,
            end_exe: 0,
            order_id: 0,
            pair_kind: None,
            is_master: false,
            is_slave: false,
        }
    }

    /// True for `Write` and `WriteBack` accesses, which dirty the block
    /// they land in.
    pub fn modifies(&self) -> bool {
        !matches!(self.kind, AccessKind::Read)
    }
}
