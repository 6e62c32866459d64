//! Trace-driven cores.
//!
//! Each core replays one CPU trace through an in-order retirement
//! window. Loads occupy a window slot until their fill returns from the
//! hierarchy; stores and non-memory instructions retire eagerly. A core
//! stalls its fetch for the tick when the L1D refuses a request.

use crate::cache::{Cache, SendOutcome};
use crate::common::request::AccessKind;
use crate::common::{Addr, Request, Requester, SimError, Tick};
use crate::sim::mapper::Mapper;
use crate::sim::stats::Stats;
use crate::sim::trace::{Instruction, Operation, Trace};

/// Instructions inserted and retired per cycle.
pub const WINDOW_IPC: usize = 4;

/// Window depth.
pub const WINDOW_DEPTH: usize = 128;

/// In-order retirement window.
#[derive(Debug)]
pub struct Window {
    block_mask: Addr,
    ready: Vec<bool>,
    addrs: Vec<Addr>,
    load: usize,
    head: usize,
    tail: usize,
}

impl Window {
    /// Creates an empty window for the given cache line size.
    pub fn new(block_size: u64) -> Self {
        Self {
            block_mask: !(block_size - 1),
            ready: vec![false; WINDOW_DEPTH],
            addrs: vec![0; WINDOW_DEPTH],
            load: 0,
            head: 0,
            tail: 0,
        }
    }

    /// Whether every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.load == WINDOW_DEPTH
    }

    /// Whether no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.load == 0
    }

    /// Occupies the next slot.
    pub fn insert(&mut self, ready: bool, addr: Addr) {
        debug_assert!(!self.is_full());
        self.ready[self.head] = ready;
        self.addrs[self.head] = addr;
        self.head = (self.head + 1) % WINDOW_DEPTH;
        self.load += 1;
    }

    /// Retires up to IPC ready instructions from the tail. Returns how
    /// many retired.
    pub fn retire(&mut self) -> usize {
        let mut retired = 0;
        while self.load > 0 && retired < WINDOW_IPC {
            if !self.ready[self.tail] {
                break;
            }
            self.tail = (self.tail + 1) % WINDOW_DEPTH;
            self.load -= 1;
            retired += 1;
        }
        retired
    }

    /// Marks every slot whose block matches the filled address ready.
    pub fn set_ready(&mut self, addr: Addr) {
        for i in 0..self.load {
            let idx = (self.tail + i) % WINDOW_DEPTH;
            if self.addrs[idx] & self.block_mask == addr & self.block_mask {
                self.ready[idx] = true;
            }
        }
    }
}

/// One trace-driven core.
pub struct Core {
    core_id: usize,
    cycles: Tick,
    trace: Trace,
    window: Window,
    mapper: Mapper,
    cur_inst: Option<Instruction>,
    retired: u64,
    num_loads: u64,
    num_stores: u64,
    num_exes: u64,
}

impl Core {
    /// Opens the core's trace and primes its first instruction.
    ///
    /// # Errors
    ///
    /// Propagates trace open and parse failures.
    pub fn new(core_id: usize, trace_path: &str, block_size: u64) -> Result<Self, SimError> {
        let mut trace = Trace::open(trace_path)?;
        let cur_inst = trace.next_instruction()?;
        Ok(Self {
            core_id,
            cycles: 0,
            trace,
            window: Window::new(block_size),
            mapper: Mapper::new(core_id),
            cur_inst,
            retired: 0,
            num_loads: 0,
            num_stores: 0,
            num_exes: 0,
        })
    }

    /// Advances the core one cycle: retire, then fetch and dispatch up
    /// to IPC instructions into the window and the L1D.
    ///
    /// # Errors
    ///
    /// Propagates trace parse failures.
    pub fn tick(&mut self, l1d: &mut Cache) -> Result<(), SimError> {
        self.cycles += 1;
        self.retired += self.window.retire() as u64;

        let mut inserted = 0;
        while inserted < WINDOW_IPC && !self.window.is_full() {
            let Some(inst) = self.cur_inst else {
                break;
            };

            match inst.op {
                Operation::Exe => {
                    self.window.insert(true, 0);
                    self.num_exes += 1;
                }
                Operation::Load => {
                    let pa = self.mapper.va2pa(inst.target_addr);
                    let mut req = Request::with_requester(
                        pa,
                        AccessKind::Read,
                        Requester::Core(self.core_id),
                    );
                    req.core_id = self.core_id;
                    req.eip = Some(inst.eip);
                    match l1d.send(req) {
                        SendOutcome::Blocked => break,
                        outcome => debug_assert!(outcome.accepted()),
                    }
                    self.window.insert(false, pa);
                    self.num_loads += 1;
                }
                Operation::Store => {
                    let pa = self.mapper.va2pa(inst.target_addr);
                    let mut req = Request::with_requester(
                        pa,
                        AccessKind::Write,
                        Requester::Core(self.core_id),
                    );
                    req.core_id = self.core_id;
                    req.eip = Some(inst.eip);
                    match l1d.send(req) {
                        SendOutcome::Blocked => break,
                        outcome => debug_assert!(outcome.accepted()),
                    }
                    // Stores retire eagerly once accepted.
                    self.window.insert(true, pa);
                    self.num_stores += 1;
                }
            }

            inserted += 1;
            self.cur_inst = self.trace.next_instruction()?;
        }

        Ok(())
    }

    /// Delivers a fill: slots waiting on the block become ready.
    pub fn notify_fill(&mut self, addr: Addr) {
        self.window.set_ready(addr);
    }

    /// Whether the trace is exhausted and the window drained.
    pub fn done(&self) -> bool {
        self.cur_inst.is_none() && self.window.is_empty()
    }

    /// Instructions retired so far.
    pub fn retired(&self) -> u64 {
        self.retired
    }

    /// Registers this core's counters.
    pub fn register_stats(&self, stats: &mut Stats) {
        let name = format!("Core-{}", self.core_id);
        stats.register(format!("{name}: Cycles"), self.cycles);
        stats.register(format!("{name}: Retired instructions"), self.retired);
        stats.register(format!("{name}: Loads"), self.num_loads);
        stats.register(format!("{name}: Stores"), self.num_stores);
        stats.register(format!("{name}: Non-memory instructions"), self.num_exes);
    }
}
