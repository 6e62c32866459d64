//! Partition-level-parallelism (PLP) channel schedulers.
//!
//! Two partitions of one PCM bank can be activated at once, so two
//! requests targeting the same channel, rank, and bank but different
//! partitions may be serviced together. The scheduler pairs a **master**
//! with a later **slave**; both leave the queue in the same tick and
//! share begin and end timestamps. Two combinations exist: two reads
//! (R||R) and a read serviced in the shadow of a write (R||W). Writes
//! never pair with writes.
//!
//! Variants:
//! - **Base** is strictly FCFS and only maintains the power average.
//! - **PALP-R** pairs reads with writes only.
//! - **PALP** also pairs reads with reads.
//!
//! Pairing is bounded by a running average power limit (RAPL) and by a
//! back-logging threshold (THB): once the oldest request's OrderID ages
//! to the threshold it is issued at the first opportunity, paired or
//! not.

use std::collections::VecDeque;

use tracing::trace;

use super::{ChannelController, QUEUE_CAPACITY};
use crate::common::request::{AccessKind, PairKind};
use crate::common::{Request, Tick};
use crate::config::Config;
use crate::pcm::array::Array;
use crate::sim::stats::Stats;

/// Scheduling discipline of a [`PlpController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlpVariant {
    /// Strict FCFS; no pairing.
    Base,
    /// Opportunistic R||W pairing only.
    PalpR,
    /// R||R and R||W pairing.
    Palp,
}

/// A scheduling decision held until its bank frees up.
#[derive(Debug, Clone, Copy)]
struct Scheduled {
    master: usize,
    slave: Option<usize>,
}

/// Result of a pairing attempt for one candidate master.
enum PairAttempt {
    /// No request on another partition of the same bank exists.
    NoCandidate,
    /// A partner exists but the power bound refused the pair; the
    /// candidate still issues alone in this decision.
    CandidateRejected,
    /// Paired with the request at this queue index.
    Paired(usize),
}

/// PLP channel controller.
pub struct PlpController {
    id: usize,
    clk: Tick,
    channel: Array,
    variant: PlpVariant,
    rr_enabled: bool,

    queue: Vec<Request>,
    pending: VecDeque<Request>,
    scheduled: Option<Scheduled>,

    power_limit_enabled: bool,
    starv_free_enabled: bool,
    rapl: f64,
    thb: i32,
    /// Running average power of the channel.
    power: f64,

    single_read_latency: Tick,
    single_read_work: Tick,
    single_write_latency: Tick,
    single_write_work: Tick,
    read_with_read_latency: Tick,
    bank_delay_read_with_read: Tick,
    read_while_write_latency: Tick,
    data_transfer_latency: Tick,
    t_rcd: Tick,
    power_per_bit_read: f64,
    power_per_bit_write: f64,

    reads_served: u64,
    writes_served: u64,
    rr_pairs: u64,
    rw_pairs: u64,
}

impl PlpController {
    /// Builds the controller and its channel array.
    pub fn new(id: usize, cfg: &Config, variant: PlpVariant) -> Self {
        let channel = Array::new_channel(id, cfg);
        Self {
            id,
            clk: 0,
            variant,
            rr_enabled: variant == PlpVariant::Palp,
            queue: Vec::new(),
            pending: VecDeque::new(),
            scheduled: None,
            power_limit_enabled: cfg.power_limit_enabled,
            starv_free_enabled: cfg.starv_free_enabled,
            rapl: cfg.rapl,
            thb: cfg.thb,
            power: 0.0,
            single_read_latency: channel.single_read_latency(),
            single_read_work: channel.single_read_work(),
            single_write_latency: channel.single_write_latency(),
            single_write_work: channel.single_write_work(),
            read_with_read_latency: channel.read_with_read_latency(),
            bank_delay_read_with_read: channel.bank_delay_read_with_read(),
            read_while_write_latency: channel.read_while_write_latency(),
            data_transfer_latency: channel.data_transfer_latency(),
            t_rcd: channel.info.t_rcd,
            power_per_bit_read: channel.power_per_bit_read(),
            power_per_bit_write: channel.power_per_bit_write(),
            channel,
            reads_served: 0,
            writes_served: 0,
            rr_pairs: 0,
            rw_pairs: 0,
        }
    }

    /// Current running average power.
    pub fn power(&self) -> f64 {
        self.power
    }

    /// The channel's availability tree, for inspection.
    pub fn channel(&self) -> &Array {
        &self.channel
    }

    fn issueable(&self, idx: usize) -> bool {
        let vec = &self.queue[idx].addr_vec;
        self.channel.is_free(vec.rank(), vec.bank())
    }

    fn serve_pending(&mut self) -> Option<Request> {
        if let Some(front) = self.pending.front() {
            if front.end_exe <= self.clk {
                return self.pending.pop_front();
            }
        }
        None
    }

    // Power accounting. The average integrates per-operation bit energy
    // over working time, weighted against the serving latency.

    fn update_power_read(&mut self) {
        self.power = (self.clk as f64 * self.power
            + self.single_read_work as f64 * self.power_per_bit_read)
            / (self.clk + self.single_read_latency) as f64;
    }

    fn update_power_write(&mut self) {
        self.power = (self.clk as f64 * self.power
            + self.single_write_work as f64 * self.power_per_bit_write)
            / (self.clk + self.single_write_latency) as f64;
    }

    fn power_rr(&self) -> f64 {
        (self.clk as f64 * self.power
            + self.single_read_work as f64 * self.power_per_bit_read * 2.0)
            / (self.clk + self.read_with_read_latency) as f64
    }

    fn power_rw(&self) -> f64 {
        (self.clk as f64 * self.power
            + self.single_read_work as f64 * self.power_per_bit_read
            + self.single_write_work as f64 * self.power_per_bit_write)
            / (self.clk + self.read_while_write_latency) as f64
    }

    fn power_allows(&self, projected: f64) -> bool {
        !self.power_limit_enabled || projected < self.rapl
    }

    /// Commits the power effect of the pick made this tick.
    fn power_update(&mut self, pick: Scheduled) {
        match self.queue[pick.master].pair_kind {
            Some(PairKind::ReadRead) => {
                let projected = self.power_rr();
                if self.power_allows(projected) {
                    self.power = projected;
                }
            }
            Some(PairKind::ReadWrite) => {
                let projected = self.power_rw();
                if self.power_allows(projected) {
                    self.power = projected;
                }
            }
            None => match self.queue[pick.master].kind {
                AccessKind::Read => self.update_power_read(),
                _ => self.update_power_write(),
            },
        }
    }

    /// Couples `master` and `slave` for the given combination.
    fn mark_pair(&mut self, master: usize, slave: usize, kind: PairKind) {
        self.queue[master].is_master = true;
        self.queue[master].pair_kind = Some(kind);
        self.queue[slave].is_slave = true;
        self.queue[slave].pair_kind = Some(kind);
    }

    /// Looks behind `master` for a partner on another partition of the
    /// same bank. Requests ahead of `master` are known not ready, or
    /// `master` is the over-threshold oldest; either way only later
    /// requests qualify.
    fn try_pair(&mut self, master: usize) -> PairAttempt {
        let mut first_read: Option<usize> = None;
        let mut first_write: Option<usize> = None;

        let m_vec = self.queue[master].addr_vec;
        for (offset, candidate) in self.queue[master + 1..].iter().enumerate() {
            let c_vec = &candidate.addr_vec;
            let same_bank = c_vec.channel() == m_vec.channel()
                && c_vec.rank() == m_vec.rank()
                && c_vec.bank() == m_vec.bank();
            if !same_bank || c_vec.partition() == m_vec.partition() {
                continue;
            }
            match candidate.kind {
                AccessKind::Write if first_write.is_none() => {
                    first_write = Some(master + 1 + offset);
                }
                AccessKind::Read if first_read.is_none() => {
                    first_read = Some(master + 1 + offset);
                }
                _ => {}
            }
        }

        match self.queue[master].kind {
            AccessKind::Read => {
                // An R||R pair is always preferred over R||W.
                if self.rr_enabled {
                    if let Some(r) = first_read {
                        if self.power_allows(self.power_rr()) {
                            self.mark_pair(master, r, PairKind::ReadRead);
                            return PairAttempt::Paired(r);
                        }
                        return PairAttempt::CandidateRejected;
                    }
                }
                if let Some(w) = first_write {
                    if self.power_allows(self.power_rw()) {
                        self.mark_pair(master, w, PairKind::ReadWrite);
                        return PairAttempt::Paired(w);
                    }
                    return PairAttempt::CandidateRejected;
                }
                PairAttempt::NoCandidate
            }
            AccessKind::Write => {
                // A write only ever pairs with a read.
                if let Some(r) = first_read {
                    if self.power_allows(self.power_rw()) {
                        self.mark_pair(master, r, PairKind::ReadWrite);
                        return PairAttempt::Paired(r);
                    }
                    return PairAttempt::CandidateRejected;
                }
                PairAttempt::NoCandidate
            }
            AccessKind::WriteBack => PairAttempt::NoCandidate,
        }
    }

    /// Scheduler entry: picks the request (and possibly its partner) to
    /// issue next. `None` means everything targets a busy bank.
    fn get_head(&mut self) -> Option<Scheduled> {
        match self.variant {
            PlpVariant::Base => {
                debug_assert_eq!(self.queue[0].order_id, 0);
                let pick = Scheduled {
                    master: 0,
                    slave: None,
                };
                self.power_update(pick);
                Some(pick)
            }
            PlpVariant::Palp | PlpVariant::PalpR => self.ooo_head(),
        }
    }

    fn ooo_head(&mut self) -> Option<Scheduled> {
        // Starvation guard: a request aged to the threshold is served
        // next, pairing it if possible, regardless of queue position.
        if self.starv_free_enabled && self.queue[0].order_id <= self.thb {
            let slave = match self.try_pair(0) {
                PairAttempt::Paired(s) => Some(s),
                _ => None,
            };
            let pick = Scheduled { master: 0, slave };
            self.power_update(pick);
            return Some(pick);
        }
        debug_assert!(self.queue[0].order_id > self.thb || !self.starv_free_enabled);

        let mut first_ready: Option<usize> = None;
        for i in 0..self.queue.len() {
            if !self.issueable(i) {
                continue;
            }
            debug_assert!(!self.queue[i].is_master && !self.queue[i].is_slave);

            if first_ready.is_none() {
                first_ready = Some(i);
            }

            match self.try_pair(i) {
                PairAttempt::NoCandidate => {}
                PairAttempt::CandidateRejected => {
                    let pick = Scheduled {
                        master: i,
                        slave: None,
                    };
                    self.power_update(pick);
                    return Some(pick);
                }
                PairAttempt::Paired(slave) => {
                    let pick = Scheduled {
                        master: i,
                        slave: Some(slave),
                    };
                    self.power_update(pick);
                    return Some(pick);
                }
            }
        }

        // No pair anywhere: fall back to the first ready request.
        first_ready.map(|i| {
            let pick = Scheduled {
                master: i,
                slave: None,
            };
            self.power_update(pick);
            pick
        })
    }

    /// Computes latencies, stamps both requests, and blocks the array.
    fn channel_access(&mut self, pick: Scheduled) {
        let master = &self.queue[pick.master];
        let (req_latency, bank_latency) = match master.pair_kind {
            None => match master.kind {
                AccessKind::Read => (
                    self.single_read_latency,
                    self.t_rcd + self.single_read_work,
                ),
                _ => (self.single_write_latency, self.single_write_latency),
            },
            Some(PairKind::ReadRead) => {
                (self.read_with_read_latency, self.bank_delay_read_with_read)
            }
            Some(PairKind::ReadWrite) => {
                (self.read_while_write_latency, self.read_while_write_latency)
            }
        };

        let (rank, bank) = (master.addr_vec.rank(), master.addr_vec.bank());
        match master.pair_kind {
            Some(PairKind::ReadRead) => {
                self.rr_pairs += 1;
                self.reads_served += 2;
            }
            Some(PairKind::ReadWrite) => {
                self.rw_pairs += 1;
                self.reads_served += 1;
                self.writes_served += 1;
            }
            None => match master.kind {
                AccessKind::Read => self.reads_served += 1,
                _ => self.writes_served += 1,
            },
        }

        self.queue[pick.master].begin_exe = self.clk;
        self.queue[pick.master].end_exe = self.clk + req_latency;
        if let Some(slave) = pick.slave {
            self.queue[slave].begin_exe = self.clk;
            self.queue[slave].end_exe = self.clk + req_latency;
        }

        trace!(
            channel = self.id,
            rank,
            bank,
            paired = pick.slave.is_some(),
            begin = self.clk,
            end = self.clk + req_latency,
            "issue"
        );

        self.channel.post_access(
            rank,
            bank,
            self.data_transfer_latency,
            req_latency,
            bank_latency,
        );
    }

    /// Moves the pick into the pending deque, the slave ahead of its
    /// master, and renumbers the queue. Erasing a master (or a lone
    /// request) ages every remaining request by one; erasing a slave
    /// renumbers nothing.
    fn retire_from_queue(&mut self, pick: Scheduled) {
        match pick.slave {
            Some(slave) => {
                debug_assert!(slave > pick.master);
                let slave_req = self.queue.remove(slave);
                let master_req = self.queue.remove(pick.master);
                self.pending.push_back(slave_req);
                self.pending.push_back(master_req);
            }
            None => {
                let master_req = self.queue.remove(pick.master);
                self.pending.push_back(master_req);
            }
        }
        for waiting in &mut self.queue {
            waiting.order_id -= 1;
        }
    }
}

impl ChannelController for PlpController {
    fn enqueue(&mut self, mut req: Request) -> Result<(), Request> {
        if self.queue.len() >= QUEUE_CAPACITY {
            return Err(req);
        }
        req.queue_arrival = self.clk;
        req.order_id = self.queue.len() as i32;
        self.queue.push(req);
        Ok(())
    }

    fn tick(&mut self) -> Option<Request> {
        self.clk += 1;
        self.channel.update(self.clk);

        let completed = self.serve_pending();

        if self.scheduled.is_none() && !self.queue.is_empty() {
            self.scheduled = self.get_head();
        }

        if let Some(pick) = self.scheduled.take() {
            if self.issueable(pick.master) {
                self.channel_access(pick);
                self.retire_from_queue(pick);
            } else {
                // The pick, pairing included, waits for its bank.
                self.scheduled = Some(pick);
            }
        }

        completed
    }

    fn pending_requests(&self) -> usize {
        self.queue.len() + self.pending.len()
    }

    fn re_initialise(&mut self) {
        self.clk = 0;
        self.channel.re_initialise();
        self.queue.clear();
        self.pending.clear();
        self.scheduled = None;
        self.power = 0.0;
        self.reads_served = 0;
        self.writes_served = 0;
        self.rr_pairs = 0;
        self.rw_pairs = 0;
    }

    fn register_stats(&self, stats: &mut Stats) {
        let name = format!("Channel-{}", self.id);
        stats.register(format!("{name}: Number of reads served"), self.reads_served);
        stats.register(format!("{name}: Number of writes served"), self.writes_served);
        stats.register(format!("{name}: Number of R||R pairs"), self.rr_pairs);
        stats.register(format!("{name}: Number of R||W pairs"), self.rw_pairs);
        stats.register(
            format!("{name}: Running average power"),
            format!("{:.6}", self.power),
        );
    }
}
