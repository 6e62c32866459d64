//! Baseline channel schedulers.
//!
//! Both variants keep one bounded queue and one pending deque. FCFS only
//! ever considers the queue head; FR-FCFS walks the queue and issues the
//! first request whose bank is free, breaking ties in arrival order.

use std::collections::VecDeque;

use tracing::trace;

use super::{ChannelController, QUEUE_CAPACITY};
use crate::common::request::AccessKind;
use crate::common::{Request, Tick};
use crate::config::Config;
use crate::pcm::array::Array;
use crate::sim::stats::Stats;

/// Scheduling discipline of a [`BaselineController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselinePolicy {
    /// Strict queue order; the head waits for its bank.
    Fcfs,
    /// First-ready: the oldest request with a free bank issues.
    FrFcfs,
}

/// FCFS / FR-FCFS channel controller.
pub struct BaselineController {
    id: usize,
    clk: Tick,
    channel: Array,
    policy: BaselinePolicy,
    queue: VecDeque<Request>,
    pending: VecDeque<Request>,
    single_read_latency: Tick,
    bank_delay_read: Tick,
    single_write_latency: Tick,
    data_transfer_latency: Tick,
    reads_served: u64,
    writes_served: u64,
}

impl BaselineController {
    /// Builds the controller and its channel array.
    pub fn new(id: usize, cfg: &Config, policy: BaselinePolicy) -> Self {
        let channel = Array::new_channel(id, cfg);
        Self {
            id,
            clk: 0,
            policy,
            single_read_latency: channel.single_read_latency(),
            bank_delay_read: channel.bank_delay_single_read(),
            single_write_latency: channel.single_write_latency(),
            data_transfer_latency: channel.data_transfer_latency(),
            channel,
            queue: VecDeque::new(),
            pending: VecDeque::new(),
            reads_served: 0,
            writes_served: 0,
        }
    }

    /// The channel's availability tree, for inspection.
    pub fn channel(&self) -> &Array {
        &self.channel
    }

    fn issueable(&self, req: &Request) -> bool {
        self.channel.is_free(req.addr_vec.rank(), req.addr_vec.bank())
    }

    fn serve_pending(&mut self) -> Option<Request> {
        if let Some(front) = self.pending.front() {
            if front.end_exe <= self.clk {
                return self.pending.pop_front();
            }
        }
        None
    }

    fn get_head(&self) -> Option<usize> {
        match self.policy {
            BaselinePolicy::Fcfs => {
                let head = self.queue.front()?;
                self.issueable(head).then_some(0)
            }
            BaselinePolicy::FrFcfs => self.queue.iter().position(|req| self.issueable(req)),
        }
    }

    fn channel_access(&mut self, req: &mut Request) {
        req.begin_exe = self.clk;

        let (req_latency, bank_latency) = match req.kind {
            AccessKind::Read => (self.single_read_latency, self.bank_delay_read),
            AccessKind::Write | AccessKind::WriteBack => {
                (self.single_write_latency, self.single_write_latency)
            }
        };
        req.end_exe = req.begin_exe + req_latency;

        match req.kind {
            AccessKind::Read => self.reads_served += 1,
            _ => self.writes_served += 1,
        }

        trace!(
            channel = self.id,
            rank = req.addr_vec.rank(),
            bank = req.addr_vec.bank(),
            begin = req.begin_exe,
            end = req.end_exe,
            "issue"
        );

        // Peer ranks stay blocked for the full request latency; there is
        // no rank-level parallelism within a channel.
        self.channel.post_access(
            req.addr_vec.rank(),
            req.addr_vec.bank(),
            self.data_transfer_latency,
            req_latency,
            bank_latency,
        );
    }
}

impl ChannelController for BaselineController {
    fn enqueue(&mut self, mut req: Request) -> Result<(), Request> {
        if self.queue.len() >= QUEUE_CAPACITY {
            return Err(req);
        }
        req.queue_arrival = self.clk;
        self.queue.push_back(req);
        Ok(())
    }

    fn tick(&mut self) -> Option<Request> {
        self.clk += 1;
        self.channel.update(self.clk);

        let completed = self.serve_pending();

        if let Some(idx) = self.get_head() {
            if let Some(mut req) = self.queue.remove(idx) {
                self.channel_access(&mut req);
                self.pending.push_back(req);
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
        self.reads_served = 0;
        self.writes_served = 0;
    }

    fn register_stats(&self, stats: &mut Stats) {
        let name = format!("Channel-{}", self.id);
        stats.register(format!("{name}: Number of reads served"), self.reads_served);
        stats.register(format!("{name}: Number of writes served"), self.writes_served);
    }
}
