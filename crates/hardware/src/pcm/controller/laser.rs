//! Charge-pump-aware channel schedulers.
//!
//! Serving a PCM read needs the bank's read charge pump (RCP) on; a
//! write needs both pumps. Pumps age while charged, so the controller
//! tracks per-bank pump status, working ticks, and idle ticks, and
//! discharges pumps before the aging estimates
//! `ps = 580.95 * writes + 0.03 * idle` and
//! `sa = 59.63 * reads + 0.03 * idle` cross the stress limit.
//!
//! Variants:
//! - **CP-Static** charges both pumps per access and discharges after
//!   every write (or after 1000 ticks of charge time).
//! - **LASER-1** keeps both pumps charged together and discharges the
//!   pair on aging or when no queued request targets the bank.
//! - **LASER-2** manages the pumps independently; charging and
//!   discharging hide behind read/write mode switches.
//!
//! The request queue is split into a read queue and a write queue with a
//! watermark drain policy, and reads aged past the back-logging
//! threshold issue at the first opportunity.

use std::collections::VecDeque;

use tracing::{debug, trace};

use super::{ChannelController, QUEUE_CAPACITY};
use crate::common::request::AccessKind;
use crate::common::{Request, Tick};
use crate::config::Config;
use crate::pcm::array::Array;
use crate::sim::stats::Stats;

/// Pump management discipline of a [`LaserController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaserVariant {
    /// Statically managed pumps, discharged per write.
    CpStatic,
    /// Both pumps charged and discharged together.
    Laser1,
    /// Independently managed read and write pumps.
    Laser2,
}

/// Which pumps of a bank are charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpStatus {
    /// Only the read charge pump is on.
    RcpOn,
    /// Only the write charge pump is on.
    WcpOn,
    /// Both pumps are on.
    BothOn,
    /// Both pumps are off.
    #[default]
    BothOff,
}

/// One pump of a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CpType {
    Rcp,
    Wcp,
}

/// Charge-pump bookkeeping of one (rank, bank).
#[derive(Debug, Clone, Copy, Default)]
pub struct PumpState {
    /// Which pumps are charged.
    pub cp_status: CpStatus,
    /// Ticks the bank served requests since the last discharge.
    pub working: Tick,
    /// Ticks the bank idled with a pump on since the last discharge.
    pub idle: Tick,
    /// Idle ticks accrued while only the RCP was on.
    pub rcp_idle: Tick,
    /// Idle ticks accrued while only the WCP was on.
    pub wcp_idle: Tick,
    /// Reads served since the RCP was last discharged.
    pub reads_served: u32,
    /// Writes served since the WCP was last discharged.
    pub writes_served: u32,
    /// When the RCP started charging.
    pub rcp_begin_charging: Tick,
    /// When the RCP finished charging.
    pub rcp_end_charging: Tick,
    /// When the WCP started charging.
    pub wcp_begin_charging: Tick,
    /// When the WCP finished charging.
    pub wcp_end_charging: Tick,
}

/// Pump stress estimate coefficients.
const PS_PER_WRITE: f64 = 580.95;
const SA_PER_READ: f64 = 59.63;
const VL_PER_WRITE: f64 = 171.26;
const PER_IDLE_TICK: f64 = 0.03;
const AGING_LIMIT: f64 = 1000.0;

/// Extra de-stress ticks on a whole-bank discharge.
const DISCHARGE_SLACK: Tick = 10;

/// Only critical reads are back-logged.
const BACK_LOGGING_THRESHOLD: i32 = -16;

/// LASER channel controller.
pub struct LaserController {
    id: usize,
    clk: Tick,
    channel: Array,
    variant: LaserVariant,

    readq: Vec<Request>,
    writeq: Vec<Request>,
    pending: VecDeque<Request>,
    write_mode: bool,
    wr_high_watermark: f64,
    wr_low_watermark: f64,

    /// Ticks to charge or discharge the write pump.
    nclks_wcp: Tick,
    /// Ticks to charge or discharge the read pump.
    nclks_rcp: Tick,

    pumps: Vec<Vec<PumpState>>,
    queued_reads: Vec<Vec<u32>>,
    queued_writes: Vec<Vec<u32>>,

    single_read_latency: Tick,
    single_write_latency: Tick,
    data_transfer_latency: Tick,

    reads_served: u64,
    writes_served: u64,
    discharges: u64,
    max_aging: f64,
    max_on_time: Tick,
    min_on_time: Tick,
}

impl LaserController {
    /// Builds the controller, its channel array, and the per-bank pump
    /// tables. All pumps start discharged.
    pub fn new(id: usize, cfg: &Config, variant: LaserVariant) -> Self {
        let channel = Array::new_channel(id, cfg);
        let ranks = channel.info.num_of_ranks as usize;
        let banks = channel.info.num_of_banks as usize;
        Self {
            id,
            clk: 0,
            variant,
            readq: Vec::new(),
            writeq: Vec::new(),
            pending: VecDeque::new(),
            write_mode: false,
            wr_high_watermark: cfg.wr_high_watermark,
            wr_low_watermark: cfg.wr_low_watermark,
            // Pump charge time is a fifth of the access it serves.
            nclks_wcp: channel.single_write_latency() / 5,
            nclks_rcp: channel.single_read_latency() / 5,
            pumps: vec![vec![PumpState::default(); banks]; ranks],
            queued_reads: vec![vec![0; banks]; ranks],
            queued_writes: vec![vec![0; banks]; ranks],
            single_read_latency: channel.single_read_latency(),
            single_write_latency: channel.single_write_latency(),
            data_transfer_latency: channel.data_transfer_latency(),
            channel,
            reads_served: 0,
            writes_served: 0,
            discharges: 0,
            max_aging: 0.0,
            max_on_time: 0,
            min_on_time: Tick::MAX,
        }
    }

    /// Pump state of one (rank, bank), for inspection.
    pub fn pump_state(&self, rank: usize, bank: usize) -> &PumpState {
        &self.pumps[rank][bank]
    }

    /// Whether the controller is draining writes.
    pub fn in_write_mode(&self) -> bool {
        self.write_mode
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

    /// Watermark policy: drain writes when the write queue is nearly
    /// full or reads have run out; go back to reads when the writes are
    /// drained and reads wait.
    fn choose_mode(&mut self) {
        let high = (self.wr_high_watermark * QUEUE_CAPACITY as f64) as usize;
        let low = (self.wr_low_watermark * QUEUE_CAPACITY as f64) as usize;
        if !self.write_mode {
            if self.writeq.len() > high || (self.readq.is_empty() && !self.writeq.is_empty()) {
                debug!(channel = self.id, clk = self.clk, "entering write mode");
                self.write_mode = true;
            }
        } else if self.writeq.len() < low && !self.readq.is_empty() {
            debug!(channel = self.id, clk = self.clk, "leaving write mode");
            self.write_mode = false;
        }
    }

    /// Accrues working and idle ticks for every bank with a charged
    /// pump. Per-pump idle only accrues in the exclusive states.
    fn table_update(&mut self) {
        for rank in 0..self.pumps.len() {
            for bank in 0..self.pumps[rank].len() {
                let status = self.pumps[rank][bank].cp_status;
                if status == CpStatus::BothOff {
                    continue;
                }
                if self.channel.is_bank_free(rank, bank) {
                    let entry = &mut self.pumps[rank][bank];
                    entry.idle += 1;
                    if status == CpStatus::WcpOn {
                        entry.wcp_idle += 1;
                    }
                    if status == CpStatus::RcpOn {
                        entry.rcp_idle += 1;
                    }
                } else {
                    self.pumps[rank][bank].working += 1;
                }
            }
        }
    }

    /// Selection policy over the active queue: back-logged head first,
    /// then the open-pump bank that idled longest, then the head.
    fn get_head(&self) -> Option<usize> {
        let queue = if self.write_mode { &self.writeq } else { &self.readq };
        if queue.is_empty() {
            return None;
        }

        if self.variant == LaserVariant::CpStatic {
            return self.issueable(&queue[0]).then_some(0);
        }

        // Step one: the oldest read must not wait past the threshold.
        if queue[0].order_id <= BACK_LOGGING_THRESHOLD && !self.write_mode {
            return self.issueable(&queue[0]).then_some(0);
        }

        // Step two: prefer a free bank whose required pumps are already
        // on; among those, the one that idled longest.
        let mut most_idle: Option<(Tick, usize)> = None;
        for (i, req) in queue.iter().enumerate() {
            let (rank, bank) = (req.addr_vec.rank(), req.addr_vec.bank());
            let status = self.pumps[rank][bank].cp_status;
            let pumps_ready = match req.kind {
                AccessKind::Read => {
                    status == CpStatus::RcpOn || status == CpStatus::BothOn
                }
                _ => status == CpStatus::BothOn,
            };
            if pumps_ready && self.issueable(req) {
                let idle = self.pumps[rank][bank].idle;
                let better = match most_idle {
                    None => true,
                    Some((best, _)) => idle > best,
                };
                if better {
                    most_idle = Some((idle, i));
                }
            }
        }
        if let Some((_, i)) = most_idle {
            return Some(i);
        }

        // Step three: fall back to the head.
        self.issueable(&queue[0]).then_some(0)
    }

    /// Charges the pumps the access needs and stamps its timing. Returns
    /// nothing; the request is already out of its queue.
    fn channel_access(&mut self, req: &mut Request) {
        req.begin_exe = self.clk;
        let (rank, bank) = (req.addr_vec.rank(), req.addr_vec.bank());
        let mut charging_latency: Tick = 0;

        // CP-Static and LASER-1 charge both pumps in parallel; the access
        // starts once the pump it needs is ready.
        if matches!(self.variant, LaserVariant::CpStatic | LaserVariant::Laser1) {
            if self.pumps[rank][bank].cp_status == CpStatus::BothOff {
                self.pumps[rank][bank].cp_status = CpStatus::BothOn;
                charging_latency = match req.kind {
                    AccessKind::Read => self.nclks_rcp,
                    _ => self.nclks_wcp,
                };
                self.pumps[rank][bank].rcp_begin_charging = self.clk;
                self.pumps[rank][bank].rcp_end_charging = self.clk + self.nclks_rcp;
                self.pumps[rank][bank].wcp_begin_charging = self.clk;
                self.pumps[rank][bank].wcp_end_charging = self.clk + self.nclks_wcp;
            }
            debug_assert_eq!(self.pumps[rank][bank].cp_status, CpStatus::BothOn);
        }

        match req.kind {
            AccessKind::Read => {
                if self.variant == LaserVariant::Laser2 {
                    // RCP charging hides behind the mode switch.
                    match self.pumps[rank][bank].cp_status {
                        CpStatus::BothOff => {
                            self.pumps[rank][bank].cp_status = CpStatus::RcpOn;
                            self.pumps[rank][bank].rcp_begin_charging = self.clk;
                            self.pumps[rank][bank].rcp_end_charging =
                                self.clk + self.nclks_rcp;
                        }
                        CpStatus::WcpOn => {
                            self.pumps[rank][bank].cp_status = CpStatus::BothOn;
                            self.pumps[rank][bank].rcp_begin_charging = self.clk;
                            self.pumps[rank][bank].rcp_end_charging =
                                self.clk + self.nclks_rcp;
                        }
                        CpStatus::RcpOn | CpStatus::BothOn => {}
                    }
                }
                self.pumps[rank][bank].reads_served += 1;
                self.reads_served += 1;
            }
            AccessKind::Write | AccessKind::WriteBack => {
                if self.variant == LaserVariant::Laser2 {
                    // WCP charging always hides behind the mode switch.
                    if self.pumps[rank][bank].cp_status != CpStatus::BothOn {
                        self.pumps[rank][bank].cp_status = CpStatus::BothOn;
                        self.pumps[rank][bank].wcp_begin_charging = self.clk;
                        self.pumps[rank][bank].wcp_end_charging = self.clk + self.nclks_wcp;
                    }
                }
                self.pumps[rank][bank].writes_served += 1;
                self.writes_served += 1;
            }
        }

        let service = match req.kind {
            AccessKind::Read => self.single_read_latency,
            _ => self.single_write_latency,
        };
        let req_latency = charging_latency + service;
        req.end_exe = req.begin_exe + req_latency;

        trace!(
            channel = self.id,
            rank,
            bank,
            charging = charging_latency,
            begin = req.begin_exe,
            end = req.end_exe,
            "issue"
        );

        self.channel.post_access(
            rank,
            bank,
            self.data_transfer_latency,
            req_latency,
            req_latency,
        );
    }

    /// Per-tick discharge policy.
    fn discharge_open_banks(&mut self) {
        let ranks = self.pumps.len();
        let banks = self.pumps.first().map_or(0, Vec::len);

        match self.variant {
            LaserVariant::Laser1 => {
                for rank in 0..ranks {
                    for bank in 0..banks {
                        if self.pumps[rank][bank].cp_status != CpStatus::BothOn {
                            continue;
                        }
                        let entry = self.pumps[rank][bank];
                        let ps = PS_PER_WRITE * f64::from(entry.writes_served)
                            + PER_IDLE_TICK * entry.idle as f64;
                        let sa = SA_PER_READ * f64::from(entry.reads_served)
                            + PER_IDLE_TICK * entry.idle as f64;

                        if ps > AGING_LIMIT || sa > AGING_LIMIT {
                            self.discharge_bank(rank, bank);
                        } else if self.queued_writes[rank][bank] == 0
                            && self.queued_reads[rank][bank] == 0
                        {
                            // No queued request targets this bank.
                            self.discharge_bank(rank, bank);
                        }
                    }
                }
            }
            LaserVariant::Laser2 => {
                for rank in 0..ranks {
                    for bank in 0..banks {
                        let entry = self.pumps[rank][bank];
                        let ps = PS_PER_WRITE * f64::from(entry.writes_served)
                            + PER_IDLE_TICK * entry.wcp_idle as f64;
                        let sa = SA_PER_READ * f64::from(entry.reads_served)
                            + PER_IDLE_TICK * entry.rcp_idle as f64;

                        if matches!(entry.cp_status, CpStatus::WcpOn | CpStatus::BothOn)
                            && (ps > AGING_LIMIT || self.queued_writes[rank][bank] == 0)
                        {
                            self.discharge_pump(CpType::Wcp, rank, bank);
                        }

                        let entry = self.pumps[rank][bank];
                        if matches!(entry.cp_status, CpStatus::RcpOn | CpStatus::BothOn)
                            && (sa > AGING_LIMIT
                                || (self.queued_reads[rank][bank] == 0
                                    && self.queued_writes[rank][bank] == 0))
                        {
                            self.discharge_pump(CpType::Rcp, rank, bank);
                        }
                    }
                }
            }
            LaserVariant::CpStatic => {
                for rank in 0..ranks {
                    for bank in 0..banks {
                        if self.pumps[rank][bank].cp_status != CpStatus::BothOn {
                            continue;
                        }
                        let entry = self.pumps[rank][bank];
                        if entry.writes_served > 0 {
                            // Per-write discharge.
                            self.discharge_bank(rank, bank);
                        } else if entry.working + entry.idle >= AGING_LIMIT as Tick {
                            self.discharge_bank(rank, bank);
                        }
                    }
                }
            }
        }
    }

    /// Discharges both pumps of a bank. Costs `nclks_wcp` plus de-stress
    /// slack of bank latency, and zeroes the bank's bookkeeping.
    fn discharge_bank(&mut self, rank: usize, bank: usize) {
        if !self.channel.is_bank_free(rank, bank) {
            return;
        }
        self.record_discharge(None, rank, bank);

        let entry = &mut self.pumps[rank][bank];
        entry.working = 0;
        entry.idle = 0;
        entry.reads_served = 0;
        entry.writes_served = 0;
        entry.cp_status = CpStatus::BothOff;

        let latency = self.nclks_wcp + DISCHARGE_SLACK;
        self.channel.add_bank_latency(rank, bank, latency);
        self.discharges += 1;
    }

    /// Discharges one pump of a bank. Free of bank latency: the WCP
    /// always hides its discharge, the RCP hides it in write mode.
    fn discharge_pump(&mut self, cp: CpType, rank: usize, bank: usize) {
        if !self.channel.is_bank_free(rank, bank) {
            return;
        }
        self.record_discharge(Some(cp), rank, bank);

        let entry = &mut self.pumps[rank][bank];
        match cp {
            CpType::Wcp => {
                entry.cp_status = match entry.cp_status {
                    CpStatus::WcpOn => CpStatus::BothOff,
                    CpStatus::BothOn => CpStatus::RcpOn,
                    other => other,
                };
                entry.working = 0;
                entry.wcp_idle = 0;
                entry.writes_served = 0;
            }
            CpType::Rcp => {
                entry.cp_status = match entry.cp_status {
                    CpStatus::RcpOn => CpStatus::BothOff,
                    CpStatus::BothOn => CpStatus::WcpOn,
                    other => other,
                };
                entry.working = 0;
                entry.rcp_idle = 0;
                entry.reads_served = 0;
            }
        }
        self.discharges += 1;
    }

    /// Folds one discharge into the on-time and aging statistics.
    fn record_discharge(&mut self, cp: Option<CpType>, rank: usize, bank: usize) {
        let entry = self.pumps[rank][bank];
        let (end_charging, aging) = match cp {
            Some(CpType::Rcp) => (
                entry.rcp_end_charging,
                SA_PER_READ * f64::from(entry.reads_served)
                    + PER_IDLE_TICK * entry.rcp_idle as f64,
            ),
            Some(CpType::Wcp) => (
                entry.wcp_end_charging,
                PS_PER_WRITE * f64::from(entry.writes_served)
                    + PER_IDLE_TICK * entry.wcp_idle as f64,
            ),
            None => {
                let ps = PS_PER_WRITE * f64::from(entry.writes_served)
                    + PER_IDLE_TICK * entry.idle as f64;
                let vl = VL_PER_WRITE * f64::from(entry.writes_served)
                    + PER_IDLE_TICK * entry.idle as f64;
                let sa = SA_PER_READ * f64::from(entry.reads_served)
                    + PER_IDLE_TICK * entry.idle as f64;
                (entry.wcp_end_charging, ps.max(vl).max(sa))
            }
        };

        let on_time = self.clk.saturating_sub(end_charging);
        self.max_on_time = self.max_on_time.max(on_time);
        self.min_on_time = self.min_on_time.min(on_time);
        if aging > self.max_aging {
            self.max_aging = aging;
        }
    }
}

impl ChannelController for LaserController {
    fn enqueue(&mut self, mut req: Request) -> Result<(), Request> {
        let (rank, bank) = (req.addr_vec.rank(), req.addr_vec.bank());
        match req.kind {
            AccessKind::Read => {
                if self.readq.len() >= QUEUE_CAPACITY {
                    return Err(req);
                }
                req.queue_arrival = self.clk;
                req.order_id = self.readq.len() as i32;
                self.readq.push(req);
                self.queued_reads[rank][bank] += 1;
            }
            AccessKind::Write | AccessKind::WriteBack => {
                if self.writeq.len() >= QUEUE_CAPACITY {
                    return Err(req);
                }
                req.queue_arrival = self.clk;
                req.order_id = self.writeq.len() as i32;
                self.writeq.push(req);
                self.queued_writes[rank][bank] += 1;
            }
        }
        Ok(())
    }

    fn tick(&mut self) -> Option<Request> {
        self.clk += 1;
        self.channel.update(self.clk);

        let completed = self.serve_pending();

        self.choose_mode();
        self.table_update();
        self.discharge_open_banks();

        if let Some(idx) = self.get_head() {
            let mut req = if self.write_mode {
                self.writeq.remove(idx)
            } else {
                self.readq.remove(idx)
            };

            let (rank, bank) = (req.addr_vec.rank(), req.addr_vec.bank());
            if req.kind == AccessKind::Read {
                self.queued_reads[rank][bank] -= 1;
            } else {
                self.queued_writes[rank][bank] -= 1;
            }

            self.channel_access(&mut req);
            self.pending.push_back(req);

            // Everything left waiting in the active queue ages by one.
            let queue = if self.write_mode {
                &mut self.writeq
            } else {
                &mut self.readq
            };
            for waiting in queue {
                waiting.order_id -= 1;
            }
        }

        completed
    }

    fn pending_requests(&self) -> usize {
        self.readq.len() + self.writeq.len() + self.pending.len()
    }

    fn re_initialise(&mut self) {
        self.clk = 0;
        self.channel.re_initialise();
        self.readq.clear();
        self.writeq.clear();
        self.pending.clear();
        self.write_mode = false;
        for row in &mut self.pumps {
            row.fill(PumpState::default());
        }
        for row in &mut self.queued_reads {
            row.fill(0);
        }
        for row in &mut self.queued_writes {
            row.fill(0);
        }
        self.reads_served = 0;
        self.writes_served = 0;
        self.discharges = 0;
        self.max_aging = 0.0;
        self.max_on_time = 0;
        self.min_on_time = Tick::MAX;
    }

    fn register_stats(&self, stats: &mut Stats) {
        let name = format!("Channel-{}", self.id);
        stats.register(format!("{name}: Number of reads served"), self.reads_served);
        stats.register(format!("{name}: Number of writes served"), self.writes_served);
        stats.register(format!("{name}: Number of discharges"), self.discharges);
        stats.register(
            format!("{name}: Max pump aging"),
            format!("{:.2}", self.max_aging),
        );
        stats.register(format!("{name}: Max pump on-time"), self.max_on_time);
        let min_on = if self.min_on_time == Tick::MAX {
            0
        } else {
            self.min_on_time
        };
        stats.register(format!("{name}: Min pump on-time"), min_on);
    }
}
