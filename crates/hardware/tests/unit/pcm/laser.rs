//! LASER Controller Unit Tests.
//!
//! Timings: tRCD 4, tData 2, tCL 3, tWL 1, tWR 5. Lone read 9, lone
//! write 12, `nclks_rcp` 1, `nclks_wcp` 2.

use hybridsim_core::common::request::AccessKind;
use hybridsim_core::common::Request;
use hybridsim_core::config::Config;
use hybridsim_core::pcm::controller::{
    ChannelController, CpStatus, LaserController, LaserVariant,
};
use hybridsim_core::pcm::AddrDecoder;
use hybridsim_core::sim::Stats;

/// 1 channel, 1 rank, 2 banks. Bank bit at bit 6.
fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.num_of_channels = 1;
    cfg.num_of_ranks = 1;
    cfg.num_of_banks = 2;
    cfg.num_of_parts = 2;
    cfg.num_of_tiles = 1;
    cfg.num_of_word_lines_per_tile = 16;
    cfg.num_of_bit_lines_per_tile = 512;
    cfg.t_rcd = 4;
    cfg.t_data = 2;
    cfg.t_cl = 3;
    cfg.t_wl = 1;
    cfg.t_wr = 5;
    cfg
}

fn request(cfg: &Config, addr: u64, kind: AccessKind) -> Request {
    let mut req = Request::new(addr, kind);
    req.addr_vec = AddrDecoder::from_config(cfg).decode(addr);
    req
}

fn run(ctrl: &mut LaserController, ticks: u64) -> Vec<Request> {
    let mut done = Vec::new();
    for _ in 0..ticks {
        done.extend(ctrl.tick());
    }
    done
}

fn max_aging(ctrl: &LaserController) -> f64 {
    let mut stats = Stats::new();
    ctrl.register_stats(&mut stats);
    stats
        .get("Channel-0: Max pump aging")
        .expect("stat registered")
        .parse()
        .expect("numeric stat")
}

// ══════════════════════════════════════════════════════════
// 1. Write-drain watermarks
// ══════════════════════════════════════════════════════════

#[test]
fn empty_read_queue_forces_write_mode() {
    let cfg = test_config();
    let mut ctrl = LaserController::new(0, &cfg, LaserVariant::Laser2);

    assert!(!ctrl.in_write_mode());
    assert!(ctrl.enqueue(request(&cfg, 0x0, AccessKind::Write)).is_ok());
    let _ = run(&mut ctrl, 1);
    assert!(ctrl.in_write_mode(), "no reads waiting: drain writes");
}

#[test]
fn drained_writes_return_to_read_mode() {
    let cfg = test_config();
    let mut ctrl = LaserController::new(0, &cfg, LaserVariant::Laser2);

    assert!(ctrl.enqueue(request(&cfg, 0x0, AccessKind::Write)).is_ok());
    let _ = run(&mut ctrl, 1); // write issued, write mode entered
    assert!(ctrl.in_write_mode());

    assert!(ctrl.enqueue(request(&cfg, 0x100, AccessKind::Read)).is_ok());
    let _ = run(&mut ctrl, 1);
    assert!(!ctrl.in_write_mode(), "write queue drained, reads waiting");
}

// ══════════════════════════════════════════════════════════
// 2. LASER-2: independent pump management
// ══════════════════════════════════════════════════════════

#[test]
fn laser2_read_charges_only_the_read_pump() {
    let cfg = test_config();
    let mut ctrl = LaserController::new(0, &cfg, LaserVariant::Laser2);

    assert!(ctrl.enqueue(request(&cfg, 0x0, AccessKind::Read)).is_ok());
    assert!(ctrl.enqueue(request(&cfg, 0x100, AccessKind::Read)).is_ok());
    let _ = run(&mut ctrl, 1);
    assert_eq!(ctrl.pump_state(0, 0).cp_status, CpStatus::RcpOn);

    // Charging hides behind the mode switch: pure read latency.
    let done = run(&mut ctrl, 30);
    assert!(done.iter().all(|r| r.end_exe - r.begin_exe == 9));
}

#[test]
fn laser2_wcp_discharges_on_aging() {
    let cfg = test_config();
    let mut ctrl = LaserController::new(0, &cfg, LaserVariant::Laser2);

    // Three writes to one bank. Two served writes push the pump stress
    // estimate past the limit (2 * 580.95 > 1000), so the write pump
    // discharges before the third write and recharges for it.
    for addr in [0x0u64, 0x100, 0x200] {
        assert!(ctrl.enqueue(request(&cfg, addr, AccessKind::Write)).is_ok());
    }

    let done = run(&mut ctrl, 50);
    assert_eq!(done.len(), 3);
    // WCP charging is always hidden in LASER-2: back-to-back writes.
    assert_eq!(done[0].end_exe, 13);
    assert_eq!(done[1].end_exe, 25);
    assert_eq!(done[2].end_exe, 37);

    // Everything served and nothing queued: both pumps end up off.
    assert_eq!(ctrl.pump_state(0, 0).cp_status, CpStatus::BothOff);
    assert_eq!(ctrl.pending_requests(), 0);
    assert!(max_aging(&ctrl) > 1000.0, "aging estimate crossed the limit");
}

#[test]
fn laser2_prefers_the_open_bank_with_the_longest_idle() {
    let cfg = test_config();
    let mut ctrl = LaserController::new(0, &cfg, LaserVariant::Laser2);

    // A write warms bank 0 (both pumps on, busy until tick 13).
    assert!(ctrl.enqueue(request(&cfg, 0x0, AccessKind::Write)).is_ok());
    let _ = run(&mut ctrl, 1);
    // A read warms bank 1 (read pump on, busy until tick 12).
    assert!(ctrl.enqueue(request(&cfg, 0x40, AccessKind::Read)).is_ok());
    let _ = run(&mut ctrl, 2);

    // Head targets bank 0, a later read targets bank 1. Bank 1 frees
    // first with its pump on, so its read overtakes the head.
    assert!(ctrl.enqueue(request(&cfg, 0x200, AccessKind::Read)).is_ok());
    assert!(ctrl.enqueue(request(&cfg, 0x240, AccessKind::Read)).is_ok());

    let done = run(&mut ctrl, 60);
    let addrs: Vec<u64> = done.iter().map(|r| r.addr).collect();
    assert_eq!(addrs, vec![0x0, 0x40, 0x240, 0x200]);
    let bank1_read = &done[2];
    let bank0_read = &done[3];
    assert!(bank1_read.begin_exe < bank0_read.begin_exe);
}

// ══════════════════════════════════════════════════════════
// 3. LASER-1: both pumps managed together
// ══════════════════════════════════════════════════════════

#[test]
fn laser1_discharges_an_idle_bank_with_no_queued_requests() {
    let cfg = test_config();
    let mut ctrl = LaserController::new(0, &cfg, LaserVariant::Laser1);

    assert!(ctrl.enqueue(request(&cfg, 0x0, AccessKind::Read)).is_ok());
    let done = run(&mut ctrl, 20);

    // Cold pumps: read pays its own charge time (nclks_rcp = 1).
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].end_exe - done[0].begin_exe, 10);

    // Nothing queued for the bank: both pumps discharged together.
    assert_eq!(ctrl.pump_state(0, 0).cp_status, CpStatus::BothOff);
    let state = ctrl.pump_state(0, 0);
    assert_eq!(state.working, 0, "discharge resets the bank bookkeeping");
    assert_eq!(state.idle, 0);
    assert_eq!(state.reads_served, 0);
}

#[test]
fn laser1_discharge_costs_bank_latency() {
    let cfg = test_config();
    let mut ctrl = LaserController::new(0, &cfg, LaserVariant::Laser1);

    // Serve one read, let the bank discharge, then send another.
    assert!(ctrl.enqueue(request(&cfg, 0x0, AccessKind::Read)).is_ok());
    let first = run(&mut ctrl, 20);
    assert_eq!(first.len(), 1);
    let discharge_start = first[0].end_exe;

    assert!(ctrl.enqueue(request(&cfg, 0x100, AccessKind::Read)).is_ok());
    let second = run(&mut ctrl, 40);
    assert_eq!(second.len(), 1);
    // The bank de-stresses for nclks_wcp + 10 ticks before reopening.
    assert!(second[0].begin_exe >= discharge_start + 12);
}

// ══════════════════════════════════════════════════════════
// 4. CP-Static: per-write discharge
// ══════════════════════════════════════════════════════════

#[test]
fn cp_static_discharges_after_every_write() {
    let cfg = test_config();
    let mut ctrl = LaserController::new(0, &cfg, LaserVariant::CpStatic);

    assert!(ctrl.enqueue(request(&cfg, 0x0, AccessKind::Write)).is_ok());
    assert!(ctrl.enqueue(request(&cfg, 0x100, AccessKind::Write)).is_ok());

    let done = run(&mut ctrl, 80);
    assert_eq!(done.len(), 2);

    // Each write pays the charge time (2 + 12), and the second also
    // waits out the per-write discharge (12 ticks of bank latency).
    assert_eq!(done[0].end_exe - done[0].begin_exe, 14);
    assert_eq!(done[1].end_exe - done[1].begin_exe, 14);
    assert_eq!(done[0].end_exe, 15);
    assert_eq!(done[1].begin_exe, 27);

    assert_eq!(ctrl.pump_state(0, 0).cp_status, CpStatus::BothOff);
}
