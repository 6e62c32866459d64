//! PLP Controller Unit Tests.
//!
//! Timings: tRCD 4, tData 2, tCL 3, tWL 1, tWR 5. Lone read 9, lone
//! write 12, R||R pair 19 (3*tRCD + tCL + 2*tData), R||W pair 16
//! (tRCD + write).
//!
//! Address map: 6 cache-line bits, 2 bank bits at bit 6, 4 row bits at
//! bit 8, 1 partition bit at bit 12.

use hybridsim_core::common::request::{AccessKind, PairKind};
use hybridsim_core::common::Request;
use hybridsim_core::config::Config;
use hybridsim_core::pcm::controller::{ChannelController, PlpController, PlpVariant};
use hybridsim_core::pcm::AddrDecoder;

/// 1 channel, 1 rank, 4 banks, 2 partitions.
fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.num_of_channels = 1;
    cfg.num_of_ranks = 1;
    cfg.num_of_banks = 4;
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

fn run(ctrl: &mut PlpController, ticks: u64) -> Vec<Request> {
    let mut done = Vec::new();
    for _ in 0..ticks {
        done.extend(ctrl.tick());
    }
    done
}

// Partition 0 / partition 1 of bank 0.
const BANK0_P0: u64 = 0x0;
const BANK0_P1: u64 = 0x1000;

// ══════════════════════════════════════════════════════════
// 1. R||R pairing (PALP)
// ══════════════════════════════════════════════════════════

#[test]
fn palp_pairs_two_reads_across_partitions() {
    let cfg = test_config();
    let mut ctrl = PlpController::new(0, &cfg, PlpVariant::Palp);

    assert!(ctrl.enqueue(request(&cfg, BANK0_P0, AccessKind::Read)).is_ok());
    assert!(ctrl.enqueue(request(&cfg, BANK0_P1, AccessKind::Read)).is_ok());

    // One tick issues the pair; both leave the queue together.
    let _ = run(&mut ctrl, 1);
    assert_eq!(ctrl.pending_requests(), 2, "both wait in the pending deque");

    let done = run(&mut ctrl, 30);
    assert_eq!(done.len(), 2);
    // The slave drains ahead of its master.
    assert_eq!(done[0].addr, BANK0_P1);
    assert!(done[0].is_slave);
    assert_eq!(done[1].addr, BANK0_P0);
    assert!(done[1].is_master);

    for req in &done {
        assert_eq!(req.pair_kind, Some(PairKind::ReadRead));
        assert_eq!(req.begin_exe, 1, "pair shares its begin tick");
        assert_eq!(req.end_exe, 20, "R||R latency is 3*tRCD + tCL + 2*tData");
    }
}

#[test]
fn pairing_requires_distinct_partitions() {
    let cfg = test_config();
    let mut ctrl = PlpController::new(0, &cfg, PlpVariant::Palp);

    // Same partition: no pairing possible.
    assert!(ctrl.enqueue(request(&cfg, 0x0, AccessKind::Read)).is_ok());
    assert!(ctrl.enqueue(request(&cfg, 0x100, AccessKind::Read)).is_ok());

    let _ = run(&mut ctrl, 1);
    assert_eq!(ctrl.pending_requests(), 2, "one issued, one still queued");

    let done = run(&mut ctrl, 40);
    assert!(done.iter().all(|r| r.pair_kind.is_none()));
}

// ══════════════════════════════════════════════════════════
// 2. R||W pairing (PALP-R)
// ══════════════════════════════════════════════════════════

#[test]
fn palp_r_pairs_read_with_write_only() {
    let cfg = test_config();
    let mut ctrl = PlpController::new(0, &cfg, PlpVariant::PalpR);

    assert!(ctrl.enqueue(request(&cfg, BANK0_P0, AccessKind::Read)).is_ok());
    assert!(ctrl.enqueue(request(&cfg, BANK0_P1, AccessKind::Write)).is_ok());

    let done = run(&mut ctrl, 30);
    assert_eq!(done.len(), 2);
    for req in &done {
        assert_eq!(req.pair_kind, Some(PairKind::ReadWrite));
        assert_eq!(req.end_exe - req.begin_exe, 16, "R||W is tRCD + write");
    }
}

#[test]
fn palp_r_never_pairs_two_reads() {
    let cfg = test_config();
    let mut ctrl = PlpController::new(0, &cfg, PlpVariant::PalpR);

    assert!(ctrl.enqueue(request(&cfg, BANK0_P0, AccessKind::Read)).is_ok());
    assert!(ctrl.enqueue(request(&cfg, BANK0_P1, AccessKind::Read)).is_ok());

    let _ = run(&mut ctrl, 1);
    // No pair: the head issued alone, its partner still queued.
    assert_eq!(ctrl.pending_requests(), 2);

    let done = run(&mut ctrl, 40);
    assert!(done.iter().all(|r| r.pair_kind.is_none()));
}

#[test]
fn writes_never_pair_with_writes() {
    let cfg = test_config();
    let mut ctrl = PlpController::new(0, &cfg, PlpVariant::Palp);

    assert!(ctrl.enqueue(request(&cfg, BANK0_P0, AccessKind::Write)).is_ok());
    assert!(ctrl.enqueue(request(&cfg, BANK0_P1, AccessKind::Write)).is_ok());

    let done = run(&mut ctrl, 60);
    assert_eq!(done.len(), 2);
    assert!(done.iter().all(|r| r.pair_kind.is_none()));
}

// ══════════════════════════════════════════════════════════
// 3. Power bound
// ══════════════════════════════════════════════════════════

#[test]
fn power_limit_refuses_the_pair_but_not_the_issue() {
    let mut cfg = test_config();
    cfg.power_limit_enabled = true;
    cfg.rapl = 0.0; // Any projected power exceeds the limit.
    let mut ctrl = PlpController::new(0, &cfg, PlpVariant::Palp);

    assert!(ctrl.enqueue(request(&cfg, BANK0_P0, AccessKind::Read)).is_ok());
    assert!(ctrl.enqueue(request(&cfg, BANK0_P1, AccessKind::Read)).is_ok());

    let _ = run(&mut ctrl, 1);
    assert_eq!(ctrl.pending_requests(), 2, "master issued unpaired");

    let done = run(&mut ctrl, 40);
    assert_eq!(done.len(), 2);
    assert!(done.iter().all(|r| r.pair_kind.is_none()));
}

#[test]
fn base_variant_tracks_running_average_power() {
    let cfg = test_config();
    let mut ctrl = PlpController::new(0, &cfg, PlpVariant::Base);
    assert_eq!(ctrl.power(), 0.0);

    assert!(ctrl.enqueue(request(&cfg, BANK0_P0, AccessKind::Read)).is_ok());
    let _ = run(&mut ctrl, 1);
    assert!(ctrl.power() > 0.0, "issue folds into the power average");
}

#[test]
fn base_variant_serves_in_order_with_zero_order_ids() {
    let cfg = test_config();
    let mut ctrl = PlpController::new(0, &cfg, PlpVariant::Base);

    for addr in [0x0u64, 0x100, 0x200] {
        assert!(ctrl.enqueue(request(&cfg, addr, AccessKind::Read)).is_ok());
    }
    let done = run(&mut ctrl, 60);
    let addrs: Vec<u64> = done.iter().map(|r| r.addr).collect();
    assert_eq!(addrs, vec![0x0, 0x100, 0x200]);
    // Head erase renumbers the queue back to 0..n.
    assert!(done.iter().all(|r| r.order_id == 0));
}

// ══════════════════════════════════════════════════════════
// 4. Starvation guard
// ══════════════════════════════════════════════════════════

#[test]
fn back_logged_head_issues_at_first_bank_free_tick() {
    let mut cfg = test_config();
    cfg.starv_free_enabled = true;
    cfg.thb = -1;
    let mut ctrl = PlpController::new(0, &cfg, PlpVariant::Palp);

    // Occupy bank 0 so the head backs up behind it.
    assert!(ctrl.enqueue(request(&cfg, 0x200, AccessKind::Read)).is_ok());
    let _ = run(&mut ctrl, 1); // bank 0 busy until tick 8

    assert!(ctrl.enqueue(request(&cfg, 0x0, AccessKind::Read)).is_ok()); // bank 0
    assert!(ctrl.enqueue(request(&cfg, 0x40, AccessKind::Read)).is_ok()); // bank 1

    // The bank-1 read overtakes, aging the head to the threshold.
    let _ = run(&mut ctrl, 2);

    // A later bank-2 arrival must now wait behind the guarded head.
    assert!(ctrl.enqueue(request(&cfg, 0x80, AccessKind::Read)).is_ok());

    let done = run(&mut ctrl, 40);
    let addrs: Vec<u64> = done.iter().map(|r| r.addr).collect();
    assert_eq!(addrs, vec![0x200, 0x40, 0x0, 0x80]);

    let head = &done[2];
    assert_eq!(head.order_id, -1, "head aged to the threshold");
    assert_eq!(head.begin_exe, 8, "issued the tick its bank freed up");
    // The bank-2 read only went after the guarded head.
    assert!(done[3].begin_exe > head.begin_exe);
}
