//! Baseline Controller Unit Tests.
//!
//! Timings used throughout: tRCD 4, tData 2, tCL 3, tWL 1, tWR 5, so a
//! lone read costs 9 ticks (bank busy 7) and a lone write 12.

use hybridsim_core::common::request::AccessKind;
use hybridsim_core::common::Request;
use hybridsim_core::config::{Config, ControllerKind};
use hybridsim_core::pcm::MemorySystem;

/// 1 channel, 1 rank, 2 banks, 2 partitions. The bank index sits just
/// above the 6 cache-line bits, so 0x40 flips the bank.
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

fn send_read(ms: &mut MemorySystem, addr: u64) {
    assert!(ms.send(Request::new(addr, AccessKind::Read)).is_ok());
}

/// Ticks the memory system, collecting completions in order.
fn run(ms: &mut MemorySystem, ticks: u64) -> Vec<Request> {
    let mut done = Vec::new();
    for _ in 0..ticks {
        done.extend(ms.tick());
    }
    done
}

// ══════════════════════════════════════════════════════════
// 1. FCFS: strict FIFO on one bank
// ══════════════════════════════════════════════════════════

#[test]
fn single_bank_serves_strictly_fifo() {
    let mut ms = MemorySystem::with_kind(&test_config(), ControllerKind::Fcfs);

    // All three target bank 0 (rows differ).
    send_read(&mut ms, 0x0);
    send_read(&mut ms, 0x100);
    send_read(&mut ms, 0x200);

    let done = run(&mut ms, 40);
    let addrs: Vec<u64> = done.iter().map(|r| r.addr).collect();
    assert_eq!(addrs, vec![0x0, 0x100, 0x200]);

    // Issue is gated by the bank window (tRCD + tCL = 7).
    assert_eq!(done[0].begin_exe, 1);
    assert_eq!(done[0].end_exe, 10);
    assert_eq!(done[1].begin_exe, 8);
    assert_eq!(done[1].end_exe, 17);
    assert_eq!(done[2].begin_exe, 15);
    assert_eq!(done[2].end_exe, 24);
}

#[test]
fn fcfs_head_blocks_ready_later_requests() {
    let mut ms = MemorySystem::with_kind(&test_config(), ControllerKind::Fcfs);

    send_read(&mut ms, 0x0); // bank 0
    let _ = run(&mut ms, 1); // issues, bank 0 busy until tick 8
    send_read(&mut ms, 0x100); // bank 0, head of queue
    send_read(&mut ms, 0x40); // bank 1, free but behind the head

    let done = run(&mut ms, 40);
    let addrs: Vec<u64> = done.iter().map(|r| r.addr).collect();
    assert_eq!(addrs, vec![0x0, 0x100, 0x40], "FCFS never reorders");
}

// ══════════════════════════════════════════════════════════
// 2. FR-FCFS: first-ready reordering
// ══════════════════════════════════════════════════════════

#[test]
fn fr_fcfs_issues_the_first_bank_free_request() {
    let mut ms = MemorySystem::with_kind(&test_config(), ControllerKind::FrFcfs);

    send_read(&mut ms, 0x0); // bank 0
    let _ = run(&mut ms, 1);
    send_read(&mut ms, 0x100); // bank 0, blocked behind the first
    send_read(&mut ms, 0x40); // bank 1, can go early

    let done = run(&mut ms, 40);
    let addrs: Vec<u64> = done.iter().map(|r| r.addr).collect();
    assert_eq!(addrs, vec![0x0, 0x40, 0x100], "bank-free request overtakes");
}

// ══════════════════════════════════════════════════════════
// 3. Write latency and queue bounds
// ══════════════════════════════════════════════════════════

#[test]
fn writes_occupy_the_bank_for_the_full_latency() {
    let mut ms = MemorySystem::with_kind(&test_config(), ControllerKind::Fcfs);

    assert!(ms.send(Request::new(0x0, AccessKind::Write)).is_ok());
    send_read(&mut ms, 0x100); // same bank

    let done = run(&mut ms, 60);
    assert_eq!(done[0].end_exe - done[0].begin_exe, 12, "write latency");
    // The read waits out the whole write (bank busy 12), not 7.
    assert_eq!(done[1].begin_exe, 13);
}

#[test]
fn full_channel_queue_hands_the_request_back() {
    let mut ms = MemorySystem::with_kind(&test_config(), ControllerKind::Fcfs);
    for i in 0..64u64 {
        assert!(ms.send(Request::new(i << 8, AccessKind::Read)).is_ok());
    }
    let refused = ms.send(Request::new(0x7F00, AccessKind::Read));
    assert!(refused.is_err(), "65th request must be refused");
    assert_eq!(ms.pending_requests(), 64);
}
