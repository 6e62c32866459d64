//! Array Availability Unit Tests.
//!
//! Verifies the per-level availability windows: a (rank, bank) is free
//! only when bank, rank, and channel have all passed `next_free`, and
//! issuing an access blocks the channel, the targeted bank, and every
//! peer rank.

use hybridsim_core::config::Config;
use hybridsim_core::pcm::Array;

/// 2 ranks x 4 banks, small timings.
fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.num_of_channels = 1;
    cfg.num_of_ranks = 2;
    cfg.num_of_banks = 4;
    cfg.t_rcd = 4;
    cfg.t_data = 2;
    cfg.t_cl = 3;
    cfg.t_wl = 1;
    cfg.t_wr = 5;
    cfg
}

// ══════════════════════════════════════════════════════════
// 1. Availability windows
// ══════════════════════════════════════════════════════════

#[test]
fn fresh_array_is_free_everywhere() {
    let arr = Array::new_channel(0, &test_config());
    for rank in 0..2 {
        for bank in 0..4 {
            assert!(arr.is_free(rank, bank));
            assert!(arr.is_bank_free(rank, bank));
        }
    }
}

#[test]
fn post_access_blocks_until_the_longest_window_passes() {
    let mut arr = Array::new_channel(0, &test_config());
    arr.update(10);
    arr.post_access(0, 1, 2, 4, 6);

    // Target (0, 1): blocked by the bank window (6 > channel 2).
    for clk in 10..16 {
        arr.update(clk);
        assert!(!arr.is_free(0, 1), "busy at {clk}");
    }
    arr.update(16);
    assert!(arr.is_free(0, 1));
}

#[test]
fn peer_rank_is_blocked_for_the_rank_latency() {
    let mut arr = Array::new_channel(0, &test_config());
    arr.update(10);
    arr.post_access(0, 1, 2, 4, 6);

    // Rank 1 never served the access but is blocked for 4 ticks.
    arr.update(12);
    assert!(!arr.is_free(1, 0), "channel and peer rank still busy");
    arr.update(13);
    assert!(!arr.is_free(1, 0), "peer rank still busy");
    arr.update(14);
    assert!(arr.is_free(1, 0));
}

#[test]
fn sibling_bank_of_the_target_rank_waits_for_the_channel() {
    let mut arr = Array::new_channel(0, &test_config());
    arr.update(10);
    arr.post_access(0, 1, 2, 4, 6);

    // (0, 0): its bank is free and rank 0 is not rank-blocked, but the
    // channel is occupied for 2 ticks.
    arr.update(11);
    assert!(!arr.is_free(0, 0));
    arr.update(12);
    assert!(arr.is_free(0, 0));
}

#[test]
fn bank_free_ignores_channel_and_rank_state() {
    let mut arr = Array::new_channel(0, &test_config());
    arr.update(10);
    arr.post_access(0, 1, 2, 4, 6);

    arr.update(11);
    assert!(arr.is_bank_free(0, 0), "untouched bank is bank-free");
    assert!(!arr.is_bank_free(0, 1), "target bank is busy");
}

// ══════════════════════════════════════════════════════════
// 2. Explicit bank latency (pump discharge)
// ══════════════════════════════════════════════════════════

#[test]
fn add_bank_latency_delays_one_bank_only() {
    let mut arr = Array::new_channel(0, &test_config());
    arr.update(5);
    arr.add_bank_latency(1, 2, 7);

    arr.update(11);
    assert!(!arr.is_bank_free(1, 2));
    assert!(arr.is_bank_free(1, 3));
    arr.update(12);
    assert!(arr.is_bank_free(1, 2));
}

// ══════════════════════════════════════════════════════════
// 3. Derived latencies
// ══════════════════════════════════════════════════════════

#[test]
fn latency_helpers_follow_the_cost_model() {
    let arr = Array::new_channel(0, &test_config());
    // tRCD 4, tData 2, tCL 3, tWL 1, tWR 5.
    assert_eq!(arr.single_read_latency(), 9);
    assert_eq!(arr.bank_delay_single_read(), 7);
    assert_eq!(arr.single_write_latency(), 12);
    assert_eq!(arr.read_with_read_latency(), 3 * 4 + 3 + 2 * 2);
    assert_eq!(arr.bank_delay_read_with_read(), 3 * 4 + 3);
    assert_eq!(arr.read_while_write_latency(), 4 + 12);
    assert_eq!(arr.data_transfer_latency(), 2);
}

#[test]
fn re_initialise_clears_all_windows() {
    let mut arr = Array::new_channel(0, &test_config());
    arr.update(10);
    arr.post_access(0, 1, 2, 4, 6);
    arr.re_initialise();
    arr.update(0);
    assert!(arr.is_free(0, 1));
    assert!(arr.is_free(1, 0));
}
