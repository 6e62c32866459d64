//! PCM array architecture.
//!
//! The array is a tree of availability windows: one channel node owning
//! rank nodes owning bank nodes. Each node carries the current tick and a
//! `next_free` tick; a (rank, bank) pair is free only when the bank, its
//! rank, and the channel have all passed their `next_free`. There is no
//! rank-level parallelism within a channel, so issuing a request blocks
//! every peer rank for the full request latency.
//!
//! The channel node also derives the per-operation latencies and per-bit
//! power figures the controllers share.

use crate::common::Tick;
use crate::config::Config;

/// Level of one node in the array tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayLevel {
    /// Top node, one per controller.
    Channel,
    /// Rank node, child of the channel.
    Rank,
    /// Bank node, leaf.
    Bank,
}

/// Geometry, timing, and energy parameters carried by every node.
#[derive(Debug, Clone, Copy)]
pub struct ArrayInfo {
    /// Cache line size in bytes.
    pub block_size: u64,
    /// Partitions per bank.
    pub num_of_parts_per_bank: u64,
    /// Word lines per partition.
    pub num_of_word_lines_per_part: u64,
    /// Byte lines per bank.
    pub num_of_byte_lines_per_bank: u64,
    /// Banks per rank.
    pub num_of_banks: u64,
    /// Ranks per channel.
    pub num_of_ranks: u64,
    /// Channels in the memory system.
    pub num_of_channels: u64,
    /// Activation latency.
    pub t_rcd: Tick,
    /// Data burst latency.
    pub t_data: Tick,
    /// Write-level latency.
    pub t_wl: Tick,
    /// Write-recovery latency.
    pub t_wr: Tick,
    /// Read column latency.
    pub t_cl: Tick,
    /// Per-bit read time in nanoseconds.
    pub ns_bit_rd: f64,
    /// Per-bit SET time in nanoseconds.
    pub ns_bit_set: f64,
    /// Per-bit RESET time in nanoseconds.
    pub ns_bit_reset: f64,
    /// Per-bit read energy in picojoules.
    pub pj_bit_rd: f64,
    /// Per-bit SET energy in picojoules.
    pub pj_bit_set: f64,
    /// Per-bit RESET energy in picojoules.
    pub pj_bit_reset: f64,
}

impl ArrayInfo {
    fn from_config(cfg: &Config) -> Self {
        Self {
            block_size: cfg.block_size,
            num_of_parts_per_bank: cfg.num_of_parts,
            num_of_word_lines_per_part: cfg.num_of_word_lines_per_tile,
            num_of_byte_lines_per_bank: cfg.num_of_bit_lines_per_tile / 8 * cfg.num_of_tiles,
            num_of_banks: cfg.num_of_banks,
            num_of_ranks: cfg.num_of_ranks,
            num_of_channels: cfg.num_of_channels,
            t_rcd: cfg.t_rcd,
            t_data: cfg.t_data,
            t_wl: cfg.t_wl,
            t_wr: cfg.t_wr,
            t_cl: cfg.t_cl,
            ns_bit_rd: cfg.ns_bit_rd,
            ns_bit_set: cfg.ns_bit_set,
            ns_bit_reset: cfg.ns_bit_reset,
            pj_bit_rd: cfg.pj_bit_rd,
            pj_bit_set: cfg.pj_bit_set,
            pj_bit_reset: cfg.pj_bit_reset,
        }
    }
}

/// One node of the availability tree. Controllers hold the channel node.
#[derive(Debug, Clone)]
pub struct Array {
    /// Level of this node.
    pub level: ArrayLevel,
    /// Index among its siblings.
    pub id: usize,
    /// Shared geometry and timing parameters.
    pub info: ArrayInfo,
    cur_clk: Tick,
    next_free: Tick,
    children: Vec<Array>,
}

impl Array {
    /// Builds the channel node for channel `id`, with its rank and bank
    /// children.
    pub fn new_channel(id: usize, cfg: &Config) -> Self {
        let info = ArrayInfo::from_config(cfg);
        let children = (0..info.num_of_ranks as usize)
            .map(|rank_id| {
                let banks = (0..info.num_of_banks as usize)
                    .map(|bank_id| Array::leaf(ArrayLevel::Bank, bank_id, info))
                    .collect();
                Array {
                    level: ArrayLevel::Rank,
                    id: rank_id,
                    info,
                    cur_clk: 0,
                    next_free: 0,
                    children: banks,
                }
            })
            .collect();

        Array {
            level: ArrayLevel::Channel,
            id,
            info,
            cur_clk: 0,
            next_free: 0,
            children,
        }
    }

    fn leaf(level: ArrayLevel, id: usize, info: ArrayInfo) -> Self {
        Array {
            level,
            id,
            info,
            cur_clk: 0,
            next_free: 0,
            children: Vec::new(),
        }
    }

    /// Propagates the current tick down the tree. `cur_clk` only moves
    /// forward.
    pub fn update(&mut self, clk: Tick) {
        debug_assert!(clk >= self.cur_clk);
        self.cur_clk = clk;
        for child in &mut self.children {
            child.update(clk);
        }
    }

    /// Whether (rank, bank) can accept a request now. The bank, its rank,
    /// and the channel must all be past their `next_free`.
    pub fn is_free(&self, rank: usize, bank: usize) -> bool {
        self.children[rank].children[bank].next_free <= self.cur_clk
            && self.children[rank].next_free <= self.cur_clk
            && self.next_free <= self.cur_clk
    }

    /// Whether the bank itself is idle, ignoring rank and channel state.
    /// The LASER pump tables use this to tell working from idle ticks.
    pub fn is_bank_free(&self, rank: usize, bank: usize) -> bool {
        self.children[rank].children[bank].next_free <= self.cur_clk
    }

    /// Records an issued access: the channel is busy for `channel_latency`,
    /// the targeted bank for `bank_latency`, and every other rank for
    /// `rank_latency` (no rank-level parallelism within a channel).
    pub fn post_access(
        &mut self,
        rank: usize,
        bank: usize,
        channel_latency: Tick,
        rank_latency: Tick,
        bank_latency: Tick,
    ) {
        self.next_free = self.cur_clk + channel_latency;
        self.children[rank].children[bank].next_free = self.cur_clk + bank_latency;

        for (i, peer) in self.children.iter_mut().enumerate() {
            if i != rank {
                peer.next_free = self.cur_clk + rank_latency;
            }
        }
    }

    /// Imposes extra latency on one bank, for charge-pump discharge.
    pub fn add_bank_latency(&mut self, rank: usize, bank: usize, latency: Tick) {
        self.children[rank].children[bank].next_free = self.cur_clk + latency;
    }

    /// Restores the freshly constructed state.
    pub fn re_initialise(&mut self) {
        self.cur_clk = 0;
        self.next_free = 0;
        for child in &mut self.children {
            child.re_initialise();
        }
    }

    // Latency and power figures shared by the controller family. The
    // read/write breakdowns follow the partition-level-parallelism cost
    // model.

    /// Full latency of a lone read.
    pub fn single_read_latency(&self) -> Tick {
        self.info.t_rcd + self.info.t_data + self.info.t_cl
    }

    /// Bank-busy time caused by a lone read.
    pub fn bank_delay_single_read(&self) -> Tick {
        self.info.t_rcd + self.info.t_cl
    }

    /// Full latency of a lone write. The bank is busy for all of it.
    pub fn single_write_latency(&self) -> Tick {
        self.info.t_rcd + self.info.t_data + self.info.t_wl + self.info.t_wr
    }

    /// Data bus occupancy of any access.
    pub fn data_transfer_latency(&self) -> Tick {
        self.info.t_data
    }

    /// Latency of two reads paired across partitions of one bank.
    pub fn read_with_read_latency(&self) -> Tick {
        3 * self.info.t_rcd + self.info.t_cl + 2 * self.info.t_data
    }

    /// Bank-busy time of a read/read pair.
    pub fn bank_delay_read_with_read(&self) -> Tick {
        3 * self.info.t_rcd + self.info.t_cl
    }

    /// Latency of a read serviced in the shadow of a write on another
    /// partition. The bank is busy for all of it.
    pub fn read_while_write_latency(&self) -> Tick {
        self.info.t_rcd + self.single_write_latency()
    }

    /// Energy per bit per working tick of a read.
    pub fn power_per_bit_read(&self) -> f64 {
        self.info.pj_bit_rd / self.info.t_cl as f64
    }

    /// Energy per bit per working tick of a write. SET and RESET are
    /// equally likely over a full cache line.
    pub fn power_per_bit_write(&self) -> f64 {
        (self.info.pj_bit_set + self.info.pj_bit_reset) / 2.0 / (self.info.t_wl + self.info.t_wr) as f64
    }

    /// Working ticks of a read, the portion that draws read power.
    pub fn single_read_work(&self) -> Tick {
        self.info.t_cl
    }

    /// Working ticks of a write, the portion that draws write power.
    pub fn single_write_work(&self) -> Tick {
        self.info.t_wl + self.info.t_wr
    }
}
