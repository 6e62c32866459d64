//! Configuration system for the memory-hierarchy simulator.
//!
//! This module defines the configuration structures and the line-oriented
//! configuration file parser. It provides:
//! 1. **Defaults:** Baseline hardware constants (cache geometry, PCM array
//!    geometry, timings, energies, scheduler bounds).
//! 2. **Structures:** The root [`Config`], per-level [`CacheInfo`], and the
//!    [`ControllerKind`] selector.
//! 3. **Parsing:** `Config::from_file` reads `key value` / `key = value`
//!    lines, ignores `#` comments and unrecognized keys, and fails on any
//!    non-empty non-comment line that does not split into exactly two
//!    tokens.
//!
//! When two configuration files are supplied on the command line the first
//! describes the DRAM partner and the second the PCM main memory.

use std::fs;

use serde::Serialize;

use crate::common::SimError;
use crate::pcm::decoder::NUM_FIELDS;

/// Default configuration constants.
///
/// These values describe the baseline system simulated when a key is not
/// present in the configuration file.
mod defaults {
    /// On-chip clock frequency in GHz.
    pub const ON_CHIP_FREQUENCY: f64 = 4.0;

    /// Off-chip (memory controller) clock frequency in GHz. The ratio to
    /// the on-chip frequency drives how often the last-level cache ticks
    /// the memory system.
    pub const OFF_CHIP_FREQUENCY: f64 = 2.0;

    /// Cache line size in bytes. Power of two.
    pub const BLOCK_SIZE: u64 = 64;

    /// Word lines per tile (rows of one partition).
    pub const NUM_OF_WORD_LINES_PER_TILE: u64 = 4096;

    /// Bit lines per tile.
    pub const NUM_OF_BIT_LINES_PER_TILE: u64 = 4096;

    /// Tiles per partition.
    pub const NUM_OF_TILES: u64 = 64;

    /// Partitions per bank. Two partitions of one bank can be activated
    /// in parallel by the PLP schedulers.
    pub const NUM_OF_PARTS: u64 = 8;

    /// Banks per rank.
    pub const NUM_OF_BANKS: u64 = 8;

    /// Ranks per channel.
    pub const NUM_OF_RANKS: u64 = 2;

    /// Independent channels, each owning one controller.
    pub const NUM_OF_CHANNELS: u64 = 2;

    /// Activation latency in controller ticks.
    pub const T_RCD: u64 = 48;

    /// Data burst latency in controller ticks.
    pub const T_DATA: u64 = 16;

    /// Write-level latency in controller ticks.
    pub const T_WL: u64 = 8;

    /// Write-recovery latency in controller ticks.
    pub const T_WR: u64 = 96;

    /// Read (column) latency in controller ticks.
    pub const T_CL: u64 = 24;

    /// Per-bit read service time in nanoseconds.
    pub const NS_BIT_RD: f64 = 60.0;

    /// Per-bit SET service time in nanoseconds.
    pub const NS_BIT_SET: f64 = 150.0;

    /// Per-bit RESET service time in nanoseconds.
    pub const NS_BIT_RESET: f64 = 100.0;

    /// Per-bit read energy in picojoules.
    pub const PJ_BIT_RD: f64 = 2.47;

    /// Per-bit SET energy in picojoules.
    pub const PJ_BIT_SET: f64 = 13.5;

    /// Per-bit RESET energy in picojoules.
    pub const PJ_BIT_RESET: f64 = 19.2;

    /// Running average power limit for the PLP schedulers.
    pub const RAPL: f64 = 0.5;

    /// Back-logging threshold. The most negative OrderID tolerated
    /// before a request is issued unconditionally.
    pub const THB: i32 = -8;

    /// Write-queue high watermark fraction. Above it the LASER
    /// controllers enter write-drain mode.
    pub const WR_HIGH_WATERMARK: f64 = 0.8;

    /// Write-queue low watermark fraction. Below it (with reads waiting)
    /// the LASER controllers leave write-drain mode.
    pub const WR_LOW_WATERMARK: f64 = 0.2;
}

/// Memory-controller scheduler selected by `mem_controller_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ControllerKind {
    /// First-come-first-served over one shared queue.
    #[default]
    Fcfs,
    /// First-ready FCFS: the oldest request whose bank is free issues.
    FrFcfs,
    /// PLP family, strictly FCFS (no pairing).
    PlpBase,
    /// PLP family, pairing reads with reads and reads with writes.
    Palp,
    /// PLP family, reduced: read/write pairing only.
    PalpR,
    /// Charge-pump-aware, statically managed pumps.
    CpStatic,
    /// LASER with both pumps charged and discharged together.
    Laser1,
    /// LASER with independently managed read and write pumps.
    Laser2,
    /// Hybrid DRAM plus PCM system; requires two configuration files.
    Hybrid,
}

impl ControllerKind {
    /// Parses the `mem_controller_type` configuration token.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "FCFS" => Some(Self::Fcfs),
            "FR-FCFS" => Some(Self::FrFcfs),
            "Base" => Some(Self::PlpBase),
            "PALP" => Some(Self::Palp),
            "PALP-R" => Some(Self::PalpR),
            "CP_Static" => Some(Self::CpStatic),
            "LASER_1" => Some(Self::Laser1),
            "LASER_2" => Some(Self::Laser2),
            "Hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

/// Cache levels recognized by the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(usize)]
pub enum CacheLevel {
    /// L1 instruction cache.
    L1I,
    /// L1 data cache.
    L1D,
    /// Shared second-level cache.
    L2,
    /// Shared third-level cache.
    L3,
    /// eDRAM last-level cache in front of the PCM.
    Edram,
}

/// Number of configurable cache levels.
pub const NUM_CACHE_LEVELS: usize = 5;

impl CacheLevel {
    /// All levels, in hierarchy order.
    pub const ALL: [Self; NUM_CACHE_LEVELS] =
        [Self::L1I, Self::L1D, Self::L2, Self::L3, Self::Edram];

    /// Display name used in stats output.
    pub fn name(self) -> &'static str {
        match self {
            Self::L1I => "L1-I",
            Self::L1D => "L1-D",
            Self::L2 => "L2",
            Self::L3 => "L3",
            Self::Edram => "eDRAM",
        }
    }

    /// Configuration key prefix for this level.
    fn key_prefix(self) -> &'static str {
        match self {
            Self::L1I => "L1I",
            Self::L1D => "L1D",
            Self::L2 => "L2",
            Self::L3 => "L3",
            Self::Edram => "eDRAM",
        }
    }
}

/// Geometry of one cache level.
///
/// A `size_kb` of zero disables the level. An `assoc` of zero selects the
/// fully-associative tag store.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheInfo {
    /// Associativity; zero means fully associative.
    pub assoc: usize,
    /// Capacity in KiB; zero disables the level.
    pub size_kb: u64,
    /// The level only caches writes; reads bypass to the next level.
    pub write_only: bool,
    /// Miss-status-holding registers (outstanding misses).
    pub num_mshrs: usize,
    /// Write-back buffer entries.
    pub num_wb_entries: usize,
    /// Ticks from acceptance to hit completion or MSHR firing.
    pub tag_lookup_latency: u64,
}

impl Default for CacheInfo {
    fn default() -> Self {
        Self {
            assoc: 8,
            size_kb: 32,
            write_only: false,
            num_mshrs: 16,
            num_wb_entries: 16,
            tag_lookup_latency: 4,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// On-chip clock frequency in GHz.
    pub on_chip_frequency: f64,
    /// Off-chip clock frequency in GHz.
    pub off_chip_frequency: f64,
    /// Cache line size in bytes.
    pub block_size: u64,
    /// Per-level cache geometry, indexed by [`CacheLevel`].
    pub caches: [CacheInfo; NUM_CACHE_LEVELS],
    /// MMU flavour. Informational; the mapper does not vary by it.
    pub mmu_type: String,
    /// Memory-controller scheduler.
    pub mem_controller_type: ControllerKind,
    /// Word lines (rows) per tile.
    pub num_of_word_lines_per_tile: u64,
    /// Bit lines per tile.
    pub num_of_bit_lines_per_tile: u64,
    /// Tiles per partition.
    pub num_of_tiles: u64,
    /// Partitions per bank.
    pub num_of_parts: u64,
    /// Banks per rank.
    pub num_of_banks: u64,
    /// Ranks per channel.
    pub num_of_ranks: u64,
    /// Channels in the memory system.
    pub num_of_channels: u64,
    /// Activation latency in ticks.
    pub t_rcd: u64,
    /// Data burst latency in ticks.
    pub t_data: u64,
    /// Write-level latency in ticks.
    pub t_wl: u64,
    /// Write-recovery latency in ticks.
    pub t_wr: u64,
    /// Read column latency in ticks.
    pub t_cl: u64,
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
    /// Running average power limit.
    pub rapl: f64,
    /// Back-logging threshold (negative).
    pub thb: i32,
    /// Enforce the RAPL bound when pairing.
    pub power_limit_enabled: bool,
    /// Enforce the back-logging threshold.
    pub starv_free_enabled: bool,
    /// Write-drain entry watermark fraction.
    pub wr_high_watermark: f64,
    /// Write-drain exit watermark fraction.
    pub wr_low_watermark: f64,
}

impl Default for Config {
    fn default() -> Self {
        let mut caches = [CacheInfo::default(); NUM_CACHE_LEVELS];
        caches[CacheLevel::L1I as usize].size_kb = 0;
        caches[CacheLevel::L2 as usize] = CacheInfo {
            assoc: 16,
            size_kb: 256,
            write_only: false,
            num_mshrs: 32,
            num_wb_entries: 32,
            tag_lookup_latency: 10,
        };
        caches[CacheLevel::L3 as usize].size_kb = 0;
        caches[CacheLevel::Edram as usize] = CacheInfo {
            assoc: 0,
            size_kb: 4096,
            write_only: true,
            num_mshrs: 32,
            num_wb_entries: 64,
            tag_lookup_latency: 12,
        };

        Self {
            on_chip_frequency: defaults::ON_CHIP_FREQUENCY,
            off_chip_frequency: defaults::OFF_CHIP_FREQUENCY,
            block_size: defaults::BLOCK_SIZE,
            caches,
            mmu_type: String::from("N/A"),
            mem_controller_type: ControllerKind::default(),
            num_of_word_lines_per_tile: defaults::NUM_OF_WORD_LINES_PER_TILE,
            num_of_bit_lines_per_tile: defaults::NUM_OF_BIT_LINES_PER_TILE,
            num_of_tiles: defaults::NUM_OF_TILES,
            num_of_parts: defaults::NUM_OF_PARTS,
            num_of_banks: defaults::NUM_OF_BANKS,
            num_of_ranks: defaults::NUM_OF_RANKS,
            num_of_channels: defaults::NUM_OF_CHANNELS,
            t_rcd: defaults::T_RCD,
            t_data: defaults::T_DATA,
            t_wl: defaults::T_WL,
            t_wr: defaults::T_WR,
            t_cl: defaults::T_CL,
            ns_bit_rd: defaults::NS_BIT_RD,
            ns_bit_set: defaults::NS_BIT_SET,
            ns_bit_reset: defaults::NS_BIT_RESET,
            pj_bit_rd: defaults::PJ_BIT_RD,
            pj_bit_set: defaults::PJ_BIT_SET,
            pj_bit_reset: defaults::PJ_BIT_RESET,
            rapl: defaults::RAPL,
            thb: defaults::THB,
            power_limit_enabled: false,
            starv_free_enabled: false,
            wr_high_watermark: defaults::WR_HIGH_WATERMARK,
            wr_low_watermark: defaults::WR_LOW_WATERMARK,
        }
    }
}

impl Config {
    /// Reads a configuration file.
    ///
    /// Lines are split on whitespace and `=`. Empty lines and lines whose
    /// first token starts with `#` are skipped. Every other line must
    /// split into exactly two tokens; unrecognized keys are ignored so
    /// configuration files can carry keys for other tools.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ConfigParse`] for malformed lines or values,
    /// and [`SimError::Io`] when the file cannot be read.
    pub fn from_file(path: &str) -> Result<Self, SimError> {
        let text = fs::read_to_string(path)?;
        let mut cfg = Self::default();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let tokens: Vec<&str> = raw
                .split(|c: char| c.is_whitespace() || c == '=')
                .filter(|t| !t.is_empty())
                .collect();

            if tokens.is_empty() || tokens[0].starts_with('#') {
                continue;
            }
            if tokens.len() != 2 {
                return Err(SimError::config(
                    path,
                    line_no,
                    format!("expected two tokens, found {}", tokens.len()),
                ));
            }

            cfg.apply(path, line_no, tokens[0], tokens[1])?;
        }

        cfg.validate(path)?;
        Ok(cfg)
    }

    /// Applies one `key value` pair.
    fn apply(&mut self, path: &str, line: usize, key: &str, value: &str) -> Result<(), SimError> {
        for level in CacheLevel::ALL {
            if key.starts_with(level.key_prefix()) {
                return self.apply_cache(path, line, level, key, value);
            }
        }

        match key {
            "on_chip_frequency" => self.on_chip_frequency = parse(path, line, value)?,
            "off_chip_frequency" => self.off_chip_frequency = parse(path, line, value)?,
            "block_size" => self.block_size = parse(path, line, value)?,
            "mmu_type" => self.mmu_type = value.to_string(),
            "mem_controller_type" => {
                self.mem_controller_type = ControllerKind::parse(value).ok_or_else(|| {
                    SimError::config(path, line, format!("unknown controller type `{value}`"))
                })?;
            }
            "num_of_word_lines_per_tile" => {
                self.num_of_word_lines_per_tile = parse(path, line, value)?;
            }
            "num_of_bit_lines_per_tile" => {
                self.num_of_bit_lines_per_tile = parse(path, line, value)?;
            }
            "num_of_tiles" => self.num_of_tiles = parse(path, line, value)?,
            "num_of_parts" => self.num_of_parts = parse(path, line, value)?,
            "num_of_banks" => self.num_of_banks = parse(path, line, value)?,
            "num_of_ranks" => self.num_of_ranks = parse(path, line, value)?,
            "num_of_channels" => self.num_of_channels = parse(path, line, value)?,
            "tRCD" => self.t_rcd = parse(path, line, value)?,
            "tData" => self.t_data = parse(path, line, value)?,
            "tWL" => self.t_wl = parse(path, line, value)?,
            "tWR" => self.t_wr = parse(path, line, value)?,
            "tCL" => self.t_cl = parse(path, line, value)?,
            "ns_bit_rd" => self.ns_bit_rd = parse(path, line, value)?,
            "ns_bit_set" => self.ns_bit_set = parse(path, line, value)?,
            "ns_bit_reset" => self.ns_bit_reset = parse(path, line, value)?,
            "pj_bit_rd" => self.pj_bit_rd = parse(path, line, value)?,
            "pj_bit_set" => self.pj_bit_set = parse(path, line, value)?,
            "pj_bit_reset" => self.pj_bit_reset = parse(path, line, value)?,
            "RAPL" => self.rapl = parse(path, line, value)?,
            "THB" => self.thb = parse(path, line, value)?,
            "power_limit_enabled" => self.power_limit_enabled = parse_bool(value),
            "starv_free_enabled" => self.starv_free_enabled = parse_bool(value),
            "wr_high_watermark" => self.wr_high_watermark = parse(path, line, value)?,
            "wr_low_watermark" => self.wr_low_watermark = parse(path, line, value)?,
            _ => {} // Unrecognized keys are ignored.
        }
        Ok(())
    }

    /// Applies one cache-level key such as `L1D_assoc` or `eDRAM_size`.
    fn apply_cache(
        &mut self,
        path: &str,
        line: usize,
        level: CacheLevel,
        key: &str,
        value: &str,
    ) -> Result<(), SimError> {
        let info = &mut self.caches[level as usize];
        // Keep `write_only` ahead of `size`: suffix matching mirrors the
        // substring key scheme of the original configuration files.
        if key.contains("assoc") {
            info.assoc = parse(path, line, value)?;
        } else if key.contains("write_only") {
            info.write_only = parse_bool(value);
        } else if key.contains("num_mshrs") {
            info.num_mshrs = parse(path, line, value)?;
        } else if key.contains("num_wb_entries") {
            info.num_wb_entries = parse(path, line, value)?;
        } else if key.contains("tag_lookup_latency") {
            info.tag_lookup_latency = parse(path, line, value)?;
        } else if key.contains("size") {
            info.size_kb = parse(path, line, value)?;
        }
        Ok(())
    }

    /// Checks the array geometry invariants the decoder relies on.
    fn validate(&self, path: &str) -> Result<(), SimError> {
        let pow2 = [
            ("block_size", self.block_size),
            ("num_of_word_lines_per_tile", self.num_of_word_lines_per_tile),
            ("num_of_bit_lines_per_tile", self.num_of_bit_lines_per_tile),
            ("num_of_tiles", self.num_of_tiles),
            ("num_of_parts", self.num_of_parts),
            ("num_of_banks", self.num_of_banks),
            ("num_of_ranks", self.num_of_ranks),
            ("num_of_channels", self.num_of_channels),
        ];
        for (name, v) in pow2 {
            if v == 0 || !v.is_power_of_two() {
                return Err(SimError::config(
                    path,
                    0,
                    format!("{name} must be a non-zero power of two, got {v}"),
                ));
            }
        }
        if self.num_of_bit_lines_per_tile / 8 < self.block_size {
            return Err(SimError::config(
                path,
                0,
                "a tile row is narrower than one cache line",
            ));
        }
        Ok(())
    }

    /// One cache level's geometry.
    pub fn cache(&self, level: CacheLevel) -> &CacheInfo {
        &self.caches[level as usize]
    }

    /// Field widths for the address decoder, ordered
    /// `[Rank, Partition, Tile, Row, Col, Bank, Channel, CacheLine]`.
    pub fn decoding_widths(&self) -> [u32; NUM_FIELDS] {
        [
            log2(self.num_of_ranks),
            log2(self.num_of_parts),
            log2(self.num_of_tiles),
            log2(self.num_of_word_lines_per_tile),
            log2(self.num_of_bit_lines_per_tile / 8 / self.block_size),
            log2(self.num_of_banks),
            log2(self.num_of_channels),
            log2(self.block_size),
        ]
    }

    /// Ticks between LLC ticks of the off-chip memory system.
    pub fn nclks_per_mem_tick(&self) -> u64 {
        let ratio = self.on_chip_frequency / self.off_chip_frequency;
        if ratio < 1.0 { 1 } else { ratio as u64 }
    }

    /// Total main-memory capacity in GiB.
    pub fn size_in_gb(&self) -> u64 {
        let word_lines_per_bank = self.num_of_word_lines_per_tile * self.num_of_parts;
        let byte_lines_per_bank = self.num_of_bit_lines_per_tile / 8 * self.num_of_tiles;
        word_lines_per_bank * byte_lines_per_bank * self.num_of_banks * self.num_of_ranks
            * self.num_of_channels
            / 1024
            / 1024
            / 1024
    }
}

/// Exact log2 of a power of two.
fn log2(v: u64) -> u32 {
    debug_assert!(v.is_power_of_two());
    v.trailing_zeros()
}

/// Parses a numeric token, reporting the offending line on failure.
fn parse<T: std::str::FromStr>(path: &str, line: usize, value: &str) -> Result<T, SimError> {
    value
        .parse()
        .map_err(|_| SimError::config(path, line, format!("bad value `{value}`")))
}

/// The original accepts anything but the literal `false` as true.
fn parse_bool(value: &str) -> bool {
    value != "false"
}
