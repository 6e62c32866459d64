//! Cycle-accurate hybrid memory-hierarchy simulator library.
//!
//! This crate models a multi-level cache stack backed by a
//! phase-change-memory (PCM) main memory, optionally paired with DRAM:
//! 1. **Caches:** Level-generic caches with MSHR coalescing, write-back
//!    buffers, fully- and set-associative LRU tag stores.
//! 2. **Memory:** The channel/rank/bank availability model, address
//!    decoding, and the FCFS, PLP, and LASER controller families.
//! 3. **Simulation:** Trace readers, trace-driven cores, the assembled
//!    hierarchy, and run statistics.
//!
//! The simulator evaluates memory-controller scheduling policies that
//! exploit partition-level parallelism (PALP) and charge-pump
//! management (LASER) under power and starvation constraints.

/// Cache stack building blocks.
pub mod cache;

/// Common types: requests, errors, scalar aliases.
pub mod common;

/// Simulator configuration and the configuration file parser.
pub mod config;

/// PCM main memory model.
pub mod pcm;

/// Simulation: traces, cores, hierarchy, and statistics.
pub mod sim;

/// Root configuration type; parse with `Config::from_file` or use
/// `Config::default()`.
pub use crate::config::Config;
/// Library error type.
pub use crate::common::SimError;
/// Top-level simulator; owns the cores and the hierarchy side-by-side.
pub use crate::sim::Simulator;
