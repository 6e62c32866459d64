//! Simulation: traces, cores, the assembled hierarchy, and statistics.
//!
//! This module holds everything around the cache/controller core:
//! 1. **Traces:** Memory and CPU trace readers.
//! 2. **Mapper:** Per-core virtual-to-physical page randomization.
//! 3. **Cores:** The in-order retirement window driving the L1Ds.
//! 4. **Hierarchy:** The assembled stack and its routing.
//! 5. **Simulator:** The tick loop, drain, and run summary.
//! 6. **Stats:** The `key = value` registry.

/// The assembled memory hierarchy.
pub mod hierarchy;

/// Virtual-to-physical page mapping.
pub mod mapper;

/// Per-request analysis probe.
pub mod probe;

/// Trace-driven cores.
pub mod processor;

/// The top-level simulator.
pub mod simulator;

/// Run statistics registry.
pub mod stats;

/// Trace readers.
pub mod trace;

pub use hierarchy::{Hierarchy, MainMemory};
pub use mapper::Mapper;
pub use probe::RequestProbe;
pub use processor::{Core, Window};
pub use simulator::{RunSummary, Simulator};
pub use stats::Stats;
pub use trace::{Instruction, Operation, Trace, TraceKind};
