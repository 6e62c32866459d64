//! PCM main memory model.
//!
//! This module implements the off-chip side of the simulator:
//! 1. **Array:** The channel/rank/bank availability tree and derived
//!    timing/power figures.
//! 2. **Decoder:** The bijective address-to-coordinates map.
//! 3. **Controllers:** The FCFS, PLP, and LASER scheduler families.
//! 4. **Memory system:** Channel fan-out, and the hybrid DRAM+PCM
//!    arrangement.

/// Channel/rank/bank availability tree.
pub mod array;

/// Channel controllers.
pub mod controller;

/// Address decoding.
pub mod decoder;

/// Hybrid DRAM plus PCM memory.
pub mod hybrid;

/// Channel fan-out.
pub mod memory_system;

pub use array::{Array, ArrayInfo, ArrayLevel};
pub use controller::{ChannelController, QUEUE_CAPACITY};
pub use decoder::{AddrDecoder, DecodedAddr, Field};
pub use hybrid::HybridMemory;
pub use memory_system::MemorySystem;
