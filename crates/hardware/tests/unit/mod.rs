//! Unit tests, one module per component family.

/// Cache stack: deferred queues, tag stores, the cache engine.
pub mod cache;


/// PCM side: decoder, array, and the controller families.
pub mod pcm;

/// Simulation front: traces, mapper, cores, end-to-end runs.
pub mod sim;
