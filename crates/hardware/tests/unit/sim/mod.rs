//! Simulation front-end unit tests.


/// Virtual-to-physical page mapping.
pub mod mapper;
