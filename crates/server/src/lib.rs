//! Wiring for the `logwatch` binary: CLI, startup, the detection cycle, and
//! shutdown handling.

pub mod cli;
pub mod commands;
pub mod cycle;
pub mod shutdown;
pub mod startup;

pub use cycle::DetectionCycle;
