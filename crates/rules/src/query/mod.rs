//! Query adapter: grouped counts over the log store.
//!
//! The evaluator only depends on the [`LogQuery`] trait, keeping this crate
//! free of any HTTP or store SDK. The storage crate implements it against the
//! search cluster; [`MemoryLogStore`] implements it over records held in memory.

mod memory;
mod types;

pub use memory::MemoryLogStore;
pub use types::*;
