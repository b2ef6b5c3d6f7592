//! `pedigree-index` library crate.
//!
//! The binary (`pedigree`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - modules are reusable (e.g., embedding the engine in a larger farm tool)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod collate;
pub mod domain;
pub mod error;
pub mod fill;
pub mod io;
pub mod math;
pub mod rank;
pub mod reference;
pub mod report;
pub mod score;
pub mod trend;
