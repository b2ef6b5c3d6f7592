//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input records (`AnimalRecord`) and their ancestor-role accessors
//! - provenance enums (`Provenance`, `ScoreSource`, `IdScheme`)
//! - derived values (`TraitValue`, `TraitScore`, `RankedResult`)
//! - run configuration (`RunConfig`, `AnchorValues`, `WeightProfile`)

pub mod progress;
pub mod types;

pub use progress::*;
pub use types::*;
