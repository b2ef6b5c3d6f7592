//! Input/output helpers.
//!
//! - animal / genomic CSV ingest + validation (`ingest`)
//! - scored-output export with locked-destination retries (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
