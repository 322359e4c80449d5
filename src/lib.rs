//! gfakt -- two-stage GPU/CPU pipeline driver for GMP-ECM.
//!
//! Stage 1 runs ECM stage 1 on every input number across a fixed set of GPU
//! devices. Each resulting save file is split into shards that stage 2
//! resumes on a bounded pool of CPU slots. Once any shard proves the
//! remaining cofactor is a probable prime, the sibling shards for that
//! number are killed.
//!
//! ```text
//!  numbers ──► Stage1Queue ──► Stage1Pool (1 worker / device)
//!                                   │ split save file
//!                                   ▼
//!               Stage2Queue ──► Stage2Pool (≤ N processes) ──► reports
//! ```

pub mod config;
pub mod ecm;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod split;
pub mod work;

pub use config::GfaktConfig;
pub use error::PipelineError;
pub use pipeline::{Pipeline, PipelineReport, PipelineSettings};

/// Program name used in the startup banner.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Crate version used in the startup banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

