//! crlfetch - certificate revocation list archive publisher
//!
//! This library downloads a remote archive of CRL files, extracts it into a
//! publishing directory and reports the outcome of the run to a local event
//! log and/or by email.
//!
//! A run is a strictly linear pipeline:
//!
//! ```text
//! prepare ──► fetch ──► extract ──► report
//!    │          │          │           ▲
//!    └──────────┴──────────┴─ StageReport ┘  (folded into StatusRecord)
//! ```
//!
//! Fetch and extraction failures never abort the run; every run reaches the
//! reporter and yields a [`pipeline::RunOutcome`] with a process exit code.

pub mod config;
pub mod extract;
pub mod fetch;
pub mod logging;
pub mod pipeline;
pub mod prepare;
pub mod report;
pub mod status;

pub use config::{ConfigError, ConfigFile, RunConfig};
pub use pipeline::{Pipeline, RunOutcome};
pub use status::{PathStatus, Stage, StageError, StageOutcome, StageReport, StatusRecord};
