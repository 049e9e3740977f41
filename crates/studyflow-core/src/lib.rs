//! # Studyflow Core
//!
//! Network-free building blocks for the Studyflow generation orchestrator:
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Documents, summaries, jobs, artifact payloads |
//! | [`cell`] | [`IdentifierCell`](cell::IdentifierCell) and the write-authority clock |
//! | [`selection`] | Selection state and list reconciliation |
//! | [`error`] | Stage and pipeline error taxonomy |
//!
//! The `studyflow` crate layers the HTTP backend, stage runner, job poller,
//! and pipeline state machine on top of these types.

pub mod cell;
pub mod error;
pub mod models;
pub mod selection;

pub use cell::{Authority, AuthorityClock, IdentifierCell};
pub use error::{ErrorCategory, PipelineError, Stage, StageError, StageErrorKind};
pub use selection::{
    FillPolicy, SelectionSource, SelectionState, SelectionSynchronizer, SummaryListing,
};
