//! # Studyflow
//!
//! Client-side orchestrator that turns an uploaded study document into a
//! summary, and a summary into a quiz, flashcards, or a narrated video,
//! through an external document-processing backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────────────┐   ┌──────────────┐
//! │   CLI    │──▶│ Studio (per login) │──▶│   Backend    │
//! │studyflow │   │ one pipeline per   │   │ HTTP/scripted│
//! └──────────┘   │ surface            │   └──────▲───────┘
//!                └─────────┬──────────┘          │
//!                          ▼                     │
//!                ┌────────────────────┐          │
//!                │ GenerationPipeline │──────────┤
//!                │ StageRunner ×4     │          │
//!                │ JobPoller          │──────────┘
//!                └────────────────────┘
//! ```
//!
//! The pure pieces (identifier cell, write authority, selection
//! reconciliation, error taxonomy, domain models) live in `studyflow-core`.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`session`] | Logged-in user context |
//! | [`backend`] | Backend trait, HTTP and scripted implementations |
//! | [`stage`] | Single-stage execution with retry |
//! | [`poller`] | Bounded job-status polling |
//! | [`pipeline`] | The generation state machine |
//! | [`studio`] | Per-session registry of UI surfaces |
//! | [`progress`] | Progress reporting on stderr |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`commands`] | CLI command implementations |

pub mod backend;
pub mod commands;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod poller;
pub mod progress;
pub mod session;
pub mod stage;
pub mod studio;
