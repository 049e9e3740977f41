//! Pipeline progress reporting.
//!
//! Reports observable progress while a pipeline runs: state transitions,
//! retried stage calls, and job poll ticks. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;

use studyflow_core::error::Stage;
use studyflow_core::models::{JobStatus, SummaryId};

use crate::pipeline::PipelineState;
use crate::studio::Surface;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// A pipeline moved to a new state.
    Transition {
        surface: Surface,
        state: PipelineState,
    },
    /// A stage call failed transiently and will be retried.
    Retry {
        stage: Stage,
        attempt: u32,
        cause: String,
    },
    /// A job status check finished. `status` is `None` when the check failed.
    PollTick {
        target_id: SummaryId,
        attempt: u32,
        status: Option<JobStatus>,
    },
}

/// Receives progress events. Implementations must not block.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Human-friendly progress on stderr: "video  polling summary 42 (attempt 3): processing".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: &ProgressEvent) {
        let line = match event {
            ProgressEvent::Transition { surface, state } => {
                format!("{:<11} {}\n", surface.to_string(), state)
            }
            ProgressEvent::Retry {
                stage,
                attempt,
                cause,
            } => format!("{:<11} retrying after attempt {}: {}\n", stage.to_string(), attempt, cause),
            ProgressEvent::PollTick {
                target_id,
                attempt,
                status,
            } => {
                let status = status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unreachable".to_string());
                format!(
                    "{:<11} summary {} (check {}): {}\n",
                    "poll", target_id, attempt, status
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: &ProgressEvent) {
        let obj = match event {
            ProgressEvent::Transition { surface, state } => serde_json::json!({
                "event": "transition",
                "surface": surface.to_string(),
                "state": state.name(),
                "detail": state.to_string(),
            }),
            ProgressEvent::Retry {
                stage,
                attempt,
                cause,
            } => serde_json::json!({
                "event": "retry",
                "stage": stage.to_string(),
                "attempt": attempt,
                "cause": cause,
            }),
            ProgressEvent::PollTick {
                target_id,
                attempt,
                status,
            } => serde_json::json!({
                "event": "poll",
                "summary_id": target_id,
                "attempt": attempt,
                "status": status,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: &ProgressEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl std::str::FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!("unknown progress mode '{}' (expected off, human, or json)", other)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_modes() {
        assert_eq!("json".parse::<ProgressMode>().unwrap(), ProgressMode::Json);
        assert_eq!("off".parse::<ProgressMode>().unwrap(), ProgressMode::Off);
        assert!("loud".parse::<ProgressMode>().is_err());
    }
}
