//! Per-session registry of UI surfaces.
//!
//! Each surface (summary page, quiz page, flashcard page, video page) owns
//! exactly one [`GenerationPipeline`] with its own selection, created on
//! first use. Work started on one surface never cancels another surface's
//! poller. Closing the studio (logout) shuts every pipeline down.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use studyflow_core::models::ArtifactKind;

use crate::backend::Backend;
use crate::pipeline::{GenerationPipeline, PipelineSettings};
use crate::progress::ProgressReporter;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    Summary,
    Quiz,
    Flashcards,
    Video,
}

impl Surface {
    pub const ALL: [Surface; 4] = [
        Surface::Summary,
        Surface::Quiz,
        Surface::Flashcards,
        Surface::Video,
    ];

    /// The surface that generates artifacts of `kind`.
    pub fn for_kind(kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::Quiz => Surface::Quiz,
            ArtifactKind::Flashcards => Surface::Flashcards,
            ArtifactKind::Video => Surface::Video,
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Surface::Summary => "summary",
            Surface::Quiz => "quiz",
            Surface::Flashcards => "flashcards",
            Surface::Video => "video",
        })
    }
}

impl FromStr for Surface {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Surface::ALL
            .into_iter()
            .find(|surface| surface.to_string() == s)
            .ok_or_else(|| format!("unknown surface '{}'", s))
    }
}

pub struct Studio {
    session: Arc<Session>,
    backend: Arc<dyn Backend>,
    settings: PipelineSettings,
    reporter: Arc<dyn ProgressReporter>,
    pipelines: Mutex<HashMap<Surface, Arc<GenerationPipeline>>>,
}

impl Studio {
    pub fn new(
        session: Session,
        backend: Arc<dyn Backend>,
        settings: PipelineSettings,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        info!(session = %session.id, user = session.display_name(), "session started");
        Self {
            session: Arc::new(session),
            backend,
            settings,
            reporter,
            pipelines: Mutex::new(HashMap::new()),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// The pipeline of `surface`, created on first use.
    pub fn pipeline(&self, surface: Surface) -> Arc<GenerationPipeline> {
        let mut pipelines = self.pipelines.lock();
        let pipeline = pipelines.entry(surface).or_insert_with(|| {
            Arc::new(GenerationPipeline::new(
                surface,
                Arc::clone(&self.session),
                Arc::clone(&self.backend),
                &self.settings,
                Arc::clone(&self.reporter),
            ))
        });
        Arc::clone(pipeline)
    }

    /// End the session: cancel every poller and invalidate every pending
    /// continuation on every surface.
    pub fn close(&self) {
        let pipelines: Vec<_> = self.pipelines.lock().drain().map(|(_, p)| p).collect();
        for pipeline in &pipelines {
            pipeline.shutdown();
        }
        info!(session = %self.session.id, surfaces = pipelines.len(), "session closed");
    }
}

impl Drop for Studio {
    fn drop(&mut self) {
        if !self.pipelines.lock().is_empty() {
            self.close();
        }
    }
}
