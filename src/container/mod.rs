//! Dependency Container (§4.8): assembles the cross-worker singletons
//! (broadcaster, cache, tracker, queues, repository, storage, config) into one
//! `WorkerDeps` bundle, plus one fresh, fully-registered `ActionFactory` per
//! payload type on demand. Mirrors the teacher's `AppState::initialize`
//! (`state.rs`): build the singletons in order, wrap once, return.
//!
//! `ActionFactory` is intentionally not `Clone` (§4.2) — a worker owns its
//! factory outright — so rather than sharing one instance, the container
//! exposes a builder method per queue that a caller invokes once per worker
//! instance it spawns (§4.4's "horizontally scalable by adding instances").

use std::sync::Arc;

use tokio::sync::watch;

use crate::action::registry::ActionConstructor;
use crate::action::{Action, ActionFactory, WorkerDeps};
use crate::actions::check_duplicates::CheckDuplicates;
use crate::actions::clean_html::CleanHtml;
use crate::actions::format_instruction_line::FormatInstructionLine;
use crate::actions::mark_note_worker_completed::MarkNoteWorkerCompleted;
use crate::actions::parse_html::ParseHtml;
use crate::actions::parse_ingredient_line::ParseIngredientLine;
use crate::actions::process_image::ProcessImage;
use crate::actions::process_source::ProcessSource;
use crate::actions::save_instruction_line::SaveInstructionLine;
use crate::actions::save_note::SaveNote;
use crate::actions::track_pattern::TrackPattern;
use crate::actions::wait_for_categorization::WaitForCategorization;
use crate::broadcaster::StatusBroadcaster;
use crate::cache::ActionCache;
use crate::completion_check::CheckCompletion;
use crate::core::config::ConfigService;
use crate::core::errors::PipelineError;
use crate::queue::QueueHandles;
use crate::repository::{InMemoryRepository, Repository};
use crate::scheduler::ScheduleAllFollowupTasks;
use crate::storage::{InMemoryObjectStorage, ObjectStorage};
use crate::tracker::CompletionTracker;
use crate::types::{CompletionCheckJobData, ImageJobData, LineJobData, NotePipelineData, PatternTrackingJobData, SourceJobData};

pub struct DependencyContainer {
    pub deps: Arc<WorkerDeps>,
    shutdown_tx: watch::Sender<bool>,
}

impl DependencyContainer {
    /// Assembles against in-memory fakes for the Repository and ObjectStorage
    /// collaborators (§1 keeps a real database/bucket out of the core's scope)
    /// and whatever config `ConfigService` resolves (env/YAML override, else
    /// compiled defaults).
    pub fn assemble() -> Result<Self, PipelineError> {
        Self::assemble_with(Arc::new(InMemoryRepository::new()), Arc::new(InMemoryObjectStorage::new()))
    }

    pub fn assemble_with(repository: Arc<dyn Repository>, storage: Arc<dyn ObjectStorage>) -> Result<Self, PipelineError> {
        let config = ConfigService::new().load_config()?;
        let broadcaster = Arc::new(StatusBroadcaster::new());
        let tracker = Arc::new(CompletionTracker::new(broadcaster.clone()));
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);

        let deps = Arc::new(WorkerDeps {
            broadcaster,
            cache: Arc::new(ActionCache::new()),
            tracker,
            repository,
            storage,
            queues: QueueHandles::in_memory(),
            config: Arc::new(config),
        });

        Ok(Self { deps, shutdown_tx })
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Flips the shared cooperative-shutdown signal every worker polls between
    /// actions (§5). In-flight actions are allowed to finish; there is no other
    /// teardown to run since every collaborator here is in-memory.
    pub async fn close(&self) {
        tracing::info!("dependency container shutting down, signalling workers");
        let _ = self.shutdown_tx.send(true);
    }

    pub fn note_action_factory(&self) -> Result<ActionFactory<NotePipelineData>, PipelineError> {
        let mut factory = ActionFactory::new();
        factory.register_actions(vec![
            ("clean_html", ctor(|| CleanHtml)),
            ("parse_html", ctor(|| ParseHtml)),
            ("save_note", ctor(|| SaveNote)),
            ("schedule_all_followup_tasks", ctor(|| ScheduleAllFollowupTasks)),
            ("check_duplicates", ctor(|| CheckDuplicates)),
            ("wait_for_categorization", ctor(|| WaitForCategorization)),
            ("mark_note_worker_completed", ctor(|| MarkNoteWorkerCompleted)),
        ])?;
        Ok(factory)
    }

    /// Shared by both the ingredient and instruction workers: the action names
    /// don't collide, so one registration batch covers both pipelines.
    pub fn line_action_factory(&self) -> Result<ActionFactory<LineJobData>, PipelineError> {
        let mut factory = ActionFactory::new();
        factory.register_actions(vec![
            ("parse_ingredient_line", ctor(|| ParseIngredientLine)),
            ("format_instruction_line", ctor(|| FormatInstructionLine)),
            ("save_instruction_line", ctor(|| SaveInstructionLine)),
        ])?;
        Ok(factory)
    }

    pub fn image_action_factory(&self) -> Result<ActionFactory<ImageJobData>, PipelineError> {
        let mut factory = ActionFactory::new();
        factory.register_actions(vec![("process_image", ctor(|| ProcessImage))])?;
        Ok(factory)
    }

    pub fn source_action_factory(&self) -> Result<ActionFactory<SourceJobData>, PipelineError> {
        let mut factory = ActionFactory::new();
        factory.register_actions(vec![("process_source", ctor(|| ProcessSource))])?;
        Ok(factory)
    }

    pub fn categorization_action_factory(&self) -> Result<ActionFactory<CompletionCheckJobData>, PipelineError> {
        let mut factory = ActionFactory::new();
        factory.register_actions(vec![
            ("check_ingredient_completion", ctor(|| CheckCompletion::ingredient())),
            ("check_instruction_completion", ctor(|| CheckCompletion::instruction())),
        ])?;
        Ok(factory)
    }

    pub fn pattern_tracking_action_factory(&self) -> Result<ActionFactory<PatternTrackingJobData>, PipelineError> {
        let mut factory = ActionFactory::new();
        factory.register_actions(vec![("track_pattern", ctor(|| TrackPattern))])?;
        Ok(factory)
    }
}

fn ctor<D, A, F>(build: F) -> ActionConstructor<D>
where
    D: Send + Sync + 'static,
    A: Action<D> + 'static,
    F: Fn() -> A + Send + Sync + 'static,
{
    Box::new(move || Box::new(build()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_registers_every_action_exactly_once() {
        let container = DependencyContainer::assemble().unwrap();
        assert!(container.note_action_factory().unwrap().create("clean_html").is_ok());
        assert!(container.line_action_factory().unwrap().create("parse_ingredient_line").is_ok());
        assert!(container.line_action_factory().unwrap().create("format_instruction_line").is_ok());
        assert!(container.image_action_factory().unwrap().create("process_image").is_ok());
        assert!(container.source_action_factory().unwrap().create("process_source").is_ok());
        assert!(container.categorization_action_factory().unwrap().create("check_ingredient_completion").is_ok());
        assert!(container.pattern_tracking_action_factory().unwrap().create("track_pattern").is_ok());
    }

    #[tokio::test]
    async fn close_flips_the_shutdown_signal_every_worker_observes() {
        let container = DependencyContainer::assemble().unwrap();
        let mut rx = container.shutdown_signal();
        assert!(!*rx.borrow());
        container.close().await;
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }
}
