//! Schedulers (§4.9): fan-out from a saved note's parsed lines/image/source
//! into the dependent queues, plus `schedule_all_followup_tasks`, the note
//! pipeline action that runs them all concurrently and fails fast. Before
//! fanning out, it also honors `options.clearIngredientCache` (§6) by
//! invalidating the `parse_ingredient_line` cache tag, so a note re-run with
//! that flag set never reads a stale parse of lines it's about to re-enqueue.

use std::sync::Arc;

use async_trait::async_trait;

use crate::action::{execute_service_action, Action, ServiceActionOptions, WorkerDeps};
use crate::core::errors::PipelineError;
use crate::queue::JobOptions;
use crate::types::{
    ActionContext, CompletionCheckJobData, EventStatus, ImageJobData, LineJobData, LineKind, NotePipelineData, SourceJobData, StatusEvent,
    WorkerKind,
};

fn require_note_id(data: &NotePipelineData) -> Result<String, PipelineError> {
    data.note_id.clone().ok_or_else(|| PipelineError::InvalidInput("scheduler requires noteId to be set".to_string()))
}

/// Fans out one job per ingredient line, a completion-check sentinel, and the
/// expected count (§4.9 steps 4-7). An empty/missing ingredient list is a no-op
/// that still records `expected = 0` so the kind is immediately complete.
pub async fn schedule_ingredient_lines(data: &NotePipelineData, deps: &WorkerDeps) -> Result<(), PipelineError> {
    let note_id = require_note_id(data)?;
    let Some(file) = &data.file else {
        deps.tracker.set_expected_counts(&note_id, WorkerKind::Ingredient, 0).await?;
        return Ok(());
    };

    if file.ingredients.is_empty() {
        tracing::debug!(%note_id, "no ingredient lines to schedule");
        deps.tracker.set_expected_counts(&note_id, WorkerKind::Ingredient, 0).await?;
        return Ok(());
    }

    let count = file.ingredients.len() as u32;
    for line in &file.ingredients {
        let job = LineJobData::new(&note_id, data.import_id.clone(), LineKind::Ingredient, &line.reference, line.line_index);
        let job_id = job.job_id.clone();
        deps.queues
            .ingredient
            .add("parse_ingredient_line", job, JobOptions { job_id: Some(job_id), ..Default::default() })
            .await?;
    }

    let sentinel = CompletionCheckJobData::new(&note_id, data.import_id.clone(), LineKind::Ingredient);
    let sentinel_id = sentinel.job_id.clone();
    deps.queues
        .categorization
        .add("check_ingredient_completion", sentinel, JobOptions { job_id: Some(sentinel_id), ..Default::default() })
        .await?;

    deps.tracker.set_expected_counts(&note_id, WorkerKind::Ingredient, count).await?;
    deps.broadcaster
        .add_status_event_and_broadcast(
            StatusEvent::new(EventStatus::Pending, "ingredient_processing", format!("0/{} ingredients", count))
                .with_import_id(data.import_id.clone())
                .with_note_id(Some(note_id))
                .with_indent(2)
                .with_counts(0, count),
        )
        .await;
    Ok(())
}

pub async fn schedule_instruction_lines(data: &NotePipelineData, deps: &WorkerDeps) -> Result<(), PipelineError> {
    let note_id = require_note_id(data)?;
    let Some(file) = &data.file else {
        deps.tracker.set_expected_counts(&note_id, WorkerKind::Instruction, 0).await?;
        return Ok(());
    };

    if file.instructions.is_empty() {
        tracing::debug!(%note_id, "no instruction lines to schedule");
        deps.tracker.set_expected_counts(&note_id, WorkerKind::Instruction, 0).await?;
        return Ok(());
    }

    let count = file.instructions.len() as u32;
    for line in &file.instructions {
        let job = LineJobData::new(&note_id, data.import_id.clone(), LineKind::Instruction, &line.reference, line.line_index);
        let job_id = job.job_id.clone();
        deps.queues
            .instruction
            .add("format_instruction_line", job, JobOptions { job_id: Some(job_id), ..Default::default() })
            .await?;
    }

    let sentinel = CompletionCheckJobData::new(&note_id, data.import_id.clone(), LineKind::Instruction);
    let sentinel_id = sentinel.job_id.clone();
    deps.queues
        .categorization
        .add("check_instruction_completion", sentinel, JobOptions { job_id: Some(sentinel_id), ..Default::default() })
        .await?;

    deps.tracker.set_expected_counts(&note_id, WorkerKind::Instruction, count).await?;
    deps.broadcaster
        .add_status_event_and_broadcast(
            StatusEvent::new(EventStatus::Pending, "instruction_processing", format!("0/{} instructions", count))
                .with_import_id(data.import_id.clone())
                .with_note_id(Some(note_id))
                .with_indent(2)
                .with_counts(0, count),
        )
        .await;
    Ok(())
}

/// Image is a 0-or-1 counted kind (§4.9's `image` entry in the component
/// table, with no dedicated action name in the closed set — `process_image`
/// is this crate's documented extension for it).
pub async fn schedule_images(data: &NotePipelineData, deps: &WorkerDeps) -> Result<(), PipelineError> {
    let note_id = require_note_id(data)?;
    let image_ref = data.file.as_ref().and_then(|file| file.image_ref.clone());

    let Some(image_ref) = image_ref else {
        deps.tracker.set_expected_counts(&note_id, WorkerKind::Image, 0).await?;
        return Ok(());
    };

    let job = ImageJobData::new(&note_id, data.import_id.clone(), image_ref);
    let job_id = job.job_id.clone();
    deps.queues.image.add("process_image", job, JobOptions { job_id: Some(job_id), ..Default::default() }).await?;
    deps.tracker.set_expected_counts(&note_id, WorkerKind::Image, 1).await?;
    Ok(())
}

/// `source` is optional and not counted (§3's `WorkerKind::is_counted`); a
/// missing/empty source string is a no-op that marks the kind complete
/// immediately rather than leaving it permanently pending (§4.9).
pub async fn schedule_source(data: &NotePipelineData, deps: &WorkerDeps) -> Result<(), PipelineError> {
    let note_id = require_note_id(data)?;
    let source_text = data
        .file
        .as_ref()
        .and_then(|file| file.evernote_metadata.source.clone())
        .filter(|s| !s.trim().is_empty());

    let Some(source_text) = source_text else {
        deps.tracker.mark_worker_completed(&note_id, WorkerKind::Source).await?;
        return Ok(());
    };

    let evernote_metadata_id = data.note.as_ref().and_then(|note| note.evernote_metadata_id.clone());
    let job = SourceJobData::new(&note_id, data.import_id.clone(), source_text, evernote_metadata_id);
    let job_id = job.job_id.clone();
    deps.queues.source.add("process_source", job, JobOptions { job_id: Some(job_id), ..Default::default() }).await?;
    Ok(())
}

/// Runs all four schedulers concurrently; fails iff any child fails (§4.9's
/// "fail-fast via `Promise.all`-equivalent").
pub struct ScheduleAllFollowupTasks;

#[async_trait]
impl Action<NotePipelineData> for ScheduleAllFollowupTasks {
    fn name(&self) -> &'static str {
        "schedule_all_followup_tasks"
    }

    fn validate_input(&self, data: &NotePipelineData) -> Result<(), PipelineError> {
        require_note_id(data).map(|_| ())
    }

    async fn execute(&self, data: NotePipelineData, deps: &WorkerDeps, _ctx: &ActionContext) -> Result<NotePipelineData, PipelineError> {
        let import_id = data.import_id.clone();
        let note_id = data.note_id.clone();
        let data = Arc::new(data);
        let broadcaster = deps.broadcaster.clone();

        execute_service_action(
            &broadcaster,
            import_id,
            note_id,
            ServiceActionOptions {
                context_name: "SCHEDULE_ALL_FOLLOWUP_TASKS",
                complete_context: None,
                start_message: "Scheduling followup tasks",
                completion_message: "Followup tasks scheduled",
                suppress_default_broadcast: false,
            },
            || async {
                if data.options.clear_ingredient_cache {
                    let removed = deps.cache.invalidate_by_tag("parse_ingredient_line");
                    tracing::debug!(note_id = %data.note_id.as_deref().unwrap_or(""), removed, "cleared ingredient parser cache before fan-out");
                }
                tokio::try_join!(
                    schedule_ingredient_lines(&data, deps),
                    schedule_instruction_lines(&data, deps),
                    schedule_images(&data, deps),
                    schedule_source(&data, deps),
                )?;
                Ok::<(), PipelineError>(())
            },
            None::<fn(&()) -> Vec<StatusEvent>>,
        )
        .await?;

        Ok(Arc::try_unwrap(data).unwrap_or_else(|arc| (*arc).clone()))
    }
}
