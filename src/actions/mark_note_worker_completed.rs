//! `mark_note_worker_completed` (§2, §4.6): the note pipeline's own worker
//! signals the tracker that its `note` kind is done. Since the other
//! kinds (ingredient/instruction/image/source) progress independently on
//! their own queues, this is frequently not the call that flips
//! `terminal = true` — it merely records that *this* worker's contribution
//! is finished, same as any other `markWorkerCompleted` caller.

use async_trait::async_trait;

use crate::action::{execute_service_action, Action, ServiceActionOptions, WorkerDeps};
use crate::core::errors::PipelineError;
use crate::types::{ActionContext, NotePipelineData, StatusEvent, WorkerKind};

pub struct MarkNoteWorkerCompleted;

#[async_trait]
impl Action<NotePipelineData> for MarkNoteWorkerCompleted {
    fn name(&self) -> &'static str {
        "mark_note_worker_completed"
    }

    fn validate_input(&self, data: &NotePipelineData) -> Result<(), PipelineError> {
        if data.note_id.is_none() {
            return Err(PipelineError::invalid_input("mark_note_worker_completed requires noteId to be set"));
        }
        Ok(())
    }

    async fn execute(&self, data: NotePipelineData, deps: &WorkerDeps, _ctx: &ActionContext) -> Result<NotePipelineData, PipelineError> {
        let note_id = data.note_id.clone().expect("validated above");
        let import_id = data.import_id.clone();

        execute_service_action(
            &deps.broadcaster,
            import_id,
            Some(note_id.clone()),
            ServiceActionOptions {
                context_name: "mark_note_worker_completed",
                complete_context: None,
                start_message: "Marking note worker completed",
                completion_message: "Note worker completed",
                suppress_default_broadcast: true,
            },
            || async { deps.tracker.mark_worker_completed(&note_id, WorkerKind::Note).await },
            None::<fn(&()) -> Vec<StatusEvent>>,
        )
        .await?;

        Ok(data)
    }
}
