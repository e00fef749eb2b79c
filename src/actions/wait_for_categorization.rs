//! `wait_for_categorization` (§4.6, §4.1): blocks until the tracker's
//! `categorizationReady` flag flips true or the configured bound elapses
//! (default 60s). A timeout is non-retryable: §4.6 calls for the note to be
//! "marked FAILED for categorization but other state preserved", so this
//! action reports `Timeout` (retryable per §7's taxonomy) but is registered
//! non-retryable here since `check_duplicates` already ran once and a second
//! run would re-check duplicates rather than simply re-wait.

use std::time::Duration;

use async_trait::async_trait;

use crate::action::{Action, WorkerDeps};
use crate::core::errors::PipelineError;
use crate::types::{ActionContext, EventStatus, NotePipelineData, StatusEvent};

pub struct WaitForCategorization;

#[async_trait]
impl Action<NotePipelineData> for WaitForCategorization {
    fn name(&self) -> &'static str {
        "wait_for_categorization"
    }

    fn retryable(&self) -> bool {
        false
    }

    fn validate_input(&self, data: &NotePipelineData) -> Result<(), PipelineError> {
        if data.note_id.is_none() {
            return Err(PipelineError::invalid_input("wait_for_categorization requires noteId to be set"));
        }
        Ok(())
    }

    async fn execute(&self, data: NotePipelineData, deps: &WorkerDeps, _ctx: &ActionContext) -> Result<NotePipelineData, PipelineError> {
        let note_id = data.note_id.clone().expect("validated above");
        let timeout = Duration::from_secs(deps.config.wait_for_categorization_timeout_secs);

        if let Err(err) = deps.tracker.wait_for_categorization(&note_id, timeout).await {
            deps.broadcaster
                .add_status_event_and_broadcast(
                    StatusEvent::new(EventStatus::Failed, "wait_for_categorization", "Timed out waiting for categorization")
                        .with_import_id(data.import_id.clone())
                        .with_note_id(Some(note_id)),
                )
                .await;
            return Err(err);
        }

        Ok(data)
    }
}
