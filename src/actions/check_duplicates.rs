//! `check_duplicates` (§4.1, §4.6): runs the repository's duplicate-detection
//! query against the parsed file and signals the tracker that categorization
//! is ready.
//!
//! §2 describes the flow as `check-duplicates -> wait-for-categorization ->
//! mark-worker-completed`; nothing else in this pipeline produces
//! `categorizationReady`, so this action is the one that flips it once the
//! duplicate check has run (documented as an Open Question decision in
//! DESIGN.md).

use async_trait::async_trait;

use crate::action::{execute_service_action, Action, ServiceActionOptions, WorkerDeps};
use crate::core::errors::PipelineError;
use crate::repository::DuplicateCheckResult;
use crate::types::{ActionContext, NotePipelineData, StatusEvent};

pub struct CheckDuplicates;

#[async_trait]
impl Action<NotePipelineData> for CheckDuplicates {
    fn name(&self) -> &'static str {
        "check_duplicates"
    }

    fn validate_input(&self, data: &NotePipelineData) -> Result<(), PipelineError> {
        if data.file.is_none() {
            return Err(PipelineError::invalid_input("check_duplicates requires a parsed file"));
        }
        Ok(())
    }

    async fn execute(&self, data: NotePipelineData, deps: &WorkerDeps, _ctx: &ActionContext) -> Result<NotePipelineData, PipelineError> {
        let file = data.file.clone().expect("validated above");
        let import_id = data.import_id.clone();
        let note_id = data.note_id.clone();

        let result = execute_service_action(
            &deps.broadcaster,
            import_id,
            note_id.clone(),
            ServiceActionOptions {
                context_name: "CHECK_DUPLICATES",
                complete_context: None,
                start_message: "Checking for duplicate notes",
                completion_message: "Verified no duplicates!",
                suppress_default_broadcast: false,
            },
            || async { deps.repository.check_duplicate(&file).await },
            None::<fn(&DuplicateCheckResult) -> Vec<StatusEvent>>,
        )
        .await?;

        if result.is_duplicate {
            tracing::warn!(?note_id, candidates = ?result.candidates, "possible duplicate note detected");
        }

        if let Some(note_id) = note_id.as_deref() {
            deps.tracker.on_categorization_ready(note_id).await?;
        }

        Ok(data)
    }
}
