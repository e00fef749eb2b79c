//! `process_source` (§4.9's source kind, §6 Repository): resolves the note's
//! source text to a source record, connects it to the note, and upserts the
//! evernote-metadata source field. A valid URL is keyed by its `www.`-stripped
//! hostname; anything else is treated as a book title. Not cached (§4.7's
//! cache is read-through for queries, not writes).

use async_trait::async_trait;
use url::Url;

use crate::action::{execute_service_action, Action, ServiceActionOptions, WorkerDeps};
use crate::core::errors::PipelineError;
use crate::types::{ActionContext, SourceJobData, StatusEvent, WorkerKind};

/// `https://www.example.com/recipe` -> `example.com`. `None` if the URL has no
/// host (can't happen for a URL `Repository::is_valid_url` already accepted,
/// but kept total rather than panicking).
fn site_name_from_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

pub struct ProcessSource;

#[async_trait]
impl Action<SourceJobData> for ProcessSource {
    fn name(&self) -> &'static str {
        "process_source"
    }

    async fn execute(&self, data: SourceJobData, deps: &WorkerDeps, _ctx: &ActionContext) -> Result<SourceJobData, PipelineError> {
        let note_id = data.note_id.clone();
        let import_id = data.import_id.clone();
        let source_text = data.source_text.clone();

        if source_text.trim().is_empty() {
            deps.tracker.mark_worker_completed(&note_id, WorkerKind::Source).await?;
            return Ok(data);
        }

        execute_service_action(
            &deps.broadcaster,
            import_id,
            Some(note_id.clone()),
            ServiceActionOptions {
                context_name: "PROCESS_SOURCE",
                complete_context: None,
                start_message: "Resolving recipe source",
                completion_message: "Recipe source resolved",
                suppress_default_broadcast: false,
            },
            || async {
                let (source_id, metadata_value) = if deps.repository.is_valid_url(&source_text) {
                    let source_id = deps.repository.create_or_find_source_with_url(&source_text).await?;
                    let site = site_name_from_url(&source_text).unwrap_or_else(|| source_text.clone());
                    (source_id, site)
                } else {
                    let source_id = deps.repository.create_or_find_source_with_book(&source_text).await?;
                    (source_id, source_text.clone())
                };

                deps.repository.connect_note_to_source(&note_id, &source_id).await?;
                if let Some(metadata_id) = &data.evernote_metadata_id {
                    deps.repository.upsert_evernote_metadata_source(metadata_id, &metadata_value).await?;
                }
                deps.tracker.mark_worker_completed(&note_id, WorkerKind::Source).await?;
                Ok::<(), PipelineError>(())
            },
            None::<fn(&()) -> Vec<StatusEvent>>,
        )
        .await?;

        Ok(data)
    }
}
