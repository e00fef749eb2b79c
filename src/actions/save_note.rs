//! `save_note` (§4.1, §4.7): persists the parsed file, initializes the note's
//! completion record, and invalidates the cache entries a note write can make
//! stale.

use async_trait::async_trait;

use crate::action::{execute_service_action, Action, ServiceActionOptions, WorkerDeps};
use crate::cache::CacheKeyGenerator;
use crate::core::errors::PipelineError;
use crate::repository::CreatedNote;
use crate::types::{ActionContext, NotePipelineData, PersistedNote, StatusEvent};

pub struct SaveNote;

#[async_trait]
impl Action<NotePipelineData> for SaveNote {
    fn name(&self) -> &'static str {
        "save_note"
    }

    fn validate_input(&self, data: &NotePipelineData) -> Result<(), PipelineError> {
        if data.file.is_none() {
            return Err(PipelineError::invalid_input("save_note requires a parsed file"));
        }
        Ok(())
    }

    async fn execute(&self, mut data: NotePipelineData, deps: &WorkerDeps, _ctx: &ActionContext) -> Result<NotePipelineData, PipelineError> {
        let file = data.file.clone().expect("validated above");
        let import_id = data.import_id.clone();

        let created = execute_service_action(
            &deps.broadcaster,
            import_id.clone(),
            None,
            ServiceActionOptions {
                context_name: "save_note",
                complete_context: None,
                start_message: "Saving note",
                completion_message: "Note saved",
                suppress_default_broadcast: false,
            },
            || async {
                let created = deps.repository.create_note_with_evernote_metadata(&file).await?;
                deps.tracker.initialize_note_completion(&created.id, import_id.clone())?;

                deps.cache.delete(&CacheKeyGenerator::note_metadata(&created.id));
                deps.cache.delete(&CacheKeyGenerator::note_status(&created.id));
                deps.cache.invalidate_by_pattern(&CacheKeyGenerator::database_query(""));

                Ok(created)
            },
            None::<fn(&CreatedNote) -> Vec<StatusEvent>>,
        )
        .await?;

        data.note_id = Some(created.id.clone());
        data.note = Some(PersistedNote {
            id: created.id.clone(),
            title: created.title.clone(),
            evernote_metadata_id: created.evernote_metadata_id.clone(),
            parsed_ingredient_line_ids: created.parsed_ingredient_lines.clone(),
            parsed_instruction_line_ids: created.parsed_instruction_lines.clone(),
            created_at: created.created_at,
            updated_at: created.updated_at,
        });
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::StatusBroadcaster;
    use crate::cache::ActionCache;
    use crate::core::config::defaults::default_config;
    use crate::queue::QueueHandles;
    use crate::repository::InMemoryRepository;
    use crate::storage::InMemoryObjectStorage;
    use crate::tracker::CompletionTracker;
    use crate::types::{EvernoteMetadata, ParsedFile};
    use std::sync::Arc;

    fn deps() -> WorkerDeps {
        let broadcaster = Arc::new(StatusBroadcaster::new());
        WorkerDeps {
            broadcaster: broadcaster.clone(),
            cache: Arc::new(ActionCache::new()),
            tracker: Arc::new(CompletionTracker::new(broadcaster)),
            repository: Arc::new(InMemoryRepository::new()),
            storage: Arc::new(InMemoryObjectStorage::new()),
            queues: QueueHandles::in_memory(),
            config: Arc::new(default_config()),
        }
    }

    fn note_data() -> NotePipelineData {
        let mut data = NotePipelineData::new("<html></html>");
        data.file = Some(ParsedFile {
            title: "Soup".to_string(),
            cleaned_contents: "<html></html>".to_string(),
            image_ref: None,
            ingredients: vec![],
            instructions: vec![],
            evernote_metadata: EvernoteMetadata::default(),
        });
        data
    }

    #[tokio::test]
    async fn saves_note_and_initializes_completion_tracking() {
        let deps = deps();
        let action = SaveNote;
        let result = action.execute(note_data(), &deps, &ActionContext::new("j1", "note", "note-worker")).await.unwrap();

        let note_id = result.note_id.expect("note_id set");
        assert_eq!(result.note.unwrap().title, "Soup");
        assert!(!deps.tracker.is_note_terminal(&note_id));
    }

    #[tokio::test]
    async fn missing_file_is_invalid_input() {
        let action = SaveNote;
        let err = action.validate_input(&NotePipelineData::new("<html></html>")).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }
}
