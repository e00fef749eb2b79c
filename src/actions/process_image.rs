//! `process_image` (§4.9's image kind, §6 ObjectStorage): uploads the note's
//! referenced image through the object-storage interface and signals the
//! tracker. Fetching the image bytes themselves (from a URL or a local export
//! path) is an external collaborator (§1); this action treats `imageRef` as
//! already-resolved content to hand to storage.

use async_trait::async_trait;

use crate::action::{execute_service_action, Action, ServiceActionOptions, WorkerDeps};
use crate::core::errors::PipelineError;
use crate::storage::content_type_for_key;
use crate::types::{ActionContext, ImageJobData, StatusEvent, WorkerKind};

pub struct ProcessImage;

#[async_trait]
impl Action<ImageJobData> for ProcessImage {
    fn name(&self) -> &'static str {
        "process_image"
    }

    fn validate_input(&self, data: &ImageJobData) -> Result<(), PipelineError> {
        if data.image_ref.trim().is_empty() {
            return Err(PipelineError::invalid_input("process_image requires a non-empty imageRef"));
        }
        Ok(())
    }

    async fn execute(&self, data: ImageJobData, deps: &WorkerDeps, _ctx: &ActionContext) -> Result<ImageJobData, PipelineError> {
        let note_id = data.note_id.clone();
        let import_id = data.import_id.clone();
        let image_ref = data.image_ref.clone();
        let file_name = image_ref.rsplit('/').next().unwrap_or("image");
        let key = format!("notes/{}/{}", note_id, file_name);
        let content_type = content_type_for_key(&key).to_string();

        execute_service_action(
            &deps.broadcaster,
            import_id,
            Some(note_id.clone()),
            ServiceActionOptions {
                context_name: "image_processing",
                complete_context: None,
                start_message: "Uploading recipe image",
                completion_message: "Recipe image uploaded",
                suppress_default_broadcast: true,
            },
            || async {
                deps.storage.upload_buffer(image_ref.as_bytes(), &key, Some(&content_type)).await?;
                deps.tracker.mark_line_completed(&note_id, WorkerKind::Image, 0).await
            },
            None::<fn(&()) -> Vec<StatusEvent>>,
        )
        .await?;

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

    #[tokio::test]
    async fn uploads_and_marks_the_image_kind_complete() {
        let deps = deps();
        deps.tracker.initialize_note_completion("note-A", None).unwrap();
        deps.tracker.set_expected_counts("note-A", WorkerKind::Image, 1).await.unwrap();

        let job = ImageJobData::new("note-A", None, "https://example.com/soup.jpg");
        let action = ProcessImage;
        action.execute(job, &deps, &ActionContext::new("j1", "image", "image-worker")).await.unwrap();

        assert_eq!(deps.tracker.observed_count("note-A", WorkerKind::Image), 1);
    }

    #[test]
    fn empty_image_ref_is_invalid_input() {
        let action = ProcessImage;
        let err = action.validate_input(&ImageJobData::new("note-A", None, "  ")).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }
}
