//! `format_instruction_line` (§4.1, §8 scenario 4): the instruction worker's
//! first action. Trims the raw reference and appends a trailing period unless
//! it already ends in sentence-final punctuation; an empty-after-trim
//! reference is marked dropped rather than failing the job, so the line still
//! counts toward the tracker's expected/observed totals (§4.6) without being
//! persisted.

use async_trait::async_trait;
use serde_json::json;

use crate::action::{Action, WorkerDeps};
use crate::core::errors::PipelineError;
use crate::types::{ActionContext, LineJobData};

const SENTENCE_FINAL: [char; 5] = ['.', '!', '?', ';', ':'];

/// `None` for an empty-after-trim reference (§8's "empty-after-trim entries
/// are dropped"); otherwise the trimmed reference with a period appended
/// unless it already ends in one of `SENTENCE_FINAL`.
pub fn format_instruction_reference(reference: &str) -> Option<String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.ends_with(SENTENCE_FINAL) {
        Some(trimmed.to_string())
    } else {
        Some(format!("{}.", trimmed))
    }
}

pub struct FormatInstructionLine;

#[async_trait]
impl Action<LineJobData> for FormatInstructionLine {
    fn name(&self) -> &'static str {
        "format_instruction_line"
    }

    async fn execute(&self, mut data: LineJobData, _deps: &WorkerDeps, _ctx: &ActionContext) -> Result<LineJobData, PipelineError> {
        match format_instruction_reference(&data.reference) {
            Some(formatted) => {
                data.reference = formatted;
                data.metadata = json!({ "dropped": false });
            }
            None => {
                data.reference = String::new();
                data.metadata = json!({ "dropped": true });
            }
        }
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
    use crate::types::LineKind;
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

    #[test]
    fn appends_a_period_when_missing_sentence_final_punctuation() {
        assert_eq!(format_instruction_reference(" Mix ingredients  "), Some("Mix ingredients.".to_string()));
        assert_eq!(format_instruction_reference("Bake at 350F"), Some("Bake at 350F.".to_string()));
    }

    #[test]
    fn leaves_existing_sentence_final_punctuation_alone() {
        assert_eq!(format_instruction_reference("Preheat the oven!"), Some("Preheat the oven!".to_string()));
        assert_eq!(format_instruction_reference("Season to taste;"), Some("Season to taste;".to_string()));
    }

    #[test]
    fn empty_after_trim_is_dropped() {
        assert_eq!(format_instruction_reference("   "), None);
        assert_eq!(format_instruction_reference(""), None);
    }

    #[tokio::test]
    async fn execute_marks_dropped_metadata_for_whitespace_only_reference() {
        let deps = deps();
        let job = LineJobData::new("note-A", None, LineKind::Instruction, "   ", 1);
        let action = FormatInstructionLine;
        let result = action.execute(job, &deps, &ActionContext::new("j1", "instruction", "instruction-worker")).await.unwrap();
        assert_eq!(result.reference, "");
        assert_eq!(result.metadata["dropped"], true);
    }

    #[tokio::test]
    async fn execute_formats_a_real_reference() {
        let deps = deps();
        let job = LineJobData::new("note-A", None, LineKind::Instruction, "Mix ingredients", 0);
        let action = FormatInstructionLine;
        let result = action.execute(job, &deps, &ActionContext::new("j1", "instruction", "instruction-worker")).await.unwrap();
        assert_eq!(result.reference, "Mix ingredients.");
        assert_eq!(result.metadata["dropped"], false);
    }
}
