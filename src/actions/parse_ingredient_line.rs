//! `parse_ingredient_line` (§4.1, §4.9): the ingredient worker's sole action.
//! The real ingredient grammar is an external collaborator (§1); this crate
//! owns only enough structural parsing (quantity / unit / name split) to
//! produce a typed result, plus the tracker signal that makes fan-out
//! completion observable. Parse results are read-through cached per distinct
//! reference text under the `parse_ingredient_line:` key space (§4.7); the
//! `clearIngredientCache` pipeline option (§6) invalidates exactly that space
//! before fan-out so a corrected grammar isn't shadowed by a stale result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::action::{execute_service_action, Action, ServiceActionOptions, WorkerDeps};
use crate::cache::{CacheGetOptions, CacheKeyGenerator};
use crate::core::errors::PipelineError;
use crate::types::{ActionContext, EventStatus, LineJobData, StatusEvent, WorkerKind};

/// A minimal structural split: leading numeric quantity, then a unit word if
/// the next token looks like one, then the remaining name. Anything the
/// grammar can't confidently split falls back to `name` holding the whole
/// trimmed reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedIngredient {
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub name: String,
}

const KNOWN_UNITS: &[&str] = &[
    "cup", "cups", "tbsp", "tsp", "tablespoon", "tablespoons", "teaspoon", "teaspoons", "oz", "ounce", "ounces", "lb", "lbs", "pound",
    "pounds", "g", "gram", "grams", "kg", "ml", "l", "clove", "cloves", "pinch", "slice", "slices", "can", "cans",
];

pub fn parse_ingredient_reference(reference: &str) -> ParsedIngredient {
    let trimmed = reference.trim();
    let mut tokens = trimmed.split_whitespace();

    let quantity = tokens.next().filter(|t| t.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false));

    let Some(quantity) = quantity else {
        return ParsedIngredient { quantity: None, unit: None, name: trimmed.to_string() };
    };

    let rest_after_quantity = &trimmed[quantity.len()..].trim_start();
    let mut rest_tokens = rest_after_quantity.split_whitespace();
    let maybe_unit = rest_tokens.next();

    match maybe_unit {
        Some(word) if KNOWN_UNITS.contains(&word.to_lowercase().as_str()) => {
            let name = rest_tokens.collect::<Vec<_>>().join(" ");
            ParsedIngredient { quantity: Some(quantity.to_string()), unit: Some(word.to_string()), name }
        }
        _ => ParsedIngredient {
            quantity: Some(quantity.to_string()),
            unit: None,
            name: rest_after_quantity.to_string(),
        },
    }
}

pub struct ParseIngredientLine;

#[async_trait]
impl Action<LineJobData> for ParseIngredientLine {
    fn name(&self) -> &'static str {
        "parse_ingredient_line"
    }

    fn validate_input(&self, data: &LineJobData) -> Result<(), PipelineError> {
        if data.reference.trim().is_empty() {
            return Err(PipelineError::invalid_input("parse_ingredient_line requires a non-empty reference"));
        }
        Ok(())
    }

    async fn execute(&self, data: LineJobData, deps: &WorkerDeps, _ctx: &ActionContext) -> Result<LineJobData, PipelineError> {
        let reference = data.reference.clone();
        let import_id = data.import_id.clone();
        let note_id = data.note_id.clone();
        let line_index = data.line_index;

        execute_service_action(
            &deps.broadcaster,
            import_id,
            Some(note_id.clone()),
            ServiceActionOptions {
                context_name: "ingredient_processing",
                complete_context: None,
                start_message: "Parsing ingredient line",
                completion_message: "Ingredient line parsed",
                suppress_default_broadcast: true,
            },
            || async move {
                let key = CacheKeyGenerator::ingredient_parse(&reference);
                let parsed = deps
                    .cache
                    .get_or_set(
                        &key,
                        || async { Ok(parse_ingredient_reference(&reference)) },
                        CacheGetOptions {
                            tags: vec!["parse_ingredient_line".to_string()],
                            ..Default::default()
                        },
                    )
                    .await?;
                tracing::debug!(%note_id, line_index, ?parsed, "parsed ingredient line");
                deps.tracker.mark_line_completed(&note_id, WorkerKind::Ingredient, line_index).await?;
                Ok(parsed)
            },
            None::<fn(&ParsedIngredient) -> Vec<StatusEvent>>,
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
    fn splits_quantity_unit_and_name() {
        let parsed = parse_ingredient_reference("1 cup flour");
        assert_eq!(parsed.quantity.as_deref(), Some("1"));
        assert_eq!(parsed.unit.as_deref(), Some("cup"));
        assert_eq!(parsed.name, "flour");
    }

    #[test]
    fn no_recognized_unit_keeps_rest_as_name() {
        let parsed = parse_ingredient_reference("2 eggs");
        assert_eq!(parsed.quantity.as_deref(), Some("2"));
        assert_eq!(parsed.unit, None);
        assert_eq!(parsed.name, "eggs");
    }

    #[test]
    fn no_leading_quantity_keeps_whole_reference_as_name() {
        let parsed = parse_ingredient_reference("Salt to taste");
        assert_eq!(parsed.quantity, None);
        assert_eq!(parsed.name, "Salt to taste");
    }

    #[tokio::test]
    async fn execute_marks_the_line_completed_on_the_tracker() {
        let deps = deps();
        deps.tracker.initialize_note_completion("note-A", None).unwrap();
        deps.tracker.set_expected_counts("note-A", WorkerKind::Ingredient, 1).await.unwrap();

        let job = LineJobData::new("note-A", None, LineKind::Ingredient, "1 cup flour", 0);
        let action = ParseIngredientLine;
        action.execute(job, &deps, &ActionContext::new("j1", "ingredient", "ingredient-worker")).await.unwrap();

        assert_eq!(deps.tracker.observed_count("note-A", WorkerKind::Ingredient), 1);
    }

    #[tokio::test]
    async fn parse_results_are_cached_under_the_ingredient_parse_key_space() {
        let deps = deps();
        deps.tracker.initialize_note_completion("note-A", None).unwrap();
        deps.tracker.set_expected_counts("note-A", WorkerKind::Ingredient, 1).await.unwrap();
        let job = LineJobData::new("note-A", None, LineKind::Ingredient, "1 cup flour", 0);
        ParseIngredientLine.execute(job, &deps, &ActionContext::new("j1", "ingredient", "ingredient-worker")).await.unwrap();

        // the key space is now populated; clearing it must wipe the entry.
        let removed = deps.cache.invalidate_by_pattern("parse_ingredient_line:");
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn invalidate_by_tag_also_clears_cached_parses() {
        let deps = deps();
        deps.tracker.initialize_note_completion("note-A", None).unwrap();
        deps.tracker.set_expected_counts("note-A", WorkerKind::Ingredient, 1).await.unwrap();
        let job = LineJobData::new("note-A", None, LineKind::Ingredient, "2 eggs", 0);
        ParseIngredientLine.execute(job, &deps, &ActionContext::new("j1", "ingredient", "ingredient-worker")).await.unwrap();

        let removed = deps.cache.invalidate_by_tag("parse_ingredient_line");
        assert_eq!(removed, 1);
    }
}
