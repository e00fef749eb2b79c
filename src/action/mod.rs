//! The `Action<D>` trait (§4.1) and the `executeServiceAction` broadcast
//! wrapper every concrete action builds its `execute` body on top of.

pub mod registry;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::broadcaster::StatusBroadcaster;
use crate::cache::ActionCache;
use crate::core::config::PipelineConfig;
use crate::core::errors::PipelineError;
use crate::queue::QueueHandles;
use crate::repository::Repository;
use crate::storage::ObjectStorage;
use crate::tracker::CompletionTracker;
use crate::types::{ActionContext, EventStatus, StatusEvent};

pub use registry::ActionFactory;

/// The capability bundle every action runs against (§4.8's "worker dependency
/// bundle"), minus `logger`/`errorHandler` — `tracing` fills that role crate-wide
/// and needs no handle threading.
pub struct WorkerDeps {
    pub broadcaster: Arc<StatusBroadcaster>,
    pub cache: Arc<ActionCache>,
    pub tracker: Arc<CompletionTracker>,
    pub repository: Arc<dyn Repository>,
    pub storage: Arc<dyn ObjectStorage>,
    pub queues: QueueHandles,
    pub config: Arc<PipelineConfig>,
}

/// A named, validated unit of work over one pipeline's payload type (§4.1).
#[async_trait]
pub trait Action<D: Send + Sync + 'static>: Send + Sync {
    fn name(&self) -> &'static str;

    fn retryable(&self) -> bool {
        true
    }

    fn priority(&self) -> i32 {
        0
    }

    /// Pure, side-effect free. Fails with `InvalidInput` when required fields
    /// are missing. Default accepts everything; actions with real preconditions
    /// override it.
    fn validate_input(&self, _data: &D) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn execute(&self, data: D, deps: &WorkerDeps, ctx: &ActionContext) -> Result<D, PipelineError>;
}

/// Fixed fields for one `executeServiceAction` call (§4.1).
///
/// `context_name` covers the start event and doubles as the completion
/// event's context unless `complete_context` overrides it — most actions use
/// one context for both (e.g. `save_note`); `parse_html` is the one the spec
/// names two distinct stage contexts for (`parse_html_start` /
/// `parse_html_complete`, §4.5, clarified at spec.md:299).
pub struct ServiceActionOptions<'a> {
    pub context_name: &'a str,
    pub complete_context: Option<&'a str>,
    pub start_message: &'a str,
    pub completion_message: &'a str,
    pub suppress_default_broadcast: bool,
}

/// Wraps an action's business logic with the start/complete broadcast pair.
///
/// The in-process `StatusBroadcaster` cannot itself fail, so the §4.1 rule
/// that "a broadcast failure never masks the business error, but propagates
/// when there is no prior business error" has no code path to exercise here —
/// it is satisfied vacuously rather than implemented as dead error-handling.
pub async fn execute_service_action<T, F, Fut, A>(
    broadcaster: &StatusBroadcaster,
    import_id: Option<String>,
    note_id: Option<String>,
    options: ServiceActionOptions<'_>,
    service_call: F,
    additional_broadcasting: Option<A>,
) -> Result<T, PipelineError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
    A: FnOnce(&T) -> Vec<StatusEvent>,
{
    if !options.suppress_default_broadcast {
        broadcaster
            .add_status_event_and_broadcast(
                StatusEvent::new(EventStatus::Processing, options.context_name, options.start_message)
                    .with_import_id(import_id.clone())
                    .with_note_id(note_id.clone())
                    .with_indent(1),
            )
            .await;
    }

    let result = service_call().await?;

    if let Some(additional) = additional_broadcasting {
        for event in additional(&result) {
            broadcaster.add_status_event_and_broadcast(event).await;
        }
    }

    broadcaster
        .add_status_event_and_broadcast(
            StatusEvent::new(
                EventStatus::Completed,
                options.complete_context.unwrap_or(options.context_name),
                options.completion_message,
            )
            .with_import_id(import_id)
            .with_note_id(note_id),
        )
        .await;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_and_completion_events_bracket_the_service_call() {
        let broadcaster = StatusBroadcaster::new();
        let result: u32 = execute_service_action(
            &broadcaster,
            Some("imp-1".to_string()),
            None,
            ServiceActionOptions {
                context_name: "clean_html",
                complete_context: None,
                start_message: "cleaning",
                completion_message: "cleaned",
                suppress_default_broadcast: false,
            },
            || async { Ok(7u32) },
            None::<fn(&u32) -> Vec<StatusEvent>>,
        )
        .await
        .unwrap();

        assert_eq!(result, 7);
        let log = broadcaster.events_for("imp-1");
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].status, EventStatus::Processing);
        assert_eq!(log[1].status, EventStatus::Completed);
    }

    #[tokio::test]
    async fn suppress_default_broadcast_skips_the_start_event_only() {
        let broadcaster = StatusBroadcaster::new();
        execute_service_action::<u32, _, _, fn(&u32) -> Vec<StatusEvent>>(
            &broadcaster,
            Some("imp-1".to_string()),
            None,
            ServiceActionOptions {
                context_name: "save_note",
                complete_context: None,
                start_message: "saving",
                completion_message: "saved",
                suppress_default_broadcast: true,
            },
            || async { Ok(1u32) },
            None,
        )
        .await
        .unwrap();
        let log = broadcaster.events_for("imp-1");
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, EventStatus::Completed);
    }

    #[tokio::test]
    async fn a_failing_service_call_emits_no_completion_event() {
        let broadcaster = StatusBroadcaster::new();
        let result: Result<u32, _> = execute_service_action(
            &broadcaster,
            Some("imp-1".to_string()),
            None,
            ServiceActionOptions {
                context_name: "save_note",
                complete_context: None,
                start_message: "saving",
                completion_message: "saved",
                suppress_default_broadcast: false,
            },
            || async { Err(PipelineError::repository("db down")) },
            None::<fn(&u32) -> Vec<StatusEvent>>,
        )
        .await;
        assert!(result.is_err());
        let log = broadcaster.events_for("imp-1");
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, EventStatus::Processing);
    }

    #[tokio::test]
    async fn additional_broadcasting_runs_between_start_and_completion() {
        let broadcaster = StatusBroadcaster::new();
        execute_service_action(
            &broadcaster,
            Some("imp-1".to_string()),
            None,
            ServiceActionOptions {
                context_name: "parse_html",
                complete_context: None,
                start_message: "parsing",
                completion_message: "parsed",
                suppress_default_broadcast: false,
            },
            || async { Ok(2u32) },
            Some(|count: &u32| {
                vec![StatusEvent::new(EventStatus::Pending, "parse_html_ingredients", format!("0/{} ingredients", count))
                    .with_import_id(Some("imp-1".to_string()))]
            }),
        )
        .await
        .unwrap();
        let log = broadcaster.events_for("imp-1");
        assert_eq!(log.len(), 3);
        assert_eq!(log[1].context, "parse_html_ingredients");
    }
}
