//! Per-note completion state machine (§4.6): aggregates per-worker completions
//! across the note/ingredient/instruction/image/source kinds and decides the
//! terminal transition.
//!
//! Grounded on §9's design note ("lock-striping ... mapped onto `dashmap`'s
//! per-shard locking") — the same per-entity concurrent-state pattern used
//! throughout the retrieval pack's job-runtime examples. All critical sections
//! here are synchronous (no `.await` while holding a shard guard), so the
//! `DashMap` entry lock alone gives the "serialized per noteId" guarantee §5
//! requires, without an extra `Mutex` wrapper.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Notify;

use crate::broadcaster::StatusBroadcaster;
use crate::core::errors::PipelineError;
use crate::types::{EventStatus, StatusEvent, WorkerKind};

pub struct NoteCompletionRecord {
    pub import_id: Option<String>,
    pub worker_completion: HashMap<WorkerKind, bool>,
    pub expected_line_counts: HashMap<WorkerKind, u32>,
    pub observed_line_completions: HashMap<WorkerKind, u32>,
    seen_lines: HashMap<WorkerKind, HashSet<usize>>,
    pub categorization_ready: bool,
    pub terminal: bool,
    notify: Arc<Notify>,
}

impl NoteCompletionRecord {
    fn new(import_id: Option<String>) -> Self {
        let mut worker_completion = HashMap::new();
        for kind in ALL_KINDS {
            worker_completion.insert(kind, false);
        }
        Self {
            import_id,
            worker_completion,
            expected_line_counts: HashMap::new(),
            observed_line_completions: HashMap::new(),
            seen_lines: HashMap::new(),
            categorization_ready: false,
            terminal: false,
            notify: Arc::new(Notify::new()),
        }
    }

    /// True iff every required kind (§3) is complete and, for counted kinds,
    /// observed line completions equal the expected count.
    fn all_required_complete(&self) -> bool {
        ALL_KINDS
            .iter()
            .filter(|kind| kind.is_required())
            .all(|kind| self.worker_completion.get(kind).copied().unwrap_or(false))
    }
}

const ALL_KINDS: [WorkerKind; 5] = [
    WorkerKind::Note,
    WorkerKind::Ingredient,
    WorkerKind::Instruction,
    WorkerKind::Image,
    WorkerKind::Source,
];

pub struct CompletionTracker {
    records: DashMap<String, NoteCompletionRecord>,
    broadcaster: Arc<StatusBroadcaster>,
}

impl CompletionTracker {
    pub fn new(broadcaster: Arc<StatusBroadcaster>) -> Self {
        Self {
            records: DashMap::new(),
            broadcaster,
        }
    }

    pub fn initialize_note_completion(
        &self,
        note_id: &str,
        import_id: Option<String>,
    ) -> Result<(), PipelineError> {
        if let Some(existing) = self.records.get(note_id) {
            if existing.import_id != import_id {
                return Err(PipelineError::ProgrammingError(format!(
                    "note '{}' already initialized with a different importId",
                    note_id
                )));
            }
            return Ok(());
        }
        self.records.insert(note_id.to_string(), NoteCompletionRecord::new(import_id));
        Ok(())
    }

    /// May be called once per kind; repeats with the same value are no-ops,
    /// repeats with a different value are a programming error (§4.6).
    /// `count == 0` immediately marks the kind complete (§8 boundary behavior).
    pub async fn set_expected_counts(
        &self,
        note_id: &str,
        kind: WorkerKind,
        count: u32,
    ) -> Result<(), PipelineError> {
        let should_finalize = {
            let mut record = self.records.get_mut(note_id).ok_or_else(|| missing_note(note_id))?;
            if let Some(existing) = record.expected_line_counts.get(&kind) {
                if *existing != count {
                    return Err(PipelineError::ProgrammingError(format!(
                        "setExpectedCounts('{}', {:?}) called with {} after already set to {}",
                        note_id, kind, count, existing
                    )));
                }
                return Ok(());
            }
            record.expected_line_counts.insert(kind, count);
            record.observed_line_completions.entry(kind).or_insert(0);
            if count == 0 {
                record.worker_completion.insert(kind, true);
                true
            } else {
                false
            }
        };
        if should_finalize {
            self.try_finalize(note_id).await?;
        }
        Ok(())
    }

    /// Increments `observedLineCompletions[kind]` only if `(kind, lineIndex)`
    /// has not been recorded before. On reaching the expected count, marks the
    /// kind complete and emits the aggregate completion event.
    pub async fn mark_line_completed(
        &self,
        note_id: &str,
        kind: WorkerKind,
        line_index: usize,
    ) -> Result<(), PipelineError> {
        let (newly_complete, import_id, observed, expected) = {
            let mut record = self.records.get_mut(note_id).ok_or_else(|| missing_note(note_id))?;
            let seen = record.seen_lines.entry(kind).or_default();
            if !seen.insert(line_index) {
                return Ok(());
            }
            let observed = record.observed_line_completions.entry(kind).or_insert(0);
            *observed += 1;
            let observed = *observed;
            let expected = record.expected_line_counts.get(&kind).copied();

            let newly_complete = match expected {
                Some(expected) if observed >= expected => {
                    let already = record.worker_completion.get(&kind).copied().unwrap_or(false);
                    record.worker_completion.insert(kind, true);
                    !already
                }
                _ => false,
            };
            (newly_complete, record.import_id.clone(), observed, expected.unwrap_or(u32::MAX))
        };

        if newly_complete {
            self.broadcaster
                .add_status_event_and_broadcast(
                    StatusEvent::new(
                        EventStatus::Completed,
                        format!("{}_processing", kind.as_str()),
                        format!("{}/{} {}s processed", observed, expected, kind.as_str()),
                    )
                    .with_import_id(import_id)
                    .with_note_id(Some(note_id.to_string()))
                    .with_indent(2)
                    .with_counts(observed, expected),
                )
                .await;
            self.try_finalize(note_id).await?;
        }

        Ok(())
    }

    /// Idempotent set-to-true; used for non-counted kinds (`note`, `source`).
    pub async fn mark_worker_completed(&self, note_id: &str, kind: WorkerKind) -> Result<(), PipelineError> {
        let already = {
            let mut record = self.records.get_mut(note_id).ok_or_else(|| missing_note(note_id))?;
            let already = record.worker_completion.get(&kind).copied().unwrap_or(false);
            record.worker_completion.insert(kind, true);
            already
        };
        if !already {
            self.try_finalize(note_id).await?;
        }
        Ok(())
    }

    pub fn is_note_terminal(&self, note_id: &str) -> bool {
        self.records.get(note_id).map(|r| r.terminal).unwrap_or(false)
    }

    /// Sets `categorizationReady = true` and wakes any `wait_for_categorization` caller.
    pub async fn on_categorization_ready(&self, note_id: &str) -> Result<(), PipelineError> {
        let notify = {
            let mut record = self.records.get_mut(note_id).ok_or_else(|| missing_note(note_id))?;
            record.categorization_ready = true;
            record.notify.clone()
        };
        notify.notify_waiters();
        self.try_finalize(note_id).await?;
        Ok(())
    }

    /// Blocks until `categorizationReady` or `timeout` elapses.
    pub async fn wait_for_categorization(&self, note_id: &str, timeout: Duration) -> Result<(), PipelineError> {
        let notify = {
            let record = self.records.get(note_id).ok_or_else(|| missing_note(note_id))?;
            if record.categorization_ready {
                return Ok(());
            }
            record.notify.clone()
        };

        let waited = tokio::time::timeout(timeout, notify.notified()).await;
        match waited {
            Ok(_) => Ok(()),
            Err(_) => {
                let ready = self
                    .records
                    .get(note_id)
                    .map(|r| r.categorization_ready)
                    .unwrap_or(false);
                if ready {
                    Ok(())
                } else {
                    Err(PipelineError::Timeout(format!(
                        "wait_for_categorization timed out after {:?} for note '{}'",
                        timeout, note_id
                    )))
                }
            }
        }
    }

    /// Sets `terminal = true` exactly once, when all required kinds are complete
    /// and categorization is ready. Emits the terminal broadcast on that one
    /// transition regardless of which caller (mark_note_worker_completed, a
    /// completion-check sentinel, or process_source/process_image) triggers it.
    pub async fn try_finalize(&self, note_id: &str) -> Result<bool, PipelineError> {
        let (became_terminal, import_id) = {
            let mut record = self.records.get_mut(note_id).ok_or_else(|| missing_note(note_id))?;
            if record.terminal {
                return Ok(false);
            }
            if record.all_required_complete() && record.categorization_ready {
                record.terminal = true;
                (true, record.import_id.clone())
            } else {
                (false, None)
            }
        };

        if became_terminal {
            self.broadcaster
                .add_status_event_and_broadcast(
                    StatusEvent::new(
                        EventStatus::Completed,
                        "mark_note_worker_completed",
                        "Note processing complete",
                    )
                    .with_import_id(import_id)
                    .with_note_id(Some(note_id.to_string())),
                )
                .await;
        }

        Ok(became_terminal)
    }

    pub fn expected_count(&self, note_id: &str, kind: WorkerKind) -> Option<u32> {
        self.records.get(note_id)?.expected_line_counts.get(&kind).copied()
    }

    pub fn observed_count(&self, note_id: &str, kind: WorkerKind) -> u32 {
        self.records
            .get(note_id)
            .and_then(|r| r.observed_line_completions.get(&kind).copied())
            .unwrap_or(0)
    }
}

fn missing_note(note_id: &str) -> PipelineError {
    PipelineError::ProgrammingError(format!("no completion record initialized for note '{}'", note_id))
}
