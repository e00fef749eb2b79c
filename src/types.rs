//! Data model (§3): the envelopes and payloads that flow between queues,
//! actions, the tracker, and the broadcaster.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ActionContext
// ---------------------------------------------------------------------------

/// Per-invocation metadata passed to every action (§3). Built by the worker
/// when it picks up a job; discarded when the pipeline returns.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub job_id: String,
    pub attempt_number: u32,
    pub retry_count: u32,
    pub queue_name: String,
    pub worker_name: String,
    pub operation: String,
    pub start_time: DateTime<Utc>,
}

impl ActionContext {
    pub fn new(job_id: impl Into<String>, queue_name: impl Into<String>, worker_name: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            attempt_number: 1,
            retry_count: 0,
            queue_name: queue_name.into(),
            worker_name: worker_name.into(),
            operation: String::new(),
            start_time: Utc::now(),
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    pub fn with_attempt(mut self, attempt_number: u32) -> Self {
        self.retry_count = attempt_number.saturating_sub(1);
        self.attempt_number = attempt_number;
        self
    }
}

// ---------------------------------------------------------------------------
// WorkerKind / LineKind
// ---------------------------------------------------------------------------

/// The five completion kinds the tracker aggregates over (§3 `NoteCompletionRecord`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerKind {
    Note,
    Ingredient,
    Instruction,
    Image,
    Source,
}

impl WorkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::Note => "note",
            WorkerKind::Ingredient => "ingredient",
            WorkerKind::Instruction => "instruction",
            WorkerKind::Image => "image",
            WorkerKind::Source => "source",
        }
    }

    /// Required kinds per §4.10's per-kind completion policy (instruction/ingredient
    /// required; image/source optional). `note` is required: it is the pipeline's
    /// own worker marking itself done and is never skipped.
    pub fn is_required(&self) -> bool {
        matches!(self, WorkerKind::Note | WorkerKind::Ingredient | WorkerKind::Instruction)
    }

    /// Kinds whose progress is tracked via `expected`/`observed` line counts
    /// (ingredient, instruction, image — image is 0-or-1) rather than a single
    /// set-once flag (note, source).
    pub fn is_counted(&self) -> bool {
        matches!(self, WorkerKind::Ingredient | WorkerKind::Instruction | WorkerKind::Image)
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The two line kinds that get fanned out one job per line (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineKind {
    Ingredient,
    Instruction,
}

impl LineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineKind::Ingredient => "ingredient",
            LineKind::Instruction => "instruction",
        }
    }

    pub fn as_worker_kind(&self) -> WorkerKind {
        match self {
            LineKind::Ingredient => WorkerKind::Ingredient,
            LineKind::Instruction => WorkerKind::Instruction,
        }
    }

    pub fn queue_name(&self) -> &'static str {
        self.as_str()
    }
}

// ---------------------------------------------------------------------------
// NotePipelineData
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub skip_followup_tasks: bool,
    pub clear_ingredient_cache: bool,
    pub parse_ingredients: bool,
    pub parse_instructions: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientLine {
    pub reference: String,
    pub block_index: usize,
    pub line_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionLine {
    pub reference: String,
    pub line_index: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvernoteMetadata {
    pub source: Option<String>,
    pub tags: Vec<String>,
    pub original_created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedFile {
    pub title: String,
    pub cleaned_contents: String,
    pub image_ref: Option<String>,
    pub ingredients: Vec<IngredientLine>,
    pub instructions: Vec<InstructionLine>,
    pub evernote_metadata: EvernoteMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedNote {
    pub id: String,
    pub title: String,
    pub evernote_metadata_id: Option<String>,
    pub parsed_ingredient_line_ids: Vec<String>,
    pub parsed_instruction_line_ids: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The payload that flows through the note pipeline (§3). `noteId` is set exactly
/// once (at `save_note`) and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotePipelineData {
    pub content: String,
    pub import_id: Option<String>,
    pub note_id: Option<String>,
    pub source: Option<String>,
    pub options: PipelineOptions,
    pub file: Option<ParsedFile>,
    pub note: Option<PersistedNote>,
}

impl NotePipelineData {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            import_id: None,
            note_id: None,
            source: None,
            options: PipelineOptions::default(),
            file: None,
            note: None,
        }
    }

    pub fn with_import_id(mut self, import_id: impl Into<String>) -> Self {
        self.import_id = Some(import_id.into());
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }
}

// ---------------------------------------------------------------------------
// Fan-out job payloads
// ---------------------------------------------------------------------------

/// `{noteId, importId?, reference, lineIndex, jobId, metadata}` (§3). `jobId` is
/// derived deterministically so re-enqueue (and at-least-once delivery) is idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineJobData {
    pub note_id: String,
    pub import_id: Option<String>,
    pub kind: LineKind,
    pub reference: String,
    pub line_index: usize,
    pub job_id: String,
    pub metadata: serde_json::Value,
}

impl LineJobData {
    pub fn new(
        note_id: impl Into<String>,
        import_id: Option<String>,
        kind: LineKind,
        reference: impl Into<String>,
        line_index: usize,
    ) -> Self {
        let note_id = note_id.into();
        let job_id = format!("{}-{}-{}", note_id, kind.as_str(), line_index);
        Self {
            note_id,
            import_id,
            kind,
            reference: reference.into(),
            line_index,
            job_id,
            metadata: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageJobData {
    pub note_id: String,
    pub import_id: Option<String>,
    pub image_ref: String,
    pub job_id: String,
}

impl ImageJobData {
    pub fn new(note_id: impl Into<String>, import_id: Option<String>, image_ref: impl Into<String>) -> Self {
        let note_id = note_id.into();
        let job_id = format!("{}-image-0", note_id);
        Self {
            note_id,
            import_id,
            image_ref: image_ref.into(),
            job_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceJobData {
    pub note_id: String,
    pub import_id: Option<String>,
    pub source_text: String,
    pub evernote_metadata_id: Option<String>,
    pub job_id: String,
}

impl SourceJobData {
    pub fn new(
        note_id: impl Into<String>,
        import_id: Option<String>,
        source_text: impl Into<String>,
        evernote_metadata_id: Option<String>,
    ) -> Self {
        let note_id = note_id.into();
        let job_id = format!("{}-source", note_id);
        Self {
            note_id,
            import_id,
            source_text: source_text.into(),
            evernote_metadata_id,
            job_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternTrackingJobData {
    pub note_id: Option<String>,
    pub pattern: String,
    pub job_id: String,
}

/// `{noteId, importId?, jobId}` (§3). `kind` selects which completion check runs;
/// `attempt` is carried across re-enqueues to drive the doubling backoff and the
/// 60-retry exhaustion cap (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionCheckJobData {
    pub note_id: String,
    pub import_id: Option<String>,
    pub kind: LineKind,
    pub job_id: String,
    pub attempt: u32,
}

impl CompletionCheckJobData {
    pub fn new(note_id: impl Into<String>, import_id: Option<String>, kind: LineKind) -> Self {
        let note_id = note_id.into();
        let job_id = format!("{}-{}-completion-check", note_id, kind.as_str());
        Self {
            note_id,
            import_id,
            kind,
            job_id,
            attempt: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// StatusEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    AwaitingParsing,
    Processing,
    Pending,
    Completed,
    Failed,
    /// Extension beyond §3's enumerated set: §7 requires a distinct event for
    /// cooperative cancellation ("no FAILED, emit a Cancelled status event").
    Cancelled,
}

/// `{importId, noteId?, status, message, context, indentLevel?, currentCount?,
/// totalCount?, metadata?, timestamp}` (§3). Append-only; ordering per `importId`
/// is preserved by the broadcaster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub import_id: Option<String>,
    pub note_id: Option<String>,
    pub status: EventStatus,
    pub message: String,
    pub context: String,
    pub indent_level: u8,
    pub current_count: Option<u32>,
    pub total_count: Option<u32>,
    pub metadata: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(status: EventStatus, context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            import_id: None,
            note_id: None,
            status,
            message: message.into(),
            context: context.into(),
            indent_level: 0,
            current_count: None,
            total_count: None,
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_import_id(mut self, import_id: Option<String>) -> Self {
        self.import_id = import_id;
        self
    }

    pub fn with_note_id(mut self, note_id: Option<String>) -> Self {
        self.note_id = note_id;
        self
    }

    pub fn with_indent(mut self, indent_level: u8) -> Self {
        self.indent_level = indent_level.min(2);
        self
    }

    pub fn with_counts(mut self, current: u32, total: u32) -> Self {
        self.current_count = Some(current);
        self.total_count = Some(total);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
