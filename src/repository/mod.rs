//! The persistence-layer interface the core consumes (§6 Repository interface).
//! The core never talks to a database directly — only through this trait — so
//! the pipeline's business logic is testable against `InMemoryRepository`.

pub mod in_memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::PipelineError;
use crate::types::ParsedFile;

pub use in_memory::InMemoryRepository;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedNote {
    pub id: String,
    pub title: String,
    pub evernote_metadata_id: Option<String>,
    pub parsed_ingredient_lines: Vec<String>,
    pub parsed_instruction_lines: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSummary {
    pub id: String,
    pub evernote_metadata_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateCheckResult {
    pub is_duplicate: bool,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionCompletionStatus {
    pub completed_instructions: u32,
    pub total_instructions: u32,
    pub progress: f32,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatedLine {
    pub id: String,
}

/// Opaque persistence operations the core calls (§6). Implementations own the
/// actual schema; the core treats every call as a named, typed RPC.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn create_note_with_evernote_metadata(
        &self,
        file: &ParsedFile,
    ) -> Result<CreatedNote, PipelineError>;

    async fn get_note_with_evernote_metadata(
        &self,
        note_id: &str,
    ) -> Result<Option<NoteSummary>, PipelineError>;

    fn is_valid_url(&self, value: &str) -> bool;

    async fn create_or_find_source_with_url(&self, url: &str) -> Result<String, PipelineError>;

    async fn create_or_find_source_with_book(&self, title: &str) -> Result<String, PipelineError>;

    async fn upsert_evernote_metadata_source(
        &self,
        metadata_id: &str,
        source: &str,
    ) -> Result<(), PipelineError>;

    async fn connect_note_to_source(&self, note_id: &str, source_id: &str) -> Result<(), PipelineError>;

    async fn update_instruction_line(
        &self,
        note_id: &str,
        line_index: usize,
        reference: &str,
        status: &str,
        is_active: bool,
    ) -> Result<UpdatedLine, PipelineError>;

    async fn get_instruction_completion_status(
        &self,
        note_id: &str,
    ) -> Result<InstructionCompletionStatus, PipelineError>;

    async fn get_notes(&self) -> Result<Vec<NoteSummary>, PipelineError>;

    async fn check_duplicate(&self, file: &ParsedFile) -> Result<DuplicateCheckResult, PipelineError>;
}
