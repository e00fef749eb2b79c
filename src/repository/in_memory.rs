//! `InMemoryRepository` — a fake of the Repository interface used by tests and
//! the demo binary. Never a real database (out of scope per §1).

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::core::errors::PipelineError;
use crate::types::ParsedFile;

use super::{
    CreatedNote, DuplicateCheckResult, InstructionCompletionStatus, NoteSummary, Repository,
    UpdatedLine,
};

#[derive(Debug, Clone)]
struct StoredNote {
    title: String,
    evernote_metadata_id: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredInstructionLine {
    reference: String,
    status: String,
    is_active: bool,
}

#[derive(Default)]
pub struct InMemoryRepository {
    notes: DashMap<String, StoredNote>,
    sources_by_url: DashMap<String, String>,
    sources_by_book: DashMap<String, String>,
    evernote_metadata_sources: DashMap<String, String>,
    note_sources: DashMap<String, String>,
    instruction_lines: DashMap<(String, usize), StoredInstructionLine>,
    note_counter: AtomicU64,
    source_counter: AtomicU64,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_note_id(&self) -> String {
        format!("note-{}", self.note_counter.fetch_add(1, Ordering::SeqCst))
    }

    fn next_source_id(&self) -> String {
        format!("source-{}", self.source_counter.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_note_with_evernote_metadata(
        &self,
        file: &ParsedFile,
    ) -> Result<CreatedNote, PipelineError> {
        let id = self.next_note_id();
        let evernote_metadata_id = Some(format!("{}-evernote", id));
        self.notes.insert(
            id.clone(),
            StoredNote {
                title: file.title.clone(),
                evernote_metadata_id: evernote_metadata_id.clone(),
            },
        );

        let now = Utc::now();
        Ok(CreatedNote {
            id: id.clone(),
            title: file.title.clone(),
            evernote_metadata_id,
            parsed_ingredient_lines: file
                .ingredients
                .iter()
                .map(|line| format!("{}-ingredient-{}", id, line.line_index))
                .collect(),
            parsed_instruction_lines: file
                .instructions
                .iter()
                .map(|line| format!("{}-instruction-{}", id, line.line_index))
                .collect(),
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    async fn get_note_with_evernote_metadata(
        &self,
        note_id: &str,
    ) -> Result<Option<NoteSummary>, PipelineError> {
        Ok(self.notes.get(note_id).map(|entry| NoteSummary {
            id: note_id.to_string(),
            evernote_metadata_id: entry.evernote_metadata_id.clone(),
        }))
    }

    fn is_valid_url(&self, value: &str) -> bool {
        url::Url::parse(value).is_ok()
    }

    async fn create_or_find_source_with_url(&self, url: &str) -> Result<String, PipelineError> {
        if let Some(existing) = self.sources_by_url.get(url) {
            return Ok(existing.clone());
        }
        let id = self.next_source_id();
        self.sources_by_url.insert(url.to_string(), id.clone());
        Ok(id)
    }

    async fn create_or_find_source_with_book(&self, title: &str) -> Result<String, PipelineError> {
        if let Some(existing) = self.sources_by_book.get(title) {
            return Ok(existing.clone());
        }
        let id = self.next_source_id();
        self.sources_by_book.insert(title.to_string(), id.clone());
        Ok(id)
    }

    async fn upsert_evernote_metadata_source(
        &self,
        metadata_id: &str,
        source: &str,
    ) -> Result<(), PipelineError> {
        self.evernote_metadata_sources
            .insert(metadata_id.to_string(), source.to_string());
        Ok(())
    }

    async fn connect_note_to_source(&self, note_id: &str, source_id: &str) -> Result<(), PipelineError> {
        self.note_sources.insert(note_id.to_string(), source_id.to_string());
        Ok(())
    }

    async fn update_instruction_line(
        &self,
        note_id: &str,
        line_index: usize,
        reference: &str,
        status: &str,
        is_active: bool,
    ) -> Result<UpdatedLine, PipelineError> {
        let key = (note_id.to_string(), line_index);
        self.instruction_lines.insert(
            key,
            StoredInstructionLine {
                reference: reference.to_string(),
                status: status.to_string(),
                is_active,
            },
        );
        Ok(UpdatedLine {
            id: format!("{}-instruction-{}", note_id, line_index),
        })
    }

    async fn get_instruction_completion_status(
        &self,
        note_id: &str,
    ) -> Result<InstructionCompletionStatus, PipelineError> {
        let lines: Vec<_> = self
            .instruction_lines
            .iter()
            .filter(|entry| entry.key().0 == note_id)
            .map(|entry| entry.value().clone())
            .collect();
        let total = lines.len() as u32;
        let completed = lines.iter().filter(|l| l.status == "completed" && l.is_active).count() as u32;
        let progress = if total == 0 { 1.0 } else { completed as f32 / total as f32 };
        Ok(InstructionCompletionStatus {
            completed_instructions: completed,
            total_instructions: total,
            progress,
            is_complete: total == 0 || completed == total,
        })
    }

    async fn get_notes(&self) -> Result<Vec<NoteSummary>, PipelineError> {
        Ok(self
            .notes
            .iter()
            .map(|entry| NoteSummary {
                id: entry.key().clone(),
                evernote_metadata_id: entry.value().evernote_metadata_id.clone(),
            })
            .collect())
    }

    async fn check_duplicate(&self, file: &ParsedFile) -> Result<DuplicateCheckResult, PipelineError> {
        let candidates: Vec<String> = self
            .notes
            .iter()
            .filter(|entry| entry.value().title == file.title)
            .map(|entry| entry.key().clone())
            .collect();
        Ok(DuplicateCheckResult {
            is_duplicate: !candidates.is_empty(),
            candidates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EvernoteMetadata;

    fn sample_file(title: &str) -> ParsedFile {
        ParsedFile {
            title: title.to_string(),
            cleaned_contents: "<p>hi</p>".to_string(),
            image_ref: None,
            ingredients: vec![],
            instructions: vec![],
            evernote_metadata: EvernoteMetadata::default(),
        }
    }

    #[tokio::test]
    async fn create_or_find_source_with_url_is_idempotent() {
        let repo = InMemoryRepository::new();
        let a = repo.create_or_find_source_with_url("https://example.com").await.unwrap();
        let b = repo.create_or_find_source_with_url("https://example.com").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn check_duplicate_detects_same_title() {
        let repo = InMemoryRepository::new();
        repo.create_note_with_evernote_metadata(&sample_file("Soup")).await.unwrap();
        let result = repo.check_duplicate(&sample_file("Soup")).await.unwrap();
        assert!(result.is_duplicate);
        assert_eq!(result.candidates.len(), 1);
    }

    #[tokio::test]
    async fn check_duplicate_no_match_for_new_title() {
        let repo = InMemoryRepository::new();
        repo.create_note_with_evernote_metadata(&sample_file("Soup")).await.unwrap();
        let result = repo.check_duplicate(&sample_file("Salad")).await.unwrap();
        assert!(!result.is_duplicate);
    }

    #[test]
    fn is_valid_url_rejects_plain_titles() {
        let repo = InMemoryRepository::new();
        assert!(repo.is_valid_url("https://www.example.com/recipe"));
        assert!(!repo.is_valid_url("The Joy of Cooking"));
    }
}
