//! `parse_html` (§4.1): extracts title, ingredient/instruction lines, and an
//! optional image reference from cleaned HTML. The ingredient/instruction
//! grammar itself is an external collaborator (§1); this is a minimal but
//! real structural extraction, not a stub.

use async_trait::async_trait;

use crate::action::{execute_service_action, Action, ServiceActionOptions, WorkerDeps};
use crate::core::errors::PipelineError;
use crate::types::{ActionContext, EventStatus, IngredientLine, InstructionLine, NotePipelineData, ParsedFile, StatusEvent};

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_lowercase().find(&needle.to_lowercase())
}

fn extract_tag_text(html: &str, tag: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let start = find_ci(html, &open)?;
    let tag_end = html[start..].find('>')? + start + 1;
    let end_rel = find_ci(&html[tag_end..], &close)?;
    Some(html[tag_end..tag_end + end_rel].to_string())
}

fn extract_list_items(html: &str, list_tag: &str) -> Vec<String> {
    let Some(body) = extract_tag_text(html, list_tag) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut rest = body.as_str();
    loop {
        let Some(start) = find_ci(rest, "<li") else { break };
        let Some(gt) = rest[start..].find('>') else { break };
        let content_start = start + gt + 1;
        let Some(end_rel) = find_ci(&rest[content_start..], "</li>") else { break };
        let text = rest[content_start..content_start + end_rel].trim().to_string();
        if !text.is_empty() {
            items.push(text);
        }
        rest = &rest[content_start + end_rel + "</li>".len()..];
    }
    items
}

fn extract_image_ref(html: &str) -> Option<String> {
    let start = find_ci(html, "<img")?;
    let tag_end = html[start..].find('>')? + start;
    let tag = &html[start..=tag_end];
    let src_pos = find_ci(tag, "src=")?;
    let after = &tag[src_pos + "src=".len()..];
    let quote = after.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let rest = &after[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

pub fn parse_html_content(html: &str) -> ParsedFile {
    let title = extract_tag_text(html, "h1").unwrap_or_default().trim().to_string();
    let ingredients = extract_list_items(html, "ul")
        .into_iter()
        .enumerate()
        .map(|(line_index, reference)| IngredientLine { reference, block_index: 0, line_index })
        .collect();
    let instructions = extract_list_items(html, "ol")
        .into_iter()
        .enumerate()
        .map(|(line_index, reference)| InstructionLine { reference, line_index })
        .collect();

    ParsedFile {
        title,
        cleaned_contents: html.to_string(),
        image_ref: extract_image_ref(html),
        ingredients,
        instructions,
        evernote_metadata: Default::default(),
    }
}

pub struct ParseHtml;

#[async_trait]
impl Action<NotePipelineData> for ParseHtml {
    fn name(&self) -> &'static str {
        "parse_html"
    }

    fn validate_input(&self, data: &NotePipelineData) -> Result<(), PipelineError> {
        if data.content.trim().is_empty() {
            return Err(PipelineError::invalid_input("parse_html requires non-empty content"));
        }
        Ok(())
    }

    async fn execute(&self, mut data: NotePipelineData, deps: &WorkerDeps, _ctx: &ActionContext) -> Result<NotePipelineData, PipelineError> {
        let content = data.content.clone();
        let import_id = data.import_id.clone();
        let note_id = data.note_id.clone();
        let broadcast_import_id = data.import_id.clone();
        let broadcast_note_id = data.note_id.clone();

        let file = execute_service_action(
            &deps.broadcaster,
            import_id,
            note_id,
            ServiceActionOptions {
                context_name: "parse_html_start",
                complete_context: Some("parse_html_complete"),
                start_message: "Parsing HTML",
                completion_message: "HTML parsed",
                suppress_default_broadcast: false,
            },
            || async move { Ok(parse_html_content(&content)) },
            Some(move |file: &ParsedFile| {
                vec![
                    StatusEvent::new(EventStatus::Pending, "parse_html_ingredients", format!("0/{} ingredients", file.ingredients.len()))
                        .with_import_id(broadcast_import_id.clone())
                        .with_note_id(broadcast_note_id.clone())
                        .with_indent(2)
                        .with_counts(0, file.ingredients.len() as u32),
                    StatusEvent::new(EventStatus::Pending, "parse_html_instructions", format!("0/{} instructions", file.instructions.len()))
                        .with_import_id(broadcast_import_id.clone())
                        .with_note_id(broadcast_note_id.clone())
                        .with_indent(2)
                        .with_counts(0, file.instructions.len() as u32),
                ]
            }),
        )
        .await?;

        data.file = Some(file);
        Ok(data)
    }
}
