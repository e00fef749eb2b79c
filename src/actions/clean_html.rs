//! `clean_html` (§4.1): strips `<style>`/`<script>` blocks before parsing.
//! Full HTML-dialect handling is an external collaborator (§1); this is the
//! minimal pre-parse pass the core owns directly.

use async_trait::async_trait;

use crate::action::{execute_service_action, Action, ServiceActionOptions, WorkerDeps};
use crate::core::errors::PipelineError;
use crate::types::{ActionContext, NotePipelineData, StatusEvent};

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_lowercase().find(&needle.to_lowercase())
}

fn strip_tag_blocks(html: &str, tag: &str) -> String {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut result = String::new();
    let mut rest = html;
    loop {
        match find_ci(rest, &open) {
            Some(start) => {
                result.push_str(&rest[..start]);
                match find_ci(&rest[start..], &close) {
                    Some(close_rel) => {
                        rest = &rest[start + close_rel + close.len()..];
                    }
                    None => {
                        rest = "";
                        break;
                    }
                }
            }
            None => {
                result.push_str(rest);
                rest = "";
                break;
            }
        }
    }
    result
}

pub fn clean_html_content(html: &str) -> String {
    let cleaned = strip_tag_blocks(html, "style");
    strip_tag_blocks(&cleaned, "script")
}

pub struct CleanHtml;

#[async_trait]
impl Action<NotePipelineData> for CleanHtml {
    fn name(&self) -> &'static str {
        "clean_html"
    }

    fn validate_input(&self, data: &NotePipelineData) -> Result<(), PipelineError> {
        if data.content.trim().is_empty() {
            return Err(PipelineError::invalid_input("clean_html requires non-empty content"));
        }
        Ok(())
    }

    async fn execute(&self, mut data: NotePipelineData, deps: &WorkerDeps, _ctx: &ActionContext) -> Result<NotePipelineData, PipelineError> {
        let content = data.content.clone();
        let cleaned = execute_service_action(
            &deps.broadcaster,
            data.import_id.clone(),
            data.note_id.clone(),
            ServiceActionOptions {
                context_name: "clean_html",
                complete_context: None,
                start_message: "Cleaning HTML",
                completion_message: "HTML cleaned",
                suppress_default_broadcast: false,
            },
            || async move { Ok(clean_html_content(&content)) },
            None::<fn(&String) -> Vec<StatusEvent>>,
        )
        .await?;

        data.content = cleaned;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_style_blocks() {
        let html = "<html><style>body{color:red}</style><body>hi</body></html>";
        assert_eq!(clean_html_content(html), "<html><body>hi</body></html>");
    }

    #[test]
    fn strips_script_blocks() {
        let html = "<p>a</p><script>alert(1)</script><p>b</p>";
        assert_eq!(clean_html_content(html), "<p>a</p><p>b</p>");
    }

    #[test]
    fn content_without_style_or_script_is_unchanged() {
        let html = "<h1>T</h1>";
        assert_eq!(clean_html_content(html), html);
    }
}
