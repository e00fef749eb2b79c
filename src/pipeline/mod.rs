//! Pipeline Builder (§4.3): pure functions from a job payload and a factory
//! to an ordered action sequence. Consults only the payload and the factory —
//! no I/O, no dependency on worker state.

use crate::action::ActionFactory;
use crate::core::errors::PipelineError;
use crate::types::{CompletionCheckJobData, ImageJobData, LineJobData, LineKind, NotePipelineData, PatternTrackingJobData, SourceJobData};

use crate::action::Action;

/// `clean_html -> parse_html -> save_note ->` (if not `skipFollowupTasks`)
/// `schedule_all_followup_tasks -> check_duplicates -> wait_for_categorization
/// -> mark_note_worker_completed`.
///
/// Testable scenario 3 pins the skip case to a *three*-step pipeline (the
/// downstream duplicate/categorization/completion steps never run either),
/// which this follows over the more literal reading of §4.3's numbered list.
pub fn build_note_pipeline(
    factory: &ActionFactory<NotePipelineData>,
    payload: &NotePipelineData,
) -> Result<Vec<Box<dyn Action<NotePipelineData>>>, PipelineError> {
    let mut names = vec!["clean_html", "parse_html", "save_note"];
    if !payload.options.skip_followup_tasks {
        names.extend(["schedule_all_followup_tasks", "check_duplicates", "wait_for_categorization", "mark_note_worker_completed"]);
    }
    names.into_iter().map(|name| factory.create(name)).collect()
}

pub fn build_ingredient_pipeline(
    factory: &ActionFactory<LineJobData>,
    _payload: &LineJobData,
) -> Result<Vec<Box<dyn Action<LineJobData>>>, PipelineError> {
    ["parse_ingredient_line"].into_iter().map(|name| factory.create(name)).collect()
}

pub fn build_instruction_pipeline(
    factory: &ActionFactory<LineJobData>,
    _payload: &LineJobData,
) -> Result<Vec<Box<dyn Action<LineJobData>>>, PipelineError> {
    ["format_instruction_line", "save_instruction_line"].into_iter().map(|name| factory.create(name)).collect()
}

pub fn build_image_pipeline(
    factory: &ActionFactory<ImageJobData>,
    _payload: &ImageJobData,
) -> Result<Vec<Box<dyn Action<ImageJobData>>>, PipelineError> {
    ["process_image"].into_iter().map(|name| factory.create(name)).collect()
}

pub fn build_source_pipeline(
    factory: &ActionFactory<SourceJobData>,
    _payload: &SourceJobData,
) -> Result<Vec<Box<dyn Action<SourceJobData>>>, PipelineError> {
    ["process_source"].into_iter().map(|name| factory.create(name)).collect()
}

pub fn build_categorization_pipeline(
    factory: &ActionFactory<CompletionCheckJobData>,
    payload: &CompletionCheckJobData,
) -> Result<Vec<Box<dyn Action<CompletionCheckJobData>>>, PipelineError> {
    let name = match payload.kind {
        LineKind::Ingredient => "check_ingredient_completion",
        LineKind::Instruction => "check_instruction_completion",
    };
    [name].into_iter().map(|name| factory.create(name)).collect()
}

pub fn build_pattern_tracking_pipeline(
    factory: &ActionFactory<PatternTrackingJobData>,
    _payload: &PatternTrackingJobData,
) -> Result<Vec<Box<dyn Action<PatternTrackingJobData>>>, PipelineError> {
    ["track_pattern"].into_iter().map(|name| factory.create(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::WorkerDeps;
    use crate::types::{ActionContext, PipelineOptions};
    use async_trait::async_trait;

    struct Noop(&'static str);

    #[async_trait]
    impl Action<NotePipelineData> for Noop {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn execute(&self, data: NotePipelineData, _deps: &WorkerDeps, _ctx: &ActionContext) -> Result<NotePipelineData, PipelineError> {
            Ok(data)
        }
    }

    fn factory() -> ActionFactory<NotePipelineData> {
        let mut factory = ActionFactory::new();
        for name in [
            "clean_html",
            "parse_html",
            "save_note",
            "schedule_all_followup_tasks",
            "check_duplicates",
            "wait_for_categorization",
            "mark_note_worker_completed",
        ] {
            factory.register(name, Box::new(move || Box::new(Noop(name)))).unwrap();
        }
        factory
    }

    #[test]
    fn full_pipeline_has_seven_steps() {
        let factory = factory();
        let payload = NotePipelineData::new("<html></html>");
        let pipeline = build_note_pipeline(&factory, &payload).unwrap();
        assert_eq!(pipeline.len(), 7);
    }

    #[test]
    fn skip_followup_tasks_truncates_to_three_steps() {
        let factory = factory();
        let payload = NotePipelineData::new("<html></html>").with_options(PipelineOptions {
            skip_followup_tasks: true,
            ..Default::default()
        });
        let pipeline = build_note_pipeline(&factory, &payload).unwrap();
        let names: Vec<_> = pipeline.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["clean_html", "parse_html", "save_note"]);
    }
}
