//! Demo binary: assembles a `DependencyContainer`, starts one worker per
//! queue, and drives a single recipe note through the pipeline end to end.
//! The HTTP/WebSocket layer that would normally forward `StatusBroadcaster`
//! events to a client is an external collaborator (§1) and out of scope here;
//! this binary just subscribes in-process and logs what it sees.

use std::time::Duration;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use recipe_pipeline::container::DependencyContainer;
use recipe_pipeline::pipeline;
use recipe_pipeline::queue::JobOptions;
use recipe_pipeline::types::{EventStatus, NotePipelineData};
use recipe_pipeline::worker::Worker;

const DEMO_HTML: &str = r#"<html>
<style>.recipe { color: red; }</style>
<body>
<h1>Tomato Soup</h1>
<ul>
<li>1 cup flour</li>
<li>2 eggs</li>
</ul>
<ol>
<li> Mix ingredients  </li>
<li>Bake at 350F</li>
</ol>
</body>
</html>"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,recipe_pipeline=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting recipe ingestion pipeline demo");

    let container = DependencyContainer::assemble()?;
    let deps = container.deps.clone();

    let mut handles = Vec::new();

    let note_worker = Worker::new(
        "note-worker-1",
        deps.queues.note.clone(),
        container.note_action_factory()?,
        deps.clone(),
        Box::new(pipeline::build_note_pipeline),
        container.shutdown_signal(),
    );
    handles.push(tokio::spawn(note_worker.run()));

    let ingredient_worker = Worker::new(
        "ingredient-worker-1",
        deps.queues.ingredient.clone(),
        container.line_action_factory()?,
        deps.clone(),
        Box::new(pipeline::build_ingredient_pipeline),
        container.shutdown_signal(),
    );
    handles.push(tokio::spawn(ingredient_worker.run()));

    let instruction_worker = Worker::new(
        "instruction-worker-1",
        deps.queues.instruction.clone(),
        container.line_action_factory()?,
        deps.clone(),
        Box::new(pipeline::build_instruction_pipeline),
        container.shutdown_signal(),
    );
    handles.push(tokio::spawn(instruction_worker.run()));

    let image_worker = Worker::new(
        "image-worker-1",
        deps.queues.image.clone(),
        container.image_action_factory()?,
        deps.clone(),
        Box::new(pipeline::build_image_pipeline),
        container.shutdown_signal(),
    );
    handles.push(tokio::spawn(image_worker.run()));

    let source_worker = Worker::new(
        "source-worker-1",
        deps.queues.source.clone(),
        container.source_action_factory()?,
        deps.clone(),
        Box::new(pipeline::build_source_pipeline),
        container.shutdown_signal(),
    );
    handles.push(tokio::spawn(source_worker.run()));

    let categorization_worker = Worker::new(
        "categorization-worker-1",
        deps.queues.categorization.clone(),
        container.categorization_action_factory()?,
        deps.clone(),
        Box::new(pipeline::build_categorization_pipeline),
        container.shutdown_signal(),
    );
    handles.push(tokio::spawn(categorization_worker.run()));

    let pattern_worker = Worker::new(
        "pattern-tracking-worker-1",
        deps.queues.pattern_tracking.clone(),
        container.pattern_tracking_action_factory()?,
        deps.clone(),
        Box::new(pipeline::build_pattern_tracking_pipeline),
        container.shutdown_signal(),
    );
    handles.push(tokio::spawn(pattern_worker.run()));

    let import_id = "imp-demo";
    let mut events = deps.broadcaster.subscribe(import_id);

    let job = NotePipelineData::new(DEMO_HTML).with_import_id(import_id);
    deps.queues
        .note
        .add(
            "clean_html",
            job,
            JobOptions { job_id: Some("demo-note-1".to_string()), ..Default::default() },
        )
        .await?;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            tracing::warn!("demo note did not reach a terminal state within the timeout");
            break;
        }

        match tokio::time::timeout(remaining, events.recv()).await {
            Ok(Ok(event)) => {
                tracing::info!(context = %event.context, status = ?event.status, message = %event.message, "status event");
                if event.context == "mark_note_worker_completed" && event.status == EventStatus::Completed {
                    break;
                }
            }
            Ok(Err(_)) => break,
            Err(_) => {
                tracing::warn!("demo note did not reach a terminal state within the timeout");
                break;
            }
        }
    }

    container.close().await;
    for handle in handles {
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    }

    tracing::info!("recipe ingestion pipeline demo finished");
    Ok(())
}
