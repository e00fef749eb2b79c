//! `QueueHandles` — the one `Arc<dyn Queue<_>>` per payload type that every
//! worker and action depends on (§4.4's queue name list, reused as the
//! `categorization` queue for completion-check sentinels per §4.10).

use std::sync::Arc;

use super::{InMemoryQueue, Queue};
use crate::types::{CompletionCheckJobData, ImageJobData, LineJobData, NotePipelineData, PatternTrackingJobData, SourceJobData};

#[derive(Clone)]
pub struct QueueHandles {
    pub note: Arc<dyn Queue<NotePipelineData>>,
    pub ingredient: Arc<dyn Queue<LineJobData>>,
    pub instruction: Arc<dyn Queue<LineJobData>>,
    pub image: Arc<dyn Queue<ImageJobData>>,
    pub source: Arc<dyn Queue<SourceJobData>>,
    /// Repurposed for `CompletionCheckJobData` sentinels: the spec's closed
    /// queue-name set has no dedicated completion-check queue, and this one
    /// otherwise has no payload of its own.
    pub categorization: Arc<dyn Queue<CompletionCheckJobData>>,
    pub pattern_tracking: Arc<dyn Queue<PatternTrackingJobData>>,
}

impl QueueHandles {
    pub fn in_memory() -> Self {
        Self {
            note: Arc::new(InMemoryQueue::new("note")),
            ingredient: Arc::new(InMemoryQueue::new("ingredient")),
            instruction: Arc::new(InMemoryQueue::new("instruction")),
            image: Arc::new(InMemoryQueue::new("image")),
            source: Arc::new(InMemoryQueue::new("source")),
            categorization: Arc::new(InMemoryQueue::new("categorization")),
            pattern_tracking: Arc::new(InMemoryQueue::new("pattern_tracking")),
        }
    }
}
