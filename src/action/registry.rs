//! `ActionFactory<D>` — one per payload type, holding `name -> constructor`
//! and instantiating actions bound to a `WorkerDeps` (§4.2).

use std::collections::{HashMap, HashSet};

use crate::core::errors::PipelineError;

use super::Action;

pub type ActionConstructor<D> = Box<dyn Fn() -> Box<dyn Action<D>> + Send + Sync>;

pub struct ActionFactory<D> {
    constructors: HashMap<&'static str, ActionConstructor<D>>,
}

impl<D: Send + Sync + 'static> ActionFactory<D> {
    pub fn new() -> Self {
        Self { constructors: HashMap::new() }
    }

    /// Errors on a duplicate name; the existing registration is left untouched.
    pub fn register(&mut self, name: &'static str, ctor: ActionConstructor<D>) -> Result<(), PipelineError> {
        if self.constructors.contains_key(name) {
            return Err(PipelineError::ProgrammingError(format!("action '{}' already registered", name)));
        }
        self.constructors.insert(name, ctor);
        Ok(())
    }

    /// Registers a batch atomically: if any name collides (with an existing
    /// registration or another entry in the same batch), none of the batch
    /// becomes visible.
    pub fn register_actions(&mut self, batch: Vec<(&'static str, ActionConstructor<D>)>) -> Result<(), PipelineError> {
        let mut seen = HashSet::new();
        for (name, _) in &batch {
            if self.constructors.contains_key(name) {
                return Err(PipelineError::ProgrammingError(format!("action '{}' already registered", name)));
            }
            if !seen.insert(*name) {
                return Err(PipelineError::ProgrammingError(format!("action '{}' registered twice in the same batch", name)));
            }
        }
        for (name, ctor) in batch {
            self.constructors.insert(name, ctor);
        }
        Ok(())
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Action<D>>, PipelineError> {
        let ctor = self
            .constructors
            .get(name)
            .ok_or_else(|| PipelineError::MissingDependency(format!("no action registered for '{}'", name)))?;
        Ok(ctor())
    }
}

impl<D: Send + Sync + 'static> Default for ActionFactory<D> {
    fn default() -> Self {
        Self::new()
    }
}
