//! Collaborator boundary
//!
//! A collaborator is an opaque, possibly slow unit of work (a crew of LLM
//! agents in practice). Stages reach collaborators only through the
//! [`Collaborators`] registry, which turns failures into [`Error::Collaborator`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

use super::result::CrewOutput;
use crate::{metrics, Error, Result};

/// Named string inputs for one invocation.
pub type Inputs = HashMap<String, String>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Run the unit of work. Transport retries, if any, belong in here.
    async fn invoke(&self, inputs: &Inputs) -> anyhow::Result<CrewOutput>;
}

/// Registry of collaborators by id. Cheap to clone.
#[derive(Clone, Default)]
pub struct Collaborators {
    entries: HashMap<String, Arc<dyn Collaborator>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: &str, collaborator: Arc<dyn Collaborator>) {
        self.entries.insert(id.to_string(), collaborator);
    }

    pub fn with(mut self, id: &str, collaborator: impl Collaborator + 'static) -> Self {
        self.register(id, Arc::new(collaborator));
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Invoke a collaborator by id and wait for its result.
    pub async fn invoke(&self, id: &str, inputs: &Inputs) -> Result<CrewOutput> {
        let collaborator = self
            .entries
            .get(id)
            .ok_or_else(|| Error::Config(format!("no collaborator registered as '{}'", id)))?;

        debug!(collaborator = %id, "Invoking collaborator");
        collaborator.invoke(inputs).await.map_err(|e| {
            error!(collaborator = %id, error = %e, "Collaborator failed");
            metrics::COLLABORATOR_FAILURES_TOTAL
                .with_label_values(&[id])
                .inc();
            Error::Collaborator {
                collaborator: id.to_string(),
                message: format!("{:#}", e),
            }
        })
    }
}
