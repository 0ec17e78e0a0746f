use tracing::debug;
use uuid::Uuid;

use crate::{
    agent::{Collaborators, CrewOutput, Inputs},
    Result,
};

/// Per-run context handed to every stage alongside the shared state.
///
/// Holds the definition-time inputs (topic and friends) and the collaborator
/// registry. Stages never get a reference to another run's context.
#[derive(Clone)]
pub struct FlowContext {
    /// Identifies this run in logs
    run_id: Uuid,

    /// Inputs fixed for the whole run
    inputs: Inputs,

    /// External units of work the stages may invoke
    collaborators: Collaborators,

    /// Stage currently being dispatched, recorded on collaborator calls
    current_stage: Option<String>,
}

impl FlowContext {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            inputs: Inputs::new(),
            collaborators,
            current_stage: None,
        }
    }

    pub fn with_input(mut self, key: &str, value: impl Into<String>) -> Self {
        self.inputs.insert(key.to_string(), value.into());
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn input(&self, key: &str) -> Option<&str> {
        self.inputs.get(key).map(String::as_str)
    }

    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Invoke a collaborator with the run inputs merged under `extra`.
    ///
    /// Keys in `extra` win over run inputs of the same name.
    pub async fn invoke(&self, collaborator: &str, extra: Inputs) -> Result<CrewOutput> {
        let inputs = self.merged(extra);
        debug!(
            stage = self.current_stage.as_deref().unwrap_or("-"),
            collaborator = %collaborator,
            inputs = inputs.len(),
            "Stage calling collaborator"
        );
        self.collaborators.invoke(collaborator, &inputs).await
    }

    fn merged(&self, extra: Inputs) -> Inputs {
        let mut inputs = self.inputs.clone();
        inputs.extend(extra);
        inputs
    }

    pub(crate) fn set_current_stage(&mut self, stage_name: &str) {
        self.current_stage = Some(stage_name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_inputs_override_run_inputs() {
        let ctx = FlowContext::new(Collaborators::new())
            .with_input("topic", "Rust")
            .with_input("feedback", "");

        let mut extra = Inputs::new();
        extra.insert("feedback".to_string(), "Shorter".to_string());
        let merged = ctx.merged(extra);

        assert_eq!(ctx.input("topic"), Some("Rust"));
        assert_eq!(ctx.input("missing"), None);
        assert_eq!(merged.get("topic").map(String::as_str), Some("Rust"));
        assert_eq!(merged.get("feedback").map(String::as_str), Some("Shorter"));
        assert_eq!(ctx.inputs().len(), 2);
    }

    #[test]
    fn test_runs_get_distinct_ids() {
        let a = FlowContext::new(Collaborators::new());
        let b = FlowContext::new(Collaborators::new());
        assert_ne!(a.run_id(), b.run_id());
    }
}
