//! Agents, tasks and crews
//!
//! A [`Crew`] runs its tasks sequentially against one LLM provider. Each
//! task's answer is handed to the next task as context, and the last answer
//! becomes the crew's [`CrewOutput`].

use anyhow::{bail, Context as _};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    collaborator::{Collaborator, Inputs},
    provider::LLMProvider,
    result::{extract_json, CrewOutput},
};
use crate::template::render_template;

/// Marker line appended to prompts that expect a JSON answer.
pub const JSON_INSTRUCTION: &str = "Respond only with a JSON object of this shape";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub role: String,
    pub goal: String,
    pub backstory: String,
}

impl Agent {
    pub fn new(role: &str, goal: &str, backstory: &str) -> Self {
        Self {
            role: role.to_string(),
            goal: goal.to_string(),
            backstory: backstory.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Text,
    /// Ask for JSON matching the described shape and parse the reply
    Json { shape: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub description: String,
    pub expected_output: String,
    pub agent: Agent,
    #[serde(default)]
    pub output: OutputFormat,
}

impl Task {
    pub fn new(description: &str, expected_output: &str, agent: Agent) -> Self {
        Self {
            description: description.to_string(),
            expected_output: expected_output.to_string(),
            agent,
            output: OutputFormat::Text,
        }
    }

    pub fn json(mut self, shape: &str) -> Self {
        self.output = OutputFormat::Json {
            shape: shape.to_string(),
        };
        self
    }
}

pub struct Crew {
    name: String,
    tasks: Vec<Task>,
    provider: Arc<dyn LLMProvider>,
}

impl Crew {
    pub fn new(name: &str, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            name: name.to_string(),
            tasks: Vec::new(),
            provider,
        }
    }

    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn build_prompt(
        &self,
        task: &Task,
        inputs: &serde_json::Value,
        context: Option<&str>,
    ) -> crate::Result<String> {
        let role = render_template(&task.agent.role, inputs)?;
        let goal = render_template(&task.agent.goal, inputs)?;
        let backstory = render_template(&task.agent.backstory, inputs)?;
        let description = render_template(&task.description, inputs)?;
        let expected = render_template(&task.expected_output, inputs)?;

        let mut prompt = format!(
            "You are {}. {}\nYour personal goal is: {}\n\nTask: {}\n\n\
             This is the expected criteria for your final answer: {}\n",
            role, backstory, goal, description, expected
        );

        if let Some(context) = context {
            prompt.push_str("\nThis is the context you're working with:\n");
            prompt.push_str(context);
            prompt.push('\n');
        }

        if let OutputFormat::Json { shape } = &task.output {
            prompt.push_str(&format!("\n{}: {}\n", JSON_INSTRUCTION, shape));
        }

        Ok(prompt)
    }
}

#[async_trait]
impl Collaborator for Crew {
    async fn invoke(&self, inputs: &Inputs) -> anyhow::Result<CrewOutput> {
        if self.tasks.is_empty() {
            bail!("crew '{}' has no tasks", self.name);
        }
        info!(crew = %self.name, tasks = self.tasks.len(), "Crew kickoff");

        let values = serde_json::to_value(inputs)?;
        let mut previous: Option<String> = None;

        for (idx, task) in self.tasks.iter().enumerate() {
            let prompt = self.build_prompt(task, &values, previous.as_deref())?;
            debug!(crew = %self.name, task = idx, prompt_len = prompt.len(), "Prompting agent");

            let reply = self
                .provider
                .prompt(&prompt)
                .await
                .with_context(|| format!("task {} of crew '{}'", idx + 1, self.name))?;
            previous = Some(reply);
        }

        let raw = previous.unwrap_or_default();
        let mut output = CrewOutput::text(raw.trim());

        if let Some(Task { output: OutputFormat::Json { .. }, .. }) = self.tasks.last() {
            match extract_json(&raw) {
                Some(value) => output = output.with_structured(value),
                None => bail!("crew '{}' expected a JSON answer, got: {}", self.name, raw),
            }
        }

        Ok(output)
    }
}
