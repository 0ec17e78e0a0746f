//! Crew definitions for the verified-article flow.

use std::sync::Arc;

use crate::{
    agent::{create_provider, Agent, Collaborators, Crew, LLMConfig, LLMProvider, Task},
    config::LlmSettings,
    Error, Result,
};

pub const RESEARCH_CREW: &str = "research_crew";
pub const WRITER_CREW: &str = "writer_crew";
pub const EDITOR_CREW: &str = "editor_crew";

/// Shape the editor must answer with.
pub const VERIFICATION_SHAPE: &str = r#"{"valid": true | false, "feedback": "string or null"}"#;

pub fn researcher() -> Agent {
    Agent::new(
        "Researcher",
        "Get the latest research on {topic}",
        "Driven by curiosity, you're at the forefront of innovation, eager to explore \
         and share knowledge that could change the world.",
    )
}

pub fn research_task() -> Task {
    Task::new(
        "Identify the latest research in {topic}. Your final report should clearly \
         articulate the key points as bullets.",
        "A succinct report on {topic}.",
        researcher(),
    )
}

pub fn article_writer() -> Agent {
    Agent::new(
        "Article Writer",
        "Write a great article on {topic}",
        "Driven by a love of writing and passion for innovation, you are eager to share \
         knowledge with the world.",
    )
}

pub fn write_task() -> Task {
    Task::new(
        "Write an article on {topic}. Your article should be engaging, informative, and \
         accurate based on the following research: {report}\n\
         Please incorporate the following feedback if present: {feedback}",
        "A comprehensive article no more than 4 paragraphs long on {topic}. Should cover \
         at least 4 categories or concepts of {topic}.",
        article_writer(),
    )
}

pub fn article_editor() -> Agent {
    Agent::new(
        "Editor",
        "Proofread an article on {topic} to meet strict guidelines.",
        "You are a careful reviewer, skilled at understanding the core message of an \
         article. Your job is to maintain the clarity and brevity of an article ensuring \
         it contains no emojis, unnecessary commentary, or excessive verbosity.",
    )
}

pub fn proofread_task() -> Task {
    Task::new(
        "Verify that the article on {topic} meets the following criteria:\n\
         - No more than four paragraphs long.\n\
         - Covers at least 4 categories or concepts of {topic}.\n\
         - It contains no emojis.\n\
         - It contains only the article itself, without additional commentary.\n\
         - Includes one bold statement to hook the reader.\n\
         If any of the criteria are not met, the article is invalid. Provide actionable \
         changes about what is wrong and what needs to be done to fix it.\n\
         Article to verify:\n{article}",
        "Valid: true/false. Feedback: commentary if the article failed any criterion.",
        article_editor(),
    )
    .json(VERIFICATION_SHAPE)
}

/// Assemble the three crews over the given providers.
pub fn collaborators_with(
    research: Arc<dyn LLMProvider>,
    writer: Arc<dyn LLMProvider>,
    editor: Arc<dyn LLMProvider>,
) -> Collaborators {
    Collaborators::new()
        .with(RESEARCH_CREW, Crew::new(RESEARCH_CREW, research).task(research_task()))
        .with(WRITER_CREW, Crew::new(WRITER_CREW, writer).task(write_task()))
        .with(EDITOR_CREW, Crew::new(EDITOR_CREW, editor).task(proofread_task()))
}

/// Assemble the crews from configured providers.
pub fn build_collaborators(llm: &LlmSettings) -> Result<Collaborators> {
    Ok(collaborators_with(
        provider(&llm.research())?,
        provider(&llm.writer())?,
        provider(&llm.editor())?,
    ))
}

fn provider(config: &LLMConfig) -> Result<Arc<dyn LLMProvider>> {
    create_provider(config).map_err(|e| Error::Provider(format!("{:#}", e)))
}
