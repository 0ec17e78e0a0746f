use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    crews::{EDITOR_CREW, RESEARCH_CREW, WRITER_CREW},
    state::ArticleState,
};
use crate::{
    agent::Inputs,
    sinks::Sink,
    workflow::{FlowContext, Outcome, Router, Stage},
    Error, Result,
};

pub const RESEARCH: &str = "research";
pub const WRITE_ARTICLE: &str = "write_article";
pub const VALIDATE_ARTICLE: &str = "validate_article";
pub const SAVE_RESULT: &str = "save_result";
pub const MAX_RETRY_EXCEEDED_EXIT: &str = "max_retry_exceeded_exit";

fn log_decision(event: &str, state: &ArticleState) {
    info!(
        event = event,
        retry_count = state.retry_count,
        valid = state.valid,
        feedback_present = state.feedback_present(),
        "Routing decision"
    );
}

/// Fills `report` from the research crew.
pub struct Research;

#[async_trait]
impl Stage<ArticleState> for Research {
    fn name(&self) -> &str {
        RESEARCH
    }

    async fn execute(&self, state: &mut ArticleState, ctx: &FlowContext) -> Result<()> {
        let output = ctx.invoke(RESEARCH_CREW, Inputs::new()).await?;
        state.report = output.raw;
        Ok(())
    }
}

/// Drafts `article` from the report and any editor feedback.
pub struct WriteArticle;

#[async_trait]
impl Stage<ArticleState> for WriteArticle {
    fn name(&self) -> &str {
        WRITE_ARTICLE
    }

    async fn execute(&self, state: &mut ArticleState, ctx: &FlowContext) -> Result<()> {
        let mut inputs = Inputs::new();
        inputs.insert("report".to_string(), state.report.clone());
        inputs.insert(
            "feedback".to_string(),
            state.feedback.clone().unwrap_or_default(),
        );

        let output = ctx.invoke(WRITER_CREW, inputs).await?;
        state.article = output.raw;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleRoute {
    Completed,
    Retry,
    MaxRetryExceeded,
}

impl Outcome for ArticleRoute {
    fn all() -> &'static [Self] {
        &[
            ArticleRoute::Completed,
            ArticleRoute::Retry,
            ArticleRoute::MaxRetryExceeded,
        ]
    }

    fn event(&self) -> &'static str {
        match self {
            ArticleRoute::Completed => "completed",
            ArticleRoute::Retry => "retry",
            ArticleRoute::MaxRetryExceeded => "max_retry_exceeded",
        }
    }
}

/// Sends the draft to the editor crew and routes on its verdict.
pub struct ValidateArticle {
    max_retries: u32,
}

impl ValidateArticle {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }
}

#[async_trait]
impl Router<ArticleState> for ValidateArticle {
    type Outcome = ArticleRoute;

    fn name(&self) -> &str {
        VALIDATE_ARTICLE
    }

    async fn route(&self, state: &mut ArticleState, ctx: &FlowContext) -> Result<ArticleRoute> {
        // Budget check comes before the editor call.
        if state.retry_count > self.max_retries {
            let route = ArticleRoute::MaxRetryExceeded;
            log_decision(route.event(), state);
            return Ok(route);
        }

        let mut inputs = Inputs::new();
        inputs.insert("article".to_string(), state.article.clone());
        let output = ctx.invoke(EDITOR_CREW, inputs).await?;
        let verdict = output.verification().map_err(|e| Error::Collaborator {
            collaborator: EDITOR_CREW.to_string(),
            message: format!("malformed verdict: {}", e),
        })?;

        state.valid = verdict.valid;
        state.feedback = verdict.feedback;
        state.retry_count += 1;

        let route = if state.valid {
            ArticleRoute::Completed
        } else {
            ArticleRoute::Retry
        };
        log_decision(route.event(), state);
        Ok(route)
    }
}

/// Persists the accepted article.
pub struct SaveResult {
    sink: Arc<dyn Sink>,
}

impl SaveResult {
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Stage<ArticleState> for SaveResult {
    fn name(&self) -> &str {
        SAVE_RESULT
    }

    async fn execute(&self, state: &mut ArticleState, _ctx: &FlowContext) -> Result<()> {
        info!(
            event = ArticleRoute::Completed.event(),
            retry_count = state.retry_count,
            valid = state.valid,
            feedback_present = state.feedback_present(),
            sink = self.sink.name(),
            "Article is valid"
        );
        self.sink.send(&state.article).await
    }
}

/// Reports the last draft and feedback once the retry budget is spent.
pub struct MaxRetryExceededExit {
    sink: Arc<dyn Sink>,
}

impl MaxRetryExceededExit {
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Stage<ArticleState> for MaxRetryExceededExit {
    fn name(&self) -> &str {
        MAX_RETRY_EXCEEDED_EXIT
    }

    async fn execute(&self, state: &mut ArticleState, _ctx: &FlowContext) -> Result<()> {
        warn!(
            event = ArticleRoute::MaxRetryExceeded.event(),
            retry_count = state.retry_count,
            valid = state.valid,
            feedback_present = state.feedback_present(),
            "Max retry count exceeded"
        );
        let report = format!(
            "Max retry count exceeded\narticle: {}\nfeedback: {}",
            state.article,
            state.feedback.as_deref().unwrap_or("")
        );
        self.sink.send(&report).await
    }
}
