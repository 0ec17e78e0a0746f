//! Verified-article flow
//!
//! research -> write_article -> validate_article, looping back to the writer
//! on `retry` until the editor approves (`completed`) or the retry budget is
//! spent (`max_retry_exceeded`).

pub mod crews;
pub mod stages;
pub mod state;

use std::sync::Arc;

use crate::{
    agent::Collaborators,
    config::FlowConfig,
    sinks::Sink,
    workflow::{or_, FlowBuilder, FlowContext, FlowDefinition, Listen, Outcome},
    Result,
};

pub use stages::{
    ArticleRoute, MaxRetryExceededExit, Research, SaveResult, ValidateArticle, WriteArticle,
    MAX_RETRY_EXCEEDED_EXIT, RESEARCH, SAVE_RESULT, VALIDATE_ARTICLE, WRITE_ARTICLE,
};
pub use state::ArticleState;

pub const FLOW_NAME: &str = "verified_article";

/// Wire the verified-article stages.
///
/// `artifact` receives the accepted article, `report` the diagnosis when the
/// retry budget runs out.
pub fn build_flow(
    config: &FlowConfig,
    artifact: Arc<dyn Sink>,
    report: Arc<dyn Sink>,
) -> Result<FlowDefinition<ArticleState>> {
    FlowBuilder::new(FLOW_NAME)
        .start(Research)
        .listen(
            WriteArticle,
            or_([
                Listen::after(RESEARCH),
                Listen::event(ArticleRoute::Retry.event()),
            ]),
        )
        .router(
            ValidateArticle::new(config.max_retries),
            vec![Listen::after(WRITE_ARTICLE)],
        )
        .listen(
            SaveResult::new(artifact),
            vec![Listen::event(ArticleRoute::Completed.event())],
        )
        .listen(
            MaxRetryExceededExit::new(report),
            vec![Listen::event(ArticleRoute::MaxRetryExceeded.event())],
        )
        .terminal(SAVE_RESULT)
        .terminal(MAX_RETRY_EXCEEDED_EXIT)
        .max_dispatches(config.max_dispatches)
        .build()
}

/// Per-run context carrying the topic.
pub fn run_context(topic: &str, collaborators: Collaborators) -> FlowContext {
    FlowContext::new(collaborators).with_input("topic", topic)
}
