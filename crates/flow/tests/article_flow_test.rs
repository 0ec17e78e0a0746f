use async_trait::async_trait;
use reflect_flow::{
    agent::{Collaborator, Collaborators, CrewOutput, Inputs, ScriptedProvider},
    article::{
        self,
        crews::{self, EDITOR_CREW, RESEARCH_CREW, WRITER_CREW},
        ArticleState,
    },
    config::FlowConfig,
    sinks::{FileSink, Sink},
    workflow::{Flow, RunReport, RunState},
    Error,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Replays verdicts and counts invocations.
struct Editor {
    verdicts: Mutex<VecDeque<bool>>,
    calls: Arc<AtomicUsize>,
}

impl Editor {
    fn new(verdicts: &[bool]) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let editor = Self {
            verdicts: Mutex::new(verdicts.iter().copied().collect()),
            calls: calls.clone(),
        };
        (editor, calls)
    }
}

#[async_trait]
impl Collaborator for Editor {
    async fn invoke(&self, inputs: &Inputs) -> anyhow::Result<CrewOutput> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        assert_eq!(inputs.get("article").map(String::as_str), Some(format!("draft {}", n).as_str()));
        let valid = self
            .verdicts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("editor called more often than scripted"))?;
        let feedback = format!("feedback {}", n);
        Ok(CrewOutput::verdict(valid, if valid { None } else { Some(feedback.as_str()) }))
    }
}

/// Produces "draft N" on its N-th call.
struct Writer {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Collaborator for Writer {
    async fn invoke(&self, inputs: &Inputs) -> anyhow::Result<CrewOutput> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        assert_eq!(inputs.get("report").map(String::as_str), Some("research report"));
        if n > 1 {
            let expected = format!("feedback {}", n - 1);
            assert_eq!(inputs.get("feedback").map(String::as_str), Some(expected.as_str()));
        }
        Ok(CrewOutput::text(format!("draft {}", n)))
    }
}

struct Researcher;

#[async_trait]
impl Collaborator for Researcher {
    async fn invoke(&self, inputs: &Inputs) -> anyhow::Result<CrewOutput> {
        assert_eq!(inputs.get("topic").map(String::as_str), Some("Agentic AI"));
        Ok(CrewOutput::text("research report"))
    }
}

struct Broken;

#[async_trait]
impl Collaborator for Broken {
    async fn invoke(&self, _inputs: &Inputs) -> anyhow::Result<CrewOutput> {
        Err(anyhow::anyhow!("upstream 503"))
    }
}

#[derive(Default)]
struct MemorySink {
    sent: Mutex<Vec<String>>,
}

impl MemorySink {
    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send(&self, content: &str) -> reflect_flow::Result<()> {
        self.sent.lock().unwrap().push(content.to_string());
        Ok(())
    }
}

struct Harness {
    artifact: Arc<MemorySink>,
    report: Arc<MemorySink>,
    editor_calls: Arc<AtomicUsize>,
    writer_calls: Arc<AtomicUsize>,
}

fn flow_config(max_retries: u32) -> FlowConfig {
    FlowConfig {
        topic: "Agentic AI".to_string(),
        max_retries,
        max_dispatches: 1_000,
    }
}

async fn run_with(
    max_retries: u32,
    verdicts: &[bool],
) -> (reflect_flow::Result<RunReport<ArticleState>>, Harness) {
    let artifact = Arc::new(MemorySink::default());
    let report = Arc::new(MemorySink::default());
    let definition = article::build_flow(&flow_config(max_retries), artifact.clone(), report.clone())
        .expect("flow builds");

    let (editor, editor_calls) = Editor::new(verdicts);
    let writer_calls = Arc::new(AtomicUsize::new(0));
    let collaborators = Collaborators::new()
        .with(RESEARCH_CREW, Researcher)
        .with(WRITER_CREW, Writer { calls: writer_calls.clone() })
        .with(EDITOR_CREW, editor);

    let mut flow = Flow::<ArticleState>::new(
        Arc::new(definition),
        article::run_context("Agentic AI", collaborators),
    );
    let result = flow.kickoff().await;

    (
        result,
        Harness {
            artifact,
            report,
            editor_calls,
            writer_calls,
        },
    )
}

#[tokio::test]
async fn test_valid_on_fourth_review_writes_artifact() {
    let (result, harness) = run_with(3, &[false, false, false, true]).await;
    let report = result.unwrap();

    assert_eq!(
        report.events,
        vec![
            "start",
            "research completed",
            "write_article completed",
            "retry",
            "write_article completed",
            "retry",
            "write_article completed",
            "retry",
            "write_article completed",
            "completed",
        ]
    );
    assert_eq!(report.status, RunState::Completed);
    assert!(report.reached("completed"));
    assert_eq!(report.state.retry_count, 4);
    assert!(report.state.valid);
    assert_eq!(report.state.article, "draft 4");
    assert_eq!(harness.artifact.sent(), vec!["draft 4".to_string()]);
    assert!(harness.report.sent().is_empty());
    assert_eq!(harness.editor_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_never_valid_ends_in_max_retry_exceeded() {
    let (result, harness) = run_with(3, &[false, false, false, false]).await;
    let report = result.unwrap();

    assert!(report.reached("max_retry_exceeded"));
    assert_eq!(
        report.events,
        vec![
            "start",
            "research completed",
            "write_article completed",
            "retry",
            "write_article completed",
            "retry",
            "write_article completed",
            "retry",
            "write_article completed",
            "retry",
            "write_article completed",
            "max_retry_exceeded",
        ]
    );
    assert_eq!(report.state.retry_count, 4);
    assert!(!report.state.valid);
    // Guard trips before a fifth review is requested
    assert_eq!(harness.editor_calls.load(Ordering::SeqCst), 4);
    // max_retries + 2: the last draft is written before the guard trips
    assert_eq!(harness.writer_calls.load(Ordering::SeqCst), 5);
    assert!(harness.artifact.sent().is_empty());

    let diagnosis = harness.report.sent();
    assert_eq!(diagnosis.len(), 1);
    assert!(diagnosis[0].contains("article: draft 5"));
    assert!(diagnosis[0].contains("feedback: feedback 4"));
}

#[tokio::test]
async fn test_first_review_valid() {
    let (result, harness) = run_with(3, &[true]).await;
    let report = result.unwrap();

    assert_eq!(
        report.events,
        vec!["start", "research completed", "write_article completed", "completed"]
    );
    assert_eq!(report.state.retry_count, 1);
    assert_eq!(harness.artifact.sent(), vec!["draft 1".to_string()]);
}

#[tokio::test]
async fn test_zero_retries_allows_one_review() {
    let (result, harness) = run_with(0, &[false]).await;
    let report = result.unwrap();

    assert!(report.reached("max_retry_exceeded"));
    assert_eq!(report.state.retry_count, 1);
    assert_eq!(harness.editor_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_review_budget_across_ceilings() {
    for max_retries in 0..5u32 {
        let budget = max_retries as usize + 1;

        // Never valid: exactly max_retries + 1 reviews.
        let (result, harness) = run_with(max_retries, &vec![false; budget]).await;
        let report = result.unwrap();
        assert!(report.reached("max_retry_exceeded"));
        assert_eq!(report.state.retry_count, max_retries + 1);
        assert_eq!(harness.editor_calls.load(Ordering::SeqCst), budget);
        assert_eq!(harness.writer_calls.load(Ordering::SeqCst), budget + 1);

        // Valid on review k: stops right there.
        for k in 1..=budget {
            let mut verdicts = vec![false; k - 1];
            verdicts.push(true);
            let (result, harness) = run_with(max_retries, &verdicts).await;
            let report = result.unwrap();
            assert!(report.reached("completed"));
            assert_eq!(report.state.retry_count as usize, k);
            assert_eq!(harness.editor_calls.load(Ordering::SeqCst), k);
            assert_eq!(harness.artifact.sent(), vec![report.state.article.clone()]);
        }
    }
}

#[tokio::test]
async fn test_replay_is_deterministic() {
    let verdicts = [false, false, true];
    let (first, _) = run_with(3, &verdicts).await;
    let (second, _) = run_with(3, &verdicts).await;
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first.events, second.events);
    assert_eq!(first.state, second.state);
    assert_eq!(first.dispatches, second.dispatches);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn test_collaborator_failure_aborts_run() {
    let artifact = Arc::new(MemorySink::default());
    let definition = article::build_flow(
        &flow_config(3),
        artifact.clone(),
        Arc::new(MemorySink::default()),
    )
    .unwrap();
    let collaborators = Collaborators::new()
        .with(RESEARCH_CREW, Researcher)
        .with(WRITER_CREW, Broken)
        .with(EDITOR_CREW, Broken);

    let mut flow = Flow::<ArticleState>::new(
        Arc::new(definition),
        article::run_context("Agentic AI", collaborators),
    );
    let err = flow.kickoff().await.unwrap_err();

    assert_eq!(flow.status(), RunState::Failed);
    assert_eq!(flow.state().report, "research report");
    assert_eq!(flow.state().retry_count, 0);

    match &err {
        Error::Stage { stage, source } => {
            assert_eq!(stage, "write_article");
            assert!(matches!(
                source.as_ref(),
                Error::Collaborator { collaborator, message }
                    if collaborator == WRITER_CREW && message.contains("503")
            ));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(artifact.sent().is_empty());
}

#[tokio::test]
async fn test_independent_runs_share_definition() {
    let artifact = Arc::new(MemorySink::default());
    let definition = Arc::new(
        article::build_flow(&flow_config(3), artifact.clone(), Arc::new(MemorySink::default()))
            .unwrap(),
    );

    let mut handles = Vec::new();
    for verdicts in [vec![true], vec![false, true], vec![false, false, true]] {
        let definition = definition.clone();
        handles.push(tokio::spawn(async move {
            let (editor, _) = Editor::new(&verdicts);
            let collaborators = Collaborators::new()
                .with(RESEARCH_CREW, Researcher)
                .with(WRITER_CREW, Writer { calls: Arc::new(AtomicUsize::new(0)) })
                .with(EDITOR_CREW, editor);
            let mut flow = Flow::<ArticleState>::new(
                definition,
                article::run_context("Agentic AI", collaborators),
            );
            flow.kickoff().await
        }));
    }

    let mut retry_counts = Vec::new();
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert!(report.reached("completed"));
        retry_counts.push(report.state.retry_count);
    }
    assert_eq!(retry_counts, vec![1, 2, 3]);

    let mut written = artifact.sent();
    written.sort();
    assert_eq!(written, vec!["draft 1", "draft 2", "draft 3"]);
}

#[tokio::test]
async fn test_end_to_end_through_crews() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("article.txt");

    let research = Arc::new(ScriptedProvider::new(["- agents reflect\n- agents plan"]));
    let writer = Arc::new(ScriptedProvider::new(["First draft", "**Bold** second draft"]));
    let editor = Arc::new(ScriptedProvider::new([
        r#"{"valid": false, "feedback": "Add a bold hook"}"#,
        r#"```json
{"valid": true, "feedback": null}
```"#,
    ]));

    let definition = article::build_flow(
        &flow_config(3),
        Arc::new(FileSink::new(&path)),
        Arc::new(MemorySink::default()),
    )
    .unwrap();
    let collaborators = crews::collaborators_with(research.clone(), writer.clone(), editor.clone());

    let report = Flow::<ArticleState>::new(
        Arc::new(definition),
        article::run_context("Agentic AI", collaborators),
    )
    .kickoff()
    .await
    .unwrap();

    assert!(report.reached("completed"));
    assert_eq!(report.state.retry_count, 2);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "**Bold** second draft");

    let research_prompts = research.prompts();
    assert!(research_prompts[0].contains("latest research in Agentic AI"));

    let writer_prompts = writer.prompts();
    assert!(writer_prompts[0].contains("- agents reflect"));
    assert!(writer_prompts[1].contains("Add a bold hook"));

    let editor_prompts = editor.prompts();
    assert_eq!(editor_prompts.len(), 2);
    assert!(editor_prompts[1].contains("**Bold** second draft"));
}
