use std::collections::VecDeque;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::{
    metrics,
    workflow::{
        builder::{FlowDefinition, StageEntry, StageKind},
        trigger::{completion_event, START},
        FlowContext, RunState,
    },
    Error, Result,
};

/// One run of a flow definition. Owns its shared state exclusively.
pub struct Flow<S: Send> {
    definition: Arc<FlowDefinition<S>>,
    state: S,
    context: FlowContext,
    status: RunState,
}

/// What a finished run leaves behind.
#[derive(Debug, Clone)]
pub struct RunReport<S> {
    pub run_id: Uuid,
    pub flow: String,
    pub status: RunState,
    /// Every emitted event, in dispatch order, starting with `start`
    pub events: Vec<String>,
    /// Event that triggered the terminal stage, if one finished
    pub terminal_event: Option<String>,
    pub dispatches: usize,
    pub state: S,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl<S> RunReport<S> {
    pub fn reached(&self, event: &str) -> bool {
        self.terminal_event.as_deref() == Some(event)
    }
}

impl<S: Send + Default + 'static> Flow<S> {
    /// Start a run with the state at its defaults.
    pub fn new(definition: Arc<FlowDefinition<S>>, context: FlowContext) -> Self {
        Self::with_state(definition, S::default(), context)
    }
}

impl<S: Send + 'static> Flow<S> {
    pub fn with_state(definition: Arc<FlowDefinition<S>>, state: S, context: FlowContext) -> Self {
        Self {
            definition,
            state,
            context,
            status: RunState::Pending,
        }
    }

    pub fn status(&self) -> RunState {
        self.status
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Drive the run from `start` until a terminal stage finishes or no
    /// stage is triggered.
    ///
    /// A stage failure aborts the run and leaves the flow `Failed`, with the
    /// state as the failing stage left it. A flow runs at most once.
    pub async fn kickoff(&mut self) -> Result<RunReport<S>>
    where
        S: Clone,
    {
        if self.status != RunState::Pending {
            return Err(Error::Execution(format!(
                "flow '{}' run {} was already started ({})",
                self.definition.name(),
                self.context.run_id(),
                self.status
            )));
        }

        let span = info_span!(
            "flow_run",
            run_id = %self.context.run_id(),
            flow = %self.definition.name()
        );
        match self.run().instrument(span).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.status = RunState::Failed;
                metrics::RUNS_TOTAL.with_label_values(&["failed"]).inc();
                Err(e)
            }
        }
    }

    async fn run(&mut self) -> Result<RunReport<S>>
    where
        S: Clone,
    {
        let definition = Arc::clone(&self.definition);
        let started_at = Utc::now();
        self.status = RunState::Running;
        info!("Starting flow run");

        let mut queue = VecDeque::from([START.to_string()]);
        let mut events = Vec::new();
        let mut dispatches = 0usize;
        let mut terminal_event = None;

        'dispatch: while let Some(event) = queue.pop_front() {
            events.push(event.clone());

            let triggered = definition.table.stages_for(&event);
            if triggered.is_empty() {
                debug!(event = %event, "Event triggers no stage");
                continue;
            }

            for &idx in triggered {
                dispatches += 1;
                if dispatches > definition.max_dispatches() {
                    return Err(Error::Execution(format!(
                        "flow '{}' exceeded {} stage dispatches",
                        definition.name(),
                        definition.max_dispatches()
                    )));
                }

                let entry = &definition.stages[idx];
                let next = self.dispatch(entry, &event).await.map_err(|e| {
                    error!(stage = %entry.name, error = %e, "Stage failed, aborting run");
                    e
                })?;

                if definition.is_terminal(idx) {
                    info!(stage = %entry.name, event = %event, "Terminal stage finished");
                    terminal_event = Some(event.clone());
                    break 'dispatch;
                }
                queue.push_back(next);
            }
        }

        self.status = RunState::Completed;
        let outcome = terminal_event.as_deref().unwrap_or("stalled");
        metrics::RUNS_TOTAL.with_label_values(&[outcome]).inc();
        info!(
            terminal_event = outcome,
            events = events.len(),
            dispatches,
            status = %self.status,
            "Flow run completed"
        );

        Ok(RunReport {
            run_id: self.context.run_id(),
            flow: definition.name().to_string(),
            status: self.status,
            events,
            terminal_event,
            dispatches,
            state: self.state.clone(),
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Run one stage and return the event it emits.
    async fn dispatch(&mut self, entry: &StageEntry<S>, trigger: &str) -> Result<String> {
        debug!(stage = %entry.name, trigger = %trigger, "Dispatching stage");
        self.context.set_current_stage(&entry.name);
        metrics::STAGE_EXECUTIONS_TOTAL
            .with_label_values(&[entry.name.as_str()])
            .inc();

        match &entry.kind {
            StageKind::Plain(stage) => {
                stage
                    .execute(&mut self.state, &self.context)
                    .await
                    .map_err(|e| wrap_stage_error(&entry.name, e))?;
                Ok(completion_event(&entry.name))
            }
            StageKind::Router(router) => {
                let event = router
                    .route_event(&mut self.state, &self.context)
                    .await
                    .map_err(|e| wrap_stage_error(&entry.name, e))?;

                if !router.declared_events().contains(&event) {
                    return Err(Error::Config(format!(
                        "router '{}' returned undeclared event '{}'",
                        entry.name, event
                    )));
                }
                metrics::ROUTER_DECISIONS_TOTAL
                    .with_label_values(&[entry.name.as_str(), event.as_str()])
                    .inc();
                Ok(event)
            }
        }
    }
}

fn wrap_stage_error(stage: &str, e: Error) -> Error {
    match e {
        already @ Error::Stage { .. } => already,
        Error::Config(msg) => Error::Config(msg),
        other => Error::in_stage(stage, other),
    }
}
