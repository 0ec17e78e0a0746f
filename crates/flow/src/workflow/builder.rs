//! Flow definition and its builder.
//!
//! The builder collects stages with their trigger conditions and validates
//! the wiring once in [`FlowBuilder::build`]. The resulting
//! [`FlowDefinition`] is immutable and can be shared between runs.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    workflow::{
        stage::{DynRouter, Router, Stage, TypedRouter},
        trigger::{completion_event, DispatchTable, Listen, START},
    },
    Error, Result,
};

/// Upper bound on stage dispatches per run unless overridden.
pub const DEFAULT_MAX_DISPATCHES: usize = 1_000;

pub(crate) enum StageKind<S: Send> {
    Plain(Arc<dyn Stage<S>>),
    Router(Arc<dyn DynRouter<S>>),
}

pub(crate) struct StageEntry<S: Send> {
    pub(crate) name: String,
    pub(crate) kind: StageKind<S>,
    pub(crate) listens: Vec<Listen>,
}

impl<S: Send> StageEntry<S> {
    fn is_router(&self) -> bool {
        matches!(self.kind, StageKind::Router(_))
    }

    /// Events this entry can put on the queue.
    fn emits(&self) -> Vec<String> {
        match &self.kind {
            StageKind::Plain(_) => vec![completion_event(&self.name)],
            StageKind::Router(router) => router.declared_events(),
        }
    }
}

pub struct FlowBuilder<S: Send> {
    name: String,
    stages: Vec<StageEntry<S>>,
    terminals: Vec<String>,
    max_dispatches: usize,
}

impl<S: Send + 'static> FlowBuilder<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            terminals: Vec::new(),
            max_dispatches: DEFAULT_MAX_DISPATCHES,
        }
    }

    /// Register a stage that runs on the start event.
    pub fn start(self, stage: impl Stage<S> + 'static) -> Self {
        self.listen(stage, vec![Listen::Start])
    }

    /// Register a stage that runs when any of `on` is emitted.
    pub fn listen(mut self, stage: impl Stage<S> + 'static, on: Vec<Listen>) -> Self {
        let stage: Arc<dyn Stage<S>> = Arc::new(stage);
        self.stages.push(StageEntry {
            name: stage.name().to_string(),
            kind: StageKind::Plain(stage),
            listens: on,
        });
        self
    }

    /// Register a typed router.
    pub fn router<R>(self, router: R, on: Vec<Listen>) -> Self
    where
        R: Router<S> + 'static,
    {
        self.dyn_router(Arc::new(TypedRouter(router)), on)
    }

    /// Register a router whose outcomes are only known at runtime.
    pub fn dyn_router(mut self, router: Arc<dyn DynRouter<S>>, on: Vec<Listen>) -> Self {
        self.stages.push(StageEntry {
            name: router.name().to_string(),
            kind: StageKind::Router(router),
            listens: on,
        });
        self
    }

    /// Mark a stage whose completion ends the run.
    pub fn terminal(mut self, stage_name: impl Into<String>) -> Self {
        self.terminals.push(stage_name.into());
        self
    }

    pub fn max_dispatches(mut self, max: usize) -> Self {
        self.max_dispatches = max;
        self
    }

    /// Validate the wiring and freeze it into a definition.
    pub fn build(self) -> Result<FlowDefinition<S>> {
        if self.stages.is_empty() {
            return Err(Error::Config(format!("flow '{}' has no stages", self.name)));
        }
        if self.max_dispatches == 0 {
            return Err(Error::Config("max_dispatches must be at least 1".to_string()));
        }

        let mut names = HashSet::new();
        for entry in &self.stages {
            if !names.insert(entry.name.as_str()) {
                return Err(Error::Config(format!("duplicate stage name '{}'", entry.name)));
            }
            if entry.listens.is_empty() {
                return Err(Error::Config(format!(
                    "stage '{}' has no trigger condition",
                    entry.name
                )));
            }
        }

        let has_start = self.stages.iter().any(|entry| {
            entry
                .listens
                .iter()
                .any(|condition| condition.event_name() == START)
        });
        if !has_start {
            return Err(Error::Config(format!(
                "flow '{}' has no stage listening on '{}'",
                self.name, START
            )));
        }

        let mut emittable: HashSet<String> = HashSet::new();
        emittable.insert(START.to_string());
        for entry in &self.stages {
            let emits = entry.emits();
            if entry.is_router() && emits.is_empty() {
                return Err(Error::Config(format!(
                    "router '{}' declares no outcome events",
                    entry.name
                )));
            }
            emittable.extend(emits);
        }

        let mut table = DispatchTable::new();
        for (idx, entry) in self.stages.iter().enumerate() {
            for condition in &entry.listens {
                if let Listen::After(predecessor) = condition {
                    if !names.contains(predecessor.as_str()) {
                        return Err(Error::Config(format!(
                            "stage '{}' listens after nonexistent stage '{}'",
                            entry.name, predecessor
                        )));
                    }
                }
                let event = condition.event_name();
                if !emittable.contains(&event) {
                    return Err(Error::Config(format!(
                        "stage '{}' listens on '{}', which nothing emits",
                        entry.name, event
                    )));
                }
                table.bind(event, idx);
            }
        }

        let mut terminals = HashSet::new();
        for terminal in &self.terminals {
            let idx = self
                .stages
                .iter()
                .position(|entry| &entry.name == terminal)
                .ok_or_else(|| {
                    Error::Config(format!("terminal stage '{}' is not registered", terminal))
                })?;
            terminals.insert(idx);
        }

        for entry in self.stages.iter().filter(|entry| entry.is_router()) {
            for event in entry.emits() {
                if !table.contains(&event) {
                    warn!(
                        router = %entry.name,
                        event = %event,
                        "router outcome has no listener; emitting it ends the branch"
                    );
                }
            }
        }

        debug!(flow = %self.name, stages = self.stages.len(), "flow definition built");

        Ok(FlowDefinition {
            name: self.name,
            stages: self.stages,
            table,
            terminals,
            max_dispatches: self.max_dispatches,
        })
    }
}

/// Immutable, validated stage registry plus dispatch table.
pub struct FlowDefinition<S: Send> {
    name: String,
    pub(crate) stages: Vec<StageEntry<S>>,
    pub(crate) table: DispatchTable,
    terminals: HashSet<usize>,
    max_dispatches: usize,
}

impl<S: Send> FlowDefinition<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_dispatches(&self) -> usize {
        self.max_dispatches
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|entry| entry.name.as_str()).collect()
    }

    /// Stages triggered by `event`, in dispatch order.
    pub fn triggered_by(&self, event: &str) -> Vec<&str> {
        self.table
            .stages_for(event)
            .iter()
            .map(|&idx| self.stages[idx].name.as_str())
            .collect()
    }

    pub(crate) fn is_terminal(&self, idx: usize) -> bool {
        self.terminals.contains(&idx)
    }

    /// Render the wiring as a Mermaid flowchart.
    pub fn plot(&self) -> String {
        let mut out = String::from("flowchart TD\n");
        out.push_str(&format!("    {}(({}))\n", START, START));

        for (idx, entry) in self.stages.iter().enumerate() {
            let node = if entry.is_router() {
                format!("{}{{{}}}", entry.name, entry.name)
            } else if self.is_terminal(idx) {
                format!("{}[[{}]]", entry.name, entry.name)
            } else {
                format!("{}[{}]", entry.name, entry.name)
            };
            out.push_str(&format!("    {}\n", node));
        }

        for entry in &self.stages {
            for condition in &entry.listens {
                let event = condition.event_name();
                for source in self.sources_of(condition) {
                    out.push_str(&format!("    {} -->|{}| {}\n", source, event, entry.name));
                }
            }
        }
        out
    }

    fn sources_of<'a>(&'a self, condition: &'a Listen) -> Vec<&'a str> {
        match condition {
            Listen::Start => vec![START],
            Listen::After(stage) => vec![stage.as_str()],
            Listen::Event(event) => self
                .stages
                .iter()
                .filter(|entry| entry.is_router() && entry.emits().contains(event))
                .map(|entry| entry.name.as_str())
                .collect(),
        }
    }
}
