//! Trigger rules and the event dispatch table.

use std::collections::HashMap;

/// System event fired once when a run starts.
pub const START: &str = "start";

/// Name of the event emitted when a plain stage finishes.
pub fn completion_event(stage: &str) -> String {
    format!("{} completed", stage)
}

/// One condition a stage listens on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Listen {
    /// The run's start event.
    Start,
    /// A user-defined event, usually returned by a router.
    Event(String),
    /// Completion of the named stage.
    After(String),
}

impl Listen {
    pub fn event(name: impl Into<String>) -> Self {
        Listen::Event(name.into())
    }

    pub fn after(stage: impl Into<String>) -> Self {
        Listen::After(stage.into())
    }

    /// The concrete event name this condition matches.
    pub fn event_name(&self) -> String {
        match self {
            Listen::Start => START.to_string(),
            Listen::Event(name) => name.clone(),
            Listen::After(stage) => completion_event(stage),
        }
    }
}

/// Combine conditions with "any of" semantics.
pub fn or_(conditions: impl IntoIterator<Item = Listen>) -> Vec<Listen> {
    conditions.into_iter().collect()
}

/// Event name -> stage indices, in registration order.
#[derive(Debug, Default, Clone)]
pub struct DispatchTable {
    routes: HashMap<String, Vec<usize>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a stage to an event. Binding the same pair twice is a no-op.
    pub fn bind(&mut self, event: String, stage: usize) {
        let stages = self.routes.entry(event).or_default();
        if !stages.contains(&stage) {
            stages.push(stage);
        }
    }

    pub fn stages_for(&self, event: &str) -> &[usize] {
        self.routes.get(event).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, event: &str) -> bool {
        self.routes.contains_key(event)
    }

    /// Every bound event name, sorted for stable output.
    pub fn events(&self) -> Vec<&str> {
        let mut events: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        events.sort_unstable();
        events
    }
}
