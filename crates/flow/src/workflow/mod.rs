pub mod builder;
pub mod context;
pub mod engine;
pub mod stage;
pub mod state;
pub mod trigger;

pub use builder::{FlowBuilder, FlowDefinition};
pub use context::FlowContext;
pub use engine::{Flow, RunReport};
pub use stage::{DynRouter, Outcome, Router, Stage, TypedRouter};
pub use state::RunState;
pub use trigger::{completion_event, or_, Listen, START};
