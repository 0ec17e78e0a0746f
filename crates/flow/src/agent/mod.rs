//! Agent Collaborator Module
//!
//! The opaque units of work that stages call out to: LLM-backed crews and
//! the registry the engine resolves them through.

pub mod collaborator;
pub mod crew;
pub mod provider;
pub mod result;

pub use collaborator::{Collaborator, Collaborators, Inputs};
pub use crew::{Agent, Crew, OutputFormat, Task};
pub use provider::{create_provider, LLMConfig, LLMProvider, MockProvider, ScriptedProvider};
pub use result::{CrewOutput, Verification};
