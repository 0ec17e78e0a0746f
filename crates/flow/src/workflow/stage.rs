//! Stage and router contracts.
//!
//! A plain [`Stage`] mutates the shared state and implicitly emits
//! `"<name> completed"`. A [`Router`] instead returns one outcome from a
//! closed enum, and the engine emits exactly that outcome's event.

use async_trait::async_trait;
use std::fmt;

use crate::{workflow::FlowContext, Result};

#[async_trait]
pub trait Stage<S: Send>: Send + Sync {
    fn name(&self) -> &str;

    /// Run the stage. Re-invocation on a retry path must be safe.
    async fn execute(&self, state: &mut S, ctx: &FlowContext) -> Result<()>;
}

/// Closed set of events a router may emit.
pub trait Outcome: Copy + fmt::Debug + Send + Sync + 'static {
    /// Every variant, used to declare the router's event set up front.
    fn all() -> &'static [Self];

    fn event(&self) -> &'static str;
}

#[async_trait]
pub trait Router<S: Send>: Send + Sync {
    type Outcome: Outcome;

    fn name(&self) -> &str;

    async fn route(&self, state: &mut S, ctx: &FlowContext) -> Result<Self::Outcome>;
}

/// Object-safe router view held by the engine.
///
/// Implement this directly only when outcomes are not known statically; the
/// engine rejects any returned event outside `declared_events`.
#[async_trait]
pub trait DynRouter<S: Send>: Send + Sync {
    fn name(&self) -> &str;

    fn declared_events(&self) -> Vec<String>;

    async fn route_event(&self, state: &mut S, ctx: &FlowContext) -> Result<String>;
}

/// Adapts a typed [`Router`] to [`DynRouter`].
pub struct TypedRouter<R>(pub R);

#[async_trait]
impl<S, R> DynRouter<S> for TypedRouter<R>
where
    S: Send,
    R: Router<S>,
{
    fn name(&self) -> &str {
        self.0.name()
    }

    fn declared_events(&self) -> Vec<String> {
        R::Outcome::all()
            .iter()
            .map(|outcome| outcome.event().to_string())
            .collect()
    }

    async fn route_event(&self, state: &mut S, ctx: &FlowContext) -> Result<String> {
        let outcome = self.0.route(state, ctx).await?;
        Ok(outcome.event().to_string())
    }
}
