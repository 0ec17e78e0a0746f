use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec_with_registry, Encoder, IntCounterVec, Registry, TextEncoder,
};

use crate::{Error, Result};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref STAGE_EXECUTIONS_TOTAL: IntCounterVec =
        register_int_counter_vec_with_registry!(
            "reflectflow_stage_executions_total",
            "Total number of stage dispatches.",
            &["stage"],
            REGISTRY
        ).unwrap();
    pub static ref ROUTER_DECISIONS_TOTAL: IntCounterVec =
        register_int_counter_vec_with_registry!(
            "reflectflow_router_decisions_total",
            "Total number of events returned by routers.",
            &["router", "event"],
            REGISTRY
        ).unwrap();
    pub static ref RUNS_TOTAL: IntCounterVec =
        register_int_counter_vec_with_registry!(
            "reflectflow_runs_total",
            "Total number of finished flow runs by outcome.",
            &["outcome"],
            REGISTRY
        ).unwrap();
    pub static ref COLLABORATOR_FAILURES_TOTAL: IntCounterVec =
        register_int_counter_vec_with_registry!(
            "reflectflow_collaborator_failures_total",
            "Total number of failed collaborator invocations.",
            &["collaborator"],
            REGISTRY
        ).unwrap();
}

// Gather metrics in the text exposition format
pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| Error::Execution(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| Error::Execution(format!("Metrics are not valid UTF-8: {}", e)))
}
