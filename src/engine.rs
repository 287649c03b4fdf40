//! Run engine seam.

use async_trait::async_trait;

use crate::types::{EventLog, Job};

/// Identifier of a run accepted by the engine. Returned for tracing only;
/// the dispatcher never consumes it beyond logging.
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub run_id: String,
}

/// External subsystem that executes a job's task graph.
///
/// `trigger_run` is a one-way hand-off: implementations must only enqueue
/// the run (mailbox send, task spawn) and return once it is accepted.
/// Run execution, retries, and run-state durability are the engine's
/// concern; the dispatcher never awaits completion and cannot deadlock on
/// a slow or stuck run.
#[async_trait]
pub trait RunEngine: Send + Sync {
    /// Seed a run of `job` from the given event log.
    async fn trigger_run(&self, job: Job, log: EventLog) -> RunHandle;
}
