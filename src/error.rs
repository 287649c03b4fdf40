//! Caller-visible failures of the listener surface.

use crate::types::JobId;

/// Errors surfaced by [`LogListener`](crate::LogListener) operations.
///
/// Anything that happens inside the per-notification dispatch loop is
/// isolated to that notification and reported through logging instead;
/// only startup, registration, and lifecycle misuse reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The job store could not serve the startup job load. Fatal to
    /// `start`; nothing was registered.
    #[error("job store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),

    /// The chain subscription service rejected a watch registration for
    /// the named job. Earlier registrations stay active.
    #[error("subscription failed for job {job_id}: {cause:#}")]
    SubscriptionFailed { job_id: JobId, cause: anyhow::Error },

    /// `start` was called while a dispatcher is already running.
    #[error("listener already started")]
    AlreadyStarted,

    /// `add_job` was called without a running dispatcher to deliver to.
    #[error("listener is not running")]
    NotRunning,
}
