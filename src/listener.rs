//! Listener lifecycle: startup, watcher registration, shutdown.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::dispatch::Dispatcher;
use crate::engine::RunEngine;
use crate::error::ListenerError;
use crate::store::JobStore;
use crate::subscriber::{ChainSubscriber, NotificationSender};
use crate::types::{Job, WatcherKind};
use crate::ListenerConfig;

/// Live resources of a started listener: the queue's producer half, the
/// shutdown token, and the consumer task.
struct Active {
    queue: NotificationSender,
    shutdown: CancellationToken,
    dispatcher: Dispatcher,
}

/// The listener core: owns the notification queue and dispatcher task,
/// registers job watchers against the chain subscription service, and
/// bridges matched events into run triggers.
///
/// All process-wide state lives on this handle; create one, `start` it,
/// and `stop` it when done.
pub struct LogListener {
    store: Arc<dyn JobStore>,
    subscriber: Arc<dyn ChainSubscriber>,
    engine: Arc<dyn RunEngine>,
    config: ListenerConfig,
    active: Option<Active>,
}

impl LogListener {
    pub fn new(
        store: Arc<dyn JobStore>,
        subscriber: Arc<dyn ChainSubscriber>,
        engine: Arc<dyn RunEngine>,
        config: ListenerConfig,
    ) -> Self {
        Self {
            store,
            subscriber,
            engine,
            config,
            active: None,
        }
    }

    /// Load the persisted jobs, start the dispatcher on a fresh queue, and
    /// register every job's log watchers.
    ///
    /// Registration is best-effort: a failing job is logged and skipped,
    /// already-registered jobs stay active, and the first failure is
    /// returned after every job has been attempted. A store failure aborts
    /// startup entirely with [`ListenerError::StoreUnavailable`].
    pub async fn start(&mut self) -> Result<(), ListenerError> {
        if self.active.is_some() {
            return Err(ListenerError::AlreadyStarted);
        }

        let jobs = self
            .store
            .jobs()
            .await
            .map_err(ListenerError::StoreUnavailable)?;

        let shutdown = CancellationToken::new();
        let (queue, dispatcher) = Dispatcher::spawn(
            self.store.clone(),
            self.engine.clone(),
            self.config.queue_capacity,
            shutdown.clone(),
        );
        self.active = Some(Active {
            queue,
            shutdown,
            dispatcher,
        });

        tracing::info!(
            target: "chainwatch::listener",
            jobs = jobs.len(),
            queue_capacity = self.config.queue_capacity,
            "listener started, registering job watchers"
        );

        let mut first_failure = None;
        for job in &jobs {
            if let Err(error) = self.add_job(job).await {
                tracing::error!(
                    target: "chainwatch::listener",
                    job_id = %job.id,
                    error = %error,
                    "watcher registration failed, continuing with remaining jobs"
                );
                first_failure.get_or_insert(error);
            }
        }
        first_failure.map_or(Ok(()), Err)
    }

    /// Shut the listener down: close the notification queue and wait for
    /// the dispatcher to drain and terminate.
    ///
    /// Idempotent; calling `stop` on a listener that is not running is a
    /// no-op. Upstream chain subscriptions are not unregistered here;
    /// their teardown belongs to the subscription service, and sends onto
    /// the closed queue fail without blocking.
    pub async fn stop(&mut self) -> Result<(), ListenerError> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };

        active.shutdown.cancel();
        drop(active.queue);
        active.dispatcher.join().await;

        tracing::info!(target: "chainwatch::listener", "listener stopped");
        Ok(())
    }

    /// Register every `RawLog` watcher of `job` with the chain
    /// subscription service, forwarding onto the shared queue.
    ///
    /// Returns the first subscription failure; earlier subscriptions from
    /// the same call are not unwound.
    pub async fn add_job(&self, job: &Job) -> Result<(), ListenerError> {
        let Some(active) = self.active.as_ref() else {
            return Err(ListenerError::NotRunning);
        };

        for watcher in job.watchers_of_kind(WatcherKind::RawLog) {
            self.subscriber
                .subscribe(active.queue.clone(), watcher.address)
                .await
                .map_err(|cause| ListenerError::SubscriptionFailed {
                    job_id: job.id.clone(),
                    cause,
                })?;
            tracing::debug!(
                target: "chainwatch::listener",
                job_id = %job.id,
                watcher_id = %watcher.id,
                address = %format!("{:#x}", watcher.address),
                "subscribed watcher"
            );
        }
        Ok(())
    }

    /// Whether a dispatcher is currently running.
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }
}
