//! The long-lived notification consumer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::RunEngine;
use crate::store::{matching_watchers, JobStore};
use crate::subscriber::NotificationSender;
use crate::types::Notification;

/// The background task consuming the shared notification queue.
///
/// One dispatcher runs for the lifetime of the listener. Every arriving
/// notification is unmarshaled, resolved to its interested watchers, and
/// turned into one run trigger per matched watcher. Any failure inside the
/// loop is isolated to that notification; the stream never stalls on a
/// single malformed or unmatched event.
pub struct Dispatcher {
    handle: JoinHandle<()>,
}

impl Dispatcher {
    /// Create the notification queue and spawn the consumer task bound to
    /// it.
    ///
    /// Returns the producer half for subscriptions alongside the
    /// dispatcher handle. Shutdown is cooperative: cancel `shutdown` or
    /// drop every sender, then [`join`](Self::join) the task.
    pub fn spawn(
        store: Arc<dyn JobStore>,
        engine: Arc<dyn RunEngine>,
        capacity: usize,
        shutdown: CancellationToken,
    ) -> (NotificationSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(Self::run(rx, store, engine, shutdown));
        (tx, Self { handle })
    }

    /// Wait for the consumer task to terminate.
    pub async fn join(self) {
        if let Err(error) = self.handle.await {
            tracing::error!(
                target: "chainwatch::dispatch",
                error = %error,
                "dispatcher task did not shut down cleanly"
            );
        }
    }

    /// Main consumer loop.
    async fn run(
        mut queue: mpsc::Receiver<Notification>,
        store: Arc<dyn JobStore>,
        engine: Arc<dyn RunEngine>,
        shutdown: CancellationToken,
    ) {
        tracing::debug!(target: "chainwatch::dispatch", "dispatcher running");

        loop {
            let notification = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::debug!(
                        target: "chainwatch::dispatch",
                        "shutdown requested, dispatcher draining"
                    );
                    break;
                }
                received = queue.recv() => match received {
                    Some(notification) => notification,
                    None => {
                        tracing::debug!(
                            target: "chainwatch::dispatch",
                            "notification queue closed, dispatcher draining"
                        );
                        break;
                    }
                },
            };

            // Termination is cooperative only: a notification already
            // taken finishes processing before the loop exits.
            Self::process(notification, store.as_ref(), engine.as_ref()).await;
        }

        tracing::debug!(target: "chainwatch::dispatch", "dispatcher stopped");
    }

    async fn process(notification: Notification, store: &dyn JobStore, engine: &dyn RunEngine) {
        let log = match notification.unmarshal() {
            Ok(log) => log,
            Err(error) => {
                tracing::error!(
                    target: "chainwatch::dispatch",
                    error = %error,
                    "unable to unmarshal notification, dropping it"
                );
                return;
            }
        };

        for watcher in matching_watchers(store, log.address).await {
            match store.find_job(&watcher.job_id).await {
                Ok(job) => {
                    let handle = engine.trigger_run(job, log.clone()).await;
                    tracing::debug!(
                        target: "chainwatch::dispatch",
                        job_id = %watcher.job_id,
                        watcher_id = %watcher.id,
                        run_id = %handle.run_id,
                        "triggered run from log event"
                    );
                }
                Err(error) => {
                    // One missing job must not block the other matches.
                    tracing::error!(
                        target: "chainwatch::dispatch",
                        job_id = %watcher.job_id,
                        watcher_id = %watcher.id,
                        error = %error,
                        "job lookup failed for matched watcher"
                    );
                }
            }
        }
    }
}
