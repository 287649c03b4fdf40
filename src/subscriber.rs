//! Chain subscription seam.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::types::{Address, Notification};

/// Producer half of the shared notification queue handed to subscriptions.
///
/// The queue is multi-producer single-consumer; once the dispatcher shuts
/// down, sends fail with a regular [`mpsc::error::SendError`] rather than
/// blocking, so late deliveries during teardown are harmless.
pub type NotificationSender = mpsc::Sender<Notification>;

/// External service that watches the chain and forwards matching log
/// events onto a notification queue.
///
/// Once `subscribe` returns `Ok`, every matching on-chain event for the
/// address is eventually delivered to `queue`, at least once, in emission
/// order per-address. Delivery must not begin before `subscribe` confirms
/// success. Cross-address ordering is not guaranteed.
///
/// Closing the queue does not unregister the upstream watch; subscription
/// teardown is owned by the service, not by this crate.
#[async_trait]
pub trait ChainSubscriber: Send + Sync {
    /// Begin forwarding log events emitted at `address` onto `queue`.
    async fn subscribe(&self, queue: NotificationSender, address: Address) -> Result<()>;
}
