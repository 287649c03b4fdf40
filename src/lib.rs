//! Event-driven dispatcher bridging a chain log stream to a job execution
//! system.
//!
//! The listener keeps a registry of interest (which addresses matter to
//! which jobs), consumes a single ordered stream of notifications, resolves
//! each one to its interested watchers, and triggers downstream runs per
//! match. [`decode`] turns a raw event payload into a structured
//! [`Output`] under the policy selected by the watcher's kind.
//!
//! The chain subscription transport, job persistence, and run execution
//! are external collaborators reached through the [`ChainSubscriber`],
//! [`JobStore`], and [`RunEngine`] seams.

use std::path::Path;

use anyhow::Result;
use serde::Deserialize;

mod decode;
mod dispatch;
mod engine;
mod error;
mod listener;
mod store;
mod subscriber;
mod types;

pub mod testing;

pub use decode::{decode, format_log_output, DecodeError, ENCODED_HEADER_LEN, WORD_LEN};
pub use dispatch::Dispatcher;
pub use engine::{RunEngine, RunHandle};
pub use error::ListenerError;
pub use listener::LogListener;
pub use store::{matching_watchers, JobStore};
pub use subscriber::{ChainSubscriber, NotificationSender};
pub use types::{
    Address, EventLog, Hash, Job, JobId, Notification, Output, Topic, Watcher, WatcherId,
    WatcherKind,
};

const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Listener tunables, usually expected in a `chainwatch.toml` file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bound of the shared notification queue; producers wait when it is
    /// full, so this caps memory without dropping events.
    pub queue_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ListenerConfig {
    /// Loads the configuration from a file.
    pub fn from_file(config_path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(Path::new(config_path)))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
