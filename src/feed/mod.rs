pub mod firebase;
pub mod generator;
pub mod sse;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::sensors::SensorSnapshot;

pub use firebase::{FirebaseFeed, ReconnectPolicy};
pub use generator::SyntheticGenerator;

const EVENT_BUFFER: usize = 32;

// ---------------------------------------------------------------------------
// DataSource
// ---------------------------------------------------------------------------

/// Which producer currently feeds the dashboard. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Live,
    Generator,
}

impl DataSource {
    pub fn from_use_generator(use_generator: bool) -> Self {
        if use_generator {
            Self::Generator
        } else {
            Self::Live
        }
    }
}

// ---------------------------------------------------------------------------
// Events and errors
// ---------------------------------------------------------------------------

/// What a running source reports back to the dashboard.
#[derive(Debug)]
pub enum FeedEvent {
    /// Raw value at the subscribed path. `None` means "no data there yet".
    Payload(Option<Value>),
    /// An already-canonical snapshot (synthetic generator).
    Snapshot(SensorSnapshot),
    /// The source failed and will not deliver anything else.
    Failed(FeedError),
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Live feed is not configured. Set FEED_DATABASE_URL to enable it.")]
    NotConfigured,

    #[error("Live feed connection error: Permission denied. Please check your Realtime Database security rules.")]
    PermissionDenied,

    #[error("Live feed connection error: authentication was revoked.")]
    AuthRevoked,

    #[error("Live feed connection error: server answered with status {0}.")]
    Status(u16),

    #[error("Live feed connection error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Live feed connection error: invalid feed URL ({0}).")]
    InvalidUrl(String),

    #[error("Live feed connection error: the stream was closed by the server.")]
    Closed,
}

// ---------------------------------------------------------------------------
// FeedSource
// ---------------------------------------------------------------------------

/// A producer of sensor data that runs until cancelled or failed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    fn kind(&self) -> DataSource;

    /// Deliver events until `token` is cancelled (→ `Ok`) or the source
    /// breaks (→ `Err`). Must return promptly once `token` is cancelled.
    async fn run(
        &self,
        events: mpsc::Sender<FeedEvent>,
        token: CancellationToken,
    ) -> Result<(), FeedError>;
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// One running source: its task, its cancellation token and its event queue.
///
/// Dropping a subscription requests cancellation; `cancel` additionally waits
/// for the task to finish so nothing from it can be observed afterwards.
pub struct Subscription {
    kind: DataSource,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    events: mpsc::Receiver<FeedEvent>,
}

impl Subscription {
    pub fn start(source: Arc<dyn FeedSource>) -> Self {
        let kind = source.kind();
        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        let token = CancellationToken::new();

        let task = {
            let token = token.clone();
            tokio::spawn(async move {
                let result = tokio::select! {
                    result = source.run(tx.clone(), token.clone()) => result,
                    _ = token.cancelled() => Ok(()),
                };

                match result {
                    Err(e) if !token.is_cancelled() => {
                        warn!(source = ?kind, error = %e, "Feed source failed");
                        let _ = tx.send(FeedEvent::Failed(e)).await;
                    }
                    _ => debug!(source = ?kind, "Feed source stopped"),
                }
            })
        };

        debug!(source = ?kind, "Subscription started");
        Self {
            kind,
            token,
            task: Some(task),
            events,
        }
    }

    pub fn kind(&self) -> DataSource {
        self.kind
    }

    /// Next event, or `None` once the source task has exited.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }

    /// Cancel the source and wait until its task has fully stopped.
    /// Calling it on an already-finished source is fine.
    pub async fn cancel(mut self) {
        self.token.cancel();
        self.events.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(source = ?self.kind, error = %e, "Feed task ended abnormally");
            }
        }
        debug!(source = ?self.kind, "Subscription cancelled");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
