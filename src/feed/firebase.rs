use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header::ACCEPT, Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    sse::{SseEvent, SseParser},
    DataSource, FeedError, FeedEvent, FeedSource,
};

/// Streams one path of a Firebase Realtime Database over its REST
/// server-sent-events endpoint.
///
/// The server sends the full value once (`put` at `/`) and then incremental
/// `put` / `patch` events; they are applied to a local copy of the subtree
/// and the whole subtree is emitted after each change.
#[derive(Debug, Clone)]
pub struct FirebaseFeed {
    http: Client,
    url: Url,
    path: String,
    reconnect: ReconnectPolicy,
}

/// Backoff between reconnection attempts, doubling up to `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamUpdate {
    path: String,
    data: Value,
}

impl FirebaseFeed {
    pub fn new(
        http: Client,
        database_url: &str,
        path: &str,
        auth: Option<&str>,
    ) -> Result<Self, FeedError> {
        let path = path.trim_matches('/').to_owned();
        let raw = format!("{}/{}.json", database_url.trim_end_matches('/'), path);
        let mut url = Url::parse(&raw).map_err(|e| FeedError::InvalidUrl(format!("{raw}: {e}")))?;
        if let Some(auth) = auth {
            url.query_pairs_mut().append_pair("auth", auth);
        }

        Ok(Self {
            http,
            url,
            path,
            reconnect: ReconnectPolicy::default(),
        })
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// The database path being streamed, without slashes.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Apply one parsed event to `tree`. Returns `Ok(true)` when the tree
    /// changed and should be emitted.
    fn apply(tree: &mut Value, event: &SseEvent) -> Result<bool, FeedError> {
        match event.event.as_str() {
            "put" | "patch" => {
                let update: StreamUpdate = match serde_json::from_str(&event.data) {
                    Ok(update) => update,
                    Err(e) => {
                        warn!(event = %event.event, error = %e, "Ignoring undecodable stream event");
                        return Ok(false);
                    }
                };
                let segments = path_segments(&update.path);
                match (event.event.as_str(), update.data) {
                    ("patch", Value::Object(children)) => {
                        for (key, value) in children {
                            let mut child_path = segments.clone();
                            child_path.push(key.as_str());
                            set_at_path(tree, &child_path, value);
                        }
                    }
                    (_, data) => set_at_path(tree, &segments, data),
                }
                Ok(true)
            }
            "keep-alive" => Ok(false),
            "cancel" => Err(FeedError::PermissionDenied),
            "auth_revoked" => Err(FeedError::AuthRevoked),
            other => {
                debug!(event = %other, "Ignoring unknown stream event");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl FeedSource for FirebaseFeed {
    fn kind(&self) -> DataSource {
        DataSource::Live
    }

    /// Streams until cancelled. A dropped connection or a stream the server
    /// closes is retried with exponential backoff; denied access, revoked
    /// auth and other non-2xx statuses end the feed.
    async fn run(
        &self,
        events: mpsc::Sender<FeedEvent>,
        token: CancellationToken,
    ) -> Result<(), FeedError> {
        let mut delay = self.reconnect.initial_delay;
        loop {
            match self.stream_once(&events, &token, &mut delay).await {
                Ok(()) => return Ok(()),
                Err(e @ (FeedError::Closed | FeedError::Request(_))) => {
                    warn!(
                        path = %self.path,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Live feed interrupted, reconnecting"
                    );
                    tokio::select! {
                        _ = token.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay = (delay * 2).min(self.reconnect.max_delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl FirebaseFeed {
    /// One connection. `Ok(())` means cancelled or nobody is listening.
    /// `delay` is reset once the server accepts the connection.
    async fn stream_once(
        &self,
        events: &mpsc::Sender<FeedEvent>,
        token: &CancellationToken,
        delay: &mut Duration,
    ) -> Result<(), FeedError> {
        info!(path = %self.path, "Connecting to live feed");

        let request = self
            .http
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream")
            .send();
        let response = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            response = request => response?,
        };

        match response.status() {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FeedError::PermissionDenied)
            }
            s => return Err(FeedError::Status(s.as_u16())),
        }
        info!(path = %self.path, "Live feed connected");
        *delay = self.reconnect.initial_delay;

        let mut stream = response.bytes_stream();
        let mut parser = SseParser::new();
        let mut tree = Value::Null;

        loop {
            let chunk = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else {
                return Err(FeedError::Closed);
            };

            for event in parser.push(&chunk?) {
                if !Self::apply(&mut tree, &event)? {
                    continue;
                }
                let payload = (!tree.is_null()).then(|| tree.clone());
                let sent = tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    sent = events.send(FeedEvent::Payload(payload)) => sent,
                };
                if sent.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Replace the value at `segments` below `node`. `null` deletes; objects left
/// empty collapse to `null`, as they do server-side.
fn set_at_path(node: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };

    let child = map.entry(head.to_string()).or_insert(Value::Null);
    set_at_path(child, rest, value);
    if is_empty_node(child) {
        map.remove(*head);
    }
    if map.is_empty() {
        *node = Value::Null;
    }
}

fn is_empty_node(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
