pub mod reconciler;
pub mod view;

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    db::ReadingStore,
    feed::{DataSource, FeedError, FeedEvent, FeedSource, Subscription},
    sensors::{ReadingHistoryEntry, SensorKind, SensorSnapshot},
    thresholds::ThresholdRule,
};

pub use reconciler::LiveFeedReconciler;
pub use view::{DashboardView, FeedStatus};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("dashboard service is not running")]
    Stopped,
}

/// Startup settings for the service.
#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub initial_source: DataSource,
    pub history_limit: usize,
    pub threshold_scope: String,
    pub feed_path: String,
}

/// The available producers. `live` is `None` when no feed is configured.
#[derive(Clone)]
pub struct FeedSources {
    pub live: Option<Arc<dyn FeedSource>>,
    pub generator: Arc<dyn FeedSource>,
}

impl FeedSources {
    fn get(&self, source: DataSource) -> Option<Arc<dyn FeedSource>> {
        match source {
            DataSource::Live => self.live.clone(),
            DataSource::Generator => Some(self.generator.clone()),
        }
    }
}

enum Command {
    DismissAlert {
        id: String,
        reply: oneshot::Sender<bool>,
    },
    UpsertThreshold {
        kind: SensorKind,
        min_value: Option<f64>,
        max_value: Option<f64>,
        reply: oneshot::Sender<(ThresholdRule, bool)>,
    },
    SetDataSource {
        source: DataSource,
        reply: oneshot::Sender<DashboardView>,
    },
    HistoryLoaded(Vec<ReadingHistoryEntry>),
    ThresholdsLoaded(Vec<ThresholdRule>),
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

enum PersistJob {
    Reading {
        snapshot: SensorSnapshot,
        captured_at: DateTime<Utc>,
    },
    Threshold {
        scope: String,
        rule: ThresholdRule,
    },
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable front door to the running service.
#[derive(Clone)]
pub struct DashboardHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<DashboardView>,
}

impl DashboardHandle {
    /// The most recently published view.
    pub fn view(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    /// A receiver notified on every published view.
    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.view.clone()
    }

    /// Returns `false` when no active alert had `id`.
    pub async fn dismiss_alert(&self, id: impl Into<String>) -> Result<bool, DashboardError> {
        let id = id.into();
        self.request(|reply| Command::DismissAlert { id, reply }).await
    }

    /// Returns the stored rule and whether it was newly created.
    pub async fn upsert_threshold(
        &self,
        kind: SensorKind,
        min_value: Option<f64>,
        max_value: Option<f64>,
    ) -> Result<(ThresholdRule, bool), DashboardError> {
        self.request(|reply| Command::UpsertThreshold {
            kind,
            min_value,
            max_value,
            reply,
        })
        .await
    }

    /// Switch producers. When this returns, the previous source has fully
    /// stopped and nothing it sent can still be applied.
    pub async fn set_data_source(&self, source: DataSource) -> Result<DashboardView, DashboardError> {
        self.request(|reply| Command::SetDataSource { source, reply })
            .await
    }

    /// Stop the active source and the service task.
    pub async fn shutdown(&self) -> Result<(), DashboardError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, DashboardError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| DashboardError::Stopped)?;
        rx.await.map_err(|_| DashboardError::Stopped)
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Single writer of dashboard state.
///
/// One task owns the reconciler and the active subscription and processes
/// commands and feed events in arrival order. Every mutation publishes a new
/// `DashboardView`.
pub struct DashboardService {
    reconciler: LiveFeedReconciler,
    sources: FeedSources,
    persist: mpsc::UnboundedSender<PersistJob>,
    persist_worker: JoinHandle<()>,
    threshold_scope: String,
    subscription: Option<Subscription>,
    commands: mpsc::Receiver<Command>,
    view: watch::Sender<DashboardView>,
}

impl DashboardService {
    /// Spawn the service task and the startup loads. Must be called inside
    /// a tokio runtime.
    pub fn spawn(
        settings: DashboardSettings,
        sources: FeedSources,
        store: Arc<dyn ReadingStore>,
    ) -> DashboardHandle {
        let reconciler = LiveFeedReconciler::new(
            settings.initial_source,
            settings.history_limit,
            settings.feed_path,
        );
        let (view_tx, view_rx) = watch::channel(reconciler.view());
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);

        spawn_startup_loads(&store, &tx, settings.history_limit, &settings.threshold_scope);
        let (persist, persist_worker) = spawn_persistence(store);

        let service = Self {
            reconciler,
            sources,
            persist,
            persist_worker,
            threshold_scope: settings.threshold_scope,
            subscription: None,
            commands: rx,
            view: view_tx,
        };
        tokio::spawn(service.run(settings.initial_source));

        DashboardHandle {
            commands: tx,
            view: view_rx,
        }
    }

    async fn run(mut self, initial: DataSource) {
        info!(source = ?initial, "Dashboard service started");
        self.start(initial);
        self.publish();

        let shutdown_reply = loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let Some(reply) = self.handle(command).await {
                            break Some(reply);
                        }
                    }
                    None => break None,
                },
                event = next_event(&mut self.subscription) => match event {
                    Some(event) => self.on_feed_event(event),
                    None => self.stop_subscription().await,
                },
            }
        };

        self.stop_subscription().await;
        // Closing the queue lets the worker finish what is already queued.
        let Self {
            persist,
            persist_worker,
            ..
        } = self;
        drop(persist);
        if let Err(e) = persist_worker.await {
            warn!(error = %e, "Persistence worker failed");
        }

        info!("Dashboard service stopped");
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    /// Returns the reply channel once shutdown is requested.
    async fn handle(&mut self, command: Command) -> Option<oneshot::Sender<()>> {
        match command {
            Command::DismissAlert { id, reply } => {
                let dismissed = self.reconciler.dismiss_alert(&id);
                debug!(alert_id = %id, dismissed, "Dismiss alert");
                self.publish();
                let _ = reply.send(dismissed);
            }
            Command::UpsertThreshold {
                kind,
                min_value,
                max_value,
                reply,
            } => {
                let (rule, created) = self.reconciler.upsert_threshold(kind, min_value, max_value);
                info!(rule_id = %rule.id, kind = %rule.sensor_kind, created, "Threshold saved");
                self.persist_threshold(rule.clone());
                self.publish();
                let _ = reply.send((rule, created));
            }
            Command::SetDataSource { source, reply } => {
                self.switch_to(source).await;
                self.publish();
                let _ = reply.send(self.reconciler.view());
            }
            Command::HistoryLoaded(entries) => {
                self.reconciler.load_history(entries);
                self.publish();
            }
            Command::ThresholdsLoaded(rules) => {
                self.reconciler.load_thresholds(rules);
                self.publish();
            }
            Command::Shutdown { reply } => return Some(reply),
        }
        None
    }

    fn on_feed_event(&mut self, event: FeedEvent) {
        // Microseconds, the precision readings are stored with.
        let now = Utc::now().trunc_subsecs(6);
        let accepted = match event {
            FeedEvent::Payload(payload) => self.reconciler.on_payload(payload, now),
            FeedEvent::Snapshot(snapshot) => self.reconciler.on_snapshot(snapshot, now),
            FeedEvent::Failed(e) => {
                self.reconciler.on_transport_error(&e);
                None
            }
        };
        if let Some(snapshot) = accepted {
            self.persist_reading(snapshot, now);
        }
        self.publish();
    }

    /// Tear down the current source, then start `source`. Re-selecting the
    /// active, healthy source is a no-op; re-selecting a failed one retries.
    async fn switch_to(&mut self, source: DataSource) {
        let healthy = self.subscription.is_some() && self.reconciler.status() != FeedStatus::Error;
        if source == self.reconciler.source() && healthy {
            debug!(?source, "Data source unchanged");
            return;
        }

        self.stop_subscription().await;
        self.reconciler.switch_source();
        self.start(source);
    }

    fn start(&mut self, source: DataSource) {
        self.reconciler.start(source);
        match self.sources.get(source) {
            Some(feed) => self.subscription = Some(Subscription::start(feed)),
            None => self.reconciler.on_transport_error(&FeedError::NotConfigured),
        }
    }

    async fn stop_subscription(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel().await;
        }
    }

    fn publish(&self) {
        self.view.send_replace(self.reconciler.view());
    }

    fn persist_reading(&self, snapshot: SensorSnapshot, captured_at: DateTime<Utc>) {
        self.enqueue(PersistJob::Reading {
            snapshot,
            captured_at,
        });
    }

    fn persist_threshold(&self, rule: ThresholdRule) {
        self.enqueue(PersistJob::Threshold {
            scope: self.threshold_scope.clone(),
            rule,
        });
    }

    fn enqueue(&self, job: PersistJob) {
        if self.persist.send(job).is_err() {
            warn!("Persistence worker is gone; write dropped");
        }
    }
}

/// Writes run one at a time in queue order, so a later edit of a rule
/// always lands after an earlier one.
fn spawn_persistence(
    store: Arc<dyn ReadingStore>,
) -> (mpsc::UnboundedSender<PersistJob>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let worker = tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            match job {
                PersistJob::Reading {
                    snapshot,
                    captured_at,
                } => {
                    if let Err(e) = store.save_reading(&snapshot, captured_at).await {
                        warn!(error = %e, "Failed to persist reading");
                    }
                }
                PersistJob::Threshold { scope, rule } => {
                    if let Err(e) = store.save_threshold(&scope, &rule).await {
                        warn!(rule_id = %rule.id, error = %e, "Failed to persist threshold");
                    }
                }
            }
        }
        debug!("Persistence queue drained");
    });
    (tx, worker)
}

async fn next_event(subscription: &mut Option<Subscription>) -> Option<FeedEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

fn spawn_startup_loads(
    store: &Arc<dyn ReadingStore>,
    commands: &mpsc::Sender<Command>,
    history_limit: usize,
    scope: &str,
) {
    {
        let store = store.clone();
        let commands = commands.clone();
        tokio::spawn(async move {
            match store.latest_readings(history_limit).await {
                Ok(entries) => {
                    let _ = commands.send(Command::HistoryLoaded(entries)).await;
                }
                Err(e) => warn!(error = %e, "Failed to load reading history"),
            }
        });
    }

    {
        let store = store.clone();
        let commands = commands.clone();
        let scope = scope.to_owned();
        tokio::spawn(async move {
            match store.thresholds(&scope).await {
                Ok(rules) => {
                    let _ = commands.send(Command::ThresholdsLoaded(rules)).await;
                }
                Err(e) => warn!(scope = %scope, error = %e, "Failed to load thresholds"),
            }
        });
    }
}
