use std::time::Duration;

use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{sync::mpsc, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{DataSource, FeedError, FeedEvent, FeedSource};
use crate::sensors::SensorSnapshot;

pub const DEFAULT_GENERATOR_INTERVAL: Duration = Duration::from_secs(3);

/// Emits random but plausible snapshots: one immediately, then one per
/// `interval`, until cancelled.
#[derive(Debug, Clone)]
pub struct SyntheticGenerator {
    interval: Duration,
    seed: Option<u64>,
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_GENERATOR_INTERVAL)
    }
}

impl SyntheticGenerator {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            seed: None,
        }
    }

    /// Reproducible sequence, for tests.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// One random snapshot within the ranges the hardware normally reports.
pub fn random_snapshot<R: Rng>(rng: &mut R) -> SensorSnapshot {
    let pump_on = rng.gen_bool(0.5);
    SensorSnapshot {
        pump_on,
        soil_moisture_pct: rng.gen_range(20.0..80.0),
        temperature_c: rng.gen_range(20.0..30.0),
        humidity_pct: rng.gen_range(30.0..80.0),
        ph_level: rng.gen_range(5.5..7.5),
        flow_rate_lpm: pump_on.then(|| rng.gen_range(0.5..2.5)),
    }
}

#[async_trait]
impl FeedSource for SyntheticGenerator {
    fn kind(&self) -> DataSource {
        DataSource::Generator
    }

    async fn run(
        &self,
        events: mpsc::Sender<FeedEvent>,
        token: CancellationToken,
    ) -> Result<(), FeedError> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut ticker = time::interval(self.interval);
        info!(interval_ms = self.interval.as_millis() as u64, "Synthetic generator started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let snapshot = random_snapshot(&mut rng);
                    debug!(?snapshot, "Generated snapshot");
                    if events.send(FeedEvent::Snapshot(snapshot)).await.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Synthetic generator stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::feed::Subscription;

    #[test]
    fn snapshots_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let s = random_snapshot(&mut rng);
            assert!((20.0..80.0).contains(&s.soil_moisture_pct));
            assert!((20.0..30.0).contains(&s.temperature_c));
            assert!((30.0..80.0).contains(&s.humidity_pct));
            assert!((5.5..7.5).contains(&s.ph_level));
            match s.flow_rate_lpm {
                Some(flow) => {
                    assert!(s.pump_on);
                    assert!((0.5..2.5).contains(&flow));
                }
                None => assert!(!s.pump_on),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_snapshot_is_immediate_then_on_interval() {
        let generator = SyntheticGenerator::new(Duration::from_secs(3)).with_seed(1);
        let mut sub = Subscription::start(Arc::new(generator));
        let started = time::Instant::now();

        assert!(matches!(sub.next().await, Some(FeedEvent::Snapshot(_))));
        assert_eq!(started.elapsed(), Duration::ZERO);

        assert!(matches!(sub.next().await, Some(FeedEvent::Snapshot(_))));
        assert_eq!(started.elapsed(), Duration::from_secs(3));

        sub.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_generator_emits_nothing_more() {
        let (tx, mut rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let generator = SyntheticGenerator::new(Duration::from_secs(1)).with_seed(2);

        let task = {
            let token = token.clone();
            tokio::spawn(async move { generator.run(tx, token).await })
        };

        assert!(rx.recv().await.is_some());
        token.cancel();
        assert!(task.await.unwrap().is_ok());

        time::advance(Duration::from_secs(10)).await;
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn seeded_generators_agree() {
        let a = random_snapshot(&mut StdRng::seed_from_u64(42));
        let b = random_snapshot(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
