//! Live feed registry and broadcaster
//!
//! WebSocket sessions register here and receive one JSON frame per tick. The
//! registry is shared by every connection task and the broadcaster, so it
//! lives behind an `RwLock`; each subscriber owns a bounded channel and a slow
//! reader only ever loses its own frames.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::application::services::monitor_service::{LiveSnapshot, MonitorService};
use crate::domain::entities::balance::Balance;
use crate::domain::entities::trade::Trade;
use crate::domain::errors::ApiError;
use crate::task_runner::{run_periodic, BackoffConfig};

/// Frames buffered per subscriber before new ticks are dropped for it
pub const SUBSCRIBER_BUFFER: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickStatus {
    pub active: bool,
    pub last_trade: String,
}

/// `{"type": "tick", ...}` frame sent to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: TickStatus,
    pub balances: Vec<Balance>,
    pub trades: Vec<Trade>,
}

impl From<LiveSnapshot> for TickPayload {
    fn from(snapshot: LiveSnapshot) -> Self {
        Self {
            kind: "tick".to_string(),
            status: TickStatus {
                active: snapshot.status.active,
                last_trade: snapshot.status.last_trade,
            },
            balances: snapshot.balances,
            trades: snapshot.trades,
        }
    }
}

struct Subscriber {
    /// Trade filter; set only when exactly one symbol was requested
    symbol: Option<String>,
    sender: mpsc::Sender<String>,
}

/// Thread-safe set of live feed subscribers
#[derive(Default)]
pub struct LiveFeed {
    subscribers: RwLock<HashMap<u64, Subscriber>>,
    next_id: AtomicU64,
}

impl LiveFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Trades are filtered only when `symbols` holds
    /// exactly one entry.
    pub async fn subscribe(&self, symbols: Vec<String>) -> (u64, mpsc::Receiver<String>) {
        let symbol = match symbols.as_slice() {
            [only] if !only.trim().is_empty() => Some(only.trim().to_uppercase()),
            _ => None,
        };
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(id, Subscriber { symbol, sender });
        info!("Live feed subscriber {} joined ({} total)", id, subscribers.len());

        (id, receiver)
    }

    pub async fn unsubscribe(&self, id: u64) {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.remove(&id).is_some() {
            info!("Live feed subscriber {} left ({} total)", id, subscribers.len());
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Push one tick to every subscriber and prune closed channels.
    ///
    /// One snapshot is built per distinct trade filter. Returns the number of
    /// frames delivered.
    pub async fn broadcast(&self, service: &MonitorService) -> Result<usize, ApiError> {
        let targets: Vec<(u64, Option<String>, mpsc::Sender<String>)> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .iter()
                .map(|(id, sub)| (*id, sub.symbol.clone(), sub.sender.clone()))
                .collect()
        };
        if targets.is_empty() {
            return Ok(0);
        }

        let mut frames: HashMap<Option<String>, String> = HashMap::new();
        for (_, symbol, _) in &targets {
            if frames.contains_key(symbol) {
                continue;
            }
            let payload = TickPayload::from(service.live_snapshot(symbol.as_deref()).await?);
            let frame = serde_json::to_string(&payload)
                .map_err(|e| ApiError::InternalServerError(e.to_string()))?;
            frames.insert(symbol.clone(), frame);
        }

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, symbol, sender) in targets {
            let Some(frame) = frames.get(&symbol) else {
                continue;
            };
            match sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("Live feed subscriber {} is lagging, tick dropped", id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in &closed {
                subscribers.remove(id);
            }
            debug!("Pruned {} closed live feed subscribers", closed.len());
        }

        Ok(delivered)
    }
}

/// Spawn the periodic broadcaster. Store outages are retried with backoff.
pub fn spawn_broadcaster(
    feed: Arc<LiveFeed>,
    service: Arc<MonitorService>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_periodic("live_feed", interval, BackoffConfig::default(), move || {
            let feed = feed.clone();
            let service = service.clone();
            async move { feed.broadcast(&service).await.map(|_| ()) }
        })
        .await;
    })
}
