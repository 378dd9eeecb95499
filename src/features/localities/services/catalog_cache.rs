use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::Instant;
use utoipa::ToSchema;

use super::degraded_mode::DegradedModeProvider;
use crate::features::localities::models::{Locality, LocalityRecord};
use crate::features::localities::stores::LocalityStore;

/// Capacity of the change-notification channel
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Origin of the data currently held by the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    /// Fetched from the locality store
    Store,
    /// Degraded mode: built-in placeholder data
    Placeholder,
    /// Nothing fetched and no placeholder available
    Empty,
}

/// What the cache serves after a failed refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradedServing {
    Stale,
    Placeholder,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    Refreshed {
        count: usize,
    },
    RefreshFailed {
        serving: DegradedServing,
        message: String,
    },
}

/// Immutable view of the catalog at one point in time
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    localities: Arc<Vec<Locality>>,
    source: SnapshotSource,
    fetched_at: Option<Instant>,
}

impl CatalogSnapshot {
    fn new(localities: Vec<Locality>, source: SnapshotSource) -> Self {
        Self {
            localities: Arc::new(localities),
            source,
            fetched_at: Some(Instant::now()),
        }
    }

    fn empty() -> Self {
        Self {
            localities: Arc::new(Vec::new()),
            source: SnapshotSource::Empty,
            fetched_at: None,
        }
    }

    pub fn localities(&self) -> &[Locality] {
        &self.localities
    }

    pub fn source(&self) -> SnapshotSource {
        self.source
    }

    pub fn is_degraded(&self) -> bool {
        self.source != SnapshotSource::Store
    }

    pub fn age(&self) -> Option<Duration> {
        self.fetched_at.map(|at| at.elapsed())
    }

    pub fn find(&self, id: uuid::Uuid) -> Option<&Locality> {
        self.localities.iter().find(|l| l.id == id)
    }
}

/// Point-in-time health of the cache
#[derive(Debug, Clone)]
pub struct CatalogStatus {
    pub size: usize,
    pub source: SnapshotSource,
    pub age: Option<Duration>,
    pub ttl: Duration,
    pub stale: bool,
    pub refresh_count: u64,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct CatalogState {
    snapshot: Option<CatalogSnapshot>,
    refresh_count: u64,
    last_error: Option<String>,
}

type RefreshFlight = Shared<BoxFuture<'static, ()>>;

/// Running refresh, tagged with the order in which flights were started
#[derive(Default)]
struct FlightSlot {
    started: u64,
    current: Option<(u64, RefreshFlight)>,
}

struct CatalogInner {
    store: Arc<dyn LocalityStore>,
    fallback: Arc<dyn DegradedModeProvider>,
    ttl: Duration,
    state: RwLock<CatalogState>,
    in_flight: Mutex<FlightSlot>,
    events: broadcast::Sender<CatalogEvent>,
}

/// Time-bounded, refreshable snapshot of the locality catalog.
///
/// Constructed once per process. Reads never fail: when the store is down the
/// last good snapshot is served, and only when nothing was ever fetched does
/// the cache fall back to the [`DegradedModeProvider`].
pub struct CatalogCache {
    inner: Arc<CatalogInner>,
}

impl CatalogCache {
    pub fn new(
        store: Arc<dyn LocalityStore>,
        fallback: Arc<dyn DegradedModeProvider>,
        ttl: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(CatalogInner {
                store,
                fallback,
                ttl,
                state: RwLock::new(CatalogState::default()),
                in_flight: Mutex::new(FlightSlot::default()),
                events,
            }),
        }
    }

    /// Current snapshot, refreshed first when forced, stale or never fetched
    pub async fn get(&self, force_refresh: bool) -> CatalogSnapshot {
        if force_refresh || self.is_stale().await {
            self.refresh().await;
        }
        self.current().await
    }

    /// Fetches the full catalog from the store.
    ///
    /// Single-flight: callers arriving while a refresh runs await that same
    /// refresh instead of issuing another store call.
    pub async fn refresh(&self) {
        let (_, flight) = self.join_or_start().await;
        flight.await;
    }

    /// Refresh whose store read begins after this call.
    ///
    /// A flight already running may have read the store before the caller's
    /// write landed, so it is awaited and then followed by a newer one.
    pub async fn refresh_after_write(&self) {
        let written_after = self.inner.in_flight.lock().await.started;

        loop {
            let (generation, flight) = self.join_or_start().await;
            flight.await;
            if generation > written_after {
                break;
            }
        }
    }

    async fn join_or_start(&self) -> (u64, RefreshFlight) {
        let mut slot = self.inner.in_flight.lock().await;
        if let Some((generation, existing)) = slot.current.as_ref() {
            tracing::debug!("Catalog refresh {} already in flight, joining it", generation);
            return (*generation, existing.clone());
        }

        slot.started += 1;
        let generation = slot.started;
        let inner = Arc::clone(&self.inner);
        let flight = async move {
            inner.fetch_and_swap().await;
            let mut slot = inner.in_flight.lock().await;
            if slot.current.as_ref().is_some_and(|(g, _)| *g == generation) {
                slot.current = None;
            }
        }
        .boxed()
        .shared();
        slot.current = Some((generation, flight.clone()));
        (generation, flight)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.inner.events.subscribe()
    }

    pub async fn status(&self) -> CatalogStatus {
        let state = self.inner.state.read().await;
        let snapshot = state.snapshot.clone().unwrap_or_else(CatalogSnapshot::empty);

        CatalogStatus {
            size: snapshot.localities().len(),
            source: snapshot.source(),
            age: snapshot.age(),
            ttl: self.inner.ttl,
            stale: self.inner.snapshot_is_stale(state.snapshot.as_ref()),
            refresh_count: state.refresh_count,
            last_error: state.last_error.clone(),
        }
    }

    async fn current(&self) -> CatalogSnapshot {
        self.inner
            .state
            .read()
            .await
            .snapshot
            .clone()
            .unwrap_or_else(CatalogSnapshot::empty)
    }

    async fn is_stale(&self) -> bool {
        let state = self.inner.state.read().await;
        self.inner.snapshot_is_stale(state.snapshot.as_ref())
    }
}

impl CatalogInner {
    /// Placeholder data is stale from the start so the next read retries the store
    fn snapshot_is_stale(&self, snapshot: Option<&CatalogSnapshot>) -> bool {
        match snapshot {
            Some(s) if s.source == SnapshotSource::Store => {
                s.age().map_or(true, |age| age >= self.ttl)
            }
            _ => true,
        }
    }

    async fn fetch_and_swap(&self) {
        match self.store.list_all().await {
            Ok(records) => {
                let fetched = records.len();
                let localities: Vec<Locality> = records
                    .into_iter()
                    .filter_map(LocalityRecord::into_locality)
                    .collect();

                let discarded = fetched - localities.len();
                if discarded > 0 {
                    tracing::warn!("Discarded {} locality records without a name", discarded);
                }

                let count = localities.len();
                {
                    let mut state = self.state.write().await;
                    state.snapshot = Some(CatalogSnapshot::new(localities, SnapshotSource::Store));
                    state.refresh_count += 1;
                    state.last_error = None;
                }

                tracing::info!("Locality catalog refreshed: {} localities", count);
                let _ = self.events.send(CatalogEvent::Refreshed { count });
            }
            Err(e) => {
                let message = e.to_string();
                let serving = {
                    let mut state = self.state.write().await;
                    state.last_error = Some(message.clone());

                    match &state.snapshot {
                        Some(s) if s.source == SnapshotSource::Store && !s.localities.is_empty() => {
                            tracing::warn!(
                                "Locality catalog refresh failed, serving stale snapshot of {} localities: {}",
                                s.localities.len(),
                                message
                            );
                            DegradedServing::Stale
                        }
                        _ => {
                            let placeholder = self.fallback.placeholder_catalog();
                            if placeholder.is_empty() {
                                tracing::warn!(
                                    "Locality catalog refresh failed and no placeholder is configured: {}",
                                    message
                                );
                                DegradedServing::Empty
                            } else {
                                tracing::warn!(
                                    "Locality catalog unavailable, serving {} placeholder localities: {}",
                                    placeholder.len(),
                                    message
                                );
                                state.snapshot = Some(CatalogSnapshot::new(
                                    placeholder,
                                    SnapshotSource::Placeholder,
                                ));
                                DegradedServing::Placeholder
                            }
                        }
                    }
                };

                let _ = self
                    .events
                    .send(CatalogEvent::RefreshFailed { serving, message });
            }
        }
    }
}
