//! Kanvas store: resource synchronizer keeping the four collections fresh.
//!
//! Each collection lives in its own `ArcSwap` slot and is replaced wholesale on a
//! successful fetch. A failed fetch leaves that slot's last good snapshot untouched
//! and never affects the other three.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use kanvas_api::{KanvasResult, RuntimeApi};
use kanvas_core::{Container, Entity, Image, Network, NodeRef, RefreshTrigger, ResourceKind, Volume};
use metrics::{counter, histogram};
use tokio::sync::{oneshot, watch, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// One collection: readers load the whole `Arc<Vec<T>>`, writers swap it.
struct Slot<T> {
    data: ArcSwap<Vec<T>>,
    /// Batch number of the stored snapshot. Guards against an older batch
    /// finishing after a newer one.
    batch: Mutex<u64>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self { data: ArcSwap::from_pointee(Vec::new()), batch: Mutex::new(0) }
    }

    fn load(&self) -> Arc<Vec<T>> { self.data.load_full() }

    /// Returns false when a newer batch already stored its result.
    fn store(&self, batch: u64, items: Vec<T>) -> bool {
        let mut last = self.batch.lock().unwrap_or_else(|p| p.into_inner());
        if batch < *last {
            return false;
        }
        *last = batch;
        self.data.store(Arc::new(items));
        true
    }
}

/// Point-in-time item counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub containers: usize,
    pub images: usize,
    pub volumes: usize,
    pub networks: usize,
}

/// Outcome of a single refresh batch, per kind.
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub batch: u64,
    pub failed: Vec<(ResourceKind, kanvas_api::KanvasError)>,
}

impl RefreshReport {
    pub fn is_ok(&self) -> bool { self.failed.is_empty() }
}

/// Owns the four collection slots and the loading flag.
pub struct Synchronizer {
    api: Arc<dyn RuntimeApi>,
    containers: Slot<Container>,
    images: Slot<Image>,
    volumes: Slot<Volume>,
    networks: Slot<Network>,
    next_batch: AtomicU64,
    in_flight: AtomicUsize,
    loading_tx: watch::Sender<bool>,
    epoch_tx: watch::Sender<u64>,
}

impl Synchronizer {
    pub fn new(api: Arc<dyn RuntimeApi>) -> Arc<Self> {
        let (loading_tx, _) = watch::channel(false);
        let (epoch_tx, _) = watch::channel(0u64);
        Arc::new(Self {
            api,
            containers: Slot::new(),
            images: Slot::new(),
            volumes: Slot::new(),
            networks: Slot::new(),
            next_batch: AtomicU64::new(1),
            in_flight: AtomicUsize::new(0),
            loading_tx,
            epoch_tx,
        })
    }

    pub fn containers(&self) -> Arc<Vec<Container>> { self.containers.load() }
    pub fn images(&self) -> Arc<Vec<Image>> { self.images.load() }
    pub fn volumes(&self) -> Arc<Vec<Volume>> { self.volumes.load() }
    pub fn networks(&self) -> Arc<Vec<Network>> { self.networks.load() }

    /// True while at least one refresh batch is outstanding.
    pub fn is_loading(&self) -> bool { *self.loading_tx.borrow() }
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> { self.loading_tx.subscribe() }

    /// Incremented after every settled batch, successful or not.
    pub fn epoch(&self) -> u64 { *self.epoch_tx.borrow() }
    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> { self.epoch_tx.subscribe() }

    pub fn counts(&self) -> Counts {
        Counts {
            containers: self.containers.load().len(),
            images: self.images.load().len(),
            volumes: self.volumes.load().len(),
            networks: self.networks.load().len(),
        }
    }

    /// Entities of one kind from the current snapshot, in API order.
    pub fn entities(&self, kind: ResourceKind) -> Vec<Entity> {
        match kind {
            ResourceKind::Container => self.containers().iter().cloned().map(Entity::Container).collect(),
            ResourceKind::Image => self.images().iter().cloned().map(Entity::Image).collect(),
            ResourceKind::Volume => self.volumes().iter().cloned().map(Entity::Volume).collect(),
            ResourceKind::Network => self.networks().iter().cloned().map(Entity::Network).collect(),
        }
    }

    pub fn find(&self, node: &NodeRef) -> Option<Entity> {
        let key = node.key.as_str();
        match node.kind {
            ResourceKind::Container => self.containers().iter().find(|c| c.id == key).cloned().map(Entity::Container),
            ResourceKind::Image => self.images().iter().find(|i| i.key() == key).cloned().map(Entity::Image),
            ResourceKind::Volume => self.volumes().iter().find(|v| v.name == key).cloned().map(Entity::Volume),
            ResourceKind::Network => self.networks().iter().find(|n| n.id == key).cloned().map(Entity::Network),
        }
    }

    pub fn contains(&self, node: &NodeRef) -> bool { self.find(node).is_some() }

    fn begin_batch(&self) -> u64 {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            self.loading_tx.send_replace(true);
        }
        self.next_batch.fetch_add(1, Ordering::SeqCst)
    }

    fn end_batch(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.loading_tx.send_replace(false);
        }
        self.epoch_tx.send_modify(|e| *e += 1);
    }

    fn settle<T>(&self, kind: ResourceKind, batch: u64, slot: &Slot<T>, res: KanvasResult<Vec<T>>, report: &Mutex<RefreshReport>) {
        match res {
            Ok(items) => {
                let n = items.len();
                if slot.store(batch, items) {
                    debug!(kind = %kind, batch, items = n, "sync: slot replaced");
                } else {
                    debug!(kind = %kind, batch, "sync: stale batch result discarded");
                }
            }
            Err(e) => {
                warn!(kind = %kind, batch, error = %e, "sync: fetch failed; keeping last snapshot");
                counter!("kanvas_refresh_failures_total", 1, "kind" => kind.as_str());
                report.lock().unwrap_or_else(|p| p.into_inner()).failed.push((kind, e));
            }
        }
    }

    /// Fetch all four kinds concurrently and replace each slot independently.
    /// Never fails: per-kind errors are logged and reported, not raised.
    pub async fn refresh_all(&self) -> RefreshReport {
        let t0 = Instant::now();
        let batch = self.begin_batch();
        // Clears loading even if this future is dropped mid-batch.
        let _guard = BatchGuard(self);
        let report = Mutex::new(RefreshReport { batch, failed: Vec::new() });
        counter!("kanvas_refresh_total", 1);
        debug!(batch, "sync: refresh start");
        // All four requests are issued before any is awaited to completion; each
        // slot is settled as soon as its own response arrives.
        tokio::join!(
            async { let r = self.api.list_containers().await; self.settle(ResourceKind::Container, batch, &self.containers, r, &report) },
            async { let r = self.api.list_images().await; self.settle(ResourceKind::Image, batch, &self.images, r, &report) },
            async { let r = self.api.list_volumes().await; self.settle(ResourceKind::Volume, batch, &self.volumes, r, &report) },
            async { let r = self.api.list_networks().await; self.settle(ResourceKind::Network, batch, &self.networks, r, &report) },
        );
        let report = report.into_inner().unwrap_or_else(|p| p.into_inner());
        let took = t0.elapsed();
        histogram!("kanvas_refresh_ms", took.as_secs_f64() * 1000.0);
        let c = self.counts();
        info!(
            batch,
            failed = report.failed.len(),
            containers = c.containers,
            images = c.images,
            volumes = c.volumes,
            networks = c.networks,
            took_ms = %took.as_millis(),
            "sync: refresh settled"
        );
        report
    }
}

struct BatchGuard<'a>(&'a Synchronizer);

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) { self.0.end_batch(); }
}

/// Cloneable on-demand refresh trigger handed to command dispatchers.
#[derive(Clone)]
pub struct RefreshRequester {
    notify: Arc<Notify>,
    requested: Arc<AtomicU64>,
}

impl RefreshRequester {
    /// Number of on-demand refreshes requested so far.
    pub fn requested(&self) -> u64 { self.requested.load(Ordering::SeqCst) }
}

impl RefreshTrigger for RefreshRequester {
    fn request_refresh(&self) {
        self.requested.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

/// Handle for the running poll loop. Dropping it stops the loop.
pub struct SyncHandle {
    sync: Arc<Synchronizer>,
    requester: RefreshRequester,
    stop: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl SyncHandle {
    pub fn synchronizer(&self) -> &Arc<Synchronizer> { &self.sync }
    pub fn trigger(&self) -> RefreshRequester { self.requester.clone() }
    pub fn is_running(&self) -> bool { self.stop.is_some() }

    /// Cancel the poll loop. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            info!("sync: poll loop stop requested");
            let _ = stop.send(());
        }
    }

    /// Stop and wait for the loop task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the poll loop: one refresh immediately, then every `interval`, plus
/// whenever the returned trigger is fired. Each refresh runs as its own task so a
/// hung request never delays the next tick.
pub fn spawn_sync(sync: Arc<Synchronizer>, interval: Duration) -> SyncHandle {
    let notify = Arc::new(Notify::new());
    let requester = RefreshRequester { notify: notify.clone(), requested: Arc::new(AtomicU64::new(0)) };
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let loop_sync = sync.clone();
    let task = tokio::spawn(async move {
        info!(interval_ms = %interval.as_millis(), "sync: poll loop started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut batches = tokio::task::JoinSet::new();
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    let s = loop_sync.clone();
                    batches.spawn(async move { s.refresh_all().await; });
                }
                _ = notify.notified() => {
                    debug!("sync: on-demand refresh");
                    let s = loop_sync.clone();
                    batches.spawn(async move { s.refresh_all().await; });
                }
                Some(_) = batches.join_next(), if !batches.is_empty() => {}
            }
        }
        batches.abort_all();
        while batches.join_next().await.is_some() {}
        info!("sync: poll loop stopped");
    });
    SyncHandle { sync, requester, stop: Some(stop_tx), task: Some(task) }
}
