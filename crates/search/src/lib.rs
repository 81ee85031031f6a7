//! Kanvas search: debounced registry lookup with stale-response protection.
//!
//! Every keystroke goes through [`SearchEngine::input`]. Only the last value after a
//! quiet period issues a request, and only the most recently issued request may
//! publish results. Older responses are dropped by comparing request tokens.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use kanvas_api::{KanvasResult, RuntimeApi};
use kanvas_core::{rank, SearchResult};
use metrics::{counter, histogram};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    pub debounce: Duration,
    /// Queries shorter than this (after trimming) clear results without a request.
    pub min_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { debounce: Duration::from_millis(500), min_chars: 2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// No query long enough to search.
    Idle,
    /// Waiting for the quiet period to elapse.
    Debouncing,
    /// Request issued, response pending.
    Loading,
    /// Results reflect `query` (possibly empty).
    Ready,
}

#[derive(Debug, Clone)]
pub struct SearchView {
    pub query: String,
    pub token: u64,
    pub status: SearchStatus,
    pub results: Arc<Vec<SearchResult>>,
}

impl SearchView {
    /// True when a completed search found nothing, as opposed to still loading.
    pub fn is_empty_result(&self) -> bool {
        self.status == SearchStatus::Ready && self.results.is_empty()
    }
}

impl Default for SearchView {
    fn default() -> Self {
        Self { query: String::new(), token: 0, status: SearchStatus::Idle, results: Arc::new(Vec::new()) }
    }
}

/// Query the registry proxy and return normalized, ranked results.
pub async fn fetch_ranked(api: &dyn RuntimeApi, query: &str) -> KanvasResult<Vec<SearchResult>> {
    let items = api.search_images(query).await?;
    let mut results: Vec<SearchResult> = items.into_iter().map(SearchResult::from).collect();
    rank(&mut results);
    Ok(results)
}

struct Shared {
    api: Arc<dyn RuntimeApi>,
    latest: AtomicU64,
    view_tx: watch::Sender<SearchView>,
}

impl Shared {
    fn is_current(&self, token: u64) -> bool { self.latest.load(Ordering::SeqCst) == token }

    /// Apply `f` to the view only while `token` is still the latest one issued.
    fn publish(&self, token: u64, f: impl FnOnce(&mut SearchView)) -> bool {
        self.view_tx.send_if_modified(|v| {
            if !self.is_current(token) {
                return false;
            }
            f(v);
            true
        })
    }

    async fn run(&self, token: u64, query: String) -> Vec<SearchResult> {
        if !self.publish(token, |v| v.status = SearchStatus::Loading) {
            return Vec::new();
        }
        let t0 = Instant::now();
        counter!("kanvas_search_requests_total", 1);
        debug!(token, query = %query, "search: request start");
        let results = match fetch_ranked(self.api.as_ref(), &query).await {
            Ok(r) => r,
            Err(e) => {
                warn!(token, query = %query, error = %e, "search: request failed; clearing results");
                Vec::new()
            }
        };
        histogram!("kanvas_search_ms", t0.elapsed().as_secs_f64() * 1000.0);
        let shared = Arc::new(results.clone());
        let published = self.publish(token, |v| {
            v.status = SearchStatus::Ready;
            v.results = shared;
        });
        if published {
            info!(token, query = %query, hits = results.len(), took_ms = %t0.elapsed().as_millis(), "search: results published");
        } else {
            counter!("kanvas_search_stale_dropped_total", 1);
            debug!(token, query = %query, "search: stale response dropped");
        }
        results
    }
}

pub struct SearchEngine {
    shared: Arc<Shared>,
    cfg: SearchConfig,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl SearchEngine {
    pub fn new(api: Arc<dyn RuntimeApi>, cfg: SearchConfig) -> Self {
        let (view_tx, _) = watch::channel(SearchView::default());
        Self {
            shared: Arc::new(Shared { api, latest: AtomicU64::new(0), view_tx }),
            cfg,
            timer: Mutex::new(None),
        }
    }

    pub fn config(&self) -> SearchConfig { self.cfg }
    pub fn view(&self) -> SearchView { self.shared.view_tx.borrow().clone() }
    pub fn results(&self) -> Arc<Vec<SearchResult>> { self.shared.view_tx.borrow().results.clone() }
    pub fn subscribe(&self) -> watch::Receiver<SearchView> { self.shared.view_tx.subscribe() }

    fn next_token(&self) -> u64 { self.shared.latest.fetch_add(1, Ordering::SeqCst) + 1 }

    fn cancel_timer(&self) {
        if let Some(h) = self.timer.lock().unwrap_or_else(|p| p.into_inner()).take() {
            h.abort();
        }
    }

    fn too_short(&self, query: &str) -> bool { query.trim().chars().count() < self.cfg.min_chars }

    /// Keystroke entry point: restart the debounce timer with the new value.
    pub fn input(&self, query: impl Into<String>) {
        let query = query.into();
        let token = self.next_token();
        self.cancel_timer();
        if self.too_short(&query) {
            self.shared.view_tx.send_modify(|v| {
                *v = SearchView { query, token, status: SearchStatus::Idle, results: Arc::new(Vec::new()) };
            });
            return;
        }
        self.shared.view_tx.send_modify(|v| {
            v.query = query.clone();
            v.token = token;
            v.status = SearchStatus::Debouncing;
        });
        let shared = self.shared.clone();
        let debounce = self.cfg.debounce;
        let task = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            shared.run(token, query.trim().to_string()).await;
        });
        *self.timer.lock().unwrap_or_else(|p| p.into_inner()) = Some(task);
    }

    /// Undebounced search. Publishes only if no newer query arrived meanwhile;
    /// the ranked results are returned to the caller either way.
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        let token = self.next_token();
        self.cancel_timer();
        if self.too_short(query) {
            self.shared.view_tx.send_modify(|v| {
                *v = SearchView { query: query.to_string(), token, status: SearchStatus::Idle, results: Arc::new(Vec::new()) };
            });
            return Vec::new();
        }
        self.shared.view_tx.send_modify(|v| {
            v.query = query.to_string();
            v.token = token;
        });
        self.shared.run(token, query.trim().to_string()).await
    }

    /// Empty the query and results, cancelling any pending or in-flight request.
    pub fn clear(&self) { self.input(String::new()); }

    /// Cancel the debounce timer. Safe to call repeatedly.
    pub fn shutdown(&self) {
        self.cancel_timer();
        self.next_token();
    }
}

impl Drop for SearchEngine {
    fn drop(&mut self) { self.cancel_timer(); }
}
