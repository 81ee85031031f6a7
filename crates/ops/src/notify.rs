#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub text: String,
    pub severity: Severity,
}

struct Inner {
    ttl: Duration,
    next_id: AtomicU64,
    tx: watch::Sender<Vec<Notification>>,
}

impl Inner {
    fn dismiss(&self, id: u64) -> bool {
        self.tx.send_if_modified(|list| {
            let before = list.len();
            list.retain(|n| n.id != id);
            list.len() != before
        })
    }
}

/// Visible command outcomes, oldest first. Each entry expires after the TTL
/// unless dismissed earlier.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

impl Default for NotificationCenter {
    fn default() -> Self { Self::new(DEFAULT_NOTIFICATION_TTL) }
}

impl NotificationCenter {
    pub fn new(ttl: Duration) -> Self {
        let (tx, _) = watch::channel(Vec::new());
        Self { inner: Arc::new(Inner { ttl, next_id: AtomicU64::new(1), tx }) }
    }

    pub fn ttl(&self) -> Duration { self.inner.ttl }

    pub fn push(&self, text: impl Into<String>, severity: Severity) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let n = Notification { id, text: text.into(), severity };
        debug!(id, severity = ?n.severity, text = %n.text, "notify: push");
        self.inner.tx.send_modify(|list| list.push(n));
        // Outside a runtime nothing expires; callers dismiss manually.
        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            let weak: Weak<Inner> = Arc::downgrade(&self.inner);
            let ttl = self.inner.ttl;
            rt.spawn(async move {
                tokio::time::sleep(ttl).await;
                if let Some(inner) = weak.upgrade() {
                    if inner.dismiss(id) {
                        debug!(id, "notify: expired");
                    }
                }
            });
        }
        id
    }

    /// Remove a notification early. Returns false when it was already gone.
    pub fn dismiss(&self, id: u64) -> bool { self.inner.dismiss(id) }

    pub fn current(&self) -> Vec<Notification> { self.inner.tx.borrow().clone() }

    pub fn latest(&self) -> Option<Notification> { self.inner.tx.borrow().last().cloned() }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> { self.inner.tx.subscribe() }
}
