//! Kanvas Ops: the two mutating commands (pull image, create container).
//!
//! Every completion, success or failure, is surfaced through the
//! [`NotificationCenter`]; errors are never returned past the dispatcher.
//! Pulls are guarded per target so a second pull of an image already in
//! flight is rejected without blocking other images.

#![forbid(unsafe_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use kanvas_api::{KanvasError, RuntimeApi};
use kanvas_core::{CreateContainerRequest, PortSpec, RefreshTrigger, SearchResult, DEFAULT_TAG};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

mod dialog;
mod notify;

pub use dialog::{suggested_name, CreateDialog};
pub use notify::{Notification, NotificationCenter, Severity, DEFAULT_NOTIFICATION_TTL};

/// Records kept for `commands()`; older ones are evicted first.
pub const COMMAND_HISTORY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Pull,
    Create,
}

impl CommandKind {
    fn as_str(self) -> &'static str {
        match self {
            CommandKind::Pull => "pull",
            CommandKind::Create => "create",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Succeeded,
    Failed(KanvasError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    pub id: Uuid,
    pub kind: CommandKind,
    /// Image reference for pulls, container name for creates.
    pub target: String,
    pub status: CommandStatus,
    /// Notification text emitted on completion, if any.
    pub message: Option<String>,
}

impl CommandRecord {
    fn pending(kind: CommandKind, target: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), kind, target: target.into(), status: CommandStatus::Pending, message: None }
    }

    pub fn is_ok(&self) -> bool { self.status == CommandStatus::Succeeded }

    pub fn error(&self) -> Option<&KanvasError> {
        match &self.status {
            CommandStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> { m.lock().unwrap_or_else(|p| p.into_inner()) }

/// Holds a pull target in the in-flight set until dropped.
struct InFlight {
    set: Arc<Mutex<HashSet<String>>>,
    target: String,
}

impl InFlight {
    fn acquire(set: &Arc<Mutex<HashSet<String>>>, target: &str) -> Option<Self> {
        if !lock(set).insert(target.to_string()) {
            return None;
        }
        Some(Self { set: set.clone(), target: target.to_string() })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) { lock(&self.set).remove(&self.target); }
}

pub struct Dispatcher {
    api: Arc<dyn RuntimeApi>,
    refresh: Arc<dyn RefreshTrigger>,
    notifications: NotificationCenter,
    pulling: Arc<Mutex<HashSet<String>>>,
    commands: Mutex<VecDeque<CommandRecord>>,
    dialog: Mutex<Option<CreateDialog>>,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn RuntimeApi>, refresh: Arc<dyn RefreshTrigger>, notifications: NotificationCenter) -> Self {
        Self {
            api,
            refresh,
            notifications,
            pulling: Arc::new(Mutex::new(HashSet::new())),
            commands: Mutex::new(VecDeque::new()),
            dialog: Mutex::new(None),
        }
    }

    pub fn notifications(&self) -> &NotificationCenter { &self.notifications }

    /// Snapshot of recent commands, oldest first.
    pub fn commands(&self) -> Vec<CommandRecord> { lock(&self.commands).iter().cloned().collect() }

    pub fn is_pulling(&self, target: &str) -> bool { lock(&self.pulling).contains(target) }

    fn register(&self, rec: &CommandRecord) {
        let mut cmds = lock(&self.commands);
        if cmds.len() == COMMAND_HISTORY {
            cmds.pop_front();
        }
        cmds.push_back(rec.clone());
    }

    fn complete(&self, rec: &mut CommandRecord, status: CommandStatus, text: String, severity: Severity) {
        let label = match &status {
            CommandStatus::Succeeded => "ok",
            _ => "error",
        };
        counter!("kanvas_ops_commands_total", 1, "kind" => rec.kind.as_str(), "status" => label);
        self.notifications.push(text.clone(), severity);
        rec.status = status;
        rec.message = Some(text);
        let mut cmds = lock(&self.commands);
        if let Some(slot) = cmds.iter_mut().find(|c| c.id == rec.id) {
            *slot = rec.clone();
        }
    }

    /// Pull `<image>:latest`. A second pull of the same image while the first
    /// is pending returns a `Conflict` record without issuing a request.
    pub async fn pull_image(&self, image: &SearchResult) -> CommandRecord {
        let target = image.image_ref().to_string();
        let Some(_guard) = InFlight::acquire(&self.pulling, &target) else {
            debug!(image = %target, "ops: pull already in flight");
            counter!("kanvas_ops_commands_total", 1, "kind" => "pull", "status" => "conflict");
            let mut rec = CommandRecord::pending(CommandKind::Pull, &target);
            rec.status = CommandStatus::Failed(KanvasError::Conflict(format!("{} is already being pulled", target)));
            return rec;
        };
        let mut rec = CommandRecord::pending(CommandKind::Pull, &target);
        self.register(&rec);
        let t0 = Instant::now();
        info!(image = %target, tag = DEFAULT_TAG, "ops: pull start");
        match self.api.pull_image(&target, DEFAULT_TAG).await {
            Ok(()) => {
                info!(image = %target, took_ms = %t0.elapsed().as_millis(), "ops: pull ok");
                let text = format!("Started pulling {}:{}", target, DEFAULT_TAG);
                self.complete(&mut rec, CommandStatus::Succeeded, text, Severity::Success);
            }
            Err(e) => {
                warn!(image = %target, error = %e, "ops: pull failed");
                let text = format!("Failed to pull image: {}", e.message());
                self.complete(&mut rec, CommandStatus::Failed(e), text, Severity::Error);
            }
        }
        rec
    }

    /// Create a container named `name` from `base:latest` with the port
    /// mappings in `ports` (`host:container,...`; malformed pairs are skipped).
    /// On success the collections are refreshed and the dialog closes; on
    /// failure the dialog stays open.
    pub async fn create_container(&self, name: &str, ports: &str, base: &SearchResult) -> CommandRecord {
        let name = name.trim();
        let mut rec = CommandRecord::pending(CommandKind::Create, name);
        self.register(&rec);
        if name.is_empty() {
            let e = KanvasError::Validation("container name is required".into());
            warn!(image = %base.image_ref(), "ops: create rejected, empty name");
            let text = format!("Failed to create container: {}", e.message());
            self.complete(&mut rec, CommandStatus::Failed(e), text, Severity::Error);
            return rec;
        }
        let spec = PortSpec::parse(ports);
        let req = CreateContainerRequest::build(name, base.image_ref(), DEFAULT_TAG, &spec);
        let t0 = Instant::now();
        info!(name = %name, image = %req.image, ports = spec.len(), "ops: create start");
        match self.api.create_container(&req).await {
            Ok(()) => {
                info!(name = %name, took_ms = %t0.elapsed().as_millis(), "ops: create ok");
                self.refresh.request_refresh();
                self.close_create_dialog();
                let text = format!("Container {} created successfully", name);
                self.complete(&mut rec, CommandStatus::Succeeded, text, Severity::Success);
            }
            Err(e) => {
                warn!(name = %name, error = %e, "ops: create failed");
                let text = format!("Failed to create container: {}", e.message());
                self.complete(&mut rec, CommandStatus::Failed(e), text, Severity::Error);
            }
        }
        rec
    }

    pub fn dialog(&self) -> Option<CreateDialog> { lock(&self.dialog).clone() }

    /// Open (or replace) the create dialog with a suggested container name.
    pub fn open_create_dialog(&self, image: SearchResult) -> CreateDialog {
        let d = CreateDialog::open(image);
        *lock(&self.dialog) = Some(d.clone());
        d
    }

    pub fn set_name(&self, name: impl Into<String>) {
        if let Some(d) = lock(&self.dialog).as_mut() {
            d.name = name.into();
        }
    }

    pub fn set_ports(&self, ports: impl Into<String>) {
        if let Some(d) = lock(&self.dialog).as_mut() {
            d.ports = ports.into();
        }
    }

    pub fn can_submit(&self) -> bool { lock(&self.dialog).as_ref().is_some_and(CreateDialog::can_submit) }

    /// Submit the open dialog. `None` when no dialog is open.
    pub async fn submit_create_dialog(&self) -> Option<CommandRecord> {
        let d = self.dialog()?;
        Some(self.create_container(&d.name, &d.ports, &d.image).await)
    }

    pub fn close_create_dialog(&self) { lock(&self.dialog).take(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTrigger(AtomicUsize);

    impl RefreshTrigger for CountingTrigger {
        fn request_refresh(&self) { self.0.fetch_add(1, Ordering::SeqCst); }
    }

    fn result(repo: &str) -> SearchResult {
        SearchResult::from(kanvas_core::RegistryItem { repo_name: repo.into(), ..Default::default() })
    }

    fn dispatcher(api: Arc<kanvas_api::MockApi>) -> (Dispatcher, Arc<CountingTrigger>) {
        let trig = Arc::new(CountingTrigger::default());
        (Dispatcher::new(api, trig.clone(), NotificationCenter::default()), trig)
    }

    #[tokio::test]
    async fn registry_keeps_latest_records_only() {
        let api = Arc::new(kanvas_api::MockApi::new());
        let (d, _) = dispatcher(api);
        for i in 0..(COMMAND_HISTORY + 5) {
            d.pull_image(&result(&format!("img{}", i))).await;
        }
        let cmds = d.commands();
        assert_eq!(cmds.len(), COMMAND_HISTORY);
        assert_eq!(cmds[0].target, "img5");
        assert!(cmds.iter().all(CommandRecord::is_ok));
    }

    #[tokio::test]
    async fn dialog_fields_update_only_while_open() {
        let api = Arc::new(kanvas_api::MockApi::new());
        let (d, _) = dispatcher(api);
        d.set_name("ignored");
        assert!(d.dialog().is_none());
        assert!(!d.can_submit());
        assert!(d.submit_create_dialog().await.is_none());

        d.open_create_dialog(result("library/nginx"));
        assert!(d.dialog().unwrap().name.starts_with("nginx-"));
        d.set_name("");
        assert!(!d.can_submit());
        d.set_name("web");
        d.set_ports("8080:80");
        assert!(d.can_submit());
        assert_eq!(d.dialog().unwrap().ports, "8080:80");
        d.close_create_dialog();
        d.close_create_dialog();
        assert!(d.dialog().is_none());
    }

    #[test]
    fn failed_status_serializes_with_error() {
        let mut rec = CommandRecord::pending(CommandKind::Pull, "redis");
        rec.status = CommandStatus::Failed(KanvasError::Network("down".into()));
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["kind"], "pull");
        assert_eq!(v["status"]["state"], "failed");
        assert_eq!(v["status"]["error"], serde_json::json!({"Network": "down"}));
    }
}
