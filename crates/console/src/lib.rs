//! Kanvas console session: wires the synchronizer, search engine, command
//! dispatcher, selection and keyboard shortcuts into one owned object.
//!
//! A renderer reads snapshots through the accessors and calls the entry points;
//! nothing here draws. [`Session::shutdown`] cancels the poll loop, the key
//! listener and any pending search exactly once.

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use kanvas_api::{HttpApi, RuntimeApi};
use kanvas_core::{
    Container, DragPayload, Entity, Image, KindMismatch, Network, NodeRef, RefreshTrigger, ResourceKind, SearchResult,
    Selection, Volume,
};
use kanvas_ops::{CommandRecord, CreateDialog, Dispatcher, Notification, NotificationCenter};
use kanvas_search::{SearchEngine, SearchView};
use kanvas_store::{spawn_sync, Counts, RefreshRequester, SyncHandle, Synchronizer};
use tokio::sync::watch;
use tracing::info;

mod config;
mod shortcuts;

pub use config::{SessionConfig, DEFAULT_API_URL};
pub use shortcuts::{apply_key, resolve, FocusState, Key, KeyEvent, KeyboardSender, ShortcutAction, ShortcutListener};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> { m.lock().unwrap_or_else(|p| p.into_inner()) }

pub struct Session {
    config: SessionConfig,
    sync: Arc<Synchronizer>,
    poll: SyncHandle,
    refresh: RefreshRequester,
    search: Arc<SearchEngine>,
    dispatcher: Dispatcher,
    selection: Mutex<Selection>,
    focus: Arc<watch::Sender<FocusState>>,
    keys: ShortcutListener,
    keyboard: KeyboardSender,
    closed: bool,
}

impl Session {
    /// Build a session against the HTTP backend at `config.api_url`.
    pub fn connect(config: SessionConfig) -> Self {
        let api = Arc::new(HttpApi::new(config.api_url.clone()));
        Self::start(api, config)
    }

    /// Start polling (first refresh runs immediately) and register the key listener.
    /// Must be called inside a tokio runtime.
    pub fn start(api: Arc<dyn RuntimeApi>, config: SessionConfig) -> Self {
        info!(api = %config.api_url, poll_secs = config.poll_interval.as_secs(), "session: start");
        let sync = Synchronizer::new(api.clone());
        let poll = spawn_sync(sync.clone(), config.poll_interval);
        let refresh = poll.trigger();
        let search = Arc::new(SearchEngine::new(api.clone(), config.search));
        let notifications = NotificationCenter::new(config.notification_ttl);
        let dispatcher = Dispatcher::new(api, Arc::new(refresh.clone()), notifications);
        let (focus_tx, _) = watch::channel(FocusState::default());
        let focus = Arc::new(focus_tx);
        let (keys, keyboard) = ShortcutListener::register(focus.clone(), search.clone());
        Self {
            config,
            sync,
            poll,
            refresh,
            search,
            dispatcher,
            selection: Mutex::new(Selection::default()),
            focus,
            keys,
            keyboard,
            closed: false,
        }
    }

    pub fn config(&self) -> &SessionConfig { &self.config }
    pub fn synchronizer(&self) -> &Arc<Synchronizer> { &self.sync }
    pub fn dispatcher(&self) -> &Dispatcher { &self.dispatcher }

    // Collections

    pub fn containers(&self) -> Arc<Vec<Container>> { self.sync.containers() }
    pub fn images(&self) -> Arc<Vec<Image>> { self.sync.images() }
    pub fn volumes(&self) -> Arc<Vec<Volume>> { self.sync.volumes() }
    pub fn networks(&self) -> Arc<Vec<Network>> { self.sync.networks() }
    pub fn entities(&self, kind: ResourceKind) -> Vec<Entity> { self.sync.entities(kind) }
    pub fn counts(&self) -> Counts { self.sync.counts() }
    pub fn is_loading(&self) -> bool { self.sync.is_loading() }
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> { self.sync.subscribe_loading() }
    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> { self.sync.subscribe_epoch() }

    /// Ask the poll loop for an extra batch now.
    pub fn refresh_now(&self) { self.refresh.request_refresh() }

    // Selection and drag

    pub fn select(&self, node: NodeRef) { lock(&self.selection).select(node) }
    pub fn deselect(&self) { lock(&self.selection).deselect() }
    pub fn selection(&self) -> Option<NodeRef> { lock(&self.selection).current().cloned() }

    /// Live entity behind the selection, if it is still present.
    pub fn selected_entity(&self) -> Option<Entity> {
        let node = self.selection()?;
        self.sync.find(&node)
    }

    /// Clear the selection when its entity has disappeared. Returns true if cleared.
    pub fn prune_selection(&self) -> bool {
        let sync = &self.sync;
        lock(&self.selection).prune(|n| sync.contains(n))
    }

    pub fn begin_drag(&self, kind: ResourceKind, entity: &Entity) -> Result<DragPayload, KindMismatch> {
        DragPayload::begin(kind, entity)
    }

    // Search

    /// Keystroke into the search field (debounced).
    pub fn search_input(&self, query: impl Into<String>) { self.search.input(query) }
    pub async fn search(&self, query: &str) -> Vec<SearchResult> { self.search.search(query).await }
    pub fn search_view(&self) -> SearchView { self.search.view() }
    pub fn subscribe_search(&self) -> watch::Receiver<SearchView> { self.search.subscribe() }

    // Commands

    pub async fn pull_image(&self, image: &SearchResult) -> CommandRecord { self.dispatcher.pull_image(image).await }

    pub async fn create_container(&self, name: &str, ports: &str, base: &SearchResult) -> CommandRecord {
        self.dispatcher.create_container(name, ports, base).await
    }

    pub fn is_pulling(&self, target: &str) -> bool { self.dispatcher.is_pulling(target) }
    pub fn commands(&self) -> Vec<CommandRecord> { self.dispatcher.commands() }
    pub fn notifications(&self) -> Vec<Notification> { self.dispatcher.notifications().current() }
    pub fn dismiss_notification(&self, id: u64) -> bool { self.dispatcher.notifications().dismiss(id) }
    pub fn subscribe_notifications(&self) -> watch::Receiver<Vec<Notification>> {
        self.dispatcher.notifications().subscribe()
    }
    pub fn dialog(&self) -> Option<CreateDialog> { self.dispatcher.dialog() }
    pub fn open_create_dialog(&self, image: SearchResult) -> CreateDialog { self.dispatcher.open_create_dialog(image) }

    // Keyboard

    pub fn focus(&self) -> FocusState { *self.focus.borrow() }
    pub fn subscribe_focus(&self) -> watch::Receiver<FocusState> { self.focus.subscribe() }

    /// Renderer reports focus moving in or out of a non-search text input.
    pub fn set_other_input_focused(&self, on: bool) {
        self.focus.send_if_modified(|f| {
            let changed = f.other_input_focused != on || (on && f.search_focused);
            f.other_input_focused = on;
            if on {
                f.search_focused = false;
            }
            changed
        });
    }

    /// Handle a key press synchronously.
    pub fn handle_key(&self, ev: KeyEvent) -> Option<ShortcutAction> { apply_key(&ev, &self.focus, &self.search) }

    /// Sender for the background key listener.
    pub fn keyboard(&self) -> KeyboardSender { self.keyboard.clone() }

    // Lifecycle

    pub fn is_running(&self) -> bool { !self.closed }

    /// Cancel the poll loop, key listener and pending search. Idempotent.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.poll.stop();
        self.keys.unregister();
        self.search.shutdown();
        info!("session: shutdown");
    }
}

impl Drop for Session {
    fn drop(&mut self) { self.shutdown(); }
}
