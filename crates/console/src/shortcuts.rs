#![forbid(unsafe_code)]

use std::sync::Arc;

use kanvas_search::SearchEngine;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const KEY_QUEUE_CAP: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Escape,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub ctrl: bool,
}

impl KeyEvent {
    pub fn plain(key: Key) -> Self { Self { key, ctrl: false } }
    pub fn ctrl(c: char) -> Self { Self { key: Key::Char(c), ctrl: true } }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FocusState {
    pub search_focused: bool,
    /// Some other text input owns the keyboard.
    pub other_input_focused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    FocusSearch,
    /// Empty the query and drop search focus.
    ClearSearch,
}

/// Map a key press to a shortcut given the current focus.
pub fn resolve(ev: &KeyEvent, focus: FocusState) -> Option<ShortcutAction> {
    match ev.key {
        Key::Char(c) if ev.ctrl && c.eq_ignore_ascii_case(&'k') => Some(ShortcutAction::FocusSearch),
        Key::Char('/') if !ev.ctrl && !focus.search_focused && !focus.other_input_focused => {
            Some(ShortcutAction::FocusSearch)
        }
        Key::Escape if focus.search_focused => Some(ShortcutAction::ClearSearch),
        _ => None,
    }
}

/// Resolve and apply one key press against the search engine and focus state.
pub fn apply_key(ev: &KeyEvent, focus: &watch::Sender<FocusState>, search: &SearchEngine) -> Option<ShortcutAction> {
    let action = resolve(ev, *focus.borrow())?;
    debug!(?action, "keys: shortcut");
    match action {
        ShortcutAction::FocusSearch => {
            focus.send_if_modified(|f| {
                let changed = !f.search_focused || f.other_input_focused;
                f.search_focused = true;
                f.other_input_focused = false;
                changed
            });
        }
        ShortcutAction::ClearSearch => {
            search.clear();
            focus.send_modify(|f| f.search_focused = false);
        }
    }
    Some(action)
}

/// Renderer side of the listener: forwards raw key presses.
#[derive(Clone)]
pub struct KeyboardSender {
    tx: mpsc::Sender<KeyEvent>,
}

impl KeyboardSender {
    /// False when the listener is gone or its queue is full.
    pub fn send(&self, ev: KeyEvent) -> bool { self.tx.try_send(ev).is_ok() }
}

/// Process-wide key listener. One task, cancelled exactly once.
pub struct ShortcutListener {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ShortcutListener {
    pub fn register(focus: Arc<watch::Sender<FocusState>>, search: Arc<SearchEngine>) -> (Self, KeyboardSender) {
        let (tx, mut rx) = mpsc::channel::<KeyEvent>(KEY_QUEUE_CAP);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            info!("keys: listener registered");
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    ev = rx.recv() => match ev {
                        Some(ev) => { apply_key(&ev, &focus, &search); }
                        None => break,
                    },
                }
            }
            info!("keys: listener stopped");
        });
        (Self { stop: Some(stop_tx), task: Some(task) }, KeyboardSender { tx })
    }

    pub fn is_registered(&self) -> bool { self.stop.is_some() }

    /// Stop listening. Safe to call repeatedly.
    pub fn unregister(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        self.task.take();
    }
}

impl Drop for ShortcutListener {
    fn drop(&mut self) { self.unregister(); }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE: FocusState = FocusState { search_focused: false, other_input_focused: false };

    #[test]
    fn ctrl_k_focuses_from_anywhere() {
        let busy = FocusState { search_focused: false, other_input_focused: true };
        assert_eq!(resolve(&KeyEvent::ctrl('k'), busy), Some(ShortcutAction::FocusSearch));
        assert_eq!(resolve(&KeyEvent::ctrl('K'), IDLE), Some(ShortcutAction::FocusSearch));
        assert_eq!(resolve(&KeyEvent::plain(Key::Char('k')), IDLE), None);
    }

    #[test]
    fn slash_only_when_no_input_has_focus() {
        let slash = KeyEvent::plain(Key::Char('/'));
        assert_eq!(resolve(&slash, IDLE), Some(ShortcutAction::FocusSearch));
        assert_eq!(resolve(&slash, FocusState { search_focused: false, other_input_focused: true }), None);
        assert_eq!(resolve(&slash, FocusState { search_focused: true, other_input_focused: false }), None);
    }

    #[test]
    fn escape_clears_only_focused_search() {
        let esc = KeyEvent::plain(Key::Escape);
        assert_eq!(resolve(&esc, IDLE), None);
        assert_eq!(resolve(&esc, FocusState { search_focused: true, other_input_focused: false }), Some(ShortcutAction::ClearSearch));
        assert_eq!(resolve(&KeyEvent::plain(Key::Other), IDLE), None);
    }
}
