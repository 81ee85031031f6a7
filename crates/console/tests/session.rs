#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use kanvas_api::MockApi;
use kanvas_console::{FocusState, Key, KeyEvent, Session, SessionConfig, ShortcutAction};
use kanvas_core::{Container, Entity, NodeRef, RegistryItem, ResourceKind, RunState, SearchResult};
use kanvas_search::SearchStatus;

fn container(id: &str, state: RunState) -> Container {
    Container { id: id.into(), names: vec![format!("/{}", id)], image: "nginx:latest".into(), state, ..Default::default() }
}

fn result(repo: &str) -> SearchResult {
    SearchResult::from(RegistryItem { repo_name: repo.into(), ..Default::default() })
}

fn list_calls(api: &MockApi) -> [usize; 4] {
    ResourceKind::ALL.map(|k| api.list_calls(k))
}

async fn ms(n: u64) { tokio::time::sleep(Duration::from_millis(n)).await }

fn start(api: &Arc<MockApi>) -> Session { Session::start(api.clone(), SessionConfig::default()) }

#[tokio::test(start_paused = true)]
async fn startup_refresh_populates_collections() {
    let api = Arc::new(MockApi::new());
    api.set_containers(vec![container("web", RunState::Running)]);
    let mut s = start(&api);
    ms(1).await;
    assert_eq!(list_calls(&api), [1, 1, 1, 1]);
    assert_eq!(s.containers()[0].display_name(), "web");
    assert!(!s.is_loading());
    assert_eq!(s.counts().containers, 1);
    s.shutdown();
}

#[tokio::test(start_paused = true)]
async fn successful_create_refreshes_all_four_collections_once() {
    let api = Arc::new(MockApi::new());
    let mut s = start(&api);
    ms(1).await;
    assert_eq!(list_calls(&api), [1, 1, 1, 1]);

    api.set_containers(vec![container("web", RunState::Other("created".into()))]);
    let rec = s.create_container("web", "8080:80", &result("nginx")).await;
    assert!(rec.is_ok());
    ms(1).await;
    assert_eq!(list_calls(&api), [2, 2, 2, 2]);
    assert_eq!(s.containers()[0].id, "web");

    // Nothing more until the next regular tick.
    ms(9_000).await;
    assert_eq!(list_calls(&api), [2, 2, 2, 2]);
    s.shutdown();
}

#[tokio::test(start_paused = true)]
async fn failed_create_does_not_refresh() {
    let api = Arc::new(MockApi::new());
    api.fail_create(Some(kanvas_api::KanvasError::Network("boom".into())));
    let mut s = start(&api);
    ms(1).await;
    s.open_create_dialog(result("nginx"));
    let rec = s.create_container("web", "", &result("nginx")).await;
    assert!(!rec.is_ok());
    ms(1).await;
    assert_eq!(list_calls(&api), [1, 1, 1, 1]);
    assert!(s.dialog().is_some());
    assert_eq!(s.notifications().len(), 1);
    s.shutdown();
}

#[tokio::test(start_paused = true)]
async fn selection_overwrites_and_prunes_stale_entries() {
    let api = Arc::new(MockApi::new());
    api.set_containers(vec![container("a", RunState::Running), container("b", RunState::Running)]);
    let mut s = start(&api);
    ms(1).await;

    s.select(NodeRef::new(ResourceKind::Container, "a"));
    s.select(NodeRef::new(ResourceKind::Container, "b"));
    assert_eq!(s.selection(), Some(NodeRef::new(ResourceKind::Container, "b")));
    assert_eq!(s.selected_entity().map(|e| e.display_name()), Some("b".to_string()));
    assert!(!s.prune_selection());

    api.set_containers(vec![container("a", RunState::Running)]);
    s.refresh_now();
    ms(1).await;
    // Selection survives a refresh until pruned explicitly.
    assert!(s.selection().is_some());
    assert!(s.selected_entity().is_none());
    assert!(s.prune_selection());
    assert_eq!(s.selection(), None);

    s.select(NodeRef::new(ResourceKind::Container, "a"));
    s.deselect();
    s.deselect();
    assert_eq!(s.selection(), None);
    s.shutdown();
}

#[tokio::test(start_paused = true)]
async fn drag_payload_is_a_snapshot() {
    let api = Arc::new(MockApi::new());
    api.set_containers(vec![container("db", RunState::Running)]);
    let mut s = start(&api);
    ms(1).await;

    let live = s.entities(ResourceKind::Container).remove(0);
    let payload = s.begin_drag(ResourceKind::Container, &live).unwrap();
    assert!(s.begin_drag(ResourceKind::Image, &live).is_err());

    api.set_containers(vec![container("db", RunState::Exited)]);
    s.refresh_now();
    ms(1).await;
    assert_eq!(s.containers()[0].state, RunState::Exited);
    match payload.entity() {
        Entity::Container(c) => assert_eq!(c.state, RunState::Running),
        other => panic!("unexpected payload {:?}", other),
    }
    s.shutdown();
}

#[tokio::test(start_paused = true)]
async fn keyboard_listener_drives_search_focus() {
    let api = Arc::new(MockApi::new());
    api.set_search("nginx", vec![RegistryItem { repo_name: "nginx".into(), is_official: true, ..Default::default() }]);
    let mut s = start(&api);
    let keys = s.keyboard();

    assert!(keys.send(KeyEvent::ctrl('k')));
    ms(1).await;
    assert!(s.focus().search_focused);

    s.search_input("nginx");
    ms(501).await;
    assert_eq!(s.search_view().results.len(), 1);

    assert!(keys.send(KeyEvent::plain(Key::Escape)));
    ms(1).await;
    let v = s.search_view();
    assert_eq!(v.query, "");
    assert!(v.results.is_empty());
    assert_eq!(v.status, SearchStatus::Idle);
    assert_eq!(s.focus(), FocusState::default());
    s.shutdown();
}

#[tokio::test(start_paused = true)]
async fn slash_is_ignored_while_another_input_has_focus() {
    let api = Arc::new(MockApi::new());
    let mut s = start(&api);
    s.set_other_input_focused(true);
    assert_eq!(s.handle_key(KeyEvent::plain(Key::Char('/'))), None);
    assert!(!s.focus().search_focused);

    s.set_other_input_focused(false);
    assert_eq!(s.handle_key(KeyEvent::plain(Key::Char('/'))), Some(ShortcutAction::FocusSearch));
    assert!(s.focus().search_focused);
    s.shutdown();
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_idempotent_and_cancels_everything() {
    let api = Arc::new(MockApi::new());
    let mut s = start(&api);
    ms(1).await;
    let keys = s.keyboard();
    s.search_input("redis");

    s.shutdown();
    s.shutdown();
    assert!(!s.is_running());
    ms(60_000).await;
    assert_eq!(list_calls(&api), [1, 1, 1, 1]);
    assert!(api.search_calls().is_empty());
    assert!(!keys.send(KeyEvent::ctrl('k')));
    drop(s);
}
