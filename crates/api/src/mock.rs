//! In-memory `RuntimeApi` for tests. Every call is recorded; responses,
//! failures and latencies are configurable per endpoint at any time.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use kanvas_core::{Container, CreateContainerRequest, Image, Network, RegistryItem, ResourceKind, Volume};

use crate::{KanvasError, KanvasResult, RuntimeApi, VolumesEnvelope};

#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    List(ResourceKind),
    Search(String),
    Pull { image: String, tag: String },
    Create(CreateContainerRequest),
}

struct MockState {
    containers: Vec<Container>,
    images: Vec<Image>,
    /// Raw body of `GET /api/volumes`, decoded through the envelope on each call.
    volumes_raw: serde_json::Value,
    networks: Vec<Network>,
    list_errors: HashMap<ResourceKind, KanvasError>,
    list_delays: HashMap<ResourceKind, Duration>,
    search: HashMap<String, Vec<RegistryItem>>,
    search_delays: HashMap<String, Duration>,
    search_error: Option<KanvasError>,
    pull_delay: Duration,
    pull_error: Option<KanvasError>,
    create_delay: Duration,
    create_error: Option<KanvasError>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            containers: Vec::new(),
            images: Vec::new(),
            volumes_raw: serde_json::json!({ "Volumes": [] }),
            networks: Vec::new(),
            list_errors: HashMap::new(),
            list_delays: HashMap::new(),
            search: HashMap::new(),
            search_delays: HashMap::new(),
            search_error: None,
            pull_delay: Duration::ZERO,
            pull_error: None,
            create_delay: Duration::ZERO,
            create_error: None,
        }
    }
}

#[derive(Default)]
pub struct MockApi {
    state: Mutex<MockState>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockApi {
    pub fn new() -> Self { Self::default() }

    fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut st = self.state.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut st)
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).push(call);
    }

    pub fn set_containers(&self, v: Vec<Container>) { self.with(|s| s.containers = v) }
    pub fn set_images(&self, v: Vec<Image>) { self.with(|s| s.images = v) }
    pub fn set_volumes(&self, v: Vec<Volume>) {
        let raw = serde_json::to_value(VolumesEnvelope { volumes: Some(v) }).unwrap_or_default();
        self.with(|s| s.volumes_raw = raw)
    }
    pub fn set_volumes_raw(&self, raw: serde_json::Value) { self.with(|s| s.volumes_raw = raw) }
    pub fn set_networks(&self, v: Vec<Network>) { self.with(|s| s.networks = v) }

    pub fn fail_list(&self, kind: ResourceKind, err: KanvasError) { self.with(|s| { s.list_errors.insert(kind, err); }) }
    pub fn heal_list(&self, kind: ResourceKind) { self.with(|s| { s.list_errors.remove(&kind); }) }
    pub fn delay_list(&self, kind: ResourceKind, d: Duration) { self.with(|s| { s.list_delays.insert(kind, d); }) }

    pub fn set_search(&self, query: &str, items: Vec<RegistryItem>) {
        self.with(|s| { s.search.insert(query.to_string(), items); })
    }
    pub fn delay_search(&self, query: &str, d: Duration) {
        self.with(|s| { s.search_delays.insert(query.to_string(), d); })
    }
    pub fn fail_search(&self, err: Option<KanvasError>) { self.with(|s| s.search_error = err) }

    pub fn delay_pull(&self, d: Duration) { self.with(|s| s.pull_delay = d) }
    pub fn fail_pull(&self, err: Option<KanvasError>) { self.with(|s| s.pull_error = err) }
    pub fn delay_create(&self, d: Duration) { self.with(|s| s.create_delay = d) }
    pub fn fail_create(&self, err: Option<KanvasError>) { self.with(|s| s.create_error = err) }

    pub fn calls(&self) -> Vec<MockCall> { self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone() }

    pub fn list_calls(&self, kind: ResourceKind) -> usize {
        self.calls().iter().filter(|c| matches!(c, MockCall::List(k) if *k == kind)).count()
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c { MockCall::Search(q) => Some(q), _ => None })
            .collect()
    }

    pub fn pull_calls(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c { MockCall::Pull { image, tag } => Some((image, tag)), _ => None })
            .collect()
    }

    pub fn create_calls(&self) -> Vec<CreateContainerRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c { MockCall::Create(r) => Some(r), _ => None })
            .collect()
    }

    async fn list<T>(&self, kind: ResourceKind, pick: impl FnOnce(&MockState) -> KanvasResult<T>) -> KanvasResult<T> {
        self.record(MockCall::List(kind));
        let delay = self.with(|s| s.list_delays.get(&kind).copied());
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        self.with(|s| match s.list_errors.get(&kind) {
            Some(e) => Err(e.clone()),
            None => pick(s),
        })
    }
}

#[async_trait::async_trait]
impl RuntimeApi for MockApi {
    async fn list_containers(&self) -> KanvasResult<Vec<Container>> {
        self.list(ResourceKind::Container, |s| Ok(s.containers.clone())).await
    }

    async fn list_images(&self) -> KanvasResult<Vec<Image>> {
        self.list(ResourceKind::Image, |s| Ok(s.images.clone())).await
    }

    async fn list_volumes(&self) -> KanvasResult<Vec<Volume>> {
        self.list(ResourceKind::Volume, |s| {
            serde_json::from_value::<VolumesEnvelope>(s.volumes_raw.clone())
                .map(VolumesEnvelope::into_volumes)
                .map_err(|e| KanvasError::Decode(format!("/api/volumes: {}", e)))
        })
        .await
    }

    async fn list_networks(&self) -> KanvasResult<Vec<Network>> {
        self.list(ResourceKind::Network, |s| Ok(s.networks.clone())).await
    }

    async fn search_images(&self, query: &str) -> KanvasResult<Vec<RegistryItem>> {
        self.record(MockCall::Search(query.to_string()));
        let delay = self.with(|s| s.search_delays.get(query).copied());
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        self.with(|s| match &s.search_error {
            Some(e) => Err(e.clone()),
            None => Ok(s.search.get(query).cloned().unwrap_or_default()),
        })
    }

    async fn pull_image(&self, image: &str, tag: &str) -> KanvasResult<()> {
        self.record(MockCall::Pull { image: image.to_string(), tag: tag.to_string() });
        let d = self.with(|s| s.pull_delay);
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
        self.with(|s| s.pull_error.clone().map_or(Ok(()), Err))
    }

    async fn create_container(&self, req: &CreateContainerRequest) -> KanvasResult<()> {
        self.record(MockCall::Create(req.clone()));
        let d = self.with(|s| s.create_delay);
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
        self.with(|s| s.create_error.clone().map_or(Ok(()), Err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn volumes_decode_through_envelope() {
        let api = MockApi::new();
        api.set_volumes_raw(serde_json::json!({}));
        assert!(api.list_volumes().await.unwrap().is_empty());
        api.set_volumes_raw(serde_json::json!({"Volumes": "nope"}));
        assert!(matches!(api.list_volumes().await, Err(KanvasError::Decode(_))));
        assert_eq!(api.list_calls(ResourceKind::Volume), 2);
    }

    #[tokio::test]
    async fn failures_are_per_kind() {
        let api = MockApi::new();
        api.set_networks(vec![Network { id: "n1".into(), ..Default::default() }]);
        api.fail_list(ResourceKind::Container, KanvasError::Network("down".into()));
        assert!(api.list_containers().await.is_err());
        assert_eq!(api.list_networks().await.unwrap().len(), 1);
        api.heal_list(ResourceKind::Container);
        assert!(api.list_containers().await.is_ok());
    }
}
