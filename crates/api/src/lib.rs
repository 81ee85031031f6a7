//! Kanvas backing API façade.
//!
//! This crate defines the trait the session components depend on, an HTTP
//! implementation against the runtime proxy, and an in-memory mock for tests.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use kanvas_core::{Container, CreateContainerRequest, Image, Network, RegistryItem, Volume};

mod http;
pub mod mock;

pub use http::HttpApi;
pub use mock::{MockApi, MockCall};

/// Failure taxonomy shared by every component.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum KanvasError {
    #[error("network: {0}")]
    Network(String),
    #[error("decode: {0}")]
    Decode(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl KanvasError {
    /// Message without the category prefix, for user-facing notifications.
    pub fn message(&self) -> &str {
        match self {
            KanvasError::Network(m)
            | KanvasError::Decode(m)
            | KanvasError::Validation(m)
            | KanvasError::Conflict(m) => m,
        }
    }
}

pub type KanvasResult<T> = Result<T, KanvasError>;

/// `GET /api/volumes` wraps the list under `Volumes`; absent or null means empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumesEnvelope {
    #[serde(rename = "Volumes", default)]
    pub volumes: Option<Vec<Volume>>,
}

impl VolumesEnvelope {
    pub fn into_volumes(self) -> Vec<Volume> { self.volumes.unwrap_or_default() }
}

/// `GET /api/search/images` wraps hits under `results`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchEnvelope {
    #[serde(default)]
    pub results: Vec<RegistryItem>,
}

/// Backing runtime API surface consumed by the console core.
#[async_trait::async_trait]
pub trait RuntimeApi: Send + Sync {
    async fn list_containers(&self) -> KanvasResult<Vec<Container>>;

    async fn list_images(&self) -> KanvasResult<Vec<Image>>;

    /// Volumes already unwrapped from their envelope.
    async fn list_volumes(&self) -> KanvasResult<Vec<Volume>>;

    async fn list_networks(&self) -> KanvasResult<Vec<Network>>;

    /// Raw registry proxy hits for `query`, in proxy order.
    async fn search_images(&self, query: &str) -> KanvasResult<Vec<RegistryItem>>;

    /// Start pulling `<image>:<tag>`.
    async fn pull_image(&self, image: &str, tag: &str) -> KanvasResult<()>;

    async fn create_container(&self, req: &CreateContainerRequest) -> KanvasResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volumes_envelope_unwraps_inner_list() {
        let env: VolumesEnvelope = serde_json::from_value(serde_json::json!({
            "Volumes": [{"Name": "data", "Driver": "local", "Mountpoint": "/var/lib/data"}],
            "Warnings": null
        }))
        .unwrap();
        let v = env.into_volumes();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].name, "data");
    }

    #[test]
    fn volumes_envelope_defaults_to_empty() {
        let env: VolumesEnvelope = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(env.into_volumes().is_empty());
        let env: VolumesEnvelope = serde_json::from_value(serde_json::json!({"Volumes": null})).unwrap();
        assert!(env.into_volumes().is_empty());
    }

    #[test]
    fn error_message_strips_category() {
        let e = KanvasError::Network("connection refused".into());
        assert_eq!(e.to_string(), "network: connection refused");
        assert_eq!(e.message(), "connection refused");
    }
}
