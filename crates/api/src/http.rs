#![forbid(unsafe_code)]

use std::time::Instant;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use kanvas_core::{Container, CreateContainerRequest, Image, Network, RegistryItem, Volume};

use crate::{KanvasError, KanvasResult, RuntimeApi, SearchEnvelope, VolumesEnvelope};

/// HTTP client for the runtime proxy (`<base>/api/...`).
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client: Client::new(), base_url }
    }

    pub fn base_url(&self) -> &str { &self.base_url }

    fn url(&self, path: &str) -> String { format!("{}{}", self.base_url, path) }

    fn transport(e: reqwest::Error) -> KanvasError { KanvasError::Network(e.to_string()) }

    /// Non-2xx responses become `Network`, preferring the server's `error`/`message` field.
    async fn check(path: &str, resp: Response) -> KanvasResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .or_else(|| v.get("message"))
                    .and_then(|m| m.as_str())
                    .map(|s| s.to_string())
            })
            .unwrap_or(body);
        if detail.is_empty() {
            Err(KanvasError::Network(format!("{} returned {}", path, status)))
        } else {
            Err(KanvasError::Network(format!("{} returned {}: {}", path, status, detail)))
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> KanvasResult<T> {
        let t0 = Instant::now();
        let resp = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(Self::transport)?;
        let resp = Self::check(path, resp).await?;
        let bytes = resp.bytes().await.map_err(Self::transport)?;
        let out = serde_json::from_slice::<T>(&bytes)
            .map_err(|e| KanvasError::Decode(format!("{}: {}", path, e)))?;
        debug!(path = %path, bytes = bytes.len(), took_ms = %t0.elapsed().as_millis(), "api: get ok");
        Ok(out)
    }
}

#[async_trait::async_trait]
impl RuntimeApi for HttpApi {
    async fn list_containers(&self) -> KanvasResult<Vec<Container>> {
        self.get_json("/api/containers", &[]).await
    }

    async fn list_images(&self) -> KanvasResult<Vec<Image>> {
        self.get_json("/api/images", &[]).await
    }

    async fn list_volumes(&self) -> KanvasResult<Vec<Volume>> {
        let env: VolumesEnvelope = self.get_json("/api/volumes", &[]).await?;
        Ok(env.into_volumes())
    }

    async fn list_networks(&self) -> KanvasResult<Vec<Network>> {
        self.get_json("/api/networks", &[]).await
    }

    async fn search_images(&self, query: &str) -> KanvasResult<Vec<RegistryItem>> {
        let env: SearchEnvelope = self.get_json("/api/search/images", &[("query", query)]).await?;
        Ok(env.results)
    }

    async fn pull_image(&self, image: &str, tag: &str) -> KanvasResult<()> {
        let path = "/api/images/create";
        let t0 = Instant::now();
        info!(image = %image, tag = %tag, "api: pull start");
        let resp = self
            .client
            .post(self.url(path))
            .query(&[("fromImage", image), ("tag", tag)])
            .send()
            .await
            .map_err(Self::transport)?;
        Self::check(path, resp).await?;
        info!(image = %image, tag = %tag, took_ms = %t0.elapsed().as_millis(), "api: pull accepted");
        Ok(())
    }

    async fn create_container(&self, req: &CreateContainerRequest) -> KanvasResult<()> {
        let path = "/api/containers/create";
        let t0 = Instant::now();
        info!(name = %req.name, image = %req.image, ports = req.exposed_ports.len(), "api: create start");
        let resp = self
            .client
            .post(self.url(path))
            .json(req)
            .send()
            .await
            .map_err(Self::transport)?;
        Self::check(path, resp).await?;
        info!(name = %req.name, took_ms = %t0.elapsed().as_millis(), "api: create ok");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = HttpApi::new("http://localhost:5000/");
        assert_eq!(api.base_url(), "http://localhost:5000");
        assert_eq!(api.url("/api/images"), "http://localhost:5000/api/images");
    }

    #[tokio::test]
    async fn unreachable_host_maps_to_network_error() {
        // Port 9 (discard) on localhost is normally closed.
        let api = HttpApi::new("http://127.0.0.1:9");
        let err = api.list_containers().await.unwrap_err();
        assert!(matches!(err, KanvasError::Network(_)), "got {:?}", err);
    }
}
