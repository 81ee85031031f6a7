//! Port-mapping input parsing and the create-container payload.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Parsed `hostPort:containerPort[,...]` input keyed by `"<containerPort>/tcp"`.
///
/// Pairs missing either side are dropped without error. A later pair for the
/// same container port replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSpec {
    bindings: BTreeMap<String, String>,
}

impl PortSpec {
    pub fn parse(input: &str) -> Self {
        let mut bindings = BTreeMap::new();
        for pair in input.split(',') {
            let mut parts = pair.split(':');
            let host = parts.next().map(str::trim).unwrap_or("");
            let container = parts.next().map(str::trim).unwrap_or("");
            if host.is_empty() || container.is_empty() {
                continue;
            }
            bindings.insert(format!("{}/tcp", container), host.to_string());
        }
        Self { bindings }
    }

    pub fn is_empty(&self) -> bool { self.bindings.is_empty() }
    pub fn len(&self) -> usize { self.bindings.len() }

    /// `(container port key, host port)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn exposed_ports(&self) -> BTreeMap<String, ExposedPort> {
        self.bindings.keys().map(|k| (k.clone(), ExposedPort {})).collect()
    }

    pub fn port_bindings(&self) -> BTreeMap<String, Vec<HostBinding>> {
        self.bindings
            .iter()
            .map(|(k, host)| (k.clone(), vec![HostBinding { host_port: host.clone() }]))
            .collect()
    }
}

/// Serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposedPort {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostBinding {
    #[serde(rename = "HostPort")]
    pub host_port: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(rename = "PortBindings", default)]
    pub port_bindings: BTreeMap<String, Vec<HostBinding>>,
}

/// Body of the create-container command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateContainerRequest {
    pub name: String,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "ExposedPorts", default)]
    pub exposed_ports: BTreeMap<String, ExposedPort>,
    #[serde(rename = "HostConfig", default)]
    pub host_config: HostConfig,
}

impl CreateContainerRequest {
    /// `image_ref` is used verbatim with `:<tag>` appended.
    pub fn build(name: &str, image_ref: &str, tag: &str, ports: &PortSpec) -> Self {
        Self {
            name: name.to_string(),
            image: format!("{}:{}", image_ref, tag),
            exposed_ports: ports.exposed_ports(),
            host_config: HostConfig { port_bindings: ports.port_bindings() },
        }
    }
}
