//! Runtime entities as returned by the backing API.
//!
//! Field names follow the container-runtime JSON casing (`Id`, `Names`, `RepoTags`, ...).
//! Unknown fields are ignored and `null` lists decode as empty.

#![forbid(unsafe_code)]

use serde::{Deserialize, Deserializer, Serialize};

use crate::ResourceKind;

fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

/// Container run state. Anything the runtime reports besides running/exited is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunState {
    Running,
    Exited,
    Other(String),
}

impl Default for RunState {
    fn default() -> Self { RunState::Other(String::new()) }
}

impl From<String> for RunState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "running" => RunState::Running,
            "exited" => RunState::Exited,
            _ => RunState::Other(s),
        }
    }
}

impl From<RunState> for String {
    fn from(s: RunState) -> Self {
        match s {
            RunState::Running => "running".into(),
            RunState::Exited => "exited".into(),
            RunState::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSummary {
    #[serde(rename = "IP", default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(rename = "PrivatePort", default)]
    pub private_port: u16,
    #[serde(rename = "PublicPort", default, skip_serializing_if = "Option::is_none")]
    pub public_port: Option<u16>,
    #[serde(rename = "Type", default)]
    pub proto: String,
}

impl std::fmt::Display for PortSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.public_port {
            Some(p) => write!(f, "{}->{}/{}", p, self.private_port, self.proto),
            None => write!(f, "{}/{}", self.private_port, self.proto),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Names", default, deserialize_with = "null_as_default")]
    pub names: Vec<String>,
    #[serde(rename = "Image", default)]
    pub image: String,
    #[serde(rename = "State", default)]
    pub state: RunState,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "Ports", default, deserialize_with = "null_as_default")]
    pub ports: Vec<PortSummary>,
}

impl Container {
    /// First name without the leading `/`, else the image, else the short id.
    pub fn display_name(&self) -> String {
        if let Some(first) = self.names.first() {
            let n = first.strip_prefix('/').unwrap_or(first);
            if !n.is_empty() {
                return n.to_string();
            }
        }
        if !self.image.is_empty() {
            return self.image.clone();
        }
        self.id.chars().take(12).collect()
    }

    pub fn is_running(&self) -> bool { self.state == RunState::Running }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Content digest (`sha256:...`).
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "RepoTags", default, deserialize_with = "null_as_default")]
    pub repo_tags: Vec<String>,
    #[serde(rename = "Size", default)]
    pub size: i64,
}

impl Image {
    pub fn display_name(&self) -> String {
        self.repo_tags.first().cloned().unwrap_or_else(|| "<untagged>".to_string())
    }

    /// Digest when present, else the first repo tag.
    pub fn key(&self) -> &str {
        if !self.id.is_empty() {
            &self.id
        } else {
            self.repo_tags.first().map(String::as_str).unwrap_or("")
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Driver", default)]
    pub driver: String,
    #[serde(rename = "Mountpoint", default)]
    pub mountpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Driver", default)]
    pub driver: String,
    #[serde(rename = "Scope", default)]
    pub scope: String,
}

/// Tagged union over the four entity kinds. Consumers switch on the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "UPPERCASE")]
pub enum Entity {
    Container(Container),
    Image(Image),
    Volume(Volume),
    Network(Network),
}

impl Entity {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Entity::Container(_) => ResourceKind::Container,
            Entity::Image(_) => ResourceKind::Image,
            Entity::Volume(_) => ResourceKind::Volume,
            Entity::Network(_) => ResourceKind::Network,
        }
    }

    /// Identity key: container id, image digest/tag, volume name, network id.
    pub fn key(&self) -> &str {
        match self {
            Entity::Container(c) => &c.id,
            Entity::Image(i) => i.key(),
            Entity::Volume(v) => &v.name,
            Entity::Network(n) => &n.id,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Entity::Container(c) => c.display_name(),
            Entity::Image(i) => i.display_name(),
            Entity::Volume(v) => v.name.clone(),
            Entity::Network(n) => n.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_decodes_runtime_casing() {
        let raw = serde_json::json!({
            "Id": "4f1c2d3e4a5b6c7d8e9f",
            "Names": ["/web"],
            "Image": "nginx:latest",
            "State": "running",
            "Status": "Up 3 minutes",
            "Ports": [{"IP": "0.0.0.0", "PrivatePort": 80, "PublicPort": 8080, "Type": "tcp"}],
            "Labels": {"ignored": "yes"}
        });
        let c: Container = serde_json::from_value(raw).unwrap();
        assert_eq!(c.display_name(), "web");
        assert!(c.is_running());
        assert_eq!(c.ports[0].to_string(), "8080->80/tcp");
    }

    #[test]
    fn container_name_falls_back_to_image_then_short_id() {
        let mut c = Container { id: "0123456789abcdef".into(), image: "redis".into(), ..Default::default() };
        assert_eq!(c.display_name(), "redis");
        c.image.clear();
        assert_eq!(c.display_name(), "0123456789ab");
        c.names = vec!["/".into()];
        assert_eq!(c.display_name(), "0123456789ab");
    }

    #[test]
    fn unknown_state_is_kept_verbatim() {
        let c: Container = serde_json::from_value(serde_json::json!({"Id": "x", "State": "paused", "Ports": null})).unwrap();
        assert_eq!(c.state, RunState::Other("paused".into()));
        assert!(c.ports.is_empty());
        let back = serde_json::to_value(&c).unwrap();
        assert_eq!(back["State"], "paused");
    }

    #[test]
    fn image_without_tags_is_untagged() {
        let i: Image = serde_json::from_value(serde_json::json!({"Id": "sha256:abc", "RepoTags": null, "Size": 42})).unwrap();
        assert_eq!(i.display_name(), "<untagged>");
        assert_eq!(i.key(), "sha256:abc");
        let t = Image { repo_tags: vec!["alpine:3".into()], ..Default::default() };
        assert_eq!(t.key(), "alpine:3");
    }

    #[test]
    fn entity_keys_follow_kind_identity() {
        let v = Entity::Volume(Volume { name: "data".into(), ..Default::default() });
        let n = Entity::Network(Network { id: "net1".into(), name: "bridge".into(), ..Default::default() });
        assert_eq!(v.kind(), ResourceKind::Volume);
        assert_eq!(v.key(), "data");
        assert_eq!(n.key(), "net1");
        assert_eq!(n.display_name(), "bridge");
    }
}
