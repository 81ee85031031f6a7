//! Kanvas core types: runtime entities, selection and drag contracts,
//! command payload shaping and registry search normalization.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

pub mod columns;
pub mod entity;
pub mod ports;
pub mod registry;
pub mod selection;

pub use entity::{Container, Entity, Image, Network, PortSummary, RunState, Volume};
pub use ports::{CreateContainerRequest, ExposedPort, HostBinding, HostConfig, PortSpec};
pub use registry::{rank, RegistryItem, SearchResult, DEFAULT_TAG};
pub use selection::{DragPayload, KindMismatch, NodeRef, Selection};

/// One of the four collection kinds the runtime exposes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceKind {
    Container,
    Image,
    Volume,
    Network,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Container,
        ResourceKind::Image,
        ResourceKind::Volume,
        ResourceKind::Network,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Container => "containers",
            ResourceKind::Image => "images",
            ResourceKind::Volume => "volumes",
            ResourceKind::Network => "networks",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "container" | "containers" | "ps" => Ok(ResourceKind::Container),
            "image" | "images" => Ok(ResourceKind::Image),
            "volume" | "volumes" => Ok(ResourceKind::Volume),
            "network" | "networks" | "net" => Ok(ResourceKind::Network),
            other => Err(format!("unknown resource kind: {} (expect containers|images|volumes|networks)", other)),
        }
    }
}

/// Out-of-band refresh request seam. Implemented by the synchronizer handle and
/// consumed by the command dispatcher after a successful mutation.
pub trait RefreshTrigger: Send + Sync {
    fn request_refresh(&self);
}

pub mod prelude {
    pub use super::{
        Container, DragPayload, Entity, Image, Network, NodeRef, RefreshTrigger, ResourceKind,
        SearchResult, Selection, Volume,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_aliases() {
        assert_eq!("ps".parse::<ResourceKind>().unwrap(), ResourceKind::Container);
        assert_eq!("Images".parse::<ResourceKind>().unwrap(), ResourceKind::Image);
        assert_eq!("volume".parse::<ResourceKind>().unwrap(), ResourceKind::Volume);
        assert_eq!("net".parse::<ResourceKind>().unwrap(), ResourceKind::Network);
        assert!("pods".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn kind_serializes_as_drag_tag() {
        let v = serde_json::to_value(ResourceKind::Volume).unwrap();
        assert_eq!(v, serde_json::json!("VOLUME"));
    }
}
