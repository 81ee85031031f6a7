//! Selection slot and drag payload contract. Pure data, no rendering.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::{Entity, ResourceKind};

/// Reference to a node on the canvas: kind plus identity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub kind: ResourceKind,
    pub key: String,
}

impl NodeRef {
    pub fn new(kind: ResourceKind, key: impl Into<String>) -> Self {
        Self { kind, key: key.into() }
    }
}

impl From<&Entity> for NodeRef {
    fn from(e: &Entity) -> Self { NodeRef::new(e.kind(), e.key()) }
}

/// Single-slot selection. Every `select` overwrites, `deselect` empties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    current: Option<NodeRef>,
}

impl Selection {
    pub fn select(&mut self, node: NodeRef) { self.current = Some(node); }
    pub fn deselect(&mut self) { self.current = None; }
    pub fn current(&self) -> Option<&NodeRef> { self.current.as_ref() }
    pub fn is_selected(&self, node: &NodeRef) -> bool { self.current.as_ref() == Some(node) }

    /// Clears the slot when `exists` reports the referenced entity gone.
    /// Returns true when something was cleared.
    pub fn prune(&mut self, exists: impl FnOnce(&NodeRef) -> bool) -> bool {
        match &self.current {
            Some(n) if !exists(n) => {
                self.current = None;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("drag kind {tag} does not match entity kind {entity}")]
pub struct KindMismatch {
    pub tag: ResourceKind,
    pub entity: ResourceKind,
}

/// Entity snapshot taken at drag start. Later refreshes do not affect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DragPayload {
    entity: Entity,
}

impl DragPayload {
    pub fn begin(kind: ResourceKind, entity: &Entity) -> Result<Self, KindMismatch> {
        if entity.kind() != kind {
            return Err(KindMismatch { tag: kind, entity: entity.kind() });
        }
        Ok(Self { entity: entity.clone() })
    }

    pub fn kind(&self) -> ResourceKind { self.entity.kind() }
    pub fn entity(&self) -> &Entity { &self.entity }
    pub fn node(&self) -> NodeRef { NodeRef::from(&self.entity) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Container, Volume};

    fn container(id: &str, name: &str) -> Entity {
        Entity::Container(Container { id: id.into(), names: vec![format!("/{}", name)], ..Default::default() })
    }

    #[test]
    fn select_overwrites_single_slot() {
        let mut s = Selection::default();
        s.select(NodeRef::new(ResourceKind::Container, "a"));
        s.select(NodeRef::new(ResourceKind::Network, "b"));
        assert_eq!(s.current(), Some(&NodeRef::new(ResourceKind::Network, "b")));
        s.deselect();
        assert!(s.current().is_none());
        s.deselect();
        assert!(s.current().is_none());
    }

    #[test]
    fn prune_only_clears_missing_nodes() {
        let mut s = Selection::default();
        assert!(!s.prune(|_| false));
        s.select(NodeRef::new(ResourceKind::Volume, "data"));
        assert!(!s.prune(|n| n.key == "data"));
        assert!(s.current().is_some());
        assert!(s.prune(|_| false));
        assert!(s.current().is_none());
    }

    #[test]
    fn drag_payload_is_a_snapshot() {
        let mut live = container("c1", "web");
        let payload = DragPayload::begin(ResourceKind::Container, &live).unwrap();
        if let Entity::Container(c) = &mut live {
            c.names = vec!["/renamed".into()];
        }
        assert_eq!(payload.entity().display_name(), "web");
        assert_eq!(payload.kind(), ResourceKind::Container);
        assert_eq!(payload.node(), NodeRef::new(ResourceKind::Container, "c1"));
    }

    #[test]
    fn drag_rejects_mismatched_tag() {
        let v = Entity::Volume(Volume { name: "data".into(), ..Default::default() });
        let err = DragPayload::begin(ResourceKind::Image, &v).unwrap_err();
        assert_eq!(err.entity, ResourceKind::Volume);
    }

    #[test]
    fn selecting_does_not_create_drag_state() {
        let mut s = Selection::default();
        let e = container("c1", "web");
        s.select(NodeRef::from(&e));
        let payload = DragPayload::begin(ResourceKind::Container, &e).unwrap();
        s.deselect();
        assert_eq!(payload.node().key, "c1");
    }
}
