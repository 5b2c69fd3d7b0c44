use serde::Deserialize;

/// Identifier of an actor or a resource.
///
/// Actor ids and resource ids share this width but live in separate id spaces;
/// the graph types in [`crate::graph`] keep them apart.
pub type NodeId = u32;

/// Width of a [`NodeId`] in the binary graph format.
pub const NODE_ID_BYTES: usize = std::mem::size_of::<NodeId>();

/// Minimal projection of an archive event: just the actor and resource ids.
///
/// Every other field of the event (type, payload, timestamps) is ignored by serde.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ActivityEvent {
    pub actor: ActorRef,
    pub repo: RepoRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ActorRef {
    pub id: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RepoRef {
    pub id: NodeId,
}

impl ActivityEvent {
    /// The (actor, resource) edge this event contributes.
    pub fn edge(&self) -> (NodeId, NodeId) {
        (self.actor.id, self.repo.id)
    }
}

/// A decoded line together with its own copy of the raw bytes.
///
/// The bytes are copied out of the reader's reusable line buffer, so the
/// record stays valid after the buffer is refilled.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord<T> {
    pub line: Box<[u8]>,
    pub value: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_event_ignores_extra_fields() {
        let json = r#"{"id":"1","type":"PushEvent","actor":{"id":7,"login":"a"},"repo":{"id":9,"name":"a/b"},"payload":{"size":1}}"#;
        let event: ActivityEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.edge(), (7, 9));
    }

    #[test]
    fn activity_event_requires_repo() {
        let json = r#"{"actor":{"id":7}}"#;
        assert!(serde_json::from_str::<ActivityEvent>(json).is_err());
    }

    #[test]
    fn activity_event_rejects_ids_wider_than_node_id() {
        let json = r#"{"actor":{"id":4294967296},"repo":{"id":1}}"#;
        assert!(serde_json::from_str::<ActivityEvent>(json).is_err());
    }
}
