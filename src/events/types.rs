//! Store event types

use crate::models::EntityKind;
use serde::{Deserialize, Serialize};

/// The mutation performed on an entity collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
    Renamed,
    Reloaded,
}

/// An event carried by the [`EventBus`](super::EventBus).
///
/// Must be Clone for `tokio::sync::broadcast`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// A mutation was confirmed by the backend, or a collection was reloaded
    Changed {
        kind: EntityKind,
        action: ChangeAction,
        /// Affected entity, absent for whole-collection reloads
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entity_id: Option<String>,
    },
    /// Request to open a note in the full-screen editor
    OpenNote { note_id: String },
}

impl StoreEvent {
    pub fn changed(kind: EntityKind, action: ChangeAction, entity_id: impl Into<String>) -> Self {
        Self::Changed {
            kind,
            action,
            entity_id: Some(entity_id.into()),
        }
    }

    pub fn reloaded(kind: EntityKind) -> Self {
        Self::Changed {
            kind,
            action: ChangeAction::Reloaded,
            entity_id: None,
        }
    }

    pub fn open_note(note_id: impl Into<String>) -> Self {
        Self::OpenNote {
            note_id: note_id.into(),
        }
    }
}

/// Anything that can publish store events
pub trait EventEmitter: Send + Sync {
    /// Publish an event. Never blocks and never fails.
    fn emit(&self, event: StoreEvent);

    fn emit_changed(&self, kind: EntityKind, action: ChangeAction, entity_id: &str) {
        self.emit(StoreEvent::changed(kind, action, entity_id));
    }

    fn emit_open_note(&self, note_id: &str) {
        self.emit(StoreEvent::open_note(note_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_action_serde_roundtrip() {
        let variants = vec![
            ChangeAction::Created,
            ChangeAction::Updated,
            ChangeAction::Deleted,
            ChangeAction::Renamed,
            ChangeAction::Reloaded,
        ];

        for variant in &variants {
            let json = serde_json::to_string(variant).unwrap();
            let deserialized: ChangeAction = serde_json::from_str(&json).unwrap();
            assert_eq!(variant, &deserialized);
        }
    }

    #[test]
    fn test_store_event_json_shape() {
        let event = StoreEvent::changed(EntityKind::Links, ChangeAction::Deleted, "l1");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "changed");
        assert_eq!(json["kind"], "links");
        assert_eq!(json["action"], "deleted");
        assert_eq!(json["entity_id"], "l1");

        // Reloads carry no entity id
        let json = serde_json::to_string(&StoreEvent::reloaded(EntityKind::Notes)).unwrap();
        assert!(!json.contains("entity_id"));

        let open: StoreEvent =
            serde_json::from_str(r#"{"type":"open_note","note_id":"n1"}"#).unwrap();
        assert_eq!(open, StoreEvent::open_note("n1"));
    }
}
