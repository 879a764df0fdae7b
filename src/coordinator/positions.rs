//! Position commands

use super::{KnowledgeStore, Outcome};
use crate::error::StoreError;
use crate::models::{EntityKind, Position};
use crate::store::{Action, Entity};
use tracing::{debug, warn};

impl KnowledgeStore {
    /// Move a note on the canvas and persist the new coordinates.
    ///
    /// Unlike other kinds, a failed position write does not keep the local
    /// value: the whole store is reloaded from the backend so the canvas
    /// shows what is actually stored, and the error is then recorded
    /// against positions.
    pub async fn save_position(
        &self,
        note_id: &str,
        x: f64,
        y: f64,
    ) -> Result<Outcome<Position>, StoreError> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(StoreError::validation("Position coordinates must be finite"));
        }
        let Some(previous) = self
            .read(|s| s.note(note_id).map(|_| s.position_of(note_id)))
            .await
        else {
            return Err(StoreError::not_found(EntityKind::Notes, note_id));
        };

        let position = Position {
            x,
            y,
            z_index: previous.and_then(|p| p.z_index),
        };
        self.apply_position(note_id, position).await;
        Ok(self.persist_position(note_id, x, y).await.map(|()| position))
    }

    /// Persist coordinates already applied locally, reconciling on failure
    pub(crate) async fn persist_position(&self, note_id: &str, x: f64, y: f64) -> Outcome<()> {
        match self.try_persist_position(note_id, x, y).await {
            Ok(()) => Outcome::Confirmed(()),
            Err(error) => {
                warn!(note_id = %note_id, error = %error, "Position save failed, reconciling");
                self.reconcile_positions(error.clone()).await;
                Outcome::Reconciled { error }
            }
        }
    }

    /// Persist coordinates already applied locally, without reconciling
    pub(crate) async fn try_persist_position(
        &self,
        note_id: &str,
        x: f64,
        y: f64,
    ) -> Result<(), StoreError> {
        self.dispatch([Action::BeginPending(EntityKind::Positions)])
            .await;
        match self.backend.save_position(note_id, x, y).await {
            Ok(()) => {
                self.confirm(EntityKind::Positions, vec![]).await;
                self.saved
                    .write()
                    .await
                    .positions
                    .insert(note_id.to_string(), (x, y));
                debug!(note_id = %note_id, x, y, "Saved position");
                Ok(())
            }
            Err(e) => {
                self.saved.write().await.positions.remove(note_id);
                self.dispatch([Action::EndPending(EntityKind::Positions)])
                    .await;
                Err(StoreError::persistence(EntityKind::Positions, &e))
            }
        }
    }

    /// True when the backend is known to hold exactly `(x, y)` for the note
    pub(crate) async fn position_saved(&self, note_id: &str, x: f64, y: f64) -> bool {
        self.saved.read().await.positions.get(note_id) == Some(&(x, y))
    }

    /// Reload every kind from the backend after a failed position write,
    /// then record `error` against positions
    pub(crate) async fn reconcile_positions(&self, error: StoreError) {
        self.reload().await;
        self.dispatch([Action::SetError {
            kind: EntityKind::Positions,
            error,
        }])
        .await;
    }

    /// Apply a position locally without persisting it
    pub(crate) async fn apply_position(&self, note_id: &str, position: Position) {
        self.dispatch([Action::Upsert(Entity::Position {
            note_id: note_id.to_string(),
            position,
        })])
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, BackendOp};
    use crate::test_helpers::{loaded_store, seeded_backend};

    #[tokio::test]
    async fn test_save_position_confirms() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;

        let outcome = store.save_position("n-c", 42.0, -7.5).await.unwrap();
        assert_eq!(outcome, Outcome::Confirmed(Position::new(42.0, -7.5)));
        assert_eq!(
            store.read(|s| s.position_of("n-c")).await,
            Some(Position::new(42.0, -7.5))
        );
        assert_eq!(
            backend.writes().await.last(),
            Some(&BackendCall::SavePosition {
                note_id: "n-c".into(),
                x: 42.0,
                y: -7.5
            })
        );
    }

    #[tokio::test]
    async fn test_failed_position_save_reconciles_every_kind() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;

        // Local edits the backend never saw
        backend.fail(BackendOp::UpdateNote).await;
        store.update_note("n-a", "Unsaved edit", None).await.unwrap();
        backend.fail(BackendOp::SavePosition).await;

        let outcome = store.save_position("n-a", 500.0, 500.0).await.unwrap();
        assert!(matches!(
            outcome,
            Outcome::Reconciled {
                error: StoreError::Persistence {
                    kind: EntityKind::Positions,
                    ..
                }
            }
        ));

        store
            .read(|s| {
                assert_eq!(s.position_of("n-a"), Some(Position::new(10.0, 10.0)));
                assert_eq!(s.note("n-a").unwrap().content, "Content of n-a");
                assert!(s.status(EntityKind::Positions).error.is_some());
                assert_eq!(s.status(EntityKind::Positions).pending, 0);
                assert!(s.status(EntityKind::Notes).error.is_none());
            })
            .await;
    }

    #[tokio::test]
    async fn test_save_position_rejections() {
        let store = loaded_store(seeded_backend()).await;
        assert!(matches!(
            store.save_position("ghost", 1.0, 1.0).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.save_position("n-a", f64::NAN, 1.0).await,
            Err(StoreError::Validation(_))
        ));
        assert_eq!(
            store.read(|s| s.position_of("n-a")).await,
            Some(Position::new(10.0, 10.0))
        );
    }
}
