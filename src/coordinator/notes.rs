//! Note commands

use super::{KnowledgeStore, Outcome};
use crate::error::StoreError;
use crate::events::ChangeAction;
use crate::models::{derive_title, EntityKind, Note};
use crate::store::{Action, Entity};
use tracing::{debug, info};

/// Custom title when it is non-blank, otherwise one derived from content
fn title_for(content: &str, title: Option<&str>) -> String {
    match title.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => derive_title(content),
    }
}

fn validate_content(content: &str) -> Result<(), StoreError> {
    if content.trim().is_empty() {
        return Err(StoreError::validation("Note content cannot be empty"));
    }
    Ok(())
}

fn validate_category_path(path: &[String]) -> Result<(), StoreError> {
    if path.iter().any(|segment| segment.trim().is_empty()) {
        return Err(StoreError::validation(
            "Category path segments cannot be empty",
        ));
    }
    Ok(())
}

impl KnowledgeStore {
    /// Create a note under `category_path`.
    ///
    /// The note appears immediately under a provisional id, which is swapped
    /// for the backend id once the save is confirmed. Missing categories on
    /// the path are created by the backend; the category list is refreshed
    /// afterwards to pick them up.
    pub async fn save_note(
        &self,
        content: &str,
        category_path: Vec<String>,
        title: Option<&str>,
    ) -> Result<Outcome<Note>, StoreError> {
        validate_content(content)?;
        validate_category_path(&category_path)?;

        let provisional = Note::new(
            Self::provisional_id(),
            title_for(content, title),
            content,
            category_path.clone(),
        );
        self.dispatch([
            Action::Upsert(Entity::Note(provisional.clone())),
            Action::BeginPending(EntityKind::Notes),
        ])
        .await;

        match self
            .backend
            .save_note(content, &category_path, title)
            .await
        {
            Ok(note) => {
                self.confirm(
                    EntityKind::Notes,
                    vec![Action::Replace {
                        provisional_id: provisional.id.clone(),
                        entity: Entity::Note(note.clone()),
                    }],
                )
                .await;
                if let Some(error) = self.superseded(EntityKind::Notes, &note.id, true).await {
                    self.refresh_categories().await;
                    return Ok(Outcome::Superseded { value: note, error });
                }
                self.refresh_categories().await;
                info!(note_id = %note.id, title = %note.title, "Saved note");
                self.emit_changed(EntityKind::Notes, ChangeAction::Created, &note.id);
                Ok(Outcome::Confirmed(note))
            }
            Err(e) => {
                let error = self.fail(EntityKind::Notes, &e).await;
                Ok(Outcome::Kept {
                    value: provisional,
                    error,
                })
            }
        }
    }

    /// Replace a note's content.
    ///
    /// With a non-blank `title` the title is set to it; otherwise it is
    /// derived from the new content.
    pub async fn update_note(
        &self,
        id: &str,
        content: &str,
        title: Option<&str>,
    ) -> Result<Outcome<Note>, StoreError> {
        validate_content(content)?;
        let Some(mut optimistic) = self.read(|s| s.note(id).cloned()).await else {
            return Err(StoreError::not_found(EntityKind::Notes, id));
        };
        optimistic.content = content.to_string();
        optimistic.title = title_for(content, title);

        self.dispatch([
            Action::Upsert(Entity::Note(optimistic.clone())),
            Action::BeginPending(EntityKind::Notes),
        ])
        .await;

        let result = match title {
            Some(title) => {
                self.backend
                    .update_note_with_title(id, content, Some(title))
                    .await
            }
            None => self.backend.update_note(id, content).await,
        };
        match result {
            Ok(note) => {
                self.confirm(
                    EntityKind::Notes,
                    vec![Action::Replace {
                        provisional_id: id.to_string(),
                        entity: Entity::Note(note.clone()),
                    }],
                )
                .await;
                if let Some(error) = self.superseded(EntityKind::Notes, &note.id, false).await {
                    return Ok(Outcome::Superseded { value: note, error });
                }
                debug!(note_id = %id, "Updated note");
                self.emit_changed(EntityKind::Notes, ChangeAction::Updated, id);
                Ok(Outcome::Confirmed(note))
            }
            Err(e) => {
                let error = self.fail(EntityKind::Notes, &e).await;
                Ok(Outcome::Kept {
                    value: optimistic,
                    error,
                })
            }
        }
    }

    /// Delete a note together with its links and position.
    ///
    /// The links touching the note are removed from the store at once and
    /// deleted at the backend after the note itself is gone.
    pub async fn delete_note(&self, id: &str) -> Result<Outcome<()>, StoreError> {
        let Some(orphaned) = self
            .read(|s| {
                s.note(id).map(|_| {
                    s.links_touching(id)
                        .into_iter()
                        .map(|l| l.id.clone())
                        .collect::<Vec<_>>()
                })
            })
            .await
        else {
            return Err(StoreError::not_found(EntityKind::Notes, id));
        };

        self.dispatch([
            Action::Remove {
                kind: EntityKind::Notes,
                id: id.to_string(),
            },
            Action::BeginPending(EntityKind::Notes),
        ])
        .await;

        match self.backend.delete_note(id).await {
            Ok(()) => {
                self.delete_orphaned_links(&orphaned).await;
                self.confirm(EntityKind::Notes, vec![]).await;
                self.refresh_categories().await;
                info!(note_id = %id, links = orphaned.len(), "Deleted note");
                self.emit_changed(EntityKind::Notes, ChangeAction::Deleted, id);
                Ok(Outcome::Confirmed(()))
            }
            Err(e) => {
                let error = self.fail(EntityKind::Notes, &e).await;
                Ok(Outcome::Kept { value: (), error })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, BackendOp, NoteBackend};
    use crate::events::{EventBus, StoreEvent};
    use crate::test_helpers::{loaded_store, path, seeded_backend};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_title_for() {
        assert_eq!(title_for("Short note", Some("  Custom  ")), "Custom");
        assert_eq!(title_for("Short note", Some("   ")), "Short note");
        assert_eq!(title_for("Short note", None), "Short note");
    }

    #[tokio::test]
    async fn test_save_note_confirms_and_creates_categories() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;

        let outcome = store
            .save_note("Ownership and borrowing", path(&["Work", "Rust", "Memory"]), None)
            .await
            .unwrap();
        let note = outcome.into_result().unwrap();
        assert!(!note.id.starts_with("local-"));
        assert_eq!(note.title, "Ownership and borrowing");

        store
            .read(|s| {
                assert_eq!(s.notes().last().map(|n| n.id.as_str()), Some(note.id.as_str()));
                assert!(s.notes().iter().all(|n| !n.id.starts_with("local-")));
                assert!(s.category_path_exists(&path(&["Work", "Rust", "Memory"])));
                assert_eq!(s.category_by_path(&path(&["Work"])).unwrap().note_count, 3);
                assert_eq!(s.status(EntityKind::Notes).pending, 0);
            })
            .await;
    }

    #[tokio::test]
    async fn test_save_note_is_visible_while_pending() {
        let backend = seeded_backend();
        backend
            .set_latency(BackendOp::SaveNote, Duration::from_millis(100))
            .await;
        let store = loaded_store(backend.clone()).await;

        let task = {
            let store = store.clone();
            tokio::spawn(async move { store.save_note("Draft", vec![], None).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        store
            .read(|s| {
                let draft = s.notes().last().unwrap();
                assert!(draft.id.starts_with("local-"));
                assert_eq!(draft.content, "Draft");
                assert_eq!(s.status(EntityKind::Notes).pending, 1);
            })
            .await;

        let confirmed = task.await.unwrap().unwrap().into_result().unwrap();
        store
            .read(|s| {
                assert_eq!(s.notes().len(), 4);
                assert_eq!(s.notes()[3].id, confirmed.id);
                assert_eq!(s.status(EntityKind::Notes).pending, 0);
            })
            .await;
    }

    #[tokio::test]
    async fn test_save_note_failure_keeps_provisional() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;
        backend.fail(BackendOp::SaveNote).await;

        let outcome = store.save_note("Lost thought", vec![], None).await.unwrap();
        let Outcome::Kept { value, error } = outcome else {
            panic!("expected kept outcome");
        };
        assert!(value.id.starts_with("local-"));
        assert!(matches!(error, StoreError::Persistence { kind: EntityKind::Notes, .. }));

        store
            .read(|s| {
                assert!(s.note(&value.id).is_some());
                assert_eq!(s.status(EntityKind::Notes).error, Some(error.clone()));
            })
            .await;

        // The next successful note operation clears the error
        backend.recover(BackendOp::SaveNote).await;
        store.save_note("Found it", vec![], None).await.unwrap();
        assert!(store.read(|s| s.status(EntityKind::Notes).error.is_none()).await);
    }

    #[tokio::test]
    async fn test_save_note_validation_leaves_state_untouched() {
        let store = loaded_store(seeded_backend()).await;
        let before = store.snapshot().await;

        assert!(matches!(
            store.save_note("   ", vec![], None).await,
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.save_note("text", path(&["Work", " "]), None).await,
            Err(StoreError::Validation(_))
        ));

        let after = store.snapshot().await;
        assert_eq!(after.notes(), before.notes());
        assert_eq!(after.status(EntityKind::Notes), before.status(EntityKind::Notes));
    }

    #[tokio::test]
    async fn test_update_note_with_and_without_title() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;

        let note = store
            .update_note("n-a", "Rewritten body", Some("Pinned title"))
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(note.title, "Pinned title");

        let note = store
            .update_note("n-a", "Second rewrite", None)
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(note.title, "Second rewrite");
        assert_eq!(store.read(|s| s.note("n-a").cloned()).await, Some(note));

        assert!(matches!(
            store.update_note("missing", "x", None).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_note_failure_keeps_local_edit() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;
        backend.fail(BackendOp::UpdateNote).await;

        let outcome = store.update_note("n-b", "Offline edit", None).await.unwrap();
        assert!(matches!(outcome, Outcome::Kept { .. }));
        assert_eq!(
            store.read(|s| s.note("n-b").map(|n| n.content.clone())).await,
            Some("Offline edit".to_string())
        );
        assert_eq!(
            backend.list_notes().await.unwrap()[1].content,
            "Content of n-b"
        );
    }

    #[tokio::test]
    async fn test_delete_note_cascades_links_everywhere() {
        let backend = seeded_backend();
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let store = loaded_store(backend.clone())
            .await
            .with_event_emitter(Arc::new(bus));

        store
            .delete_note("n-b")
            .await
            .unwrap()
            .into_result()
            .unwrap();

        store
            .read(|s| {
                assert!(s.note("n-b").is_none());
                assert!(s.links_touching("n-b").is_empty());
                assert!(s.links().is_empty());
                assert!(s.position_of("n-b").is_none());
                assert_eq!(s.category_by_path(&path(&["Work"])).unwrap().note_count, 1);
            })
            .await;
        assert!(backend.list_links().await.unwrap().is_empty());
        let writes = backend.writes().await;
        assert!(writes.contains(&BackendCall::DeleteLink { id: "l-ab".into() }));
        assert!(writes.contains(&BackendCall::DeleteLink { id: "l-bc".into() }));
        assert_eq!(
            rx.try_recv().unwrap(),
            StoreEvent::changed(EntityKind::Notes, ChangeAction::Deleted, "n-b")
        );
    }

    #[tokio::test]
    async fn test_delete_note_link_cleanup_is_best_effort() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;
        backend.fail(BackendOp::DeleteLink).await;

        let outcome = store.delete_note("n-a").await.unwrap();
        assert!(outcome.is_confirmed());
        assert!(store.read(|s| s.links_touching("n-a").is_empty()).await);
        assert!(store.read(|s| s.status(EntityKind::Notes).error.is_none()).await);
    }

    #[tokio::test]
    async fn test_delete_missing_note_is_rejected() {
        let store = loaded_store(seeded_backend()).await;
        assert_eq!(
            store.delete_note("nope").await,
            Err(StoreError::not_found(EntityKind::Notes, "nope"))
        );
        assert_eq!(store.read(|s| s.notes().len()).await, 3);
    }
}
