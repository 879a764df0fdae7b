//! Mutation coordinator
//!
//! `KnowledgeStore` is the only writer of the entity state. Every command
//! follows the same sequence:
//!
//! 1. validate against the current state and reject without side effects
//! 2. apply the optimistic transition and mark the kind pending
//! 3. call the backend
//! 4. confirm, or record the failure (positions additionally reconcile)
//!
//! The state lock is only held while actions are applied, never across a
//! backend call.

mod categories;
mod links;
mod notes;
mod outcome;
mod positions;

pub use outcome::Outcome;

use crate::backend::NoteBackend;
use crate::error::StoreError;
use crate::events::{ChangeAction, EventEmitter, StoreEvent};
use crate::models::{EntityKind, Viewport};
use crate::store::{Action, Collection, EntityState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Optimistic front of a [`NoteBackend`]
///
/// # Example
///
/// ```rust
/// use notegraph::backend::MemoryBackend;
/// use notegraph::KnowledgeStore;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let store = KnowledgeStore::new(Arc::new(MemoryBackend::new()));
/// let note = store
///     .save_note("Buy milk", vec!["Home".into()], None)
///     .await
///     .unwrap()
///     .into_result()
///     .unwrap();
///
/// // The category on the path was created along with the note
/// let count = store
///     .read(|s| s.category_by_path(&["Home".to_string()]).map(|c| c.note_count))
///     .await;
/// assert_eq!(count, Some(1));
/// assert_eq!(note.title, "Buy milk");
/// # });
/// ```
#[derive(Clone)]
pub struct KnowledgeStore {
    backend: Arc<dyn NoteBackend>,
    state: Arc<RwLock<EntityState>>,
    saved: Arc<RwLock<SavedLayout>>,
    event_emitter: Option<Arc<dyn EventEmitter>>,
}

/// Positions and viewport the backend is known to hold, as last written or
/// read through the store. A missing entry means unknown.
#[derive(Debug, Default)]
struct SavedLayout {
    positions: HashMap<String, (f64, f64)>,
    viewport: Option<Viewport>,
}

impl KnowledgeStore {
    /// Create a store with empty collections
    pub fn new(backend: Arc<dyn NoteBackend>) -> Self {
        Self {
            backend,
            state: Arc::new(RwLock::new(EntityState::new())),
            saved: Arc::new(RwLock::new(SavedLayout::default())),
            event_emitter: None,
        }
    }

    /// Publish confirmed changes to `emitter`
    pub fn with_event_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.event_emitter = Some(emitter);
        self
    }

    pub fn backend(&self) -> &Arc<dyn NoteBackend> {
        &self.backend
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Run `f` against the current state under a read guard
    pub async fn read<R>(&self, f: impl FnOnce(&EntityState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    /// Clone of the current state
    pub async fn snapshot(&self) -> EntityState {
        self.state.read().await.clone()
    }

    // ========================================================================
    // Plumbing
    // ========================================================================

    /// Apply actions atomically with respect to readers
    pub(crate) async fn dispatch(&self, actions: impl IntoIterator<Item = Action>) {
        let mut state = self.state.write().await;
        for action in actions {
            state.apply(action);
        }
    }

    fn emit(&self, event: StoreEvent) {
        if let Some(emitter) = &self.event_emitter {
            emitter.emit(event);
        }
    }

    fn emit_changed(&self, kind: EntityKind, action: ChangeAction, entity_id: &str) {
        self.emit(StoreEvent::changed(kind, action, entity_id));
    }

    /// Locally generated id for an entity the backend has not confirmed yet
    fn provisional_id() -> String {
        format!("local-{}", Uuid::new_v4())
    }

    /// Close the pending window of `kind` after a successful backend call
    async fn confirm(&self, kind: EntityKind, mut actions: Vec<Action>) {
        actions.push(Action::EndPending(kind));
        actions.push(Action::ClearError(kind));
        self.dispatch(actions).await;
    }

    /// Close the pending window of `kind` after a failed backend call and
    /// record the failure
    async fn fail(&self, kind: EntityKind, error: &anyhow::Error) -> StoreError {
        let store_error = StoreError::persistence(kind, error);
        warn!(kind = %kind, error = %store_error, "Backend call failed, keeping local state");
        self.dispatch([
            Action::EndPending(kind),
            Action::SetError {
                kind,
                error: store_error.clone(),
            },
        ])
        .await;
        store_error
    }

    /// Check that a confirmed entity is still in the store.
    ///
    /// A later command may remove the provisional entry while the backend
    /// call is in flight; the reducer then drops the confirmation. With
    /// `undo` set the backend copy is deleted again, best effort, so the
    /// backend does not keep what the store no longer shows.
    async fn superseded(&self, kind: EntityKind, id: &str, undo: bool) -> Option<StoreError> {
        let present = self
            .read(|s| match kind {
                EntityKind::Notes => s.note(id).is_some(),
                EntityKind::Categories => s.category(id).is_some(),
                EntityKind::Links => s.link(id).is_some(),
                EntityKind::Positions => s.position_of(id).is_some(),
            })
            .await;
        if present {
            return None;
        }

        warn!(kind = %kind, id = %id, "Entity was removed locally before its confirmation arrived");
        if undo {
            let result = match kind {
                EntityKind::Notes => self.backend.delete_note(id).await,
                EntityKind::Categories => self.backend.delete_category(id).await,
                EntityKind::Links => self.backend.delete_link(id).await,
                EntityKind::Positions => Ok(()),
            };
            if let Err(e) = result {
                warn!(kind = %kind, id = %id, error = %e, "Failed to undo superseded backend write");
            }
        }
        Some(StoreError::Superseded {
            kind,
            id: id.to_string(),
        })
    }

    /// Refresh categories after a change that moves note counts or creates
    /// categories on the backend side. Failures are recorded but do not fail
    /// the command that triggered the refresh.
    async fn refresh_categories(&self) {
        match self.backend.list_categories().await {
            Ok(categories) => {
                self.dispatch([
                    Action::SetAll(Collection::Categories(categories)),
                    Action::ClearError(EntityKind::Categories),
                ])
                .await;
            }
            Err(e) => {
                let error = StoreError::persistence(EntityKind::Categories, &e);
                warn!(error = %error, "Failed to refresh categories");
                self.dispatch([Action::SetError {
                    kind: EntityKind::Categories,
                    error,
                }])
                .await;
            }
        }
    }

    /// Delete links at the backend whose notes are already gone.
    ///
    /// Best effort: failures are logged and otherwise ignored.
    async fn delete_orphaned_links(&self, link_ids: &[String]) {
        for link_id in link_ids {
            if let Err(e) = self.backend.delete_link(link_id).await {
                warn!(link_id = %link_id, error = %e, "Failed to delete orphaned link");
            }
        }
    }

    // ========================================================================
    // Reload
    // ========================================================================

    /// Re-read every collection from the backend.
    ///
    /// The four reads run concurrently and are applied together, notes
    /// first. A kind whose read failed keeps its previous contents and gets
    /// the error recorded; the first such error is reported in `Kept`.
    pub async fn reload(&self) -> Outcome<()> {
        self.dispatch(EntityKind::ALL.map(|kind| Action::SetLoading {
            kind,
            loading: true,
        }))
        .await;

        let (notes, categories, links, positions) = futures::join!(
            self.backend.list_notes(),
            self.backend.list_categories(),
            self.backend.list_links(),
            self.backend.list_positions(),
        );
        {
            let mut saved = self.saved.write().await;
            saved.positions = match &positions {
                Ok(positions) => positions
                    .iter()
                    .map(|(id, p)| (id.clone(), (p.x, p.y)))
                    .collect(),
                Err(_) => HashMap::new(),
            };
        }

        let results = [
            (EntityKind::Notes, notes.map(Collection::Notes)),
            (EntityKind::Categories, categories.map(Collection::Categories)),
            (EntityKind::Links, links.map(Collection::Links)),
            (EntityKind::Positions, positions.map(Collection::Positions)),
        ];

        let mut actions = Vec::new();
        let mut reloaded = Vec::new();
        let mut first_error = None;
        for (kind, result) in results {
            match result {
                Ok(collection) => {
                    actions.push(Action::SetAll(collection));
                    actions.push(Action::ClearError(kind));
                    reloaded.push(kind);
                }
                Err(e) => {
                    let error = StoreError::persistence(kind, &e);
                    warn!(kind = %kind, error = %error, "Failed to reload collection");
                    actions.push(Action::SetError {
                        kind,
                        error: error.clone(),
                    });
                    first_error.get_or_insert(error);
                }
            }
            actions.push(Action::SetLoading {
                kind,
                loading: false,
            });
        }
        self.dispatch(actions).await;

        for kind in reloaded {
            self.emit(StoreEvent::reloaded(kind));
        }
        match first_error {
            None => {
                debug!("Reloaded all collections");
                Outcome::Confirmed(())
            }
            Some(error) => Outcome::Kept { value: (), error },
        }
    }

    // ========================================================================
    // View state
    // ========================================================================

    pub async fn set_category_filter(&self, filter: Option<Vec<String>>) {
        self.dispatch([Action::SetCategoryFilter(filter)]).await;
    }

    pub async fn set_search_text(&self, text: impl Into<String>) {
        self.dispatch([Action::SetSearchText(text.into())]).await;
    }

    /// Ask views to open a note in the full-screen editor
    pub async fn open_note(&self, note_id: &str) -> Result<(), StoreError> {
        if self.read(|s| s.note(note_id).is_none()).await {
            return Err(StoreError::not_found(EntityKind::Notes, note_id));
        }
        self.emit(StoreEvent::open_note(note_id));
        Ok(())
    }

    /// Load the persisted viewport into the view state.
    ///
    /// On failure the current viewport is kept and the error is recorded
    /// against positions.
    pub async fn load_viewport(&self) -> Outcome<Viewport> {
        match self.backend.get_viewport().await {
            Ok(viewport) => {
                self.dispatch([Action::SetViewport(viewport)]).await;
                self.saved.write().await.viewport = Some(viewport);
                Outcome::Confirmed(viewport)
            }
            Err(e) => {
                let error = StoreError::persistence(EntityKind::Positions, &e);
                warn!(error = %error, "Failed to load viewport");
                self.dispatch([Action::SetError {
                    kind: EntityKind::Positions,
                    error: error.clone(),
                }])
                .await;
                let value = self.read(|s| s.view().viewport).await;
                Outcome::Kept { value, error }
            }
        }
    }

    /// Apply and persist a viewport
    pub async fn save_viewport(&self, viewport: Viewport) -> Result<Outcome<Viewport>, StoreError> {
        if !(viewport.x.is_finite() && viewport.y.is_finite() && viewport.zoom.is_finite()) {
            return Err(StoreError::validation("Viewport coordinates must be finite"));
        }
        if viewport.zoom <= 0.0 {
            return Err(StoreError::validation("Viewport zoom must be positive"));
        }

        self.dispatch([Action::SetViewport(viewport)]).await;
        Ok(self.persist_viewport(viewport).await)
    }

    /// True when the backend is known to hold exactly `viewport`
    pub(crate) async fn viewport_saved(&self, viewport: Viewport) -> bool {
        self.saved.read().await.viewport == Some(viewport)
    }

    /// Persist a viewport already applied to the view state
    pub(crate) async fn persist_viewport(&self, viewport: Viewport) -> Outcome<Viewport> {
        self.dispatch([Action::BeginPending(EntityKind::Positions)])
            .await;
        match self
            .backend
            .save_viewport(viewport.x, viewport.y, viewport.zoom)
            .await
        {
            Ok(()) => {
                self.confirm(EntityKind::Positions, vec![]).await;
                self.saved.write().await.viewport = Some(viewport);
                debug!(x = viewport.x, y = viewport.y, zoom = viewport.zoom, "Saved viewport");
                Outcome::Confirmed(viewport)
            }
            Err(e) => {
                self.saved.write().await.viewport = None;
                let error = self.fail(EntityKind::Positions, &e).await;
                Outcome::Kept {
                    value: viewport,
                    error,
                }
            }
        }
    }
}
