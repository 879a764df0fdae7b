//! Entity state and its transition function
//!
//! `EntityState` holds the four normalized collections, the per-kind status
//! slots and the view state. It only changes through [`EntityState::apply`],
//! which consumes one [`Action`] at a time and always leaves the collections
//! consistent: no link or position refers to a missing note, and category
//! note counts match the notes.

use crate::error::StoreError;
use crate::models::{recount_notes, Category, EntityKind, Link, Note, Position, Viewport};
use crate::view::ViewState;
use std::collections::HashMap;

// ============================================================================
// Actions
// ============================================================================

/// A whole collection, as returned by a full read
#[derive(Debug, Clone)]
pub enum Collection {
    Notes(Vec<Note>),
    Categories(Vec<Category>),
    Links(Vec<Link>),
    Positions(Vec<(String, Position)>),
}

impl Collection {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Notes(_) => EntityKind::Notes,
            Self::Categories(_) => EntityKind::Categories,
            Self::Links(_) => EntityKind::Links,
            Self::Positions(_) => EntityKind::Positions,
        }
    }
}

/// A single entity of any kind
#[derive(Debug, Clone)]
pub enum Entity {
    Note(Note),
    Category(Category),
    Link(Link),
    Position { note_id: String, position: Position },
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Note(_) => EntityKind::Notes,
            Self::Category(_) => EntityKind::Categories,
            Self::Link(_) => EntityKind::Links,
            Self::Position { .. } => EntityKind::Positions,
        }
    }

    /// Identity within its collection. Positions are keyed by note id.
    pub fn id(&self) -> &str {
        match self {
            Self::Note(n) => &n.id,
            Self::Category(c) => &c.id,
            Self::Link(l) => &l.id,
            Self::Position { note_id, .. } => note_id,
        }
    }
}

/// Every state transition the store knows about
#[derive(Debug, Clone)]
pub enum Action {
    /// Replace a collection wholesale
    SetAll(Collection),
    /// Insert or replace one entity, keeping its place in collection order
    Upsert(Entity),
    /// Remove one entity and whatever depends on it
    Remove { kind: EntityKind, id: String },
    /// Swap a provisional entity for the confirmed one, in place
    Replace {
        provisional_id: String,
        entity: Entity,
    },
    /// Rename a category and rewrite every path below it
    RenameCategory { id: String, name: String },
    SetLoading { kind: EntityKind, loading: bool },
    SetError { kind: EntityKind, error: StoreError },
    ClearError(EntityKind),
    BeginPending(EntityKind),
    EndPending(EntityKind),
    SetCategoryFilter(Option<Vec<String>>),
    SetSearchText(String),
    SetViewport(Viewport),
}

/// Loading and error status of one entity kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KindStatus {
    pub loading: bool,
    pub error: Option<StoreError>,
    /// Optimistic changes applied but not yet confirmed by the backend
    pub pending: usize,
}

// ============================================================================
// State
// ============================================================================

/// Normalized entity collections plus status and view state
#[derive(Debug, Clone, Default)]
pub struct EntityState {
    pub(crate) notes: Vec<Note>,
    pub(crate) categories: Vec<Category>,
    pub(crate) links: Vec<Link>,
    pub(crate) positions: HashMap<String, Position>,
    status: [KindStatus; 4],
    revisions: [u64; 4],
    pub(crate) view: ViewState,
}

impl EntityState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn positions(&self) -> &HashMap<String, Position> {
        &self.positions
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn status(&self, kind: EntityKind) -> &KindStatus {
        &self.status[kind.index()]
    }

    /// Counter bumped every time the kind's collection changes
    pub fn revision(&self, kind: EntityKind) -> u64 {
        self.revisions[kind.index()]
    }

    // ========================================================================
    // Generic helpers
    // ========================================================================

    /// Replace a collection wholesale
    pub fn set_all(&mut self, items: Collection) {
        self.apply(Action::SetAll(items));
    }

    /// Insert or replace a single entity
    pub fn upsert(&mut self, item: Entity) {
        self.apply(Action::Upsert(item));
    }

    /// Remove a single entity
    pub fn remove(&mut self, kind: EntityKind, id: impl Into<String>) {
        self.apply(Action::Remove {
            kind,
            id: id.into(),
        });
    }

    // ========================================================================
    // Transition function
    // ========================================================================

    /// Apply one action.
    ///
    /// Callers validate commands before building an action; `apply` itself
    /// never fails and only repairs what would otherwise break referential
    /// integrity (links or positions pointing at notes that are gone).
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::SetAll(collection) => self.apply_set_all(collection),
            Action::Upsert(entity) => self.apply_upsert(entity),
            Action::Remove { kind, id } => self.apply_remove(kind, &id),
            Action::Replace {
                provisional_id,
                entity,
            } => self.apply_replace(&provisional_id, entity),
            Action::RenameCategory { id, name } => self.apply_rename_category(&id, &name),
            Action::SetLoading { kind, loading } => {
                self.status[kind.index()].loading = loading;
            }
            Action::SetError { kind, error } => {
                self.status[kind.index()].error = Some(error);
            }
            Action::ClearError(kind) => {
                self.status[kind.index()].error = None;
            }
            Action::BeginPending(kind) => {
                self.status[kind.index()].pending += 1;
            }
            Action::EndPending(kind) => {
                let slot = &mut self.status[kind.index()].pending;
                *slot = slot.saturating_sub(1);
            }
            Action::SetCategoryFilter(filter) => {
                self.view.category_filter = filter;
            }
            Action::SetSearchText(text) => {
                self.view.search_text = text;
            }
            Action::SetViewport(viewport) => {
                self.view.viewport = viewport;
            }
        }
    }

    fn bump(&mut self, kind: EntityKind) {
        self.revisions[kind.index()] += 1;
    }

    fn apply_set_all(&mut self, collection: Collection) {
        match collection {
            Collection::Notes(notes) => {
                self.notes = notes;
                self.bump(EntityKind::Notes);
                self.after_notes_changed();
            }
            Collection::Categories(mut categories) => {
                for category in &mut categories {
                    category.refresh_derived();
                }
                self.categories = categories;
                self.bump(EntityKind::Categories);
                recount_notes(&mut self.categories, &self.notes);
            }
            Collection::Links(links) => {
                let total = links.len();
                self.links = links
                    .into_iter()
                    .filter(|l| l.source_id != l.target_id)
                    .filter(|l| self.has_note(&l.source_id) && self.has_note(&l.target_id))
                    .collect();
                if self.links.len() != total {
                    tracing::warn!(
                        dropped = total - self.links.len(),
                        "Dropped links with unknown or identical endpoints"
                    );
                }
                self.bump(EntityKind::Links);
            }
            Collection::Positions(positions) => {
                self.positions = positions
                    .into_iter()
                    .filter(|(id, _)| self.has_note(id))
                    .collect();
                self.bump(EntityKind::Positions);
            }
        }
    }

    fn apply_upsert(&mut self, entity: Entity) {
        let kind = entity.kind();
        match entity {
            Entity::Note(note) => {
                upsert_by_id(&mut self.notes, note, |n| &n.id);
                recount_notes(&mut self.categories, &self.notes);
            }
            Entity::Category(mut category) => {
                category.refresh_derived();
                upsert_by_id(&mut self.categories, category, |c| &c.id);
                recount_notes(&mut self.categories, &self.notes);
            }
            Entity::Link(link) => {
                if !self.link_is_valid(&link) {
                    tracing::warn!(link_id = %link.id, "Dropped link with unknown or identical endpoints");
                    return;
                }
                upsert_by_id(&mut self.links, link, |l| &l.id);
            }
            Entity::Position { note_id, position } => {
                self.positions.insert(note_id, position);
            }
        }
        self.bump(kind);
    }

    fn apply_remove(&mut self, kind: EntityKind, id: &str) {
        match kind {
            EntityKind::Notes => self.remove_notes(|n| n.id == id),
            EntityKind::Categories => {
                let Some(path) = self
                    .categories
                    .iter()
                    .find(|c| c.id == id)
                    .map(|c| c.path.clone())
                else {
                    return;
                };
                // Cascade: the subtree goes, and so do the notes filed in it.
                self.categories.retain(|c| !c.is_within(&path));
                self.bump(EntityKind::Categories);
                self.remove_notes(|n| n.is_under(&path));
                if self
                    .view
                    .category_filter
                    .as_ref()
                    .is_some_and(|filter| filter.starts_with(&path))
                {
                    self.view.category_filter = None;
                }
            }
            EntityKind::Links => {
                let before = self.links.len();
                self.links.retain(|l| l.id != id);
                if self.links.len() != before {
                    self.bump(EntityKind::Links);
                }
            }
            EntityKind::Positions => {
                if self.positions.remove(id).is_some() {
                    self.bump(EntityKind::Positions);
                }
            }
        }
    }

    /// Swap a provisional entity for its confirmed form.
    ///
    /// Nothing is inserted when the provisional entity is gone (a later
    /// command removed it) or, for links, when an endpoint no longer exists.
    fn apply_replace(&mut self, provisional_id: &str, entity: Entity) {
        let kind = entity.kind();
        let replaced = match entity {
            Entity::Note(note) => {
                let confirmed_id = note.id.clone();
                let replaced = replace_by_id(&mut self.notes, provisional_id, note, |n| &n.id);
                if replaced {
                    self.move_note_dependents(provisional_id, &confirmed_id);
                    recount_notes(&mut self.categories, &self.notes);
                }
                replaced
            }
            Entity::Category(mut category) => {
                category.refresh_derived();
                let confirmed_id = category.id.clone();
                let replaced =
                    replace_by_id(&mut self.categories, provisional_id, category, |c| &c.id);
                if replaced {
                    for child in &mut self.categories {
                        if child.parent_id.as_deref() == Some(provisional_id) {
                            child.parent_id = Some(confirmed_id.clone());
                        }
                    }
                    recount_notes(&mut self.categories, &self.notes);
                }
                replaced
            }
            Entity::Link(link) => {
                self.link_is_valid(&link)
                    && replace_by_id(&mut self.links, provisional_id, link, |l| &l.id)
            }
            Entity::Position { note_id, position } => {
                let known = self.has_note(&note_id);
                if known {
                    self.positions.remove(provisional_id);
                    self.positions.insert(note_id, position);
                }
                known
            }
        };

        if replaced {
            self.bump(kind);
        } else {
            tracing::warn!(
                kind = %kind,
                provisional_id = %provisional_id,
                "Dropped confirmation for an entity that is no longer in the store"
            );
        }
    }

    /// Re-key the position and link endpoints of a note whose id changed
    fn move_note_dependents(&mut self, old_id: &str, new_id: &str) {
        if old_id == new_id {
            return;
        }
        if let Some(position) = self.positions.remove(old_id) {
            self.positions.insert(new_id.to_string(), position);
            self.bump(EntityKind::Positions);
        }
        let mut relinked = false;
        for link in &mut self.links {
            if link.source_id == old_id {
                link.source_id = new_id.to_string();
                relinked = true;
            }
            if link.target_id == old_id {
                link.target_id = new_id.to_string();
                relinked = true;
            }
        }
        if relinked {
            self.bump(EntityKind::Links);
        }
    }

    fn apply_rename_category(&mut self, id: &str, name: &str) {
        let Some(old_path) = self
            .categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.path.clone())
        else {
            return;
        };
        let mut new_path = old_path.clone();
        if let Some(last) = new_path.last_mut() {
            *last = name.to_string();
        }

        for category in &mut self.categories {
            if let Some(path) = rebase(&category.path, &old_path, &new_path) {
                category.path = path;
                if category.id == id {
                    category.name = name.to_string();
                }
                category.refresh_derived();
            }
        }
        self.bump(EntityKind::Categories);

        let mut notes_changed = false;
        for note in &mut self.notes {
            if let Some(path) = rebase(&note.category_path, &old_path, &new_path) {
                note.category_path = path;
                notes_changed = true;
            }
        }
        if notes_changed {
            self.bump(EntityKind::Notes);
        }

        if let Some(filter) = &self.view.category_filter {
            if let Some(path) = rebase(filter, &old_path, &new_path) {
                self.view.category_filter = Some(path);
            }
        }
    }

    // ========================================================================
    // Integrity
    // ========================================================================

    fn has_note(&self, id: &str) -> bool {
        self.notes.iter().any(|n| n.id == id)
    }

    fn link_is_valid(&self, link: &Link) -> bool {
        link.source_id != link.target_id
            && self.has_note(&link.source_id)
            && self.has_note(&link.target_id)
    }

    fn remove_notes(&mut self, doomed: impl Fn(&Note) -> bool) {
        let before = self.notes.len();
        self.notes.retain(|n| !doomed(n));
        if self.notes.len() != before {
            self.bump(EntityKind::Notes);
            self.after_notes_changed();
        }
    }

    /// Drop links and positions whose notes are gone, then recount categories
    fn after_notes_changed(&mut self) {
        let links_before = self.links.len();
        let notes = &self.notes;
        let known = |id: &str| notes.iter().any(|n| n.id == id);
        self.links
            .retain(|l| known(&l.source_id) && known(&l.target_id));
        let links_removed = self.links.len() != links_before;

        let positions_before = self.positions.len();
        self.positions.retain(|id, _| known(id));
        let positions_removed = self.positions.len() != positions_before;

        if links_removed {
            self.bump(EntityKind::Links);
        }
        if positions_removed {
            self.bump(EntityKind::Positions);
        }
        recount_notes(&mut self.categories, &self.notes);
    }
}

fn upsert_by_id<T>(items: &mut Vec<T>, item: T, id: impl Fn(&T) -> &String) {
    match items.iter().position(|existing| id(existing) == id(&item)) {
        Some(idx) => items[idx] = item,
        None => items.push(item),
    }
}

/// Put `item` where `old_id` was. Returns false, dropping `item`, when
/// `old_id` is not in `items`.
fn replace_by_id<T>(items: &mut [T], old_id: &str, item: T, id: impl Fn(&T) -> &String) -> bool {
    match items.iter().position(|existing| id(existing) == old_id) {
        Some(idx) => {
            items[idx] = item;
            true
        }
        None => false,
    }
}

/// `path` with its `old` prefix swapped for `new`, if it has that prefix
fn rebase(path: &[String], old: &[String], new: &[String]) -> Option<Vec<String>> {
    if !path.starts_with(old) {
        return None;
    }
    let mut rebased = new.to_vec();
    rebased.extend_from_slice(&path[old.len()..]);
    Some(rebased)
}
