//! In-memory implementation of NoteBackend.
//!
//! Keeps every collection behind a single `tokio::sync::RwLock` and mirrors
//! the storage rules of the file-backed application: categories are created
//! on demand when a note is saved, note counts are recomputed after every
//! note or category change, renames rewrite descendant paths and category
//! deletion takes the filed notes with it.
//!
//! Tests can make individual operations fail or stall, and inspect the log of
//! successful writes.

use super::traits::NoteBackend;
use super::Snapshot;
use crate::models::{
    derive_title, recount_notes, Category, Link, Note, NewLink, Position, Viewport,
};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Backend operations that can be failed or delayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    ListNotes,
    SaveNote,
    UpdateNote,
    DeleteNote,
    ListCategories,
    CreateCategory,
    RenameCategory,
    DeleteCategory,
    ListLinks,
    CreateLink,
    DeleteLink,
    ListPositions,
    SavePosition,
    GetViewport,
    SaveViewport,
}

/// A write that reached storage
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    SaveNote { id: String },
    UpdateNote { id: String },
    DeleteNote { id: String },
    CreateCategory { path: Vec<String> },
    RenameCategory { id: String, name: String },
    DeleteCategory { id: String },
    CreateLink { id: String },
    DeleteLink { id: String },
    SavePosition { note_id: String, x: f64, y: f64 },
    SaveViewport(Viewport),
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Always,
    Times(u32),
}

#[derive(Default)]
struct Data {
    notes: Vec<Note>,
    categories: Vec<Category>,
    links: Vec<Link>,
    positions: Vec<(String, Position)>,
    viewport: Viewport,
}

impl Data {
    fn recount(&mut self) {
        recount_notes(&mut self.categories, &self.notes);
    }

    fn category_exists(&self, path: &[String]) -> bool {
        self.categories.iter().any(|c| c.path == path)
    }

    fn insert_category(&mut self, name: &str, parent_path: &[String]) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            bail!("Category name cannot be empty");
        }
        if !parent_path.is_empty() && !self.category_exists(parent_path) {
            bail!("Parent category {:?} does not exist", parent_path);
        }
        let mut full_path = parent_path.to_vec();
        full_path.push(name.to_string());
        if self.category_exists(&full_path) {
            bail!("Category with path {:?} already exists", full_path);
        }

        let parent_id = self
            .categories
            .iter()
            .find(|c| c.path == parent_path)
            .map(|c| c.id.clone());
        let category = Category::new(Uuid::new_v4().to_string(), name, parent_path, parent_id);
        self.categories.push(category.clone());
        Ok(category)
    }

    /// Create every missing level of `path`, root first
    fn ensure_category_path(&mut self, path: &[String]) -> Result<()> {
        for depth in 1..=path.len() {
            if !self.category_exists(&path[..depth]) {
                self.insert_category(&path[depth - 1], &path[..depth - 1])?;
            }
        }
        Ok(())
    }

    fn note_mut(&mut self, id: &str) -> Result<&mut Note> {
        self.notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| anyhow!("Note with id {} not found", id))
    }
}

/// In-memory implementation of NoteBackend.
pub struct MemoryBackend {
    data: RwLock<Data>,
    failures: RwLock<HashMap<BackendOp, Failure>>,
    latency: RwLock<HashMap<BackendOp, Duration>>,
    reply_latency: RwLock<HashMap<BackendOp, Duration>>,
    writes: RwLock<Vec<BackendCall>>,
}

impl MemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::from_snapshot(Snapshot::default())
    }

    /// Create a backend pre-seeded with a snapshot.
    ///
    /// Note counts and derived category fields are recomputed on load.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut data = Data {
            notes: snapshot.notes,
            categories: snapshot.categories,
            links: snapshot.links,
            positions: snapshot.positions,
            viewport: snapshot.viewport,
        };
        for category in &mut data.categories {
            category.refresh_derived();
        }
        data.recount();
        Self {
            data: RwLock::new(data),
            failures: RwLock::new(HashMap::new()),
            latency: RwLock::new(HashMap::new()),
            reply_latency: RwLock::new(HashMap::new()),
            writes: RwLock::new(Vec::new()),
        }
    }

    /// Dump the current contents
    pub async fn snapshot(&self) -> Snapshot {
        let data = self.data.read().await;
        Snapshot {
            notes: data.notes.clone(),
            categories: data.categories.clone(),
            links: data.links.clone(),
            positions: data.positions.clone(),
            viewport: data.viewport,
        }
    }

    // ========================================================================
    // Failure injection and inspection
    // ========================================================================

    /// Make every call of `op` fail until [`recover`](Self::recover) is called
    pub async fn fail(&self, op: BackendOp) {
        self.failures.write().await.insert(op, Failure::Always);
    }

    /// Make the next `times` calls of `op` fail
    pub async fn fail_times(&self, op: BackendOp, times: u32) {
        self.failures.write().await.insert(op, Failure::Times(times));
    }

    /// Stop failing `op`
    pub async fn recover(&self, op: BackendOp) {
        self.failures.write().await.remove(&op);
    }

    /// Delay every call of `op` by `delay` before it touches storage
    pub async fn set_latency(&self, op: BackendOp, delay: Duration) {
        self.latency.write().await.insert(op, delay);
    }

    /// Delay the reply of every successful `op` by `delay`, after its write
    /// has already landed in storage
    pub async fn set_reply_latency(&self, op: BackendOp, delay: Duration) {
        self.reply_latency.write().await.insert(op, delay);
    }

    /// Successful writes, oldest first
    pub async fn writes(&self) -> Vec<BackendCall> {
        self.writes.read().await.clone()
    }

    /// Successful position writes for one note, oldest first
    pub async fn position_writes(&self, note_id: &str) -> Vec<(f64, f64)> {
        self.writes
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                BackendCall::SavePosition { note_id: id, x, y } if id == note_id => Some((*x, *y)),
                _ => None,
            })
            .collect()
    }

    async fn enter(&self, op: BackendOp) -> Result<()> {
        let delay = self.latency.read().await.get(&op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut failures = self.failures.write().await;
        match failures.get(&op).copied() {
            Some(Failure::Always) => bail!("{:?} failed (injected)", op),
            Some(Failure::Times(remaining)) => {
                if remaining <= 1 {
                    failures.remove(&op);
                } else {
                    failures.insert(op, Failure::Times(remaining - 1));
                }
                bail!("{:?} failed (injected)", op)
            }
            None => Ok(()),
        }
    }

    /// Log a successful write, then stall the reply if asked to
    async fn record(&self, op: BackendOp, call: BackendCall) {
        self.writes.write().await.push(call);
        let delay = self.reply_latency.read().await.get(&op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Custom title when it is non-blank, otherwise one derived from content
fn resolve_title(content: &str, title: Option<&str>) -> String {
    match title.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => derive_title(content),
    }
}

#[async_trait]
impl NoteBackend for MemoryBackend {
    // ========================================================================
    // Notes
    // ========================================================================

    async fn list_notes(&self) -> Result<Vec<Note>> {
        self.enter(BackendOp::ListNotes).await?;
        Ok(self.data.read().await.notes.clone())
    }

    async fn save_note(
        &self,
        content: &str,
        category_path: &[String],
        title: Option<&str>,
    ) -> Result<Note> {
        self.enter(BackendOp::SaveNote).await?;
        let mut data = self.data.write().await;
        data.ensure_category_path(category_path)?;

        let note = Note::new(
            Uuid::new_v4().to_string(),
            resolve_title(content, title),
            content,
            category_path.to_vec(),
        );
        data.notes.push(note.clone());
        data.recount();
        drop(data);

        self.record(BackendOp::SaveNote, BackendCall::SaveNote {
            id: note.id.clone(),
        })
        .await;
        Ok(note)
    }

    async fn update_note(&self, id: &str, content: &str) -> Result<Note> {
        self.update_note_with_title(id, content, None).await
    }

    async fn update_note_with_title(
        &self,
        id: &str,
        content: &str,
        title: Option<&str>,
    ) -> Result<Note> {
        self.enter(BackendOp::UpdateNote).await?;
        let mut data = self.data.write().await;
        let note = data.note_mut(id)?;
        note.content = content.to_string();
        note.title = resolve_title(content, title);
        let updated = note.clone();
        drop(data);

        self.record(BackendOp::UpdateNote, BackendCall::UpdateNote { id: id.to_string() })
            .await;
        Ok(updated)
    }

    async fn delete_note(&self, id: &str) -> Result<()> {
        self.enter(BackendOp::DeleteNote).await?;
        let mut data = self.data.write().await;
        data.notes.retain(|n| n.id != id);
        data.positions.retain(|(note_id, _)| note_id != id);
        data.recount();
        drop(data);

        self.record(BackendOp::DeleteNote, BackendCall::DeleteNote { id: id.to_string() })
            .await;
        Ok(())
    }

    // ========================================================================
    // Categories
    // ========================================================================

    async fn list_categories(&self) -> Result<Vec<Category>> {
        self.enter(BackendOp::ListCategories).await?;
        Ok(self.data.read().await.categories.clone())
    }

    async fn create_category(
        &self,
        name: &str,
        parent_path: Option<&[String]>,
    ) -> Result<Category> {
        self.enter(BackendOp::CreateCategory).await?;
        let mut data = self.data.write().await;
        let category = data.insert_category(name, parent_path.unwrap_or(&[]))?;
        data.recount();
        let category = data
            .categories
            .iter()
            .find(|c| c.id == category.id)
            .cloned()
            .unwrap_or(category);
        drop(data);

        self.record(BackendOp::CreateCategory, BackendCall::CreateCategory {
            path: category.path.clone(),
        })
        .await;
        Ok(category)
    }

    async fn rename_category(&self, id: &str, new_name: &str) -> Result<()> {
        self.enter(BackendOp::RenameCategory).await?;
        let new_name = new_name.trim();
        if new_name.is_empty() {
            bail!("Category name cannot be empty");
        }

        let mut data = self.data.write().await;
        let old_path = data
            .categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.path.clone())
            .ok_or_else(|| anyhow!("Category not found"))?;
        let mut new_path = old_path.clone();
        if let Some(last) = new_path.last_mut() {
            *last = new_name.to_string();
        }

        for category in &mut data.categories {
            if category.path.starts_with(&old_path) {
                let mut path = new_path.clone();
                path.extend_from_slice(&category.path[old_path.len()..]);
                category.path = path;
                if category.id == id {
                    category.name = new_name.to_string();
                }
                category.refresh_derived();
            }
        }
        for note in &mut data.notes {
            if note.category_path.starts_with(&old_path) {
                let mut path = new_path.clone();
                path.extend_from_slice(&note.category_path[old_path.len()..]);
                note.category_path = path;
            }
        }
        drop(data);

        self.record(BackendOp::RenameCategory, BackendCall::RenameCategory {
            id: id.to_string(),
            name: new_name.to_string(),
        })
        .await;
        Ok(())
    }

    async fn delete_category(&self, id: &str) -> Result<()> {
        self.enter(BackendOp::DeleteCategory).await?;
        let mut data = self.data.write().await;
        let path = data
            .categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.path.clone())
            .ok_or_else(|| anyhow!("Category not found"))?;

        let removed: Vec<String> = data
            .notes
            .iter()
            .filter(|n| n.is_under(&path))
            .map(|n| n.id.clone())
            .collect();
        data.notes.retain(|n| !n.is_under(&path));
        data.positions.retain(|(note_id, _)| !removed.contains(note_id));
        data.categories.retain(|c| !c.is_within(&path));
        data.recount();
        drop(data);

        self.record(BackendOp::DeleteCategory, BackendCall::DeleteCategory { id: id.to_string() })
            .await;
        Ok(())
    }

    // ========================================================================
    // Links
    // ========================================================================

    async fn list_links(&self) -> Result<Vec<Link>> {
        self.enter(BackendOp::ListLinks).await?;
        Ok(self.data.read().await.links.clone())
    }

    async fn create_link(&self, link: &NewLink) -> Result<Link> {
        self.enter(BackendOp::CreateLink).await?;
        let mut data = self.data.write().await;
        for endpoint in [&link.source_id, &link.target_id] {
            if !data.notes.iter().any(|n| &n.id == endpoint) {
                bail!("Note with id {} not found", endpoint);
            }
        }

        let created = Link::from_new(Uuid::new_v4().to_string(), link.clone());
        data.links.push(created.clone());
        drop(data);

        self.record(BackendOp::CreateLink, BackendCall::CreateLink {
            id: created.id.clone(),
        })
        .await;
        Ok(created)
    }

    async fn delete_link(&self, id: &str) -> Result<()> {
        self.enter(BackendOp::DeleteLink).await?;
        let mut data = self.data.write().await;
        let before = data.links.len();
        data.links.retain(|l| l.id != id);
        if data.links.len() == before {
            bail!("Link with id {} not found", id);
        }
        drop(data);

        self.record(BackendOp::DeleteLink, BackendCall::DeleteLink { id: id.to_string() })
            .await;
        Ok(())
    }

    // ========================================================================
    // Positions
    // ========================================================================

    async fn list_positions(&self) -> Result<Vec<(String, Position)>> {
        self.enter(BackendOp::ListPositions).await?;
        Ok(self.data.read().await.positions.clone())
    }

    async fn save_position(&self, note_id: &str, x: f64, y: f64) -> Result<()> {
        self.enter(BackendOp::SavePosition).await?;
        let mut data = self.data.write().await;
        if !data.notes.iter().any(|n| n.id == note_id) {
            bail!("Note with id {} not found", note_id);
        }
        match data.positions.iter_mut().find(|(id, _)| id == note_id) {
            Some((_, position)) => {
                position.x = x;
                position.y = y;
            }
            None => data
                .positions
                .push((note_id.to_string(), Position::new(x, y))),
        }
        drop(data);

        self.record(BackendOp::SavePosition, BackendCall::SavePosition {
            note_id: note_id.to_string(),
            x,
            y,
        })
        .await;
        Ok(())
    }

    // ========================================================================
    // Viewport
    // ========================================================================

    async fn get_viewport(&self) -> Result<Viewport> {
        self.enter(BackendOp::GetViewport).await?;
        Ok(self.data.read().await.viewport)
    }

    async fn save_viewport(&self, x: f64, y: f64, zoom: f64) -> Result<()> {
        self.enter(BackendOp::SaveViewport).await?;
        let viewport = Viewport { x, y, zoom };
        self.data.write().await.viewport = viewport;
        self.record(BackendOp::SaveViewport, BackendCall::SaveViewport(viewport)).await;
        Ok(())
    }
}
