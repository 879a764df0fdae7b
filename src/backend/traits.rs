//! NoteBackend trait definition
//!
//! Defines the abstract persistence boundary the store talks to. The store
//! never reads or writes storage directly; every durable effect goes through
//! one of these calls, each of which may fail.

use crate::models::{Category, Link, Note, NewLink, Position, Viewport};
use anyhow::Result;
use async_trait::async_trait;

/// Abstract interface for all knowledge base persistence operations.
#[async_trait]
pub trait NoteBackend: Send + Sync {
    // ========================================================================
    // Note operations
    // ========================================================================

    /// List all notes in storage order
    async fn list_notes(&self) -> Result<Vec<Note>>;

    /// Persist a new note. Missing categories along `category_path` are
    /// created. A blank `title` means "derive one from the content".
    async fn save_note(
        &self,
        content: &str,
        category_path: &[String],
        title: Option<&str>,
    ) -> Result<Note>;

    /// Replace a note's content and regenerate its title
    async fn update_note(&self, id: &str, content: &str) -> Result<Note>;

    /// Replace a note's content, keeping `title` when it is non-blank
    async fn update_note_with_title(
        &self,
        id: &str,
        content: &str,
        title: Option<&str>,
    ) -> Result<Note>;

    /// Delete a note and its stored position
    async fn delete_note(&self, id: &str) -> Result<()>;

    // ========================================================================
    // Category operations
    // ========================================================================

    /// List all categories with fresh note counts
    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Create a category under an existing parent path
    async fn create_category(&self, name: &str, parent_path: Option<&[String]>)
        -> Result<Category>;

    /// Rename a category, rewriting descendant category and note paths
    async fn rename_category(&self, id: &str, new_name: &str) -> Result<()>;

    /// Delete a category, its descendants and the notes filed under them
    async fn delete_category(&self, id: &str) -> Result<()>;

    // ========================================================================
    // Link operations
    // ========================================================================

    /// List all links in creation order
    async fn list_links(&self) -> Result<Vec<Link>>;

    /// Create a link between two stored notes
    async fn create_link(&self, link: &NewLink) -> Result<Link>;

    /// Delete a link by id
    async fn delete_link(&self, id: &str) -> Result<()>;

    // ========================================================================
    // Position operations
    // ========================================================================

    /// List every stored note position
    async fn list_positions(&self) -> Result<Vec<(String, Position)>>;

    /// Store a note's canvas coordinates
    async fn save_position(&self, note_id: &str, x: f64, y: f64) -> Result<()>;

    // ========================================================================
    // Viewport operations
    // ========================================================================

    /// Last saved viewport, or the default one
    async fn get_viewport(&self) -> Result<Viewport>;

    /// Store the graph viewport
    async fn save_viewport(&self, x: f64, y: f64, zoom: f64) -> Result<()>;
}
