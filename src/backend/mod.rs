//! Persistence boundary
//!
//! - [`traits`]: the `NoteBackend` trait the store is written against
//! - [`memory`]: `MemoryBackend`, an in-memory implementation with failure
//!   injection, used by tests and the CLI

pub mod memory;
pub mod traits;

pub use memory::{BackendCall, BackendOp, MemoryBackend};
pub use traits::NoteBackend;

use crate::models::{Category, Link, Note, Position, Viewport};
use serde::{Deserialize, Serialize};

/// A complete dump of the knowledge base, as read from or written to JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub notes: Vec<Note>,
    pub categories: Vec<Category>,
    pub links: Vec<Link>,
    pub positions: Vec<(String, Position)>,
    pub viewport: Viewport,
}

impl Snapshot {
    /// Parse a snapshot from JSON text
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
