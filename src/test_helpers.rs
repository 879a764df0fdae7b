//! Test helper factories and seeded backends
//!
//! Provides small constructors for models and a fixed knowledge base used
//! across the coordinator and sync tests.
#![allow(dead_code)]

use crate::backend::{MemoryBackend, Snapshot};
use crate::coordinator::KnowledgeStore;
use crate::models::{Category, Link, LinkType, NewLink, Note, Position};
use std::sync::Arc;

// ============================================================================
// Model factories
// ============================================================================

pub fn path(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

pub fn test_note(id: &str, category: &[&str]) -> Note {
    Note::new(id, format!("Note {}", id), format!("Content of {}", id), path(category))
}

pub fn test_link(id: &str, source: &str, target: &str, link_type: LinkType) -> Link {
    Link::from_new(id, NewLink::new(source, target, link_type))
}

// ============================================================================
// Seeded backends
// ============================================================================

/// Three notes across `Work`, `Work → Rust` and `Home`, two links and two
/// stored positions:
///
/// - `n-a` in Work, at (10, 10)
/// - `n-b` in Work → Rust, at (20, 20)
/// - `n-c` in Home, never positioned
/// - `l-ab` Related n-a → n-b, `l-bc` Reference n-b → n-c
pub fn seeded_snapshot() -> Snapshot {
    Snapshot {
        notes: vec![
            test_note("n-a", &["Work"]),
            test_note("n-b", &["Work", "Rust"]),
            test_note("n-c", &["Home"]),
        ],
        categories: vec![
            Category::new("c-work", "Work", &[], None),
            Category::new("c-rust", "Rust", &path(&["Work"]), Some("c-work".into())),
            Category::new("c-home", "Home", &[], None),
        ],
        links: vec![
            test_link("l-ab", "n-a", "n-b", LinkType::Related),
            test_link("l-bc", "n-b", "n-c", LinkType::Reference),
        ],
        positions: vec![
            ("n-a".into(), Position::new(10.0, 10.0)),
            ("n-b".into(), Position::new(20.0, 20.0)),
        ],
        viewport: Default::default(),
    }
}

pub fn seeded_backend() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::from_snapshot(seeded_snapshot()))
}

/// A store over `backend` with every collection loaded
pub async fn loaded_store(backend: Arc<MemoryBackend>) -> KnowledgeStore {
    let store = KnowledgeStore::new(backend);
    store
        .reload()
        .await
        .into_result()
        .expect("seeded reload");
    store
}
