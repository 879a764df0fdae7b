//! Knowledge base models
//!
//! Plain serde types for the four entity collections (notes, categories,
//! links, positions) and the graph viewport. None of these types enforce
//! cross-entity invariants; that is the job of [`crate::store`].

pub mod category;
pub mod link;
pub mod note;
pub mod position;

pub use category::{display_path, recount_notes, Category};
pub use link::{Link, LinkColor, LinkType, NewLink};
pub use note::{derive_title, Note, NoteSource};
pub use position::{Position, Viewport};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four independently tracked entity collections
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Notes,
    Categories,
    Links,
    Positions,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Notes,
        EntityKind::Categories,
        EntityKind::Links,
        EntityKind::Positions,
    ];

    /// Dense index used for per-kind status slots
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Notes => 0,
            Self::Categories => 1,
            Self::Links => 2,
            Self::Positions => 3,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notes => write!(f, "notes"),
            Self::Categories => write!(f, "categories"),
            Self::Links => write!(f, "links"),
            Self::Positions => write!(f, "positions"),
        }
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "notes" | "note" => Ok(Self::Notes),
            "categories" | "category" => Ok(Self::Categories),
            "links" | "link" => Ok(Self::Links),
            "positions" | "position" => Ok(Self::Positions),
            _ => Err(format!("Unknown entity kind: {}", s)),
        }
    }
}
