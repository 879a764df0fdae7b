//! Read-only queries over [`EntityState`]

use super::state::EntityState;
use crate::models::{Category, Link, Note, Position};

impl EntityState {
    pub fn note(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn link(&self, id: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.id == id)
    }

    pub fn position_of(&self, note_id: &str) -> Option<Position> {
        self.positions.get(note_id).copied()
    }

    /// Notes under `category_path` (or any descendant) whose title, content
    /// or tags contain `search_text`, case-insensitively.
    ///
    /// Empty or missing filters match everything. Collection order is kept.
    pub fn notes_matching(
        &self,
        category_path: Option<&[String]>,
        search_text: Option<&str>,
    ) -> Vec<&Note> {
        let needle = search_text
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        self.notes
            .iter()
            .filter(|n| category_path.map_or(true, |path| n.is_under(path)))
            .filter(|n| needle.as_deref().map_or(true, |s| n.matches_lowercase(s)))
            .collect()
    }

    /// Links with `note_id` at either end, in collection order
    pub fn links_touching(&self, note_id: &str) -> Vec<&Link> {
        self.links.iter().filter(|l| l.touches(note_id)).collect()
    }

    /// Categories sorted by depth, then name
    pub fn category_hierarchy(&self) -> Vec<&Category> {
        let mut sorted: Vec<&Category> = self.categories.iter().collect();
        sorted.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.name.cmp(&b.name)));
        sorted
    }

    /// Categories whose name contains `name`, case-insensitively.
    ///
    /// Exact matches come first, then prefix matches, then the rest; ties
    /// are broken by case-sensitive name order, so `Zeta` sorts before
    /// `alpha`.
    pub fn find_categories_fuzzy(&self, name: &str) -> Vec<&Category> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<(u8, &Category)> = self
            .categories
            .iter()
            .filter_map(|c| {
                let lower = c.name.to_lowercase();
                let rank = if lower == needle {
                    0
                } else if lower.starts_with(&needle) {
                    1
                } else if lower.contains(&needle) {
                    2
                } else {
                    return None;
                };
                Some((rank, c))
            })
            .collect();
        hits.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));
        hits.into_iter().map(|(_, c)| c).collect()
    }

    pub fn category_path_exists(&self, path: &[String]) -> bool {
        self.categories.iter().any(|c| c.path == path)
    }

    pub fn category_by_path(&self, path: &[String]) -> Option<&Category> {
        self.categories.iter().find(|c| c.path == path)
    }
}
