//! Category model

use super::note::Note;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator used for the cached display path
pub const PATH_SEPARATOR: &str = " → ";

fn default_created_at() -> DateTime<Utc> {
    Utc::now()
}

/// A node of the category tree.
///
/// `path` always ends with `name`. `parent_id` is a back-reference to the
/// category whose path is `path[..len - 1]`; it never implies ownership.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub path: Vec<String>,
    /// Cached display path, e.g. "Technical → Python → Flask"
    #[serde(default)]
    pub full_path: String,
    /// Depth in the tree, 0 for roots
    #[serde(default)]
    pub level: u32,
    /// Notes filed under this category or any descendant
    #[serde(default)]
    pub note_count: u32,
    #[serde(default = "default_created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Category {
    /// Create a category at `parent_path / name`
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        parent_path: &[String],
        parent_id: Option<String>,
    ) -> Self {
        let name = name.into();
        let mut path = parent_path.to_vec();
        path.push(name.clone());
        let mut category = Self {
            id: id.into(),
            name,
            parent_id,
            path,
            full_path: String::new(),
            level: 0,
            note_count: 0,
            created_at: Utc::now(),
            color: None,
        };
        category.refresh_derived();
        category
    }

    /// Path of the parent category, empty for roots
    pub fn parent_path(&self) -> &[String] {
        match self.path.split_last() {
            Some((_, parent)) => parent,
            None => &[],
        }
    }

    /// True if `self` is `other` or one of its descendants
    pub fn is_within(&self, other: &[String]) -> bool {
        self.path.starts_with(other)
    }

    /// Recompute `level` and `full_path` from `path`
    pub fn refresh_derived(&mut self) {
        self.level = (self.path.len() as u32).saturating_sub(1);
        self.full_path = display_path(&self.path);
    }
}

/// Render a category path for display
pub fn display_path(path: &[String]) -> String {
    path.join(PATH_SEPARATOR)
}

/// Recompute every category's `note_count` from the given notes.
///
/// A note counts toward its own category and every ancestor of it.
pub fn recount_notes(categories: &mut [Category], notes: &[Note]) {
    for category in categories.iter_mut() {
        category.note_count = notes
            .iter()
            .filter(|note| note.category_path.starts_with(&category.path))
            .count() as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_root_category() {
        let cat = Category::new("c1", "Work", &[], None);
        assert_eq!(cat.path, path(&["Work"]));
        assert_eq!(cat.level, 0);
        assert_eq!(cat.full_path, "Work");
        assert!(cat.parent_path().is_empty());
    }

    #[test]
    fn test_new_child_category() {
        let cat = Category::new("c2", "Flask", &path(&["Technical", "Python"]), Some("c1".into()));
        assert_eq!(cat.level, 2);
        assert_eq!(cat.full_path, "Technical → Python → Flask");
        assert_eq!(cat.parent_path(), path(&["Technical", "Python"]).as_slice());
        assert!(cat.is_within(&path(&["Technical"])));
        assert!(!cat.is_within(&path(&["Python"])));
    }

    #[test]
    fn test_recount_counts_ancestors() {
        let mut cats = vec![
            Category::new("c1", "Work", &[], None),
            Category::new("c2", "Rust", &path(&["Work"]), Some("c1".into())),
            Category::new("c3", "Home", &[], None),
        ];
        let notes = vec![
            Note::new("n1", "a", "a", path(&["Work"])),
            Note::new("n2", "b", "b", path(&["Work", "Rust"])),
            Note::new("n3", "c", "c", vec![]),
        ];
        recount_notes(&mut cats, &notes);
        assert_eq!(cats[0].note_count, 2);
        assert_eq!(cats[1].note_count, 1);
        assert_eq!(cats[2].note_count, 0);
    }

    #[test]
    fn test_legacy_category_without_derived_fields() {
        let json = r#"{"id":"c1","name":"Flask","parent_id":null,"path":["Technical","Python","Flask"],"note_count":4}"#;
        let mut cat: Category = serde_json::from_str(json).unwrap();
        assert_eq!(cat.level, 0);
        cat.refresh_derived();
        assert_eq!(cat.level, 2);
        assert_eq!(cat.full_path, "Technical → Python → Flask");
    }
}
