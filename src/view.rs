//! View state and derived graph data

use crate::edges::{build_edges, EdgeDescriptor};
use crate::models::{EntityKind, Note, Viewport};
use crate::store::EntityState;
use std::collections::HashSet;

/// What the graph view is currently showing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    /// Show only notes under this category path
    pub category_filter: Option<Vec<String>>,
    pub search_text: String,
    pub viewport: Viewport,
}

impl ViewState {
    /// Notes passing the category filter and search text, in collection order
    pub fn visible_notes<'a>(&self, state: &'a EntityState) -> Vec<&'a Note> {
        state.notes_matching(self.category_filter.as_deref(), Some(&self.search_text))
    }

    pub fn visible_note_ids(&self, state: &EntityState) -> HashSet<String> {
        self.visible_notes(state)
            .into_iter()
            .map(|n| n.id.clone())
            .collect()
    }
}

/// Memoized edge list.
///
/// Edges are rebuilt only when the link collection changed (by revision) or
/// the visible note set differs from the last build.
#[derive(Debug, Default)]
pub struct EdgeCache {
    links_revision: Option<u64>,
    visible: HashSet<String>,
    edges: Vec<EdgeDescriptor>,
    rebuilds: u64,
}

impl EdgeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current edges for `state` as seen through its view state
    pub fn edges(&mut self, state: &EntityState) -> &[EdgeDescriptor] {
        let visible = state.view().visible_note_ids(state);
        let revision = state.revision(EntityKind::Links);
        if self.links_revision != Some(revision) || self.visible != visible {
            self.edges = build_edges(state.links(), &visible);
            self.visible = visible;
            self.links_revision = Some(revision);
            self.rebuilds += 1;
            tracing::debug!(
                edges = self.edges.len(),
                links_revision = revision,
                "Rebuilt graph edges"
            );
        }
        &self.edges
    }

    /// How many times the edge list was recomputed
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Link, LinkType, NewLink};
    use crate::store::{Action, Collection, Entity};

    fn state() -> EntityState {
        let mut state = EntityState::new();
        state.set_all(Collection::Notes(vec![
            Note::new("a", "Alpha", "first", vec!["Work".into()]),
            Note::new("b", "Beta", "second", vec!["Work".into()]),
            Note::new("c", "Gamma", "third", vec!["Home".into()]),
        ]));
        state.set_all(Collection::Links(vec![
            Link::from_new("l1", NewLink::new("a", "b", LinkType::Related)),
            Link::from_new("l2", NewLink::new("b", "c", LinkType::Related)),
        ]));
        state
    }

    #[test]
    fn test_visible_notes_follow_filter_and_search() {
        let mut state = state();
        assert_eq!(state.view().visible_note_ids(&state).len(), 3);

        state.apply(Action::SetCategoryFilter(Some(vec!["Work".into()])));
        let ids: Vec<&str> = state
            .view()
            .visible_notes(&state)
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        state.apply(Action::SetSearchText("beta".into()));
        let ids: Vec<&str> = state
            .view()
            .visible_notes(&state)
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_edge_cache_rebuilds_only_on_change() {
        let mut state = state();
        let mut cache = EdgeCache::new();

        assert_eq!(cache.edges(&state).len(), 2);
        assert_eq!(cache.edges(&state).len(), 2);
        assert_eq!(cache.rebuilds(), 1);

        // A position change touches neither links nor visibility
        state.upsert(Entity::Position {
            note_id: "a".into(),
            position: crate::models::Position::new(1.0, 1.0),
        });
        cache.edges(&state);
        assert_eq!(cache.rebuilds(), 1);

        state.apply(Action::SetCategoryFilter(Some(vec!["Work".into()])));
        let ids: Vec<String> = cache.edges(&state).iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids, vec!["l1"]);
        assert_eq!(cache.rebuilds(), 2);

        state.remove(EntityKind::Links, "l1");
        assert!(cache.edges(&state).is_empty());
        assert_eq!(cache.rebuilds(), 3);
    }
}
