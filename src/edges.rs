//! Graph edge construction
//!
//! Turns the stored links into renderable edge descriptors. Several links may
//! join the same two notes; each one in a group gets its own curve so they
//! stay distinguishable. The output depends only on the link collection order
//! and the visible set, so the same input always renders the same way.

use crate::models::{Link, LinkType};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

// ============================================================================
// Descriptors
// ============================================================================

/// How an edge is drawn relative to the others between the same notes.
///
/// Ordered by position within a group: straight first, then the two
/// mirrored beziers, then increasingly offset curves.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(tag = "style", content = "offset", rename_all = "snake_case")]
pub enum CurveStyle {
    Straight,
    Bezier,
    BezierOpposite,
    Offset(usize),
}

impl CurveStyle {
    /// Curve for the `index`-th link of a pair group
    pub fn for_index(index: usize) -> Self {
        match index {
            0 => Self::Straight,
            1 => Self::Bezier,
            2 => Self::BezierOpposite,
            n => Self::Offset(n),
        }
    }
}

/// A renderable edge, one per visible link
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EdgeDescriptor {
    /// Id of the link this edge draws
    pub id: String,
    pub source: String,
    pub target: String,
    pub curve: CurveStyle,
    /// Stroke color as `#rrggbb`
    pub color: &'static str,
    /// Draw an arrowhead at the target end
    pub directional: bool,
    pub label: String,
    pub link_type: LinkType,
    /// Position of this edge within its pair group
    pub pair_index: usize,
    /// Number of visible links between the same two notes
    pub pair_size: usize,
}

// ============================================================================
// Attribute resolution
// ============================================================================

/// Stroke color for a link type
pub fn type_color(link_type: &LinkType) -> &'static str {
    match link_type {
        LinkType::Related => "#6b7280",
        LinkType::Reference => "#3b82f6",
        LinkType::FollowUp => "#22c55e",
        LinkType::Contradicts => "#ef4444",
        LinkType::Supports => "#f59e0b",
        LinkType::Custom(_) => "#8b5cf6",
    }
}

/// Explicit color if set, otherwise the type color
pub fn resolve_color(link: &Link) -> &'static str {
    match link.color {
        Some(color) => color.hex(),
        None => type_color(&link.link_type),
    }
}

/// Explicit directionality if set, otherwise the type default
pub fn resolve_directional(link: &Link) -> bool {
    link.directional
        .unwrap_or_else(|| link.link_type.is_directional_by_default())
}

/// Trimmed label if non-empty, otherwise the type's display name
pub fn resolve_label(link: &Link) -> String {
    link.label
        .as_deref()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| link.link_type.display_name())
        .to_string()
}

// ============================================================================
// Grouping
// ============================================================================

/// Build edge descriptors for every link whose endpoints are both visible.
///
/// Output follows link collection order. Links are grouped by their
/// unordered endpoint pair and each gets the curve for its index within
/// the group.
pub fn build_edges(links: &[Link], visible_ids: &HashSet<String>) -> Vec<EdgeDescriptor> {
    let visible: Vec<&Link> = links
        .iter()
        .filter(|l| visible_ids.contains(&l.source_id) && visible_ids.contains(&l.target_id))
        .collect();

    let mut group_sizes: HashMap<(&str, &str), usize> = HashMap::new();
    for link in visible.iter().copied() {
        *group_sizes.entry(link.pair_key()).or_default() += 1;
    }

    let mut seen: HashMap<(&str, &str), usize> = HashMap::new();
    visible
        .into_iter()
        .map(|link| {
            let key = link.pair_key();
            let slot = seen.entry(key).or_default();
            let pair_index = *slot;
            *slot += 1;

            EdgeDescriptor {
                id: link.id.clone(),
                source: link.source_id.clone(),
                target: link.target_id.clone(),
                curve: CurveStyle::for_index(pair_index),
                color: resolve_color(link),
                directional: resolve_directional(link),
                label: resolve_label(link),
                link_type: link.link_type.clone(),
                pair_index,
                pair_size: group_sizes.get(&key).copied().unwrap_or(1),
            }
        })
        .collect()
}
