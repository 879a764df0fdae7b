//! Node placement
//!
//! Two deterministic placements: the grid seed used for notes that were
//! never positioned, and the circle used by auto-layout. No physics.

use crate::models::{Note, Position};
use crate::store::EntityState;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Geometry of the seed grid and the auto-layout circle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub center_x: f64,
    pub center_y: f64,
    pub base_radius: f64,
    /// Radius added per laid out node
    pub radius_per_node: f64,
    /// Distance between neighbouring grid cells
    pub seed_spacing: f64,
    pub seed_columns: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            center_x: 400.0,
            center_y: 300.0,
            base_radius: 200.0,
            radius_per_node: 20.0,
            seed_spacing: 250.0,
            seed_columns: 4,
        }
    }
}

/// Grid cell for the `index`-th note of the collection
pub fn seed_position(index: usize, config: &LayoutConfig) -> Position {
    let columns = config.seed_columns.max(1);
    Position::new(
        (index % columns) as f64 * config.seed_spacing,
        (index / columns) as f64 * config.seed_spacing,
    )
}

/// Circle placement for `ids`, in the given order.
///
/// The radius grows with the node count so larger graphs stay legible.
pub fn circle_positions(ids: &[String], config: &LayoutConfig) -> Vec<(String, Position)> {
    let n = ids.len();
    if n == 0 {
        return Vec::new();
    }
    let radius = config.base_radius + config.radius_per_node * n as f64;
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            let angle = TAU * i as f64 / n as f64;
            let position = Position::new(
                config.center_x + radius * angle.cos(),
                config.center_y + radius * angle.sin(),
            );
            (id.clone(), position)
        })
        .collect()
}

/// A note with the place it should be drawn at
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedNote {
    pub note_id: String,
    pub title: String,
    pub position: Position,
    /// True when no stored position exists and the grid seed was used
    pub seeded: bool,
}

/// Pair every note in `notes` with its stored position, or with the grid
/// seed for its index in the full note collection.
pub fn resolve_positions(
    state: &EntityState,
    notes: &[&Note],
    config: &LayoutConfig,
) -> Vec<PlacedNote> {
    notes
        .iter()
        .map(|note| {
            let stored = state.position_of(&note.id);
            let position = stored.unwrap_or_else(|| {
                let index = state
                    .notes()
                    .iter()
                    .position(|n| n.id == note.id)
                    .unwrap_or_default();
                seed_position(index, config)
            });
            PlacedNote {
                note_id: note.id.clone(),
                title: note.title.clone(),
                position,
                seeded: stored.is_none(),
            }
        })
        .collect()
}
