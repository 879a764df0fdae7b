//! Canvas coordinates for notes and the graph viewport

use serde::{Deserialize, Serialize};

/// Persisted canvas coordinates of a note
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z_index: None }
    }

    /// Same coordinates, ignoring stacking order
    pub fn same_point(&self, x: f64, y: f64) -> bool {
        self.x == x && self.y == y
    }
}

/// Last seen pan and zoom of the graph view
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 0.8,
        }
    }
}
