//! Entity store
//!
//! Normalized collections of notes, categories, links and positions, with
//! per-kind status and the view state. See [`EntityState::apply`] for the
//! transition rules.

mod selectors;
mod state;

pub use state::{Action, Collection, Entity, EntityState, KindStatus};
