//! Store change notifications
//!
//! This module provides:
//! - `StoreEvent`: emitted after confirmed mutations and reloads, plus
//!   "open note" requests from views
//! - `EventBus`: broadcast channel that distributes them

mod bus;
mod types;

pub use bus::EventBus;
pub use types::{ChangeAction, EventEmitter, StoreEvent};
