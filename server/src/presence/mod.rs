//! In-memory player presence: last-known positions and the adjacency state
//! derived from them.
//!
//! The store and the adjacency set are owned by a single tracker task
//! (see [`tracker`]); sessions only talk to it through [`PresenceTracker`].

pub mod proximity;
pub mod store;
pub mod tracker;

pub use proximity::{AdjacencyKey, AdjacencySet, ProximityEngine};
pub use store::{Position, PresenceStore};
pub use tracker::PresenceTracker;
