//! Database record structures.
//!
//! These types mirror what the document store persists. They are separate from the
//! API models in [`crate::api::models`] so the wire shape can evolve independently.

pub mod forms;
