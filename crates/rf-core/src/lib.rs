//! rf-core: shared types, IDs, errors, configuration, quality presets and
//! the event bus.
//!
//! This crate is the foundational dependency for all other rf-* crates.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;
pub mod quality;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use media::*;
pub use quality::{QualityId, QualityProfile};
