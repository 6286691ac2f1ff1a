//! Visual recognition for the game client.
//!
//! This module provides:
//! - 64-bit average hashing over ROIs
//! - Hash similarity and ranking
//! - Separator-based grid detection
//! - Per-category template registry and recognizers

pub mod grid;
pub mod hash;
pub mod layout;
pub mod matcher;
pub mod recognizers;
pub mod templates;

pub use grid::{detect_grid, GridLines};
pub use hash::{average_hash, ImageHash};
pub use matcher::{rank, similarity, AcceptRule};
pub use recognizers::{
    BindFilter, CardInfo, ItemMatch, Position, RecognitionResult, Recognizer,
};
pub use templates::{Category, Template, TemplateRegistry};
