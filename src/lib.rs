//! Constrained scene composition and change-tracking engine.
//!
//! Composes randomized object scenes under placement and visibility
//! constraints, infers pairwise directional relationships, and (in
//! action mode) applies a single tracked mutation per scene, emitting
//! paired before/after ground truth for downstream question generation.

pub mod directions;
pub mod error;
pub mod generate;
pub mod mutation;
pub mod output;
pub mod placement;
pub mod prng;
pub mod relationships;
pub mod renderer;
pub mod types;
pub mod visibility;
