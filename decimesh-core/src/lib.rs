//! Core data structures for decimesh
//!
//! This crate provides the in-memory mesh document that travels between the
//! codec, the simplification passes and the statistics extractor, plus the
//! error type shared by every processing stage.

pub mod point;
pub mod document;
pub mod mesh;
pub mod stats;
pub mod error;

pub use point::*;
pub use document::*;
pub use mesh::*;
pub use stats::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};
