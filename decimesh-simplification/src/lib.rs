//! Mesh simplification and decimation algorithms
//!
//! This crate provides the passes the decimation worker runs over a decoded
//! document:
//! - Vertex welding of coincident vertices
//! - Quadric error edge collapse toward a target ratio and error bound
//! - An adapter that gates the engine behind a one-time readiness check

pub mod weld;
pub mod edge_collapse;
pub mod adapter;

pub use weld::*;
pub use edge_collapse::*;
pub use adapter::*;

use decimesh_core::{Result, TriangleMesh};

/// Simplify a mesh by reducing the number of faces/vertices
pub trait MeshSimplifier: Send + Sync {
    /// One-time preparation, run before the first simplification
    fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Simplify toward `target_ratio` of the input faces (1.0 keeps everything).
    ///
    /// `max_error` bounds the geometric deviation relative to the mesh extent;
    /// the simplifier stops early rather than exceed it, so the ratio is a
    /// target and not a guarantee.
    fn simplify(
        &self,
        mesh: &TriangleMesh,
        target_ratio: f32,
        max_error: f32,
    ) -> Result<TriangleMesh>;
}
