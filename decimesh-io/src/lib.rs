//! I/O operations for decimesh
//!
//! This crate turns mesh buffers into [`MeshDocument`]s and back, fetches
//! source bytes for remote assets and writes results out as files.

pub mod codec;
pub mod glb;
pub mod fetch;
pub mod download;

pub use codec::MeshCodec;
pub use glb::GlbCodec;
pub use fetch::{ByteFetcher, FileFetcher};
pub use download::{save_glb, DEFAULT_FILENAME, GLB_MEDIA_TYPE};

use decimesh_core::{MeshDocument, Result};

/// Decode a binary glTF buffer with the default codec
pub fn read_glb(bytes: &[u8]) -> Result<MeshDocument> {
    GlbCodec::new().decode(bytes)
}

/// Encode a document as binary glTF with the default codec
pub fn write_glb(document: &MeshDocument) -> Result<Vec<u8>> {
    GlbCodec::new().encode(document)
}
