//! Codec abstraction between byte buffers and mesh documents

use decimesh_core::{MeshDocument, Result};

/// Decodes byte buffers into mesh documents and encodes them back.
///
/// Decoding must be free of side effects so the same buffer can be decoded
/// more than once.
pub trait MeshCodec: Send + Sync {
    /// Decode a buffer into a document
    fn decode(&self, bytes: &[u8]) -> Result<MeshDocument>;

    /// Encode a document into a buffer
    fn encode(&self, document: &MeshDocument) -> Result<Vec<u8>>;

    /// Get the format name this codec handles
    fn format_name(&self) -> &'static str;
}
