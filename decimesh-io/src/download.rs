//! Save decimated buffers as `.glb` files

use decimesh_core::Result;
use std::path::{Path, PathBuf};

/// File name used when the destination is a directory
pub const DEFAULT_FILENAME: &str = "simplified.glb";

/// Media type of binary glTF files
pub const GLB_MEDIA_TYPE: &str = "model/gltf-binary";

/// Write `bytes` to `destination`, returning the path actually written.
///
/// A destination that is an existing directory receives [`DEFAULT_FILENAME`].
pub async fn save_glb<P: AsRef<Path>>(bytes: &[u8], destination: P) -> Result<PathBuf> {
    let destination = destination.as_ref();
    let path = if tokio::fs::metadata(destination).await.map(|m| m.is_dir()).unwrap_or(false) {
        destination.join(DEFAULT_FILENAME)
    } else {
        destination.to_path_buf()
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, bytes).await?;
    log::info!("saved {} bytes of {} to {}", bytes.len(), GLB_MEDIA_TYPE, path.display());
    Ok(path)
}
