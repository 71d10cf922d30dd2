//! Byte retrieval for decimating assets by URL

use decimesh_core::{Error, Result};
use std::future::Future;
use std::path::PathBuf;

/// Retrieves the raw bytes behind a URL
pub trait ByteFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Fetches `file://` URLs and plain paths from the local filesystem.
///
/// Relative paths resolve against `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct FileFetcher {
    root: Option<PathBuf>,
}

impl FileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root`
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Map a URL onto a filesystem path
    pub fn resolve(&self, url: &str) -> Result<PathBuf> {
        let path = match url.split_once("://") {
            Some(("file", rest)) => rest,
            Some((scheme, _)) => {
                return Err(Error::UnsupportedFormat(format!(
                    "unsupported URL scheme '{}'",
                    scheme
                )));
            }
            None => url,
        };

        let path = PathBuf::from(path);
        Ok(match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        })
    }
}

impl ByteFetcher for FileFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let path = self.resolve(url)?;
        log::debug!("fetching {} from {}", url, path.display());
        Ok(tokio::fs::read(&path).await?)
    }
}
