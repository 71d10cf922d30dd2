//! Readiness-gated front end for a simplification engine
//!
//! Engines may need a one-time preparation step before they can run. The
//! adapter performs it at most once and hands out a [`Ready`] token; the
//! document-level entry point requires that token, so "simplify before the
//! engine is prepared" cannot be expressed.

use crate::MeshSimplifier;
use decimesh_core::{Error, MeshDocument, Result, TriangleMesh};
use rayon::prelude::*;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Proof that the engine behind a [`SimplifierAdapter`] has been prepared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready(());

pub struct SimplifierAdapter {
    engine: Arc<dyn MeshSimplifier>,
    gate: OnceCell<()>,
}

impl SimplifierAdapter {
    pub fn new<S: MeshSimplifier + 'static>(engine: S) -> Self {
        Self::from_arc(Arc::new(engine))
    }

    pub fn from_arc(engine: Arc<dyn MeshSimplifier>) -> Self {
        Self {
            engine,
            gate: OnceCell::new(),
        }
    }

    /// Prepare the engine if that has not happened yet.
    ///
    /// Concurrent callers wait for the same preparation. A failed preparation
    /// is not cached, so a later call tries again.
    pub async fn ready(&self) -> Result<Ready> {
        self.gate
            .get_or_try_init(|| async {
                log::debug!("preparing simplification engine");
                self.engine.prepare().map_err(|e| match e {
                    Error::NotReady(message) => Error::NotReady(message),
                    other => Error::NotReady(other.to_string()),
                })
            })
            .await?;
        Ok(Ready(()))
    }

    /// The token, if preparation already succeeded
    pub fn try_ready(&self) -> Option<Ready> {
        self.gate.get().map(|_| Ready(()))
    }

    pub fn is_ready(&self) -> bool {
        self.gate.initialized()
    }

    /// Simplify every triangle-list primitive of `document` in place.
    ///
    /// Primitives of other topologies, or without positions, are left as they
    /// are. Primitives are processed in parallel.
    pub fn simplify_document(
        &self,
        _ready: Ready,
        document: &mut MeshDocument,
        ratio: f32,
        max_error: f32,
    ) -> Result<()> {
        let primitives: Vec<_> = document.primitives_mut().collect();
        primitives.into_par_iter().try_for_each(|primitive| {
            if let Some(mesh) = TriangleMesh::from_primitive(primitive)? {
                let simplified = self.engine.simplify(&mesh, ratio, max_error)?;
                *primitive = simplified.into_primitive();
            }
            Ok(())
        })
    }
}

impl std::fmt::Debug for SimplifierAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimplifierAdapter")
            .field("ready", &self.is_ready())
            .finish()
    }
}
