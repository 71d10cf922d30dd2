//! Triangle and vertex counting over mesh documents

use crate::document::{MeshDocument, Primitive, Topology};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// Triangle and vertex totals of a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshStats {
    pub triangles: u64,
    pub vertices: u64,
}

impl MeshStats {
    pub fn new(triangles: u64, vertices: u64) -> Self {
        Self { triangles, vertices }
    }

    /// Count triangles and vertices over every primitive of `document`
    pub fn of(document: &MeshDocument) -> Self {
        document.primitives().map(Self::of_primitive).sum()
    }

    /// Count a single primitive.
    ///
    /// Triangles come from the index buffer only: a list yields `ic / 3`,
    /// strips and fans yield `ic - 2`, every other mode yields nothing.
    /// Vertices are the element count of the position attribute.
    pub fn of_primitive(primitive: &Primitive) -> Self {
        let triangles = match primitive.index_count() {
            Some(ic) => {
                let ic = ic as u64;
                match primitive.mode {
                    Topology::Triangles => ic / 3,
                    Topology::TriangleStrip | Topology::TriangleFan => ic.saturating_sub(2),
                    _ => 0,
                }
            }
            None => 0,
        };

        Self {
            triangles,
            vertices: primitive.vertex_count() as u64,
        }
    }
}

impl Add for MeshStats {
    type Output = MeshStats;

    fn add(self, rhs: Self) -> Self {
        Self {
            triangles: self.triangles + rhs.triangles,
            vertices: self.vertices + rhs.vertices,
        }
    }
}

impl Sum for MeshStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(MeshStats::default(), Add::add)
    }
}

impl fmt::Display for MeshStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tris, {} verts", self.triangles, self.vertices)
    }
}
