//! Indexed triangle mesh used by the simplification passes

use crate::document::{Primitive, Topology};
use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};

/// A triangle mesh with vertices and faces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3f>,
    pub faces: Vec<[usize; 3]>,
    pub normals: Option<Vec<Vector3f>>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            normals: None,
        }
    }

    /// Create a mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3f>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            normals: None,
        }
    }

    /// Build a mesh from an indexed triangle-list primitive.
    ///
    /// Returns `Ok(None)` for primitives that are not triangle lists, carry no
    /// positions or have no index buffer. Those count no triangles in
    /// [`MeshStats`](crate::MeshStats), so the passes leave them untouched.
    pub fn from_primitive(primitive: &Primitive) -> Result<Option<Self>> {
        if primitive.mode != Topology::Triangles {
            return Ok(None);
        }
        let (Some(positions), Some(indices)) = (&primitive.positions, &primitive.indices) else {
            return Ok(None);
        };

        let vertices: Vec<Point3f> = positions
            .iter()
            .map(|p| Point3f::new(p[0], p[1], p[2]))
            .collect();
        let faces: Vec<[usize; 3]> = indices
            .chunks_exact(3)
            .map(|tri| [tri[0] as usize, tri[1] as usize, tri[2] as usize])
            .collect();

        if let Some(face) = faces.iter().find(|f| f.iter().any(|&v| v >= vertices.len())) {
            return Err(Error::InvalidData(format!(
                "face {:?} references a missing vertex",
                face
            )));
        }

        let mut mesh = Self::from_vertices_and_faces(vertices, faces);
        if let Some(normals) = &primitive.normals {
            mesh.set_normals(normals.iter().map(|n| Vector3f::new(n[0], n[1], n[2])).collect());
        }
        Ok(Some(mesh))
    }

    /// Convert back into an indexed triangle-list primitive
    pub fn into_primitive(self) -> Primitive {
        Primitive {
            mode: Topology::Triangles,
            positions: Some(self.vertices.iter().map(|p| [p.x, p.y, p.z]).collect()),
            normals: self
                .normals
                .map(|normals| normals.iter().map(|n| [n.x, n.y, n.z]).collect()),
            indices: Some(
                self.faces
                    .iter()
                    .flat_map(|face| face.iter().map(|&v| v as u32))
                    .collect(),
            ),
        }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Set vertex normals
    pub fn set_normals(&mut self, normals: Vec<Vector3f>) {
        if normals.len() == self.vertices.len() {
            self.normals = Some(normals);
        }
    }

    /// Axis-aligned bounds of the vertices
    pub fn bounding_box(&self) -> (Point3f, Point3f) {
        if self.vertices.is_empty() {
            return (Point3f::origin(), Point3f::origin());
        }

        let mut min = self.vertices[0];
        let mut max = self.vertices[0];

        for vertex in &self.vertices {
            min.x = min.x.min(vertex.x);
            min.y = min.y.min(vertex.y);
            min.z = min.z.min(vertex.z);

            max.x = max.x.max(vertex.x);
            max.y = max.y.max(vertex.y);
            max.z = max.z.max(vertex.z);
        }

        (min, max)
    }

    /// Length of the bounding box diagonal, used to scale tolerances
    pub fn extent(&self) -> f32 {
        let (min, max) = self.bounding_box();
        (max - min).norm()
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}
