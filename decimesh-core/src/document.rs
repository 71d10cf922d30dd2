//! Mesh document model
//!
//! A [`MeshDocument`] is the decoded, traversable form of a mesh buffer. It
//! keeps what the decimation pipeline reads or rewrites (per-primitive
//! topology, positions, optional normals and optional indices) plus the node
//! hierarchy that places and instances those meshes, so a decimated file shows
//! the same scene as its source.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// How an index buffer groups vertices, numbered as glTF 2.0 primitive modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Topology {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Topology {
    /// Map a glTF `mode` value to a topology
    pub fn from_gl(mode: u32) -> Option<Self> {
        match mode {
            0 => Some(Topology::Points),
            1 => Some(Topology::Lines),
            2 => Some(Topology::LineLoop),
            3 => Some(Topology::LineStrip),
            4 => Some(Topology::Triangles),
            5 => Some(Topology::TriangleStrip),
            6 => Some(Topology::TriangleFan),
            _ => None,
        }
    }

    /// The glTF `mode` value of this topology
    pub fn as_gl(self) -> u32 {
        match self {
            Topology::Points => 0,
            Topology::Lines => 1,
            Topology::LineLoop => 2,
            Topology::LineStrip => 3,
            Topology::Triangles => 4,
            Topology::TriangleStrip => 5,
            Topology::TriangleFan => 6,
        }
    }
}

/// A single drawable primitive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    pub mode: Topology,
    pub positions: Option<Vec<[f32; 3]>>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub indices: Option<Vec<u32>>,
}

impl Primitive {
    /// Create an indexed triangle-list primitive
    pub fn triangles(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self {
            mode: Topology::Triangles,
            positions: Some(positions),
            normals: None,
            indices: Some(indices),
        }
    }

    /// Create a primitive with an explicit topology
    pub fn with_mode(
        mode: Topology,
        positions: Option<Vec<[f32; 3]>>,
        indices: Option<Vec<u32>>,
    ) -> Self {
        Self {
            mode,
            positions,
            normals: None,
            indices,
        }
    }

    /// Number of entries in the index buffer, if the primitive is indexed
    pub fn index_count(&self) -> Option<usize> {
        self.indices.as_ref().map(Vec::len)
    }

    /// Number of elements in the position attribute (0 when absent)
    pub fn vertex_count(&self) -> usize {
        self.positions.as_ref().map_or(0, Vec::len)
    }

    /// Check that attributes agree in length and indices stay in range
    pub fn validate(&self) -> Result<()> {
        let vertex_count = self.vertex_count();

        if let Some(normals) = &self.normals {
            if self.positions.is_some() && normals.len() != vertex_count {
                return Err(Error::InvalidData(format!(
                    "NORMAL has {} elements but POSITION has {}",
                    normals.len(),
                    vertex_count
                )));
            }
        }

        if let Some(indices) = &self.indices {
            if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(Error::InvalidData(format!(
                    "index {} out of range for {} vertices",
                    bad, vertex_count
                )));
            }
        }

        Ok(())
    }
}

/// A named group of primitives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

impl Mesh {
    pub fn new(primitives: Vec<Primitive>) -> Self {
        Self {
            name: None,
            primitives,
        }
    }

    pub fn named<S: Into<String>>(name: S, primitives: Vec<Primitive>) -> Self {
        Self {
            name: Some(name.into()),
            primitives,
        }
    }
}

/// Local transform of a node, as stored in glTF
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    /// Column-major 4x4 matrix
    Matrix([[f32; 4]; 4]),
    Decomposed {
        translation: [f32; 3],
        /// Unit quaternion, `[x, y, z, w]`
        rotation: [f32; 4],
        scale: [f32; 3],
    },
}

const IDENTITY_MATRIX: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

impl Default for Transform {
    fn default() -> Self {
        Transform::Decomposed {
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

impl Transform {
    pub fn is_identity(&self) -> bool {
        match self {
            Transform::Matrix(matrix) => *matrix == IDENTITY_MATRIX,
            decomposed => *decomposed == Transform::default(),
        }
    }
}

/// A scene graph node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: Option<String>,
    /// Index into [`MeshDocument::meshes`]
    pub mesh: Option<usize>,
    pub transform: Transform,
    /// Indices into [`MeshDocument::nodes`]
    pub children: Vec<usize>,
}

impl Node {
    /// A node instancing `mesh` with the identity transform
    pub fn with_mesh(mesh: usize) -> Self {
        Self {
            mesh: Some(mesh),
            ..Self::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_children(mut self, children: Vec<usize>) -> Self {
        self.children = children;
        self
    }
}

/// A set of root nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub name: Option<String>,
    /// Indices into [`MeshDocument::nodes`]
    pub nodes: Vec<usize>,
}

/// Decoded mesh document: the meshes of a scene file and the nodes placing them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshDocument {
    pub meshes: Vec<Mesh>,
    pub nodes: Vec<Node>,
    pub scenes: Vec<Scene>,
    /// Scene shown by default
    pub scene: Option<usize>,
}

impl MeshDocument {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document holding the given meshes, each placed by one
    /// untransformed root node of a single default scene
    pub fn from_meshes(meshes: Vec<Mesh>) -> Self {
        if meshes.is_empty() {
            return Self::default();
        }
        let nodes = (0..meshes.len()).map(Node::with_mesh).collect();
        Self {
            scenes: vec![Scene {
                name: None,
                nodes: (0..meshes.len()).collect(),
            }],
            scene: Some(0),
            meshes,
            nodes,
        }
    }

    /// Iterate over all primitives of all meshes
    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.meshes.iter().flat_map(|mesh| mesh.primitives.iter())
    }

    /// Iterate mutably over all primitives of all meshes
    pub fn primitives_mut(&mut self) -> impl Iterator<Item = &mut Primitive> {
        self.meshes.iter_mut().flat_map(|mesh| mesh.primitives.iter_mut())
    }

    /// Validate every primitive and every node, scene and mesh reference
    pub fn validate(&self) -> Result<()> {
        self.primitives().try_for_each(Primitive::validate)?;

        let check = |what: &str, index: usize, len: usize| {
            if index < len {
                Ok(())
            } else {
                Err(Error::InvalidData(format!(
                    "{} {} out of range for {} entries",
                    what, index, len
                )))
            }
        };
        for node in &self.nodes {
            if let Some(mesh) = node.mesh {
                check("mesh", mesh, self.meshes.len())?;
            }
            for &child in &node.children {
                check("child node", child, self.nodes.len())?;
            }
        }
        for scene in &self.scenes {
            for &node in &scene.nodes {
                check("scene node", node, self.nodes.len())?;
            }
        }
        if let Some(scene) = self.scene {
            check("scene", scene, self.scenes.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_gl_mapping() {
        for mode in 0..7 {
            let topology = Topology::from_gl(mode).unwrap();
            assert_eq!(topology.as_gl(), mode);
        }
        assert!(Topology::from_gl(7).is_none());
    }

    #[test]
    fn test_validate_index_out_of_range() {
        let prim = Primitive::triangles(vec![[0.0; 3]; 3], vec![0, 1, 3]);
        assert!(prim.validate().is_err());

        let prim = Primitive::triangles(vec![[0.0; 3]; 4], vec![0, 1, 3]);
        assert!(prim.validate().is_ok());
    }

    #[test]
    fn test_validate_normal_length_mismatch() {
        let mut prim = Primitive::triangles(vec![[0.0; 3]; 3], vec![0, 1, 2]);
        prim.normals = Some(vec![[0.0, 0.0, 1.0]; 2]);
        assert!(prim.validate().is_err());
    }

    #[test]
    fn test_from_meshes_places_each_mesh_once() {
        let doc = MeshDocument::from_meshes(vec![Mesh::default(), Mesh::default()]);
        assert_eq!(doc.nodes, vec![Node::with_mesh(0), Node::with_mesh(1)]);
        assert_eq!(doc.scenes[0].nodes, vec![0, 1]);
        assert_eq!(doc.scene, Some(0));
        assert!(doc.validate().is_ok());

        assert_eq!(MeshDocument::from_meshes(vec![]), MeshDocument::new());
    }

    #[test]
    fn test_validate_node_references() {
        let mut doc = MeshDocument::from_meshes(vec![Mesh::default()]);
        doc.nodes.push(Node::with_mesh(3));
        assert!(doc.validate().is_err());

        let mut doc = MeshDocument::from_meshes(vec![Mesh::default()]);
        doc.nodes[0].children.push(5);
        assert!(doc.validate().is_err());

        let mut doc = MeshDocument::from_meshes(vec![Mesh::default()]);
        doc.scene = Some(1);
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_identity_transforms() {
        assert!(Transform::default().is_identity());
        assert!(Transform::Matrix(IDENTITY_MATRIX).is_identity());

        let moved = Transform::Decomposed {
            translation: [1.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        };
        assert!(!moved.is_identity());
    }

    #[test]
    fn test_primitives_iterates_all_meshes() {
        let doc = MeshDocument::from_meshes(vec![
            Mesh::new(vec![Primitive::default(), Primitive::default()]),
            Mesh::named("second", vec![Primitive::default()]),
        ]);
        assert_eq!(doc.primitives().count(), 3);
    }
}
