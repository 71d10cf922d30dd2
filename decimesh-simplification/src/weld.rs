//! Vertex welding
//!
//! Merges vertices whose positions (and normals, when present) agree within a
//! tolerance, rewrites the index buffer and drops triangles that collapse to a
//! line or point in the process.

use decimesh_core::{MeshDocument, Point3f, Result, TriangleMesh, Vector3f};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for the weld pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeldOptions {
    /// Position tolerance as a fraction of the mesh bounding box diagonal
    pub tolerance: f32,
    /// Absolute tolerance on normal components
    pub normal_tolerance: f32,
}

impl Default for WeldOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            normal_tolerance: 1e-3,
        }
    }
}

type Cell = [i64; 3];

fn cell_of(p: &Point3f, step: f32) -> Cell {
    [p.x, p.y, p.z].map(|v| (v / step).floor() as i64)
}

/// The cell itself and its 26 neighbours
fn neighbourhood(cell: Cell) -> impl Iterator<Item = Cell> {
    (-1..=1).flat_map(move |dx| {
        (-1..=1).flat_map(move |dy| {
            (-1..=1).map(move |dz| [cell[0] + dx, cell[1] + dy, cell[2] + dz])
        })
    })
}

fn within(a: &[f32; 3], b: &[f32; 3], tolerance: f32) -> bool {
    a.iter().zip(b).all(|(x, y)| (x - y).abs() <= tolerance)
}

/// Weld coincident vertices of a single mesh.
///
/// Two vertices merge when every position component differs by at most the
/// scaled tolerance (and every normal component by at most the normal
/// tolerance). Positions are bucketed into grid cells one tolerance wide, so
/// only the 27 cells around a vertex need to be searched. Each vertex joins the
/// first earlier kept vertex it matches.
pub fn weld(mesh: &TriangleMesh, options: &WeldOptions) -> TriangleMesh {
    let extent = mesh.extent();
    let step = if extent > 0.0 { options.tolerance * extent } else { options.tolerance };
    let step = step.max(f32::MIN_POSITIVE);

    let mut grid: HashMap<Cell, Vec<usize>> = HashMap::with_capacity(mesh.vertices.len());
    let mut remap = Vec::with_capacity(mesh.vertices.len());
    let mut vertices: Vec<Point3f> = Vec::new();
    let mut normals: Option<Vec<Vector3f>> = mesh.normals.as_ref().map(|_| Vec::new());

    for (i, p) in mesh.vertices.iter().enumerate() {
        let normal = mesh.normals.as_ref().map(|n| n[i]);
        let position = [p.x, p.y, p.z];
        let cell = cell_of(p, step);

        let matches = |&j: &usize| {
            let q = &vertices[j];
            let same_normal = match (normals.as_ref(), normal) {
                (Some(kept), Some(n)) => {
                    let k = kept[j];
                    within(&[k.x, k.y, k.z], &[n.x, n.y, n.z], options.normal_tolerance)
                }
                _ => true,
            };
            same_normal && within(&[q.x, q.y, q.z], &position, step)
        };
        let found = neighbourhood(cell)
            .filter_map(|c| grid.get(&c))
            .flat_map(|bucket| bucket.iter())
            .copied()
            .filter(matches)
            .min();

        let index = match found {
            Some(index) => index,
            None => {
                vertices.push(*p);
                if let (Some(out), Some(n)) = (normals.as_mut(), normal) {
                    out.push(n);
                }
                let index = vertices.len() - 1;
                grid.entry(cell).or_default().push(index);
                index
            }
        };
        remap.push(index);
    }

    let faces: Vec<[usize; 3]> = mesh
        .faces
        .iter()
        .map(|face| face.map(|v| remap[v]))
        .filter(|[a, b, c]| a != b && b != c && c != a)
        .collect();

    let mut welded = TriangleMesh::from_vertices_and_faces(vertices, faces);
    if let Some(normals) = normals {
        welded.set_normals(normals);
    }
    welded
}

/// Weld every triangle-list primitive of a document in place
pub fn weld_document(document: &mut MeshDocument, options: &WeldOptions) -> Result<()> {
    for primitive in document.primitives_mut() {
        if let Some(mesh) = TriangleMesh::from_primitive(primitive)? {
            let welded = weld(&mesh, options);
            log::trace!(
                "welded {} -> {} vertices",
                mesh.vertex_count(),
                welded.vertex_count()
            );
            *primitive = welded.into_primitive();
        }
    }
    Ok(())
}
