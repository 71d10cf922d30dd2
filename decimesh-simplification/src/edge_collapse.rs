//! Edge collapse simplification
//!
//! Iterative edge collapse driven by quadric error metrics (QEM). Each vertex
//! accumulates the plane quadrics of its incident faces, open boundaries add
//! weighted planes perpendicular to the surface, and the cheapest edge is
//! collapsed until the face target is met or the next collapse would exceed
//! the error bound.

use crate::MeshSimplifier;
use decimesh_core::{Error, Point3f, Result, TriangleMesh, Vector3f};
use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};
use priority_queue::PriorityQueue;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BTreeSet;

/// Error slack relative to the mesh extent, so exactly flat regions still collapse
const RELATIVE_EPSILON: f64 = 1e-6;

type Edge = (usize, usize);

fn edge_key(a: usize, b: usize) -> Edge {
    (a.min(b), a.max(b))
}

fn coords(p: &Point3f) -> Vector3<f64> {
    Vector3::new(p.x as f64, p.y as f64, p.z as f64)
}

fn plane_quadric(n: &Vector3<f64>, point: &Vector3<f64>) -> Matrix4<f64> {
    let p = Vector4::new(n.x, n.y, n.z, -n.dot(point));
    p * p.transpose()
}

fn quadric_error(q: &Matrix4<f64>, v: &Vector3<f64>) -> f64 {
    let vh = v.push(1.0);
    vh.dot(&(q * vh)).max(0.0)
}

/// Collapse cost, ordered by `f64::total_cmp`
#[derive(Debug, Clone, Copy, PartialEq)]
struct Cost(f64);

impl Eq for Cost {}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Face-adjacency working copy of a mesh during simplification
struct CollapseState {
    positions: Vec<Point3f>,
    normals: Option<Vec<Vector3f>>,
    faces: Vec<[usize; 3]>,
    face_alive: Vec<bool>,
    /// Live faces incident to each vertex
    vertex_faces: Vec<Vec<usize>>,
    quadrics: Vec<Matrix4<f64>>,
    active_faces: usize,
}

impl CollapseState {
    fn new(mesh: &TriangleMesh, boundary_weight: f64) -> Self {
        let nv = mesh.vertices.len();
        let mut vertex_faces = vec![Vec::new(); nv];
        let mut face_alive = Vec::with_capacity(mesh.faces.len());

        for (fi, &[a, b, c]) in mesh.faces.iter().enumerate() {
            let alive = a != b && b != c && c != a;
            if alive {
                vertex_faces[a].push(fi);
                vertex_faces[b].push(fi);
                vertex_faces[c].push(fi);
            }
            face_alive.push(alive);
        }

        let active_faces = face_alive.iter().filter(|&&alive| alive).count();
        let mut state = Self {
            positions: mesh.vertices.clone(),
            normals: mesh.normals.clone(),
            faces: mesh.faces.clone(),
            face_alive,
            vertex_faces,
            quadrics: vec![Matrix4::zeros(); nv],
            active_faces,
        };
        state.initialize_quadrics(boundary_weight);
        state
    }

    fn face_normal(&self, face: &[usize; 3]) -> Vector3<f64> {
        let [p0, p1, p2] = face.map(|v| coords(&self.positions[v]));
        (p1 - p0).cross(&(p2 - p0))
    }

    fn initialize_quadrics(&mut self, boundary_weight: f64) {
        for fi in 0..self.faces.len() {
            if !self.face_alive[fi] {
                continue;
            }
            let face = self.faces[fi];
            let Some(normal) = self.face_normal(&face).try_normalize(f64::EPSILON) else {
                continue;
            };
            let origin = coords(&self.positions[face[0]]);
            let q = plane_quadric(&normal, &origin);
            for &v in &face {
                self.quadrics[v] += q;
            }

            if boundary_weight <= 0.0 {
                continue;
            }
            for j in 0..3 {
                let (a, b) = (face[j], face[(j + 1) % 3]);
                if self.shared_faces(a, b).len() != 1 {
                    continue;
                }
                let pa = coords(&self.positions[a]);
                let direction = coords(&self.positions[b]) - pa;
                if let Some(perpendicular) = direction.cross(&normal).try_normalize(f64::EPSILON) {
                    let q = plane_quadric(&perpendicular, &pa) * boundary_weight;
                    self.quadrics[a] += q;
                    self.quadrics[b] += q;
                }
            }
        }
    }

    fn shared_faces(&self, a: usize, b: usize) -> Vec<usize> {
        self.vertex_faces[a]
            .iter()
            .copied()
            .filter(|&f| self.faces[f].contains(&b))
            .collect()
    }

    fn neighbors(&self, v: usize) -> BTreeSet<usize> {
        self.vertex_faces[v]
            .iter()
            .flat_map(|&f| self.faces[f])
            .filter(|&n| n != v)
            .collect()
    }

    fn is_boundary_vertex(&self, v: usize) -> bool {
        self.neighbors(v)
            .into_iter()
            .any(|n| self.shared_faces(v, n).len() == 1)
    }

    /// Common neighbors must be exactly the apices of the faces on the edge
    /// (two for an interior edge, one for a boundary edge).
    fn check_link_condition(&self, a: usize, b: usize) -> bool {
        let shared = self.shared_faces(a, b).len();
        if !(1..=2).contains(&shared) {
            return false;
        }
        let common = self.neighbors(a).intersection(&self.neighbors(b)).count();
        common == shared
    }

    /// Cheapest placement among the quadric optimum, both endpoints and the midpoint
    fn placement(&self, a: usize, b: usize) -> (Vector3<f64>, f64) {
        let q = self.quadrics[a] + self.quadrics[b];
        let pa = coords(&self.positions[a]);
        let pb = coords(&self.positions[b]);
        let midpoint = (pa + pb) * 0.5;
        let length = (pb - pa).norm();

        let mut candidates = Vec::with_capacity(4);
        let q3: Matrix3<f64> = q.fixed_view::<3, 3>(0, 0).into_owned();
        let q1: Vector3<f64> = q.fixed_view::<3, 1>(0, 3).into_owned();
        if let Some(inverse) = q3.try_inverse() {
            let optimal = -(inverse * q1);
            if optimal.iter().all(|x| x.is_finite()) && (optimal - midpoint).norm() <= length {
                candidates.push(optimal);
            }
        }
        candidates.extend([pa, pb, midpoint]);

        candidates
            .into_iter()
            .map(|p| (p, quadric_error(&q, &p)))
            .min_by(|x, y| x.1.total_cmp(&y.1))
            .unwrap_or((midpoint, quadric_error(&q, &midpoint)))
    }

    /// Whether moving `a` and `b` to `target` would turn any surviving face over
    fn flips(&self, a: usize, b: usize, target: &Vector3<f64>) -> bool {
        let faces: BTreeSet<usize> = self.vertex_faces[a]
            .iter()
            .chain(&self.vertex_faces[b])
            .copied()
            .collect();

        faces.into_iter().any(|f| {
            let face = self.faces[f];
            if face.contains(&a) && face.contains(&b) {
                return false;
            }
            let before = self.face_normal(&face);
            if before.norm_squared() == 0.0 {
                return false;
            }
            let [p0, p1, p2] = face.map(|v| {
                if v == a || v == b {
                    *target
                } else {
                    coords(&self.positions[v])
                }
            });
            let after = (p1 - p0).cross(&(p2 - p0));
            before.dot(&after) <= 0.0
        })
    }

    /// Merge `b` into `a` at `target`; returns the former neighbors of `b`
    fn collapse(&mut self, a: usize, b: usize, target: Vector3<f64>) -> BTreeSet<usize> {
        let b_neighbors = self.neighbors(b);

        for f in self.shared_faces(a, b) {
            self.face_alive[f] = false;
            self.active_faces -= 1;
            for v in self.faces[f] {
                self.vertex_faces[v].retain(|&x| x != f);
            }
        }

        for f in std::mem::take(&mut self.vertex_faces[b]) {
            for v in self.faces[f].iter_mut() {
                if *v == b {
                    *v = a;
                }
            }
            self.vertex_faces[a].push(f);
        }

        self.positions[a] = Point3f::new(target.x as f32, target.y as f32, target.z as f32);
        let absorbed = self.quadrics[b];
        self.quadrics[a] += absorbed;

        if let Some(normals) = self.normals.as_mut() {
            let merged = normals[a] + normals[b];
            normals[a] = merged.try_normalize(f32::EPSILON).unwrap_or(normals[a]);
        }

        b_neighbors
    }

    fn into_triangle_mesh(self) -> TriangleMesh {
        let mut remap = vec![usize::MAX; self.positions.len()];
        let mut positions = Vec::new();
        let mut normals = self.normals.as_ref().map(|_| Vec::new());

        for (v, incident) in self.vertex_faces.iter().enumerate() {
            if incident.is_empty() {
                continue;
            }
            remap[v] = positions.len();
            positions.push(self.positions[v]);
            if let (Some(out), Some(source)) = (normals.as_mut(), self.normals.as_ref()) {
                out.push(source[v]);
            }
        }

        let faces = self
            .faces
            .iter()
            .zip(&self.face_alive)
            .filter(|&(_, &alive)| alive)
            .map(|(face, _)| face.map(|v| remap[v]))
            .collect();

        let mut mesh = TriangleMesh::from_vertices_and_faces(positions, faces);
        if let Some(normals) = normals {
            mesh.set_normals(normals);
        }
        mesh
    }
}

/// Quadric error edge collapse simplifier.
///
/// Faces are removed by repeatedly collapsing the edge whose merged vertex
/// deviates least from the planes of the original surface. The collapse
/// respects the link condition and refuses to flip face orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeCollapseSimplifier {
    /// Never move or remove vertices on an open boundary
    pub preserve_boundary: bool,
    /// Weight of the planes that pin open boundaries in place
    pub boundary_weight: f64,
}

impl Default for EdgeCollapseSimplifier {
    fn default() -> Self {
        Self {
            preserve_boundary: false,
            boundary_weight: 100.0,
        }
    }
}

impl EdgeCollapseSimplifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preserve_boundary(mut self, preserve_boundary: bool) -> Self {
        self.preserve_boundary = preserve_boundary;
        self
    }

    pub fn with_boundary_weight(mut self, boundary_weight: f64) -> Self {
        self.boundary_weight = boundary_weight;
        self
    }

    fn is_locked(&self, state: &CollapseState, a: usize, b: usize) -> bool {
        self.preserve_boundary && (state.is_boundary_vertex(a) || state.is_boundary_vertex(b))
    }

    fn build_queue(&self, state: &CollapseState) -> PriorityQueue<Edge, Reverse<Cost>> {
        let mut queue = PriorityQueue::new();
        for (fi, face) in state.faces.iter().enumerate() {
            if !state.face_alive[fi] {
                continue;
            }
            for j in 0..3 {
                let key = edge_key(face[j], face[(j + 1) % 3]);
                if queue.get(&key).is_some() || self.is_locked(state, key.0, key.1) {
                    continue;
                }
                let (_, cost) = state.placement(key.0, key.1);
                queue.push(key, Reverse(Cost(cost)));
            }
        }
        queue
    }
}

impl MeshSimplifier for EdgeCollapseSimplifier {
    fn prepare(&self) -> Result<()> {
        if !self.boundary_weight.is_finite() || self.boundary_weight < 0.0 {
            return Err(Error::Algorithm(format!(
                "boundary weight must be a finite non-negative number, got {}",
                self.boundary_weight
            )));
        }
        Ok(())
    }

    fn simplify(
        &self,
        mesh: &TriangleMesh,
        target_ratio: f32,
        max_error: f32,
    ) -> Result<TriangleMesh> {
        if !target_ratio.is_finite() || target_ratio <= 0.0 {
            return Err(Error::InvalidData(format!(
                "target ratio must be in (0, 1], got {}",
                target_ratio
            )));
        }
        if !max_error.is_finite() || max_error < 0.0 {
            return Err(Error::InvalidData(format!(
                "max error must be non-negative, got {}",
                max_error
            )));
        }
        if target_ratio >= 1.0 || mesh.faces.is_empty() {
            return Ok(mesh.clone());
        }
        let vertex_count = mesh.vertices.len();
        if let Some(face) = mesh.faces.iter().find(|f| f.iter().any(|&v| v >= vertex_count)) {
            return Err(Error::InvalidData(format!(
                "face {:?} references a missing vertex",
                face
            )));
        }

        let target_faces = (mesh.faces.len() as f64 * target_ratio as f64).floor() as usize;
        let target_faces = target_faces.max(1);
        let extent = mesh.extent() as f64;
        let tolerance = (max_error as f64 + RELATIVE_EPSILON) * extent;

        let mut state = CollapseState::new(mesh, self.boundary_weight);
        let mut queue = self.build_queue(&state);
        let mut collapses = 0usize;

        while state.active_faces > target_faces {
            let Some(((a, b), Reverse(Cost(cost)))) = queue.pop() else {
                break;
            };
            if cost.sqrt() > tolerance {
                break;
            }
            if !state.check_link_condition(a, b) {
                continue;
            }
            // Never collapse the last remaining faces away
            if state.shared_faces(a, b).len() >= state.active_faces {
                continue;
            }
            let (target, _) = state.placement(a, b);
            if state.flips(a, b, &target) {
                continue;
            }

            for n in state.collapse(a, b, target) {
                queue.remove(&edge_key(b, n));
            }
            collapses += 1;

            for n in state.neighbors(a) {
                let key = edge_key(a, n);
                if self.is_locked(&state, a, n) {
                    queue.remove(&key);
                    continue;
                }
                let (_, cost) = state.placement(a, n);
                queue.push(key, Reverse(Cost(cost)));
            }
        }

        log::debug!(
            "edge collapse: {} -> {} faces after {} collapses (target {})",
            mesh.faces.len(),
            state.active_faces,
            collapses,
            target_faces
        );
        Ok(state.into_triangle_mesh())
    }
}
