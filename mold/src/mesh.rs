use std::collections::{HashMap, HashSet};

use crate::Pos;

/// A named polygon mesh. Faces are ordered lists of vertex indices wound
/// counter-clockwise when seen from outside.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    name: String,
    vertices: Vec<Pos>,
    faces: Vec<Vec<u32>>,
}

impl Mesh {
    pub fn new(name: impl Into<String>, vertices: Vec<Pos>, faces: Vec<Vec<u32>>) -> Self {
        Self {
            name: name.into(),
            vertices,
            faces,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn vertices(&self) -> &[Pos] {
        &self.vertices
    }

    pub fn faces(&self) -> &[Vec<u32>] {
        &self.faces
    }

    pub fn face(&self, index: usize) -> &[u32] {
        &self.faces[index]
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Unit normal of a face, computed with Newell's method so non-planar and
    /// concave polygons still get a sensible direction. Degenerate faces give
    /// a NaN vector.
    pub fn normal(&self, index: usize) -> Pos {
        let face = self.face(index);
        let mut normal = Pos::zeros();
        for (i, &a) in face.iter().enumerate() {
            let a = self.vertices[a as usize];
            let b = self.vertices[face[(i + 1) % face.len()] as usize];
            normal.x += (a.y - b.y) * (a.z + b.z);
            normal.y += (a.z - b.z) * (a.x + b.x);
            normal.z += (a.x - b.x) * (a.y + b.y);
        }
        normal.normalize()
    }

    /// Mean position of a face's vertices.
    pub fn face_center(&self, index: usize) -> Pos {
        let face = self.face(index);
        let sum = face
            .iter()
            .fold(Pos::zeros(), |acc, &v| acc + self.vertices[v as usize]);
        sum / face.len() as f32
    }

    /// Every undirected edge once, in the order they are first seen while
    /// walking the faces.
    pub fn edges(&self) -> Vec<[u32; 2]> {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();

        for face in self.faces.iter() {
            for (i, &a) in face.iter().enumerate() {
                let b = face[(i + 1) % face.len()];
                if seen.insert((a.min(b), a.max(b))) {
                    edges.push([a, b]);
                }
            }
        }

        edges
    }

    pub fn is_manifold(&self) -> bool {
        let mut edges = HashMap::<_, u8>::new();

        for face in self.faces.iter() {
            for (i, &a) in face.iter().enumerate() {
                let b = face[(i + 1) % face.len()];
                *edges.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }

        !edges.is_empty() && edges.values().all(|&count| count == 2)
    }

    /// Get the minimum and maximum of each component of every vertex in the
    /// model. These points define the bounding box of the model.
    pub fn bounds(&self) -> (Pos, Pos) {
        vertex_bounds(&self.vertices)
    }

    /// Length of the bounding box diagonal.
    pub fn diagonal(&self) -> f32 {
        if self.vertices.is_empty() {
            return 0.0;
        }

        let (min, max) = self.bounds();
        (max - min).norm()
    }

    /// Mean of all vertex positions. This is not the bounding box center.
    pub fn centroid(&self) -> Pos {
        let sum = self.vertices.iter().fold(Pos::zeros(), |acc, v| acc + v);
        sum / self.vertices.len().max(1) as f32
    }

    /// Signed volume enclosed by the faces. Positive for closed meshes with
    /// outward facing normals.
    pub fn volume(&self) -> f32 {
        let mut volume = 0.0;
        for face in self.faces.iter() {
            let origin = self.vertices[face[0] as usize];
            for pair in face[1..].windows(2) {
                let (b, c) = (
                    self.vertices[pair[0] as usize],
                    self.vertices[pair[1] as usize],
                );
                volume += origin.dot(&b.cross(&c));
            }
        }
        volume / 6.0
    }

    pub fn translate(&mut self, vertices: &[u32], offset: Pos) {
        for &vertex in vertices {
            self.vertices[vertex as usize] += offset;
        }
    }

    /// Removes vertices no face references, renumbering the faces. The
    /// remaining vertices keep their relative order.
    pub fn compact(&mut self) {
        let mut used = vec![false; self.vertices.len()];
        for face in self.faces.iter() {
            for &index in face {
                used[index as usize] = true;
            }
        }

        let mut remap = vec![u32::MAX; self.vertices.len()];
        let mut vertices = Vec::with_capacity(self.vertices.len());
        for (index, vertex) in self.vertices.iter().enumerate() {
            if used[index] {
                remap[index] = vertices.len() as u32;
                vertices.push(*vertex);
            }
        }

        for face in self.faces.iter_mut() {
            face.iter_mut().for_each(|index| *index = remap[*index as usize]);
        }

        self.vertices = vertices;
    }

    pub(crate) fn add_vertex(&mut self, vertex: Pos) -> u32 {
        self.vertices.push(vertex);
        (self.vertices.len() - 1) as u32
    }

    pub(crate) fn add_face(&mut self, face: Vec<u32>) {
        self.faces.push(face);
    }

    pub(crate) fn face_mut(&mut self, index: usize) -> &mut Vec<u32> {
        &mut self.faces[index]
    }

    /// Replaces the geometry while keeping the name.
    pub(crate) fn set_geometry(&mut self, vertices: Vec<Pos>, faces: Vec<Vec<u32>>) {
        self.vertices = vertices;
        self.faces = faces;
    }
}

/// Get the minimum and maximum of each component of every vertex.
/// These points define the bounding box of the model.
fn vertex_bounds(vertices: &[Pos]) -> (Pos, Pos) {
    vertices.iter().fold(
        (
            Pos::new(f32::MAX, f32::MAX, f32::MAX),
            Pos::new(f32::MIN, f32::MIN, f32::MIN),
        ),
        |(min, max), v| (min.inf(v), max.sup(v)),
    )
}
