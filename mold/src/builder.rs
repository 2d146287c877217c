use std::f32::consts::{PI, TAU};

use crate::{mesh::Mesh, Pos};

pub struct MeshBuilder {
    vertices: Vec<Pos>,
    faces: Vec<Vec<u32>>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    pub fn add_vertex(&mut self, vertex: Pos) -> u32 {
        self.vertices.push(vertex);
        (self.vertices.len() - 1) as u32
    }

    pub fn add_face(&mut self, face: impl Into<Vec<u32>>) {
        self.faces.push(face.into());
    }

    /// Adds a quad given as a counter-clockwise ring.
    pub fn add_quad(&mut self, quad: [u32; 4]) {
        self.add_face(quad);
    }

    pub fn build(self, name: impl Into<String>) -> Mesh {
        Mesh::new(name, self.vertices, self.faces)
    }
}

impl MeshBuilder {
    /// Axis aligned box with one quad per side. Vertex `i` sits at the corner
    /// selected by the bits of `i` (x = bit 0, y = bit 1, z = bit 2).
    pub fn add_box(&mut self, min: Pos, max: Pos) {
        let base = self.vertices.len() as u32;
        for i in 0..8 {
            self.add_vertex(Pos::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            ));
        }

        for quad in [
            [0, 2, 3, 1],
            [4, 5, 7, 6],
            [0, 1, 5, 4],
            [2, 6, 7, 3],
            [0, 4, 6, 2],
            [1, 3, 7, 5],
        ] {
            self.add_quad(quad.map(|x| base + x));
        }
    }

    /// Closed cylinder along the Z axis with quad sides and n-gon caps.
    pub fn add_vertical_cylinder(
        &mut self,
        bottom: Pos,
        height: f32,
        (bottom_radius, top_radius): (f32, f32),
        precision: u32,
    ) {
        let top = bottom + Pos::new(0.0, 0.0, height);

        let mut rings = Vec::with_capacity(precision as usize);
        for i in 0..precision {
            let angle = TAU * (i as f32) / (precision as f32);
            let normal = Pos::new(angle.sin(), angle.cos(), 0.0);

            let top = self.add_vertex(top + normal * top_radius);
            let bottom = self.add_vertex(bottom + normal * bottom_radius);
            rings.push((top, bottom));
        }

        for (i, &(top, bottom)) in rings.iter().enumerate() {
            let (last_top, last_bottom) = rings[(i + rings.len() - 1) % rings.len()];
            self.add_quad([last_bottom, last_top, top, bottom]);
        }

        // Angles run clockwise when seen from above.
        self.add_face(rings.iter().rev().map(|x| x.0).collect::<Vec<_>>());
        self.add_face(rings.iter().map(|x| x.1).collect::<Vec<_>>());
    }

    /// UV sphere with triangle fans at the poles and quads elsewhere.
    pub fn add_uv_sphere(&mut self, center: Pos, radius: f32, rings: u32, segments: u32) {
        let top = self.add_vertex(center + Pos::new(0.0, 0.0, radius));
        let bottom = self.add_vertex(center - Pos::new(0.0, 0.0, radius));

        let mut latitudes = Vec::new();
        for ring in 1..rings {
            let polar = PI * ring as f32 / rings as f32;
            let ring = (0..segments)
                .map(|segment| {
                    let azimuth = TAU * segment as f32 / segments as f32;
                    let direction = Pos::new(
                        polar.sin() * azimuth.cos(),
                        polar.sin() * azimuth.sin(),
                        polar.cos(),
                    );
                    self.add_vertex(center + direction * radius)
                })
                .collect::<Vec<_>>();
            latitudes.push(ring);
        }

        let segments = segments as usize;
        for j in 0..segments {
            let next = (j + 1) % segments;

            if let Some(first) = latitudes.first() {
                self.add_face([first[j], first[next], top]);
            }

            for pair in latitudes.windows(2) {
                let (upper, lower) = (&pair[0], &pair[1]);
                self.add_quad([lower[j], lower[next], upper[next], upper[j]]);
            }

            if let Some(last) = latitudes.last() {
                self.add_face([bottom, last[next], last[j]]);
            }
        }
    }
}

impl Default for MeshBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn cylinder_is_closed() {
        let mut builder = MeshBuilder::new();
        builder.add_vertical_cylinder(Pos::zeros(), 2.0, (1.0, 1.0), 32);
        let mesh = builder.build("cylinder");

        assert_eq!(mesh.vertex_count(), 64);
        assert_eq!(mesh.face_count(), 34);
        assert!(mesh.is_manifold());

        // Inscribed polygon area times height.
        let expected = 0.5 * 32.0 * (TAU / 32.0).sin() * 2.0;
        assert_relative_eq!(mesh.volume(), expected, epsilon = 1e-4);
    }

    #[test]
    fn sphere_is_closed() {
        let mut builder = MeshBuilder::new();
        builder.add_uv_sphere(Pos::new(0.0, 0.0, 5.0), 2.0, 12, 24);
        let mesh = builder.build("sphere");

        assert_eq!(mesh.vertex_count(), 2 + 11 * 24);
        assert!(mesh.is_manifold());
        assert!(mesh.volume() > 0.0);

        let (min, max) = mesh.bounds();
        assert_relative_eq!(min.z, 3.0, epsilon = 1e-5);
        assert_relative_eq!(max.z, 7.0, epsilon = 1e-5);
    }
}
