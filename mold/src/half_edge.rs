use std::collections::HashMap;

use crate::mesh::Mesh;

#[derive(Clone)]
pub struct HalfEdgeMesh {
    half_edges: Vec<HalfEdge>,
}

#[derive(Debug, Clone)]
pub struct HalfEdge {
    pub origin_vertex: u32,
    pub vertex: u32,
    pub face: u32,

    pub next: u32,
    pub prev: u32,
    pub twin: Option<u32>,
}

impl HalfEdgeMesh {
    pub fn build(mesh: &Mesh) -> Self {
        let mut half_edges = Vec::new();
        let mut edge_map = HashMap::new();

        for (face_idx, face) in mesh.faces().iter().enumerate() {
            let first_edge = half_edges.len() as u32;
            let sides = face.len();
            for i in 0..sides {
                let next = first_edge + ((i + 1) % sides) as u32;
                let prev = first_edge + ((i + sides - 1) % sides) as u32;

                let half_edge = HalfEdge {
                    origin_vertex: face[i],
                    vertex: face[(i + 1) % sides],
                    face: face_idx as u32,

                    next,
                    prev,
                    twin: None,
                };

                let edge_key = (face[i], face[(i + 1) % sides]);
                half_edges.push(half_edge);
                edge_map.insert(edge_key, first_edge + i as u32);
            }
        }

        for edge in half_edges.iter_mut() {
            edge.twin = edge_map.get(&(edge.vertex, edge.origin_vertex)).copied();
        }

        Self { half_edges }
    }

    pub fn half_edges(&self) -> &[HalfEdge] {
        &self.half_edges
    }

    pub fn half_edge_count(&self) -> usize {
        self.half_edges.len()
    }

    pub fn get_edge(&self, idx: u32) -> &HalfEdge {
        &self.half_edges[idx as usize]
    }

    /// Half edges with no opposite half edge, i.e. the edges of holes in the
    /// surface.
    pub fn boundary_edges(&self) -> impl Iterator<Item = &HalfEdge> + '_ {
        self.half_edges.iter().filter(|edge| edge.twin.is_none())
    }

    /// Half edges of the given face set whose opposite face lies outside the
    /// set (or does not exist). These outline the region.
    pub fn region_boundary<'a>(
        &'a self,
        in_region: &'a [bool],
    ) -> impl Iterator<Item = &'a HalfEdge> + 'a {
        self.half_edges.iter().filter(move |edge| {
            in_region[edge.face as usize]
                && edge
                    .twin
                    .map_or(true, |twin| !in_region[self.get_edge(twin).face as usize])
        })
    }
}
