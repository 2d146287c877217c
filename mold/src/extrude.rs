//! Closes a cut mesh by extruding the faces left at the cut back up to the
//! original top.
//!
//! The thresholds below were tuned by hand against solver output and are
//! kept as-is so results stay reproducible.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::{
    error::{MoldError, MoldResult},
    half_edge::HalfEdgeMesh,
    mesh::Mesh,
    Pos,
};

/// Minimum Z component of a face normal for it to count as facing up.
pub const RIM_NORMAL_THRESHOLD: f32 = 0.7;
/// Allowed distance between a rim face's mean height and the cut height.
pub const RIM_HEIGHT_TOLERANCE: f32 = 0.05;
/// Allowed distance from the highest upward face when falling back.
pub const FALLBACK_HEIGHT_TOLERANCE: f32 = 0.01;

/// Faces picked for extrusion.
#[derive(Debug, Clone, PartialEq)]
pub struct RimSelection {
    pub faces: Vec<usize>,
    /// Whether the faces came from the highest-face fallback search.
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extrusion {
    pub rim_faces: usize,
    /// Vertices added to the mesh, one per vertex on the rim outline.
    pub created: usize,
    /// Vertices that were translated to the top.
    pub moved: Vec<u32>,
    pub fallback: bool,
}

/// Finds upward facing faces whose mean height is within
/// [`RIM_HEIGHT_TOLERANCE`] of the cut. If there are none, takes the highest
/// upward facing faces instead.
pub fn find_rim_faces(mesh: &Mesh, cut_height: f32) -> Option<RimSelection> {
    let upward = (0..mesh.face_count())
        .filter(|&face| mesh.normal(face).z > RIM_NORMAL_THRESHOLD)
        .map(|face| (face, mesh.face_center(face).z))
        .collect::<Vec<_>>();

    let faces = (upward.iter())
        .filter(|(_, height)| (height - cut_height).abs() < RIM_HEIGHT_TOLERANCE)
        .map(|(face, _)| *face)
        .collect::<Vec<_>>();

    if !faces.is_empty() {
        return Some(RimSelection {
            faces,
            fallback: false,
        });
    }

    // Faces seen before a new maximum are discarded even if they end up
    // within tolerance of it.
    let mut max_height = f32::NEG_INFINITY;
    let mut top = Vec::new();
    for &(face, height) in upward.iter() {
        if height > max_height {
            max_height = height;
            top = vec![face];
        } else if (height - max_height).abs() < FALLBACK_HEIGHT_TOLERANCE {
            top.push(face);
        }
    }

    (!top.is_empty()).then(|| {
        info!(
            "Using {} top faces at z = {:.3} instead of the cut",
            top.len(),
            max_height
        );
        RimSelection {
            faces: top,
            fallback: true,
        }
    })
}

/// Extrudes the rim faces of a freshly cut mesh as one region and moves the
/// new layer up by `top_height - cut_height`.
pub fn extrude_rim(mesh: &mut Mesh, cut_height: f32, top_height: f32) -> MoldResult<Extrusion> {
    let Some(selection) = find_rim_faces(mesh, cut_height) else {
        warn!("Could not find any suitable faces for extrusion");
        return Err(MoldError::NoExtrusionFaces { height: cut_height });
    };

    info!(
        "Found {} faces near the cut plane z = {:.3} (tolerance = {})",
        selection.faces.len(),
        cut_height,
        RIM_HEIGHT_TOLERANCE
    );

    let before = mesh.vertex_count();
    let moved = extrude_region(mesh, &selection.faces);
    mesh.translate(&moved, Pos::new(0.0, 0.0, top_height - cut_height));

    info!(
        "Extruded {} vertices from z = {:.3} up to z = {:.3}",
        moved.len(),
        cut_height,
        top_height
    );

    Ok(Extrusion {
        rim_faces: selection.faces.len(),
        created: mesh.vertex_count() - before,
        moved,
        fallback: selection.fallback,
    })
}

/// Extrudes a set of faces as one connected region. Edges shared by two
/// region faces stay interior, every edge on the region's outline gets a
/// side quad. The region faces are moved onto the new vertices and their
/// vertex indices are returned, ready to be translated.
pub fn extrude_region(mesh: &mut Mesh, faces: &[usize]) -> Vec<u32> {
    let mut in_region = vec![false; mesh.face_count()];
    faces.iter().for_each(|&face| in_region[face] = true);

    let half_edge = HalfEdgeMesh::build(mesh);
    let outline = (half_edge.region_boundary(&in_region))
        .map(|edge| (edge.origin_vertex, edge.vertex))
        .collect::<Vec<_>>();

    // Vertices still used by the rest of the mesh must stay where they are,
    // so the region gets its own copies of them.
    let mut shared = (0..mesh.face_count())
        .filter(|&face| !in_region[face])
        .flat_map(|face| mesh.face(face).to_vec())
        .collect::<HashSet<_>>();
    shared.extend(outline.iter().flat_map(|&(a, b)| [a, b]));

    let mut remap = vec![u32::MAX; mesh.vertex_count()];
    let mut moved = Vec::new();
    for &face in faces {
        for i in 0..mesh.face(face).len() {
            let vertex = mesh.face(face)[i];
            if remap[vertex as usize] == u32::MAX {
                remap[vertex as usize] = if shared.contains(&vertex) {
                    mesh.add_vertex(mesh.vertices()[vertex as usize])
                } else {
                    vertex
                };
                moved.push(remap[vertex as usize]);
            }
        }
    }

    for &face in faces {
        mesh.face_mut(face)
            .iter_mut()
            .for_each(|vertex| *vertex = remap[*vertex as usize]);
    }

    for (a, b) in outline {
        let (top_a, top_b) = (remap[a as usize], remap[b as usize]);
        mesh.add_face(vec![a, b, top_b, top_a]);
    }

    moved
}
