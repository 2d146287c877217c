//! Boolean difference between a mesh and the half-space behind a cutting
//! plane.
//!
//! The pipeline only ever needs one kind of boolean, so solvers plug in
//! through the [`BooleanEngine`] trait. [`PlaneClipper`] is the built-in
//! implementation: it clips every face against the plane, shares the new
//! vertices between neighbouring faces and closes each outline left on the
//! plane with a cap face.

use std::collections::HashMap;

use itertools::Itertools;
use nalgebra::Vector2;
use ordered_float::OrderedFloat;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{half_edge::HalfEdgeMesh, mesh::Mesh, plane::CuttingPlane, Pos};

#[derive(Debug, Error)]
pub enum BooleanError {
    #[error("target mesh `{0}` has no faces")]
    EmptyTarget(String),
    #[error("cutter `{cutter}` (size {size:.3}) does not span the target")]
    CutterTooSmall { cutter: String, size: f32 },
    #[error("target mesh `{0}` is not closed and self intersection is not allowed")]
    NonManifoldInput(String),
    #[error("cut removed the whole mesh")]
    EmptyResult,
    #[error("cut outline is not closed at vertex {0}")]
    OpenBoundary(u32),
    #[error("cut produced a mesh that is not closed")]
    NonManifoldResult,
    #[error("failed to triangulate cap: {0}")]
    Triangulation(String),
}

pub type BooleanResult<T> = Result<T, BooleanError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Solver {
    /// Tight tolerances, output must be closed if the input was.
    #[default]
    Exact,
    /// Looser tolerances and no output validation beyond non-emptiness.
    Fast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BooleanSettings {
    pub solver: Solver,
    /// Tolerate targets that are not closed 2-manifolds.
    pub self_intersection: bool,
}

pub trait BooleanEngine {
    /// Removes everything behind `cutter` (the side its normal points away
    /// from) and closes the opening. The target is rewritten in place; on
    /// failure it may be left holding partial output.
    fn subtract(
        &self,
        target: &mut Mesh,
        cutter: &CuttingPlane,
        settings: BooleanSettings,
    ) -> BooleanResult<()>;
}

/// Cap triangles with less area than this times their longest edge squared
/// count as slivers.
const SLIVER_RATIO: f32 = 1e-4;

/// Built-in half-space cutter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaneClipper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Keep,
    On,
    Remove,
}

impl Solver {
    fn epsilon(&self) -> f32 {
        match self {
            Solver::Exact => 1e-6,
            Solver::Fast => 1e-4,
        }
    }
}

impl Side {
    fn classify(distance: f32, epsilon: f32) -> Self {
        if distance > epsilon {
            Side::Keep
        } else if distance < -epsilon {
            Side::Remove
        } else {
            Side::On
        }
    }
}

impl BooleanEngine for PlaneClipper {
    fn subtract(
        &self,
        target: &mut Mesh,
        cutter: &CuttingPlane,
        settings: BooleanSettings,
    ) -> BooleanResult<()> {
        if target.face_count() == 0 {
            return Err(BooleanError::EmptyTarget(target.name().to_owned()));
        }

        if !target.vertices().iter().all(|v| cutter.covers(v)) {
            return Err(BooleanError::CutterTooSmall {
                cutter: cutter.name().to_owned(),
                size: cutter.size(),
            });
        }

        let closed = target.is_manifold();
        if !closed && !settings.self_intersection {
            return Err(BooleanError::NonManifoldInput(target.name().to_owned()));
        }

        let epsilon = settings.solver.epsilon() * target.diagonal().max(1.0);
        let (vertices, faces) = clip(target, cutter, epsilon);
        target.set_geometry(vertices, faces);
        target.compact();

        if target.face_count() == 0 {
            return Err(BooleanError::EmptyResult);
        }

        let caps = cap(target, cutter, epsilon * 2.0, closed)?;
        debug!(
            "Cut `{}` with `{}`: {} faces, {} cap faces",
            target.name(),
            cutter.name(),
            target.face_count(),
            caps
        );

        if settings.solver == Solver::Exact && closed && !target.is_manifold() {
            return Err(BooleanError::NonManifoldResult);
        }

        Ok(())
    }
}

/// Clips every face against the plane, keeping the part in front of it.
/// Vertices created on an edge are shared by both faces using that edge.
fn clip(mesh: &Mesh, cutter: &CuttingPlane, epsilon: f32) -> (Vec<Pos>, Vec<Vec<u32>>) {
    let mut vertices = mesh.vertices().to_vec();
    let distances = (vertices.iter())
        .map(|v| cutter.signed_distance(v))
        .collect::<Vec<_>>();
    let sides = (distances.iter())
        .map(|&d| Side::classify(d, epsilon))
        .collect::<Vec<_>>();

    let mut crossings = HashMap::<(u32, u32), u32>::new();
    let mut faces = Vec::with_capacity(mesh.face_count());

    for (idx, face) in mesh.faces().iter().enumerate() {
        let keep = face.iter().any(|&v| sides[v as usize] == Side::Keep);
        let remove = face.iter().any(|&v| sides[v as usize] == Side::Remove);

        match (keep, remove) {
            (true, false) => faces.push(face.clone()),
            // Faces lying in the plane are kept only if they already close
            // the kept side.
            (false, false) => {
                if mesh.normal(idx).dot(&cutter.normal()) < 0.0 {
                    faces.push(face.clone());
                }
            }
            (false, true) => {}
            (true, true) => {
                let mut polygon = Vec::with_capacity(face.len() + 1);
                for (&a, &b) in face.iter().circular_tuple_windows() {
                    let (side_a, side_b) = (sides[a as usize], sides[b as usize]);
                    if side_a != Side::Remove {
                        polygon.push(a);
                    }

                    if matches!(
                        (side_a, side_b),
                        (Side::Keep, Side::Remove) | (Side::Remove, Side::Keep)
                    ) {
                        let key = (a.min(b), a.max(b));
                        let vertex = *crossings.entry(key).or_insert_with(|| {
                            let (lo, hi) = (key.0 as usize, key.1 as usize);
                            let t = distances[lo] / (distances[lo] - distances[hi]);
                            let point = vertices[lo] + (vertices[hi] - vertices[lo]) * t;
                            let point = point - cutter.normal() * cutter.signed_distance(&point);
                            vertices.push(point);
                            (vertices.len() - 1) as u32
                        });
                        polygon.push(vertex);
                    }
                }

                if polygon.len() >= 3 {
                    faces.push(polygon);
                }
            }
        }
    }

    (vertices, faces)
}

/// An outline left on the plane by the clip, walked in the direction of the
/// surface's own boundary edges.
struct Ring {
    vertices: Vec<u32>,
    points: Vec<Vector2<f32>>,
    area: f32,
}

/// Closes every outline on the plane. Returns the number of faces added.
fn cap(mesh: &mut Mesh, cutter: &CuttingPlane, epsilon: f32, strict: bool) -> BooleanResult<usize> {
    let half_edge = HalfEdgeMesh::build(mesh);
    let on_plane = |v: u32| cutter.signed_distance(&mesh.vertices()[v as usize]).abs() <= epsilon;

    let boundary = (half_edge.boundary_edges())
        .filter(|edge| on_plane(edge.origin_vertex) && on_plane(edge.vertex))
        .map(|edge| (edge.origin_vertex, edge.vertex))
        .collect::<Vec<_>>();

    let mut outgoing = HashMap::<u32, Vec<usize>>::new();
    for (idx, (origin, _)) in boundary.iter().enumerate() {
        outgoing.entry(*origin).or_default().push(idx);
    }

    let mut used = vec![false; boundary.len()];
    let mut rings = Vec::new();
    for start in 0..boundary.len() {
        if used[start] {
            continue;
        }
        used[start] = true;

        let (first, mut current) = boundary[start];
        let mut vertices = vec![first];
        let closed = loop {
            if current == first {
                break true;
            }

            let next = (outgoing.get(&current))
                .and_then(|edges| edges.iter().copied().find(|&edge| !used[edge]));
            let Some(next) = next else {
                break false;
            };

            used[next] = true;
            vertices.push(current);
            current = boundary[next].1;
        };

        if !closed {
            if strict {
                return Err(BooleanError::OpenBoundary(current));
            }
            warn!("Skipping open cut outline ending at vertex {}", current);
            continue;
        }

        if vertices.len() >= 3 {
            let points = (vertices.iter())
                .map(|&v| cutter.project(&mesh.vertices()[v as usize]))
                .collect::<Vec<_>>();
            let area = signed_area(&points);
            rings.push(Ring {
                vertices,
                points,
                area,
            });
        }
    }

    // Outer outlines wind counter-clockwise around the cutter normal, holes
    // clockwise.
    let (outers, holes): (Vec<_>, Vec<_>) = rings.into_iter().partition(|ring| ring.area > 0.0);
    let mut islands = outers
        .into_iter()
        .map(|outer| (outer, Vec::new()))
        .collect::<Vec<_>>();

    for hole in holes {
        let parent = (islands.iter_mut())
            .filter(|(outer, _)| point_in_polygon(&hole.points[0], &outer.points))
            .min_by_key(|(outer, _)| OrderedFloat(outer.area));

        match parent {
            Some((_, children)) => children.push(hole),
            None if strict => {
                return Err(BooleanError::Triangulation(
                    "hole outside of every outline".into(),
                ))
            }
            None => warn!("Skipping cut hole with no enclosing outline"),
        }
    }

    let mut added = 0;
    for (outer, holes) in islands {
        if holes.is_empty() {
            // The cap faces the opposite way to the outline it closes.
            mesh.add_face(outer.vertices.into_iter().rev().collect());
            added += 1;
            continue;
        }

        for triangle in triangulate(&outer, &holes)? {
            mesh.add_face(triangle.to_vec());
            added += 1;
        }
    }

    Ok(added)
}

/// Triangulates an outline with holes into cap triangles. Every outline
/// vertex is used so the cap meets the clipped faces edge for edge.
fn triangulate(outer: &Ring, holes: &[Ring]) -> BooleanResult<Vec<[u32; 3]>> {
    let mut data = Vec::new();
    let mut hole_indices = Vec::new();
    let mut ids = Vec::new();
    let mut points = Vec::new();

    for (i, ring) in [outer].into_iter().chain(holes).enumerate() {
        if i > 0 {
            hole_indices.push(ids.len());
        }

        for (&vertex, point) in ring.vertices.iter().zip(&ring.points) {
            data.extend([point.x as f64, point.y as f64]);
            ids.push(vertex);
            points.push(*point);
        }
    }

    let indices = earcutr::earcut(&data, &hole_indices, 2)
        .map_err(|err| BooleanError::Triangulation(format!("{err:?}")))?;

    let raw = (indices.chunks_exact(3))
        .map(|tri| [tri[0], tri[1], tri[2]])
        .collect::<Vec<_>>();

    let mut triangles = drop_slivers(raw, &points)
        .into_iter()
        .map(|[a, b, c]| {
            // Caps face against the cutter normal, which is clockwise in the
            // plane's own coordinates.
            if signed_area(&[points[a], points[b], points[c]]) > 0.0 {
                [ids[a], ids[c], ids[b]]
            } else {
                [ids[a], ids[b], ids[c]]
            }
        })
        .collect::<Vec<_>>();

    // Earcut drops collinear points. Split the triangle on each shortened
    // edge so no T-junction is left behind.
    for ring in [outer].into_iter().chain(holes) {
        let cap_order = ring.vertices.iter().rev().copied().collect::<Vec<_>>();
        let used = (0..cap_order.len())
            .filter(|&i| {
                let vertex = cap_order[i];
                triangles.iter().any(|tri| tri.contains(&vertex))
            })
            .collect::<Vec<_>>();

        if used.len() < 2 {
            continue;
        }

        for (&i, &j) in used.iter().circular_tuple_windows() {
            let skipped = (i + 1..if j > i { j } else { j + cap_order.len() })
                .map(|k| cap_order[k % cap_order.len()])
                .collect::<Vec<_>>();
            if skipped.is_empty() {
                continue;
            }

            let (a, b) = (cap_order[i], cap_order[j]);
            let position = triangles.iter().position(|tri| {
                (0..3).any(|k| tri[k] == a && tri[(k + 1) % 3] == b)
            });
            let Some(position) = position else {
                return Err(BooleanError::Triangulation(format!(
                    "no triangle on edge {a} -> {b}"
                )));
            };

            let tri = triangles.swap_remove(position);
            let c = (0..3)
                .map(|k| tri[k])
                .find(|&v| v != a && v != b)
                .unwrap_or(a);

            let fan = [a].into_iter().chain(skipped).chain([b]).collect::<Vec<_>>();
            for pair in fan.windows(2) {
                triangles.push([pair[0], pair[1], c]);
            }
        }
    }

    Ok(triangles)
}

/// Drops sliver triangles earcut leaves on nearly collinear outline points.
/// Their normals are noise, so a sliver is removed when its middle vertex is
/// used by no other triangle and the triangle across its long edge stays.
/// The T-junction repair then splits that neighbour through the middle
/// vertex.
fn drop_slivers(triangles: Vec<[usize; 3]>, points: &[Vector2<f32>]) -> Vec<[usize; 3]> {
    let mut uses = HashMap::<usize, usize>::new();
    for &v in triangles.iter().flatten() {
        *uses.entry(v).or_default() += 1;
    }

    // Long edge of every removable sliver.
    let slivers = (triangles.iter())
        .map(|tri| {
            let corners = (*tri).map(|i| points[i]);
            let edge = |k: usize| (corners[(k + 1) % 3] - corners[k]).norm_squared();
            let longest = (0..3).max_by_key(|&k| OrderedFloat(edge(k))).unwrap_or(0);

            let middle = tri[(longest + 2) % 3];
            let thin = signed_area(&corners).abs() <= SLIVER_RATIO * edge(longest);
            (thin && uses.get(&middle) == Some(&1))
                .then_some((tri[longest], tri[(longest + 1) % 3]))
        })
        .collect::<Vec<_>>();

    let neighbour = |idx: usize, a: usize, b: usize| {
        (0..triangles.len()).find(|&other| {
            other != idx && triangles[other].contains(&a) && triangles[other].contains(&b)
        })
    };

    let mut dropped = vec![false; triangles.len()];
    for (idx, sliver) in slivers.iter().enumerate() {
        let Some((a, b)) = *sliver else {
            continue;
        };

        if let Some(other) = neighbour(idx, a, b) {
            if slivers[other].is_none() {
                dropped[idx] = true;
            }
        }
    }

    (triangles.into_iter())
        .zip(dropped)
        .filter(|(_, dropped)| !dropped)
        .map(|(tri, _)| tri)
        .collect()
}

fn signed_area(points: &[Vector2<f32>]) -> f32 {
    points
        .iter()
        .circular_tuple_windows()
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum::<f32>()
        / 2.0
}

fn point_in_polygon(point: &Vector2<f32>, polygon: &[Vector2<f32>]) -> bool {
    let mut inside = false;
    for (a, b) in polygon.iter().circular_tuple_windows() {
        if (a.y > point.y) != (b.y > point.y)
            && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
        {
            inside = !inside;
        }
    }
    inside
}
