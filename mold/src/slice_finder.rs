//! Search for the horizontal plane with the largest cross-section near the
//! top of a mesh.
//!
//! Each candidate height is scored by counting the mesh edges that strictly
//! straddle it. This is a cheap stand-in for the perimeter of the section and
//! runs in `O(samples * edges)`.

use rayon::prelude::*;

use crate::mesh::Mesh;

pub const DEFAULT_SAMPLES: u32 = 30;

/// A cut height and its cross-section score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceResult {
    pub height: f32,
    pub score: f32,
}

/// Evaluates `samples + 1` evenly spaced heights in `[max_z - depth, max_z]`
/// and returns the one with the greatest crossing count. Ties keep the lowest
/// height. With `samples == 0` only `max_z - depth` is evaluated.
pub fn find_best_slice(mesh: &Mesh, max_z: f32, depth: f32, samples: u32) -> SliceResult {
    let min_z = max_z - depth;
    let edges = mesh.edges();
    let vertices = mesh.vertices();

    let scores = (0..=samples)
        .into_par_iter()
        .map(|i| {
            let t = if samples == 0 {
                0.0
            } else {
                i as f32 / samples as f32
            };
            let height = max_z - depth * (1.0 - t);

            let crossings = edges
                .iter()
                .filter(|[a, b]| {
                    let (a, b) = (vertices[*a as usize].z, vertices[*b as usize].z);
                    (a - height) * (b - height) < 0.0
                })
                .count();

            (height, crossings as f32)
        })
        .collect::<Vec<_>>();

    // Only strict improvements replace the best, so the earliest sample wins
    // ties.
    let mut best = SliceResult {
        height: min_z,
        score: 0.0,
    };
    for (height, score) in scores {
        if score > best.score {
            best = SliceResult { height, score };
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{builder::MeshBuilder, Pos};

    fn unit_cube() -> Mesh {
        let mut builder = MeshBuilder::new();
        builder.add_box(Pos::zeros(), Pos::repeat(1.0));
        builder.build("cube")
    }

    /// Two cylinders stacked on top of each other, the lower one wider and
    /// with more sides.
    fn stacked() -> Mesh {
        let mut builder = MeshBuilder::new();
        builder.add_vertical_cylinder(Pos::zeros(), 1.0, (2.0, 2.0), 16);
        builder.add_vertical_cylinder(Pos::new(0.0, 0.0, 1.0), 1.0, (1.0, 1.0), 8);
        builder.build("stacked")
    }

    #[test]
    fn cube_scenario() {
        let result = find_best_slice(&unit_cube(), 1.0, 1.0, 2);
        assert_eq!(result, SliceResult { height: 0.5, score: 4.0 });
    }

    #[test]
    fn touching_vertices_do_not_count() {
        let result = find_best_slice(&unit_cube(), 1.0, 0.0, 4);
        assert_eq!(result, SliceResult { height: 1.0, score: 0.0 });
    }

    #[test]
    fn depth_past_bottom_scores_zero_below() {
        let result = find_best_slice(&unit_cube(), 1.0, 2.0, 4);
        assert_eq!(result, SliceResult { height: 0.5, score: 4.0 });
    }

    #[test]
    fn picks_section_with_most_crossings() {
        let result = find_best_slice(&stacked(), 2.0, 2.0, 4);
        assert_eq!(result, SliceResult { height: 0.5, score: 16.0 });
    }

    #[test]
    fn ties_keep_the_lowest_height() {
        // Every interior sample of the cube crosses the same four edges.
        let result = find_best_slice(&unit_cube(), 1.0, 1.0, 10);
        assert_eq!(result.score, 4.0);
        assert!((result.height - 0.1).abs() < 1e-6);
    }

    #[test]
    fn zero_samples_checks_the_bottom_of_the_range() {
        let result = find_best_slice(&unit_cube(), 1.0, 0.75, 0);
        assert_eq!(result, SliceResult { height: 0.25, score: 4.0 });
    }

    proptest! {
        #[test]
        fn height_within_search_range(
            depth in 0.0f32..8.0,
            samples in 1u32..64,
            radius in 0.5f32..4.0,
            height in 0.5f32..6.0,
        ) {
            let mut builder = MeshBuilder::new();
            builder.add_uv_sphere(Pos::zeros(), radius, 8, 12);
            builder.add_vertical_cylinder(Pos::zeros(), height, (radius, radius * 0.5), 10);
            let mesh = builder.build("blob");

            let max_z = mesh.bounds().1.z;
            let result = find_best_slice(&mesh, max_z, depth, samples);

            prop_assert!(result.height >= max_z - depth);
            prop_assert!(result.height <= max_z);
            prop_assert!(result.score >= 0.0);

            // Determinism
            prop_assert_eq!(result, find_best_slice(&mesh, max_z, depth, samples));
        }

        #[test]
        fn zero_depth_returns_top(samples in 0u32..64, radius in 0.5f32..4.0) {
            let mut builder = MeshBuilder::new();
            builder.add_uv_sphere(Pos::zeros(), radius, 6, 10);
            let mesh = builder.build("sphere");

            let max_z = mesh.bounds().1.z;
            prop_assert_eq!(find_best_slice(&mesh, max_z, 0.0, samples).height, max_z);
        }
    }
}
