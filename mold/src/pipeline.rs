//! The mold pipeline: find the cut height, cut the top off, close the shell
//! back up to the original top and optionally split it in two.

use common::{config::PipelineOptions, preferences::preferences};
use tracing::{info, warn};

use crate::{
    boolean::{BooleanEngine, BooleanSettings, PlaneClipper, Solver},
    error::{MoldError, MoldResult},
    extrude::{extrude_rim, Extrusion},
    mesh::Mesh,
    plane::{CuttingPlane, Intermediates},
    slice_finder::{find_best_slice, SliceResult, DEFAULT_SAMPLES},
    split::split_shell,
    Pos,
};

const TOP_CUT_SETTINGS: BooleanSettings = BooleanSettings {
    solver: Solver::Exact,
    self_intersection: false,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Shell {
    Single(Mesh),
    Split(ShellPair),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShellPair {
    pub a: Mesh,
    pub b: Mesh,
}

#[derive(Debug, Clone)]
pub struct MoldOutput {
    pub shell: Shell,
    pub slice: SliceResult,
    pub extrusion: Extrusion,
    /// Hidden cutting planes, only filled when intermediates are kept.
    pub intermediates: Vec<CuttingPlane>,
}

/// Holds a boolean engine and the last computed slice for display.
pub struct MoldGenerator<E = PlaneClipper> {
    engine: E,
    found: Option<SliceResult>,
}

impl Shell {
    pub fn meshes(&self) -> Vec<&Mesh> {
        match self {
            Shell::Single(mesh) => vec![mesh],
            Shell::Split(pair) => vec![&pair.a, &pair.b],
        }
    }
}

impl<E: BooleanEngine> MoldGenerator<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            found: None,
        }
    }

    /// Last slice computed by [`MoldGenerator::find`] or a non-manual
    /// [`MoldGenerator::generate`].
    pub fn found(&self) -> Option<SliceResult> {
        self.found
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Computes the best slice without touching the mesh.
    pub fn find(&mut self, target: Option<&Mesh>, options: &PipelineOptions) -> MoldResult<SliceResult> {
        let mesh = target.ok_or_else(missing_target)?;
        validate_search_depth(options.search_depth)?;
        let (_, max_z) = vertical_range(mesh)?;

        let slice = find_best_slice(mesh, max_z, options.search_depth, options.samples);
        info!("Slice at z = {:.3}, perimeter ~ {:.1}", slice.height, slice.score);
        self.found = Some(slice);
        Ok(slice)
    }

    pub fn generate(
        &mut self,
        target: Option<&mut Mesh>,
        options: &PipelineOptions,
    ) -> MoldResult<MoldOutput> {
        let output = generate_mold(target, options, &self.engine)?;
        if !options.use_manual {
            self.found = Some(output.slice);
        }
        Ok(output)
    }
}

impl Default for MoldGenerator {
    fn default() -> Self {
        Self::new(PlaneClipper)
    }
}

/// Finds the height of the thickest cross-section within `search_depth` of
/// the top of the mesh, sampled [`DEFAULT_SAMPLES`] times. Negative depths
/// are treated as zero.
pub fn find_slice(mesh: &Mesh, search_depth: f32) -> MoldResult<SliceResult> {
    let (_, max_z) = vertical_range(mesh)?;
    Ok(find_best_slice(
        mesh,
        max_z,
        search_depth.max(0.0),
        DEFAULT_SAMPLES,
    ))
}

/// Runs the whole pipeline. Without `operate_on_copy` the target is cut in
/// place and, when split, becomes half `A`.
pub fn generate_mold(
    target: Option<&mut Mesh>,
    options: &PipelineOptions,
    engine: &impl BooleanEngine,
) -> MoldResult<MoldOutput> {
    let target = target.ok_or_else(missing_target)?;
    if target.face_count() == 0 && !target.is_empty() {
        return Err(MoldError::InvalidInput(format!(
            "`{}` has no faces and is not a surface mesh",
            target.name()
        )));
    }
    if !options.use_manual {
        validate_search_depth(options.search_depth)?;
    }
    let (min_z, max_z) = vertical_range(target)?;

    let mut intermediates = Intermediates::new(options.keep_intermediates(&preferences()));

    let mut copy = options.operate_on_copy.then(|| {
        info!("Creating copy of `{}`", target.name());
        let mut copy = target.clone();
        copy.set_name(format!("{}_mold", target.name()));
        copy
    });
    let mesh: &mut Mesh = match &mut copy {
        Some(copy) => copy,
        None => &mut *target,
    };

    let slice = if options.use_manual {
        if !(min_z..=max_z).contains(&options.manual_height) {
            warn!(
                "Manual cut height {:.3} is outside the mesh ({:.3} to {:.3})",
                options.manual_height, min_z, max_z
            );
        }

        SliceResult {
            height: options.manual_height,
            score: options.manual_score,
        }
    } else {
        find_best_slice(mesh, max_z, options.search_depth, options.samples)
    };
    info!(
        "Thickest cross-section at z = {:.3} (approx.) with metric {}",
        slice.height, slice.score
    );

    let (min, max) = mesh.bounds();
    let center = (min + max) / 2.0;
    let plane = CuttingPlane::new(
        "Z_Cutting_Plane",
        Pos::new(center.x, center.y, slice.height),
        -Pos::z(),
        None,
        Some(&*mesh),
    );

    let cut = engine.subtract(mesh, &plane, TOP_CUT_SETTINGS);
    intermediates.dispose(plane);
    cut.map_err(MoldError::boolean("cutting the top"))?;

    let extrusion = extrude_rim(mesh, slice.height, max_z)?;

    let second = if options.cut_in_half {
        Some(split_shell(mesh, options.split_axis, engine, &mut intermediates)?)
    } else {
        None
    };

    let first = copy.unwrap_or_else(|| target.clone());
    let shell = match second {
        Some(b) => Shell::Split(ShellPair { a: first, b }),
        None => Shell::Single(first),
    };

    Ok(MoldOutput {
        shell,
        slice,
        extrusion,
        intermediates: intermediates.into_planes(),
    })
}

fn missing_target() -> MoldError {
    MoldError::InvalidInput("no target mesh was given".into())
}

fn validate_search_depth(depth: f32) -> MoldResult<()> {
    if !depth.is_finite() || depth < 0.0 {
        return Err(MoldError::InvalidInput(format!(
            "search depth must be a non-negative number, got {depth}"
        )));
    }
    Ok(())
}

/// Lowest and highest vertex heights, if the mesh has any vertical extent.
fn vertical_range(mesh: &Mesh) -> MoldResult<(f32, f32)> {
    if mesh.is_empty() {
        return Err(MoldError::DegenerateGeometry(format!(
            "`{}` has no vertices",
            mesh.name()
        )));
    }

    let (min, max) = mesh.bounds();
    if max.z <= min.z {
        return Err(MoldError::DegenerateGeometry(format!(
            "`{}` is flat (z = {:.3})",
            mesh.name(),
            max.z
        )));
    }

    Ok((min.z, max.z))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use common::{config::SplitAxis, preferences::set_keep_intermediates};

    use super::*;
    use crate::builder::MeshBuilder;

    fn unit_cube() -> Mesh {
        let mut builder = MeshBuilder::new();
        builder.add_box(Pos::zeros(), Pos::repeat(1.0));
        builder.build("cube")
    }

    fn options() -> PipelineOptions {
        PipelineOptions {
            search_depth: 1.0,
            samples: 2,
            keep_intermediates: Some(false),
            ..Default::default()
        }
    }

    #[test]
    fn missing_target_is_invalid() {
        let result = generate_mold(None, &options(), &PlaneClipper);
        assert!(matches!(result, Err(MoldError::InvalidInput(_))));

        let mut generator = MoldGenerator::default();
        assert!(matches!(
            generator.find(None, &options()),
            Err(MoldError::InvalidInput(_))
        ));
        assert_eq!(generator.found(), None);
    }

    #[test]
    fn degenerate_inputs_are_not_mutated() {
        let mut empty = Mesh::default();
        let result = generate_mold(Some(&mut empty), &options(), &PlaneClipper);
        assert!(matches!(result, Err(MoldError::DegenerateGeometry(_))));
        assert_eq!(empty, Mesh::default());

        let mut flat = Mesh::new(
            "flat",
            vec![Pos::zeros(), Pos::x(), Pos::y()],
            vec![vec![0, 1, 2]],
        );
        let before = flat.clone();
        let result = generate_mold(Some(&mut flat), &options(), &PlaneClipper);
        assert!(matches!(result, Err(MoldError::DegenerateGeometry(_))));
        assert_eq!(flat, before);

        let mut points = Mesh::new("points", vec![Pos::zeros(), Pos::z()], Vec::new());
        let result = generate_mold(Some(&mut points), &options(), &PlaneClipper);
        assert!(matches!(result, Err(MoldError::InvalidInput(_))));
    }

    #[test]
    fn negative_search_depth_is_invalid() {
        let mut cube = unit_cube();
        let options = PipelineOptions {
            search_depth: -1.0,
            ..options()
        };
        let result = generate_mold(Some(&mut cube), &options, &PlaneClipper);
        assert!(matches!(result, Err(MoldError::InvalidInput(_))));
        assert_eq!(cube, unit_cube());
    }

    #[test]
    fn cube_mold_in_place() {
        let mut cube = unit_cube();
        let output = generate_mold(Some(&mut cube), &options(), &PlaneClipper).unwrap();

        assert_eq!(output.slice, SliceResult { height: 0.5, score: 4.0 });
        assert_eq!(output.extrusion.created, 4);
        assert!(output.intermediates.is_empty());

        let Shell::Single(shell) = &output.shell else {
            panic!("expected a single shell");
        };
        assert_eq!(shell, &cube);
        assert_eq!(shell.name(), "cube");
        assert_eq!(shell.vertex_count(), 12);
        assert!(shell.is_manifold());
        assert_relative_eq!(shell.bounds().1.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn copy_leaves_target_alone() {
        let mut cube = unit_cube();
        let options = PipelineOptions {
            operate_on_copy: true,
            ..options()
        };
        let output = generate_mold(Some(&mut cube), &options, &PlaneClipper).unwrap();

        assert_eq!(cube, unit_cube());
        assert_eq!(output.shell.meshes()[0].name(), "cube_mold");
    }

    #[test]
    fn manual_slice_skips_search() {
        let mut cube = unit_cube();
        let options = PipelineOptions {
            use_manual: true,
            manual_height: 0.25,
            manual_score: 99.0,
            search_depth: -5.0,
            ..options()
        };

        let mut generator = MoldGenerator::default();
        let output = generator.generate(Some(&mut cube), &options).unwrap();
        assert_eq!(output.slice, SliceResult { height: 0.25, score: 99.0 });
        assert_eq!(generator.found(), None);
        assert_relative_eq!(cube.bounds().1.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn manual_slice_above_mesh_falls_back() {
        // Cutting above the mesh removes nothing, and the top face is far
        // from the requested height but still picked up by the fallback.
        let mut cube = unit_cube();
        let options = PipelineOptions {
            use_manual: true,
            manual_height: 5.0,
            ..options()
        };

        let output = generate_mold(Some(&mut cube), &options, &PlaneClipper).unwrap();
        assert!(output.extrusion.fallback);
        // The top is pushed down by the difference between the top and the
        // requested height.
        let moved = output.extrusion.moved[0] as usize;
        assert_relative_eq!(cube.vertices()[moved].z, 1.0 + (1.0 - 5.0), epsilon = 1e-5);
    }

    #[test]
    fn split_mold() {
        let mut cube = unit_cube();
        let options = PipelineOptions {
            cut_in_half: true,
            split_axis: SplitAxis::XZ,
            keep_intermediates: Some(true),
            ..options()
        };

        let mut generator = MoldGenerator::default();
        let output = generator.generate(Some(&mut cube), &options).unwrap();
        assert_eq!(generator.found(), Some(output.slice));

        let Shell::Split(pair) = &output.shell else {
            panic!("expected two halves");
        };
        assert_eq!(pair.a.name(), "cube_A");
        assert_eq!(pair.b.name(), "cube_B");
        assert_eq!(&pair.a, &cube);
        assert_relative_eq!(pair.a.volume() + pair.b.volume(), 1.0, epsilon = 1e-4);

        let names = (output.intermediates.iter())
            .map(|x| x.name())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            ["Z_Cutting_Plane", "XZ_Split_Plane", "XZ_Split_Plane_Inverted"]
        );
    }

    /// Turns the process-wide keep flag on until dropped. Tests in this
    /// binary run concurrently, so every other test passes
    /// `keep_intermediates: Some(..)` and never reads the flag.
    struct KeepIntermediates;

    impl KeepIntermediates {
        fn enable() -> Self {
            set_keep_intermediates(true);
            Self
        }
    }

    impl Drop for KeepIntermediates {
        fn drop(&mut self) {
            set_keep_intermediates(false);
        }
    }

    #[test]
    fn process_preference_keeps_planes() {
        let output = {
            let _keep = KeepIntermediates::enable();
            let mut cube = unit_cube();
            let options = PipelineOptions {
                keep_intermediates: None,
                ..options()
            };
            generate_mold(Some(&mut cube), &options, &PlaneClipper)
        };
        assert!(!preferences().keep_intermediates);

        let planes = output.unwrap().intermediates;
        assert_eq!(planes.len(), 1);
        assert_eq!(planes[0].name(), "Z_Cutting_Plane");
        assert!(planes[0].hidden());
        assert_eq!(planes[0].normal(), -Pos::z());
    }

    #[test]
    fn find_does_not_mutate() {
        let cube = unit_cube();
        let mut generator = MoldGenerator::default();
        let slice = generator.find(Some(&cube), &options()).unwrap();

        assert_eq!(slice, SliceResult { height: 0.5, score: 4.0 });
        assert_eq!(generator.found(), Some(slice));
        assert_eq!(cube, unit_cube());
    }

    #[test]
    fn find_slice_uses_default_samples() {
        let slice = find_slice(&unit_cube(), 1.0).unwrap();
        assert_eq!(slice.score, 4.0);
        assert!((slice.height - 1.0 / 30.0).abs() < 1e-6);

        assert_eq!(find_slice(&unit_cube(), -3.0).unwrap().height, 1.0);
    }
}
