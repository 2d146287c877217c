use common::config::SplitAxis;
use tracing::info;

use crate::{
    boolean::{BooleanEngine, BooleanSettings, Solver},
    error::{MoldError, MoldResult},
    mesh::Mesh,
    plane::{CuttingPlane, Intermediates},
};

/// Split cuts run into coincident and touching geometry more often than the
/// top cut does.
const SPLIT_SETTINGS: BooleanSettings = BooleanSettings {
    solver: Solver::Exact,
    self_intersection: true,
};

/// Cuts a shell into two halves through its vertex centroid. `shell` becomes
/// half `A` (the side `axis.normal()` points to) and the other half `B` is
/// returned.
pub fn split_shell(
    shell: &mut Mesh,
    axis: SplitAxis,
    engine: &impl BooleanEngine,
    intermediates: &mut Intermediates,
) -> MoldResult<Mesh> {
    let center = shell.centroid();
    let normal = axis.normal();
    info!(
        "Cutting mold in half along {} plane through ({:.3}, {:.3}, {:.3})",
        axis, center.x, center.y, center.z
    );

    let plane = CuttingPlane::new(
        format!("{axis}_Split_Plane"),
        center,
        normal,
        None,
        Some(&*shell),
    );

    let name = shell.name().to_owned();
    let mut second = shell.clone();
    second.set_name(format!("{name}_B"));
    shell.set_name(format!("{name}_A"));

    info!("Creating first half");
    let first = engine.subtract(shell, &plane, SPLIT_SETTINGS);
    intermediates.dispose(plane);
    first.map_err(MoldError::boolean("cutting the first half"))?;

    let inverted = CuttingPlane::new(
        format!("{axis}_Split_Plane_Inverted"),
        center,
        -normal,
        None,
        Some(&second),
    );

    info!("Creating second half");
    let result = engine.subtract(&mut second, &inverted, SPLIT_SETTINGS);
    intermediates.dispose(inverted);
    result.map_err(MoldError::boolean("cutting the second half"))?;

    Ok(second)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{boolean::PlaneClipper, builder::MeshBuilder, Pos};

    /// Box whose vertex centroid sits away from the origin.
    fn shell() -> Mesh {
        let mut builder = MeshBuilder::new();
        builder.add_box(Pos::new(-1.0, 0.0, 0.0), Pos::new(3.0, 2.0, 3.0));
        builder.build("shell")
    }

    #[test]
    fn halves_cover_the_shell() {
        for axis in SplitAxis::ALL {
            let original = shell();
            let mut a = original.clone();
            let mut intermediates = Intermediates::new(false);
            let b = split_shell(&mut a, axis, &PlaneClipper, &mut intermediates).unwrap();

            assert_eq!(a.name(), "shell_A");
            assert_eq!(b.name(), "shell_B");
            assert!(a.is_manifold() && b.is_manifold());
            assert!(intermediates.into_planes().is_empty());

            assert_relative_eq!(a.volume() + b.volume(), original.volume(), epsilon = 1e-4);

            let (min_a, max_a) = a.bounds();
            let (min_b, max_b) = b.bounds();
            let (min, max) = original.bounds();
            assert_relative_eq!(min_a.inf(&min_b), min, epsilon = 1e-5);
            assert_relative_eq!(max_a.sup(&max_b), max, epsilon = 1e-5);

            // A is on the side the axis normal points to.
            let normal = axis.normal();
            let center = original.centroid().dot(&normal);
            assert_relative_eq!(min_a.dot(&normal), center, epsilon = 1e-5);
            assert_relative_eq!(max_b.dot(&normal), center, epsilon = 1e-5);
        }
    }

    #[test]
    fn kept_planes_are_hidden() {
        let mut a = shell();
        let mut intermediates = Intermediates::new(true);
        split_shell(&mut a, SplitAxis::XZ, &PlaneClipper, &mut intermediates).unwrap();

        let planes = intermediates.into_planes();
        let names = planes.iter().map(|x| x.name()).collect::<Vec<_>>();
        assert_eq!(names, ["XZ_Split_Plane", "XZ_Split_Plane_Inverted"]);
        assert!(planes.iter().all(|x| x.hidden()));
        assert_relative_eq!(planes[0].normal(), -planes[1].normal());
    }
}
