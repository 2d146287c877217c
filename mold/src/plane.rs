use std::f32::consts::PI;

use nalgebra::{UnitQuaternion, Vector2, Vector3};
use tracing::{debug, warn};

use crate::{mesh::Mesh, Pos};

/// Edge length of a cutting plane when neither a size nor a target is given.
pub const DEFAULT_PLANE_SIZE: f32 = 100.0;

/// Normals closer than this to straight down are treated as antiparallel to
/// the plane's local up axis.
const ANTIPARALLEL_TOLERANCE: f32 = 0.001;

/// A finite square cutting surface. In its own frame the plane lies in XY
/// with its face normal along +Z; `rotation` carries that frame onto the
/// requested normal.
#[derive(Debug, Clone, PartialEq)]
pub struct CuttingPlane {
    name: String,
    location: Pos,
    normal: Pos,
    rotation: UnitQuaternion<f32>,
    size: f32,
    hidden: bool,
}

impl CuttingPlane {
    /// Creates a plane centered on `location` facing `normal`. The edge
    /// length is `size` if given, otherwise twice the bounding diagonal of
    /// `target`, otherwise [`DEFAULT_PLANE_SIZE`].
    pub fn new(
        name: impl Into<String>,
        location: Pos,
        normal: Pos,
        size: Option<f32>,
        target: Option<&Mesh>,
    ) -> Self {
        let name = name.into();
        let size = match (size, target) {
            (Some(size), _) => size,
            (None, Some(target)) => plane_size(target),
            (None, None) => DEFAULT_PLANE_SIZE,
        };

        let up = Vector3::z();
        let normal = normal.try_normalize(f32::EPSILON).unwrap_or_else(|| {
            warn!("Plane `{name}` was given a zero normal, facing it up instead");
            up
        });

        let rotation = if (normal + up).norm() < ANTIPARALLEL_TOLERANCE {
            // The shortest arc is undefined here, so flip about X instead.
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), PI)
        } else if normal != up {
            UnitQuaternion::rotation_between(&up, &normal).unwrap_or_else(UnitQuaternion::identity)
        } else {
            UnitQuaternion::identity()
        };

        debug!(
            "Created plane `{}` at ({:.3}, {:.3}, {:.3}) with size {:.3}",
            name, location.x, location.y, location.z, size
        );

        Self {
            name,
            location,
            normal,
            rotation,
            size,
            hidden: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Pos {
        self.location
    }

    /// Unit normal. Boolean cuts keep the half-space it points into.
    pub fn normal(&self) -> Pos {
        self.normal
    }

    pub fn rotation(&self) -> &UnitQuaternion<f32> {
        &self.rotation
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn hide(&mut self) {
        self.hidden = true;
    }

    /// Distance of a point from the plane, positive on the side the normal
    /// points to.
    pub fn signed_distance(&self, point: &Pos) -> f32 {
        (point - self.location).dot(&self.normal)
    }

    /// Position of a point in the plane's own XY coordinates.
    pub fn project(&self, point: &Pos) -> Vector2<f32> {
        (self.rotation.inverse() * (point - self.location)).xy()
    }

    /// Whether a point's projection onto the plane falls inside its square.
    pub fn covers(&self, point: &Pos) -> bool {
        let half = self.size / 2.0;
        let local = self.project(point);
        local.x.abs() <= half && local.y.abs() <= half
    }

    /// The plane as a single quad face.
    pub fn to_mesh(&self) -> Mesh {
        let half = self.size / 2.0;
        let vertices = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
            .into_iter()
            .map(|(x, y)| self.location + self.rotation * Pos::new(x * half, y * half, 0.0))
            .collect();

        Mesh::new(self.name.clone(), vertices, vec![vec![0, 1, 2, 3]])
    }
}

/// Collects cutting planes once they have been used. Planes are dropped
/// unless intermediates are being kept, in which case they are hidden and
/// handed back to the caller.
#[derive(Debug, Default)]
pub struct Intermediates {
    keep: bool,
    planes: Vec<CuttingPlane>,
}

impl Intermediates {
    pub fn new(keep: bool) -> Self {
        Self {
            keep,
            planes: Vec::new(),
        }
    }

    pub fn dispose(&mut self, mut plane: CuttingPlane) {
        if self.keep {
            debug!("Hiding plane `{}`", plane.name());
            plane.hide();
            self.planes.push(plane);
        } else {
            debug!("Removing plane `{}`", plane.name());
        }
    }

    pub fn into_planes(self) -> Vec<CuttingPlane> {
        self.planes
    }
}

/// Twice the bounding diagonal, so the plane reaches past the target in every
/// direction whatever its orientation.
fn plane_size(target: &Mesh) -> f32 {
    target.diagonal() * 2.0
}
