//! Turns a closed mesh into a mold shell: the top is cut off at the thickest
//! cross-section near the top, the cut rim is extruded back up to the
//! original height and the result can be split into two halves.
//!
//! The entry points are [`pipeline::generate_mold`] and
//! [`pipeline::find_slice`], or [`pipeline::MoldGenerator`] to keep the last
//! found slice around between runs.

use nalgebra::Vector3;

pub mod boolean;
pub mod builder;
pub mod error;
pub mod extrude;
pub mod format;
pub mod half_edge;
pub mod mesh;
pub mod pipeline;
pub mod plane;
pub mod slice_finder;
pub mod split;

pub type Pos = Vector3<f32>;

pub use error::{MoldError, MoldResult};
pub use mesh::Mesh;
pub use pipeline::{find_slice, generate_mold, MoldGenerator, MoldOutput, Shell};
