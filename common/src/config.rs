use std::fmt::{self, Display};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::preferences::Preferences;

/// Parameters for one run of the mold pipeline.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PipelineOptions {
    /// Distance down from the top of the mesh to search for the thickest
    /// cross-section.
    pub search_depth: f32,
    /// Number of intervals the search range is divided into. `samples + 1`
    /// heights are evaluated.
    pub samples: u32,

    pub use_manual: bool,
    pub manual_height: f32,
    pub manual_score: f32,

    /// Duplicate the target before any step runs and leave the caller's mesh
    /// untouched.
    pub operate_on_copy: bool,
    pub cut_in_half: bool,
    pub split_axis: SplitAxis,

    /// Overrides the process-wide preference when set.
    pub keep_intermediates: Option<bool>,
}

/// Axis plane used to split a finished shell into two halves.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SplitAxis {
    #[default]
    YZ,
    XZ,
    XY,
}

impl PipelineOptions {
    /// Default options with the search depth seeded from the user's
    /// preferences.
    pub fn from_preferences(preferences: &Preferences) -> Self {
        Self {
            search_depth: preferences.default_search_depth,
            ..Default::default()
        }
    }

    pub fn keep_intermediates(&self, preferences: &Preferences) -> bool {
        self.keep_intermediates
            .unwrap_or(preferences.keep_intermediates)
    }
}

impl SplitAxis {
    pub const ALL: [SplitAxis; 3] = [SplitAxis::YZ, SplitAxis::XZ, SplitAxis::XY];

    /// Normal of the splitting plane.
    pub fn normal(&self) -> Vector3<f32> {
        match self {
            SplitAxis::YZ => Vector3::x(),
            SplitAxis::XZ => Vector3::y(),
            SplitAxis::XY => Vector3::z(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SplitAxis::YZ => "YZ",
            SplitAxis::XZ => "XZ",
            SplitAxis::XY => "XY",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_uppercase().as_str() {
            "YZ" | "X" => SplitAxis::YZ,
            "XZ" | "Y" => SplitAxis::XZ,
            "XY" | "Z" => SplitAxis::XY,
            _ => return None,
        })
    }
}

impl Display for SplitAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            search_depth: 30.0,
            samples: 30,

            use_manual: false,
            manual_height: 0.0,
            manual_score: 0.0,

            operate_on_copy: false,
            cut_in_half: false,
            split_axis: SplitAxis::YZ,

            keep_intermediates: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_axis_normals() {
        assert_eq!(SplitAxis::YZ.normal(), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(SplitAxis::XZ.normal(), Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(SplitAxis::XY.normal(), Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn split_axis_names_round_trip() {
        for axis in SplitAxis::ALL {
            assert_eq!(SplitAxis::from_name(axis.name()), Some(axis));
        }
        assert_eq!(SplitAxis::from_name("xz"), Some(SplitAxis::XZ));
        assert_eq!(SplitAxis::from_name("diagonal"), None);
    }

    #[test]
    fn keep_intermediates_override() {
        let preferences = Preferences {
            keep_intermediates: true,
            ..Default::default()
        };

        let mut options = PipelineOptions::default();
        assert!(options.keep_intermediates(&preferences));

        options.keep_intermediates = Some(false);
        assert!(!options.keep_intermediates(&preferences));
    }

    #[test]
    fn options_seeded_from_preferences() {
        let preferences = Preferences {
            default_search_depth: 12.5,
            ..Default::default()
        };

        let options = PipelineOptions::from_preferences(&preferences);
        assert_eq!(options.search_depth, 12.5);
        assert_eq!(options.samples, 30);
    }

    #[test]
    fn partial_options_fill_defaults() {
        let options: PipelineOptions =
            toml::from_str("cut_in_half = true\nsplit_axis = \"XY\"").unwrap();
        assert!(options.cut_in_half);
        assert_eq!(options.split_axis, SplitAxis::XY);
        assert_eq!(options.search_depth, 30.0);
        assert_eq!(options.keep_intermediates, None);
    }
}
