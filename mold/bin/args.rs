use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use common::{config::SplitAxis, preferences::Preferences};

#[derive(Debug, Parser)]
/// Mold shell generator command line interface.
pub struct Args {
    #[arg(long, global = true)]
    /// Directory holding config.toml. Defaults to the user's config
    /// directory.
    pub config: Option<PathBuf>,
    #[arg(short, long, global = true)]
    /// Log everything, not just progress.
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the height and score of the thickest cross-section near the top
    /// of a mesh.
    Find {
        /// Path to a .stl or .obj file.
        mesh: PathBuf,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Cut, extrude and optionally split a mesh into a mold shell.
    Generate {
        /// Path to a .stl or .obj file.
        mesh: PathBuf,
        #[arg(short, long)]
        /// File to save the shell to (.stl or .obj). Split shells are saved
        /// with `_A` and `_B` appended to the file stem.
        output: PathBuf,

        #[command(flatten)]
        search: SearchArgs,
        #[arg(long)]
        /// Cut at this height instead of searching for one.
        manual_height: Option<f32>,
        #[arg(long, default_value_t = 0.0)]
        /// Score reported alongside a manual height.
        manual_score: f32,

        #[arg(long, value_parser = split_axis_parser)]
        /// Split the shell in two along this axis plane (YZ, XZ or XY).
        split: Option<SplitAxis>,
        #[arg(long)]
        /// Also save the cutting planes next to the output.
        keep_intermediates: bool,
    },
    /// Update the saved preferences.
    Config {
        #[arg(long)]
        /// Search depth used when --search-depth is not given.
        default_search_depth: Option<f32>,
        #[arg(long)]
        keep_intermediates: Option<bool>,
    },
}

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    #[arg(long)]
    /// Distance down from the top to search. Defaults to the saved
    /// preference.
    pub search_depth: Option<f32>,
    #[arg(long, default_value_t = 30)]
    /// Number of intervals the search range is divided into.
    pub samples: u32,
}

impl Args {
    pub fn config_dir(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| dirs::config_dir().map(|x| x.join("mold")))
    }
}

impl SearchArgs {
    pub fn search_depth(&self, preferences: &Preferences) -> f32 {
        self.search_depth
            .unwrap_or(preferences.default_search_depth)
    }
}

/// `out.stl` with `suffix` appended to the file stem.
pub fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let mut name = format!("{stem}{suffix}");
    if let Some(ext) = path.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    path.with_file_name(name)
}

fn split_axis_parser(raw: &str) -> Result<SplitAxis, String> {
    SplitAxis::from_name(raw).ok_or_else(|| format!("unknown split axis `{raw}`"))
}
