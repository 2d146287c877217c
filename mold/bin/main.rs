use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

use args::{suffixed, Args, Command};
use common::{
    config::PipelineOptions,
    preferences::{preferences, set_preferences, Preferences},
};
use mold::{
    boolean::PlaneClipper,
    format::{load_mesh, save_mesh},
    pipeline::{MoldGenerator, Shell},
};

mod args;

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new()
        .with_default(LevelFilter::OFF)
        .with_target("mold", level)
        .with_target("common", level);
    let format = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();

    let config_dir = args.config_dir();
    if let Some(dir) = &config_dir {
        set_preferences(Preferences::load_or_default(dir));
    }

    let mut generator = MoldGenerator::new(PlaneClipper);
    match args.command {
        Command::Find { mesh, search } => {
            let mesh = load_mesh(&mesh)?;
            let options = PipelineOptions {
                search_depth: search.search_depth(&preferences()),
                samples: search.samples,
                ..PipelineOptions::from_preferences(&preferences())
            };

            let slice = generator.find(Some(&mesh), &options)?;
            println!("height: {:.4}", slice.height);
            println!("score: {}", slice.score);
        }
        Command::Generate {
            mesh,
            output,
            search,
            manual_height,
            manual_score,
            split,
            keep_intermediates,
        } => {
            let mut mesh = load_mesh(&mesh)?;
            let options = PipelineOptions {
                search_depth: search.search_depth(&preferences()),
                samples: search.samples,
                use_manual: manual_height.is_some(),
                manual_height: manual_height.unwrap_or_default(),
                manual_score,
                cut_in_half: split.is_some(),
                split_axis: split.unwrap_or_default(),
                keep_intermediates: keep_intermediates.then_some(true),
                ..PipelineOptions::from_preferences(&preferences())
            };

            let result = generator.generate(Some(&mut mesh), &options)?;
            match &result.shell {
                Shell::Single(shell) => save_mesh(shell, &output)?,
                Shell::Split(pair) => {
                    save_mesh(&pair.a, &suffixed(&output, "_A"))?;
                    save_mesh(&pair.b, &suffixed(&output, "_B"))?;
                }
            }

            for plane in result.intermediates.iter() {
                let path = suffixed(&output, &format!("_{}", plane.name()));
                save_mesh(&plane.to_mesh(), &path)?;
            }

            info!(
                "Mold cut at z = {:.3} with score {}",
                result.slice.height, result.slice.score
            );
        }
        Command::Config {
            default_search_depth,
            keep_intermediates,
        } => {
            let dir = config_dir.context("No config directory available")?;
            let mut preferences = preferences();
            if let Some(depth) = default_search_depth {
                preferences.default_search_depth = depth;
            }
            if let Some(keep) = keep_intermediates {
                preferences.keep_intermediates = keep;
            }

            preferences.save(&dir)?;
            print_preferences(&preferences, &dir);
        }
    }

    Ok(())
}

fn print_preferences(preferences: &Preferences, dir: &Path) {
    println!("{}", dir.join("config.toml").display());
    println!("default_search_depth = {}", preferences.default_search_depth);
    println!("keep_intermediates = {}", preferences.keep_intermediates);
}
