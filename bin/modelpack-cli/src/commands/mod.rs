// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CLI command implementations and shared helpers.

pub mod build;
pub mod inspect;
pub mod predict;
pub mod weights;

use anyhow::Context;
use prediction::PredictionConfig;
use resource_descr::{ResourceDescriptor, WeightFormat};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialises the tracing subscriber based on verbosity level.
///
/// `RUST_LOG` takes precedence when set.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the prediction configuration, or the defaults without a file.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PredictionConfig> {
    match path {
        Some(path) => {
            let config = PredictionConfig::from_file(path)?;
            tracing::info!("loaded config from {}", path.display());
            Ok(config)
        }
        None => Ok(PredictionConfig::default()),
    }
}

pub fn parse_format(tag: &str) -> anyhow::Result<WeightFormat> {
    tag.parse::<WeightFormat>().map_err(anyhow::Error::msg)
}

pub fn load_package(path: &Path) -> anyhow::Result<ResourceDescriptor> {
    ResourceDescriptor::load(path)
        .with_context(|| format!("failed to load package from '{}'", path.display()))
}

/// How `predict` and `predict-batch` fit inputs to the model.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ShapeFitArgs {
    /// Pad every spatial axis up to a multiple of this divisor.
    #[arg(long, conflicts_with_all = ["tile", "auto_tile"])]
    pub pad_divisor: Option<usize>,

    /// Tile interior extent per spatial axis.
    #[arg(long)]
    pub tile: Option<usize>,

    /// Context added around every tile (default: the model's declared halo).
    #[arg(long, requires = "tile")]
    pub halo: Option<usize>,

    /// Tile with a size derived from the model's constraints.
    #[arg(long, conflicts_with = "tile")]
    pub auto_tile: bool,

    /// Process tiles on several threads.
    #[arg(long)]
    pub parallel: bool,

    /// Padding fill: zero or edge.
    #[arg(long)]
    pub fill: Option<String>,
}

/// Truncates a string to `max_len` with ellipsis if needed.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
