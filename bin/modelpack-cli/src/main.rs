// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # modelpack
//!
//! Command-line interface for model packages.
//!
//! ## Usage
//! ```bash
//! # Build a verified package
//! modelpack build-package --manifest-template unet.json \
//!     --weights safetensors=unet.safetensors \
//!     --test-input raw.npy --test-output mask.npy --out ./unet
//!
//! # Certify it
//! modelpack test-package --package ./unet --decimals 4
//!
//! # Segment an image in 256-pixel tiles
//! modelpack predict --package ./unet --input cells.tif --output mask.tif --tile 256 --halo 32
//! ```

mod commands;

use clap::{Parser, Subcommand};
use commands::ShapeFitArgs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "modelpack",
    about = "Package, certify and run bioimage models",
    version,
    author
)]
struct Cli {
    /// Path to a TOML prediction configuration. Explicit flags take precedence.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble, verify and write a new package.
    BuildPackage {
        /// JSON file with the package metadata and tensor specifications.
        #[arg(long)]
        manifest_template: PathBuf,

        /// Weights as `format=path`; repeat for several formats.
        #[arg(long = "weights", required = true)]
        weights: Vec<String>,

        /// Test input, one per model input in order (npy or image).
        #[arg(long = "test-input", required = true)]
        test_inputs: Vec<PathBuf>,

        /// Expected output, one per model output in order.
        #[arg(long = "test-output", required = true)]
        test_outputs: Vec<PathBuf>,

        /// Destination directory; must not exist.
        #[arg(short, long)]
        out: PathBuf,

        /// Package the new one is derived from.
        #[arg(long)]
        parent: Option<PathBuf>,
    },

    /// Add weights of another format to an existing package.
    AddWeights {
        #[arg(short, long)]
        package: PathBuf,

        #[arg(short, long)]
        format: String,

        #[arg(short, long)]
        weights: PathBuf,
    },

    /// Convert a package's weights to another format and add them.
    ConvertWeights {
        #[arg(short, long)]
        package: PathBuf,

        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,
    },

    /// Run the certification checks on a package.
    TestPackage {
        #[arg(short, long)]
        package: PathBuf,

        /// Restrict to these formats (default: all shipped formats).
        #[arg(long = "weight-format")]
        weight_formats: Vec<String>,

        /// Decimal places the outputs must agree to.
        #[arg(long)]
        decimals: Option<u32>,

        /// Also write the report as JSON.
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Predict on a single image.
    Predict {
        #[arg(short, long)]
        package: PathBuf,

        /// Input file (npy, png or tif).
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (npy, png or tif).
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        fit: ShapeFitArgs,
    },

    /// Predict on every image in a directory.
    PredictBatch {
        #[arg(short, long)]
        package: PathBuf,

        /// Directory of input files.
        #[arg(long)]
        inputs: PathBuf,

        #[arg(long)]
        output_dir: PathBuf,

        /// Extension of the written outputs.
        #[arg(long, default_value = "npy")]
        output_extension: String,

        #[command(flatten)]
        fit: ShapeFitArgs,
    },

    /// Show a package's metadata, tensors and weights.
    Inspect {
        #[arg(short, long)]
        package: PathBuf,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::BuildPackage {
            manifest_template,
            weights,
            test_inputs,
            test_outputs,
            out,
            parent,
        } => commands::build::execute(
            &config,
            &manifest_template,
            &weights,
            &test_inputs,
            &test_outputs,
            &out,
            parent.as_deref(),
        ),
        Commands::AddWeights {
            package,
            format,
            weights,
        } => commands::weights::add(&config, &package, &format, &weights),
        Commands::ConvertWeights { package, from, to } => {
            commands::weights::convert(&config, &package, &from, &to)
        }
        Commands::TestPackage {
            package,
            weight_formats,
            decimals,
            json,
        } => {
            return commands::test::execute(
                &config,
                &package,
                &weight_formats,
                decimals,
                json.as_deref(),
            )
        }
        Commands::Predict {
            package,
            input,
            output,
            fit,
        } => commands::predict::single(&config, &package, &input, &output, &fit),
        Commands::PredictBatch {
            package,
            inputs,
            output_dir,
            output_extension,
            fit,
        } => commands::predict::batch(
            &config,
            &package,
            &inputs,
            &output_dir,
            &output_extension,
            &fit,
        ),
        Commands::Inspect { package } => commands::inspect::execute(&package),
    }?;
    Ok(ExitCode::SUCCESS)
}
