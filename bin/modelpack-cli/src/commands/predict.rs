// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `modelpack predict` and `modelpack predict-batch`.
//!
//! Inputs are fitted to the model in one of four ways:
//! ```text
//! --pad-divisor n      pad spatial axes to a multiple of n, crop outputs
//! --tile n [--halo h]  tile with interior n and context h
//! --auto-tile          tile with a size derived from the model
//! (none)               pad to the smallest size the model admits
//! ```

use super::{load_package, ShapeFitArgs};
use anyhow::{bail, Context};
use prediction::{
    predict_with_padding, tile_apply, tile_apply_parallel, CancellationToken, ConvolutionEngine,
    PaddingSpec, PipelineOptions, PredictionConfig, PredictionPipeline, TileSpec,
};
use resource_descr::{ResourceDescriptor, TensorSpec};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tensor_core::io::{is_image_path, read_tensor_as, write_image_channels, write_npy_tensor};
use tensor_core::{FillMode, Tensor};

enum Strategy {
    PadToDivisor(usize),
    PadToModel,
    Tile(Option<TileSpec>),
}

/// Prediction settings resolved from the package, config and flags.
struct Runner<'a> {
    descriptor: &'a ResourceDescriptor,
    engine: ConvolutionEngine,
    options: PipelineOptions,
    strategy: Strategy,
    fill: FillMode,
    parallel: bool,
    workers: usize,
    token: CancellationToken,
}

impl<'a> Runner<'a> {
    fn new(
        descriptor: &'a ResourceDescriptor,
        config: &PredictionConfig,
        fit: &ShapeFitArgs,
    ) -> anyhow::Result<Self> {
        if descriptor.inputs().len() != 1 {
            bail!(
                "'{}' has {} inputs; the command line supports single-input models",
                descriptor.name(),
                descriptor.inputs().len()
            );
        }

        let mut config = config.clone();
        if fit.tile.is_some() {
            config.tile = fit.tile;
        }
        if fit.halo.is_some() {
            config.halo = fit.halo;
        }
        if fit.parallel {
            config.parallel_tiles = true;
        }
        let fill = match &fit.fill {
            Some(s) => FillMode::from_str_loose(s)
                .with_context(|| format!("unknown fill mode '{s}' (expected zero or edge)"))?,
            None => config.fill,
        };

        let strategy = if let Some(divisor) = fit.pad_divisor {
            Strategy::PadToDivisor(divisor)
        } else if fit.auto_tile {
            Strategy::Tile(None)
        } else if config.tile.is_some() {
            Strategy::Tile(uniform_tiling(descriptor, &config))
        } else {
            Strategy::PadToModel
        };

        Ok(Self {
            descriptor,
            engine: ConvolutionEngine::default(),
            options: config.pipeline_options()?,
            strategy,
            fill,
            parallel: config.parallel_tiles,
            workers: config.resolve_workers(),
            token: CancellationToken::new(),
        })
    }

    fn input_spec(&self) -> &TensorSpec {
        &self.descriptor.inputs()[0]
    }

    fn open(&self) -> anyhow::Result<PredictionPipeline<'a>> {
        Ok(PredictionPipeline::open(self.descriptor, &self.engine, &self.options)?)
    }

    fn read(&self, path: &Path) -> anyhow::Result<Tensor> {
        read_tensor_as(path, &self.input_spec().axis_ids())
            .with_context(|| format!("failed to read '{}'", path.display()))
    }

    fn predict(
        &self,
        pipeline: &mut PredictionPipeline<'_>,
        tensor: &Tensor,
    ) -> anyhow::Result<Vec<Tensor>> {
        let outputs = match &self.strategy {
            Strategy::PadToDivisor(divisor) => {
                if *divisor == 0 {
                    bail!("--pad-divisor must be positive");
                }
                let spec = PaddingSpec::dynamic(tensor, *divisor, self.fill);
                predict_with_padding(pipeline, tensor, &spec)?
            }
            Strategy::PadToModel => {
                let spec = PaddingSpec::for_input(self.input_spec(), tensor, self.fill)?;
                predict_with_padding(pipeline, tensor, &spec)?
            }
            Strategy::Tile(spec) if self.parallel => vec![tile_apply_parallel(
                self.descriptor,
                &self.engine,
                &self.options,
                tensor,
                spec.as_ref(),
                &self.token,
                self.workers,
            )?],
            Strategy::Tile(spec) => {
                vec![tile_apply(pipeline, tensor, spec.as_ref(), &self.token)?]
            }
        };
        Ok(outputs)
    }

    /// Writes `outputs` next to `path`, suffixing the output name when the
    /// model has several.
    fn write(&self, path: &Path, outputs: &[Tensor]) -> anyhow::Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for (spec, tensor) in self.descriptor.outputs().iter().zip(outputs) {
            let target = if outputs.len() == 1 {
                path.to_path_buf()
            } else {
                suffixed(path, &spec.name)
            };
            if is_image_path(&target) {
                written.extend(write_image_channels(&target, tensor)?);
            } else {
                write_npy_tensor(&target, tensor)?;
                written.push(target);
            }
        }
        Ok(written)
    }
}

/// Tiles every paddable axis of the input with the configured tile size.
fn uniform_tiling(descriptor: &ResourceDescriptor, config: &PredictionConfig) -> Option<TileSpec> {
    let input = descriptor.inputs().first()?;
    let output = descriptor.outputs().first()?;
    let axes: Vec<_> = input
        .axes
        .iter()
        .filter(|a| a.kind.is_paddable())
        .map(|a| a.id.clone())
        .collect();
    config.tile_spec(&axes, |axis| output.halo(axis))
}

fn suffixed(path: &Path, name: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => path.with_file_name(format!("{stem}_{name}.{ext}")),
        None => path.with_file_name(format!("{stem}_{name}")),
    }
}

pub fn single(
    config: &PredictionConfig,
    package: &Path,
    input: &Path,
    output: &Path,
    fit: &ShapeFitArgs,
) -> anyhow::Result<()> {
    let descriptor = load_package(package)?;
    let runner = Runner::new(&descriptor, config, fit)?;
    let mut pipeline = runner.open()?;

    let tensor = runner.read(input)?;
    let start = Instant::now();
    let outputs = runner.predict(&mut pipeline, &tensor)?;
    let written = runner.write(output, &outputs)?;

    println!(
        "  Predicted {:?} with '{}' ({}) in {:.2}ms",
        tensor.dims(),
        descriptor.name(),
        pipeline.weight_format(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    for path in &written {
        println!("   -> {}", path.display());
    }
    if let Some(metrics) = pipeline.metrics() {
        println!("  {}", metrics.summary());
    }
    pipeline.close();
    Ok(())
}

pub fn batch(
    config: &PredictionConfig,
    package: &Path,
    inputs: &Path,
    output_dir: &Path,
    output_extension: &str,
    fit: &ShapeFitArgs,
) -> anyhow::Result<()> {
    let descriptor = load_package(package)?;
    let runner = Runner::new(&descriptor, config, fit)?;

    let files = list_inputs(inputs)?;
    if files.is_empty() {
        bail!("no npy or image files in '{}'", inputs.display());
    }
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create '{}'", output_dir.display()))?;

    let mut pipeline = runner.open()?;
    let mut failed = 0usize;
    for (i, file) in files.iter().enumerate() {
        runner.token.check()?;
        let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
        let target = output_dir.join(format!("{stem}.{output_extension}"));

        let result = runner
            .read(file)
            .and_then(|tensor| runner.predict(&mut pipeline, &tensor))
            .and_then(|outputs| runner.write(&target, &outputs));
        match result {
            Ok(_) => println!("  [{}/{}] {}", i + 1, files.len(), target.display()),
            Err(e) => {
                failed += 1;
                tracing::error!("{}: {e:#}", file.display());
                println!("  [{}/{}] {} FAILED", i + 1, files.len(), file.display());
            }
        }
    }

    if let Some(metrics) = pipeline.metrics() {
        println!("  {}", metrics.summary());
    }
    pipeline.close();

    if failed > 0 {
        bail!("{failed} of {} inputs failed", files.len());
    }
    Ok(())
}

fn list_inputs(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("failed to list '{}'", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_npy = path.extension().and_then(|e| e.to_str()) == Some("npy");
        if path.is_file() && (is_npy || is_image_path(&path)) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
