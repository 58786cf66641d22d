// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tiled prediction for inputs larger than a model can take at once.
//!
//! Each tiled axis is cut into *interiors* of `tile` elements that exactly
//! cover the axis. Every interior is run inside a *window* extended by
//! `halo` on both sides, so the model sees enough context for the interior
//! to match a full-image run. Windows at the borders are shifted inward
//! rather than shrunk, so every window has the same length.
//!
//! ```text
//! axis  0                96   128  160              256
//!       |----------------|----|----|----------------|
//! tile0 [interior 0..128 ]
//!       [window 0..160        ]
//! tile1                       [interior 128..256    ]
//!                        [window 96..256            ]
//! ```

use crate::padding::{pad, CropDescriptor, PadMode, PaddingSpec};
use crate::processing::preprocess_inputs;
use crate::{
    CancellationToken, InferenceEngine, PipelineOptions, PredictionError, PredictionPipeline,
};
use rayon::prelude::*;
use resource_descr::{AxisSize, ResourceDescriptor};
use std::collections::BTreeMap;
use std::ops::Range;
use tensor_core::{AxisId, FillMode, Tensor};

/// Largest window derived for an axis when no tile size is given.
pub const DEFAULT_TILE_EXTENT: usize = 256;

/// Tile and halo sizes per tiled axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileSpec {
    pub tile: BTreeMap<AxisId, usize>,
    pub halo: BTreeMap<AxisId, usize>,
}

impl TileSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_axis(mut self, axis: impl Into<AxisId>, tile: usize, halo: usize) -> Self {
        let axis = axis.into();
        self.tile.insert(axis.clone(), tile);
        self.halo.insert(axis, halo);
        self
    }

    /// The same tile and halo on every axis in `axes`.
    pub fn uniform(axes: &[AxisId], tile: usize, halo: usize) -> Self {
        axes.iter()
            .fold(Self::new(), |spec, axis| spec.with_axis(axis.clone(), tile, halo))
    }

    pub fn halo_of(&self, axis: &AxisId) -> usize {
        self.halo.get(axis).copied().unwrap_or(0)
    }

    /// Window length on `axis`, if it is tiled.
    pub fn window_of(&self, axis: &AxisId) -> Option<usize> {
        self.tile.get(axis).map(|t| t + 2 * self.halo_of(axis))
    }

    /// Derives a tiling from the model's constraints.
    ///
    /// Every spatial or time axis of the input is tiled. Its halo is the
    /// halo declared on the first output, and its window is the smallest
    /// admissible input size that is at least `min(len, 256)` and leaves a
    /// tile larger than twice the halo.
    pub fn for_model(
        descriptor: &ResourceDescriptor,
        tensor: &Tensor,
    ) -> Result<Self, PredictionError> {
        let (input, output) = single_io(descriptor)?;
        let mut spec = Self::new();
        for axis in input.axes.iter().filter(|a| a.kind.is_paddable()) {
            if matches!(axis.size, AxisSize::Reference { .. }) {
                continue;
            }
            let len = tensor.size_of(&axis.id).ok_or_else(|| {
                PredictionError::ShapeMismatch(format!("tensor has no axis '{}'", axis.id))
            })?;
            let halo = output.halo(&axis.id);
            let wanted = len.min(DEFAULT_TILE_EXTENT).max(4 * halo + 1);
            let window = axis.size.smallest_valid_at_least(wanted).ok_or_else(|| {
                PredictionError::InvalidTiling(format!(
                    "axis '{}' admits no window of at least {wanted} ({})",
                    axis.id, axis.size
                ))
            })?;
            if window <= 4 * halo {
                return Err(PredictionError::InvalidTiling(format!(
                    "axis '{}': window {window} leaves no interior for halo {halo}",
                    axis.id
                )));
            }
            spec = spec.with_axis(axis.id.clone(), window - 2 * halo, halo);
        }
        Ok(spec)
    }
}

/// One tile's extent on one axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisWindow {
    /// Region fed to the model.
    pub window: Range<usize>,
    /// Region of the result taken from this tile.
    pub interior: Range<usize>,
}

/// Splits an axis of length `len` into tiles.
///
/// Interiors step by `tile` from 0 and exactly cover `[0, len)`. Windows are
/// `tile + 2 * halo` long and shifted inward at the borders.
///
/// # Errors
/// [`PredictionError::InvalidTiling`] if `tile` is zero, if `2 * halo >=
/// tile`, or if the axis is shorter than one window.
pub fn plan_axis(len: usize, tile: usize, halo: usize) -> Result<Vec<AxisWindow>, PredictionError> {
    if tile == 0 {
        return Err(PredictionError::InvalidTiling("tile size must be positive".into()));
    }
    if 2 * halo >= tile {
        return Err(PredictionError::InvalidTiling(format!(
            "halo {halo} must be less than half the tile size {tile}"
        )));
    }
    let window = tile + 2 * halo;
    if len < window {
        return Err(PredictionError::InvalidTiling(format!(
            "axis of length {len} is shorter than the window {window}"
        )));
    }

    Ok((0..len)
        .step_by(tile)
        .map(|start| {
            let end = (start + tile).min(len);
            let window_start = start.saturating_sub(halo).min(len - window);
            AxisWindow {
                window: window_start..window_start + window,
                interior: start..end,
            }
        })
        .collect())
}

/// One tile across all axes of a tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub window: Vec<Range<usize>>,
    pub interior: Vec<Range<usize>>,
}

/// The cartesian product of per-axis windows.
#[derive(Debug, Clone)]
pub struct TilePlan {
    axes: Vec<AxisId>,
    per_axis: Vec<Vec<AxisWindow>>,
}

impl TilePlan {
    /// Plans `spec` over a tensor with the given layout. Untiled axes are
    /// covered by a single window.
    pub fn new(axes: &[AxisId], dims: &[usize], spec: &TileSpec) -> Result<Self, PredictionError> {
        if let Some(unknown) = spec.tile.keys().find(|a| !axes.contains(a)) {
            return Err(PredictionError::InvalidTiling(format!(
                "tiled axis '{unknown}' is not on the tensor ({axes:?})"
            )));
        }
        let per_axis = axes
            .iter()
            .zip(dims)
            .map(|(axis, &len)| match spec.tile.get(axis) {
                Some(&tile) => plan_axis(len, tile, spec.halo_of(axis)),
                None => Ok(vec![AxisWindow {
                    window: 0..len,
                    interior: 0..len,
                }]),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            axes: axes.to_vec(),
            per_axis,
        })
    }

    pub fn axes(&self) -> &[AxisId] {
        &self.axes
    }

    pub fn len(&self) -> usize {
        self.per_axis.iter().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All tiles, last axis varying fastest.
    pub fn tiles(&self) -> Vec<Tile> {
        let mut tiles = Vec::with_capacity(self.len());
        let mut index = vec![0usize; self.per_axis.len()];
        for _ in 0..self.len() {
            let (window, interior) = self
                .per_axis
                .iter()
                .zip(&index)
                .map(|(windows, &i)| (windows[i].window.clone(), windows[i].interior.clone()))
                .unzip();
            tiles.push(Tile { window, interior });

            for d in (0..index.len()).rev() {
                index[d] += 1;
                if index[d] < self.per_axis[d].len() {
                    break;
                }
                index[d] = 0;
            }
        }
        tiles
    }
}

/// Runs a single-input model tile by tile and assembles the first output.
///
/// Preprocessing runs once on the whole input, so statistics such as
/// per-sample mean or percentiles match a full-image run. Each window then
/// goes through the engine and postprocessing only.
///
/// Without a spec the tiling is derived with [`TileSpec::for_model`]. Axes
/// shorter than one window are edge-padded to the window length after
/// preprocessing; the padding is cropped from the result. Cancellation is
/// checked before every tile.
pub fn tile_apply(
    pipeline: &mut PredictionPipeline<'_>,
    tensor: &Tensor,
    spec: Option<&TileSpec>,
    token: &CancellationToken,
) -> Result<Tensor, PredictionError> {
    let prepared = Prepared::new(pipeline.descriptor(), tensor, spec)?;
    let tiles = prepared.plan.tiles();
    tracing::info!(
        "tiling '{}' input {:?} into {} tiles",
        pipeline.descriptor().name(),
        tensor.dims(),
        tiles.len()
    );

    let mut assembler = Assembler::new(&prepared);
    for tile in &tiles {
        token.check()?;
        let output = prepared.run_tile(pipeline, tile)?;
        assembler.place(tile, &output)?;
    }
    assembler.finish()
}

/// Like [`tile_apply`], with tiles spread over `workers` threads.
///
/// Every worker opens its own pipeline. Tile results are assembled in plan
/// order, so the output equals the sequential one.
pub fn tile_apply_parallel(
    descriptor: &ResourceDescriptor,
    engine: &dyn InferenceEngine,
    options: &PipelineOptions,
    tensor: &Tensor,
    spec: Option<&TileSpec>,
    token: &CancellationToken,
    workers: usize,
) -> Result<Tensor, PredictionError> {
    let prepared = Prepared::new(descriptor, tensor, spec)?;
    let tiles = prepared.plan.tiles();
    tracing::info!(
        "tiling '{}' input {:?} into {} tiles on {} workers",
        descriptor.name(),
        tensor.dims(),
        tiles.len(),
        workers
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| PredictionError::Config(format!("cannot start tile workers: {e}")))?;

    let outputs: Vec<Result<Tensor, PredictionError>> = pool.install(|| {
        tiles
            .par_iter()
            .map_init(
                || PredictionPipeline::open(descriptor, engine, options),
                |pipeline, tile| {
                    token.check()?;
                    match pipeline {
                        Ok(pipeline) => prepared.run_tile(pipeline, tile),
                        Err(e) => Err(PredictionError::Engine {
                            engine: engine.name().to_string(),
                            detail: format!("worker could not open a pipeline: {e}"),
                        }),
                    }
                },
            )
            .collect()
    });

    let mut assembler = Assembler::new(&prepared);
    for (tile, output) in tiles.iter().zip(outputs) {
        assembler.place(tile, &output?)?;
    }
    assembler.finish()
}

/// A validated tiling of an input, ready to run.
struct Prepared {
    padded: Tensor,
    crop: CropDescriptor,
    spec: TileSpec,
    plan: TilePlan,
}

impl Prepared {
    fn new(
        descriptor: &ResourceDescriptor,
        tensor: &Tensor,
        spec: Option<&TileSpec>,
    ) -> Result<Self, PredictionError> {
        let (input, output) = single_io(descriptor)?;
        let spec = match spec {
            Some(spec) => spec.clone(),
            None => TileSpec::for_model(descriptor, tensor)?,
        };

        let mut padding = PaddingSpec::new(FillMode::Edge);
        let mut effective = TileSpec::new();
        for (axis, &tile) in &spec.tile {
            let halo = spec.halo_of(axis);
            if tile == 0 || 2 * halo >= tile {
                return Err(PredictionError::InvalidTiling(format!(
                    "axis '{axis}': tile {tile} must exceed twice the halo {halo}"
                )));
            }
            let window = tile + 2 * halo;
            let declared = input.axis(axis).ok_or_else(|| {
                PredictionError::InvalidTiling(format!(
                    "'{}' has no axis '{axis}' to tile",
                    input.name
                ))
            })?;
            if !declared.kind.is_paddable() {
                return Err(PredictionError::InvalidTiling(format!(
                    "{} axis '{axis}' cannot be tiled",
                    declared.kind.as_str()
                )));
            }
            if !declared.size.is_valid(window) {
                return Err(PredictionError::InvalidTiling(format!(
                    "window {window} on axis '{axis}' is not a valid input size ({})",
                    declared.size
                )));
            }
            let len = tensor.size_of(axis).ok_or_else(|| {
                PredictionError::ShapeMismatch(format!("tensor has no axis '{axis}'"))
            })?;

            // An axis that fits in one window runs as a single tile.
            if len <= window {
                if len < window {
                    padding = padding.with_axis(axis.clone(), PadMode::Fixed(window));
                }
                effective = effective.with_axis(axis.clone(), window, 0);
                continue;
            }

            let required = output.halo(axis);
            if halo < required {
                tracing::warn!(
                    "halo {} on axis '{}' is smaller than the model's declared halo {}; \
                     tile borders may differ from a full-image run",
                    halo,
                    axis,
                    required
                );
            }
            effective = effective.with_axis(axis.clone(), tile, halo);
        }
        let spec = effective;

        let normalized = preprocess_inputs(descriptor, std::slice::from_ref(tensor))?
            .into_iter()
            .next()
            .ok_or_else(|| PredictionError::ShapeMismatch("model declares no input".into()))?;
        let (padded, crop) = pad(&normalized, &padding)?;
        let plan = TilePlan::new(padded.axes(), padded.dims(), &spec)?;
        Ok(Self {
            padded,
            crop,
            spec,
            plan,
        })
    }

    fn run_tile(
        &self,
        pipeline: &mut PredictionPipeline<'_>,
        tile: &Tile,
    ) -> Result<Tensor, PredictionError> {
        let window = self.padded.slice(&tile.window)?;
        pipeline
            .apply_preprocessed(&[window])?
            .into_iter()
            .next()
            .ok_or_else(|| PredictionError::ShapeMismatch("model produced no output".into()))
    }
}

/// Copies tile interiors into the output buffer.
struct Assembler<'p> {
    prepared: &'p Prepared,
    buffer: Option<Tensor>,
    /// For each output axis, its index in the padded input if tiled.
    tiled: Vec<Option<usize>>,
}

impl<'p> Assembler<'p> {
    fn new(prepared: &'p Prepared) -> Self {
        Self {
            prepared,
            buffer: None,
            tiled: Vec::new(),
        }
    }

    fn place(&mut self, tile: &Tile, output: &Tensor) -> Result<(), PredictionError> {
        if self.buffer.is_none() {
            self.allocate(tile, output)?;
        }

        let mut offsets = Vec::with_capacity(output.ndim());
        let mut local = Vec::with_capacity(output.ndim());
        for (d, tiled) in self.tiled.iter().enumerate() {
            match tiled {
                Some(i) => {
                    let (window, interior) = (&tile.window[*i], &tile.interior[*i]);
                    if output.dims()[d] != window.len() {
                        return Err(PredictionError::InvalidTiling(format!(
                            "tile output axis '{}' has size {}, window has {}",
                            output.axes()[d],
                            output.dims()[d],
                            window.len()
                        )));
                    }
                    offsets.push(interior.start);
                    local.push(interior.start - window.start..interior.end - window.start);
                }
                None => {
                    offsets.push(0);
                    local.push(0..output.dims()[d]);
                }
            }
        }

        let interior = output.slice(&local)?;
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.assign(&offsets, &interior)?;
        }
        Ok(())
    }

    fn allocate(&mut self, tile: &Tile, output: &Tensor) -> Result<(), PredictionError> {
        let plan = &self.prepared.plan;
        let mut dims = Vec::with_capacity(output.ndim());
        self.tiled.clear();
        for (axis, &n) in output.axes().iter().zip(output.dims()) {
            let index = plan.axes().iter().position(|a| a == axis);
            match index.filter(|_| self.prepared.spec.tile.contains_key(axis)) {
                Some(i) => {
                    if n != tile.window[i].len() {
                        return Err(PredictionError::InvalidTiling(format!(
                            "output axis '{axis}' has size {n} for a window of {}; \
                             only outputs matching the input extent can be tiled",
                            tile.window[i].len()
                        )));
                    }
                    dims.push(self.prepared.padded.dims()[i]);
                    self.tiled.push(Some(i));
                }
                None => {
                    dims.push(n);
                    self.tiled.push(None);
                }
            }
        }
        for axis in self.prepared.spec.tile.keys() {
            if !output.axes().contains(axis) {
                return Err(PredictionError::InvalidTiling(format!(
                    "tiled axis '{axis}' is missing from the output"
                )));
            }
        }
        self.buffer = Some(Tensor::zeros(output.axes().to_vec(), &dims)?);
        Ok(())
    }

    fn finish(self) -> Result<Tensor, PredictionError> {
        let buffer = self
            .buffer
            .ok_or_else(|| PredictionError::InvalidTiling("tiling produced no tiles".into()))?;
        self.prepared.crop.crop(&buffer)
    }
}

fn single_io(
    descriptor: &ResourceDescriptor,
) -> Result<(&resource_descr::TensorSpec, &resource_descr::TensorSpec), PredictionError> {
    match (descriptor.inputs(), descriptor.outputs()) {
        ([input], [output, ..]) => Ok((input, output)),
        (inputs, _) => Err(PredictionError::InvalidTiling(format!(
            "tiling needs a single-input model, '{}' has {} inputs",
            descriptor.name(),
            inputs.len()
        ))),
    }
}
