// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # prediction
//!
//! Runs packaged models on tensors.
//!
//! A [`PredictionPipeline`] takes a loaded `ResourceDescriptor` and an
//! [`InferenceEngine`], picks a weight format, and then:
//! - checks inputs against the declared tensor specifications,
//! - runs each input's preprocessing,
//! - calls the engine session once,
//! - runs each output's postprocessing.
//!
//! # Shape fitting
//! Inputs that do not have an admissible size can be padded
//! ([`padding`]) or, when too large, split into overlapping tiles
//! ([`tiling`]). Tiles may run on a rayon worker pool, one engine session
//! per worker.
//!
//! # Engines
//! Concrete backends live behind [`InferenceEngine`]. The crate ships
//! [`ConvolutionEngine`], a CPU reference backend for single-layer
//! convolution weights.

mod cancel;
mod config;
mod conv_engine;
mod engine;
mod error;
mod metrics;
pub mod padding;
mod pipeline;
pub mod processing;
pub mod tiling;
mod tolerance;

pub use cancel::CancellationToken;
pub use config::PredictionConfig;
pub use conv_engine::{ConvolutionEngine, ConvolutionSession};
pub use engine::{Device, EngineSession, InferenceEngine};
pub use error::PredictionError;
pub use metrics::{CallMetrics, PredictionMetrics};
pub use padding::{pad, predict_with_padding, CropDescriptor, PadMode, PaddingSpec};
pub use pipeline::{with_pipeline, PipelineOptions, PredictionPipeline};
pub use tiling::{plan_axis, tile_apply, tile_apply_parallel, AxisWindow, Tile, TilePlan, TileSpec};
pub use tolerance::Tolerance;
