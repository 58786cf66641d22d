// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for prediction, padding and tiling.

use resource_descr::WeightFormat;
use tensor_core::AxisId;

/// Errors that can occur while running a model.
#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    /// Input or output tensors do not satisfy the model's specification.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A tile specification cannot be executed for this model or tensor.
    #[error("invalid tiling: {0}")]
    InvalidTiling(String),

    /// A padding specification is malformed.
    #[error("invalid padding: {0}")]
    InvalidPadding(String),

    /// Fixed-mode padding asked for a size smaller than the input.
    #[error("cannot pad axis '{axis}' of size {size} down to {target}")]
    PaddingTooSmall {
        axis: AxisId,
        size: usize,
        target: usize,
    },

    /// Batch and channel axes are never padded.
    #[error("axis '{axis}' cannot be padded")]
    UnpaddableAxis { axis: AxisId },

    /// The package does not ship the requested weight format.
    #[error("package has no '{format}' weights")]
    WeightFormatUnavailable { format: WeightFormat },

    /// The engine cannot execute the requested weight format.
    #[error("engine '{engine}' does not support '{format}' weights")]
    UnsupportedFormat { engine: String, format: WeightFormat },

    /// No shipped weight format is both prioritized and supported.
    #[error("engine '{engine}' supports none of the shipped weight formats ({available})")]
    NoUsableWeights { engine: String, available: String },

    /// The inference engine failed.
    #[error("engine '{engine}': {detail}")]
    Engine { engine: String, detail: String },

    /// A processing step failed on a tensor.
    #[error("{step} on tensor '{tensor}' failed: {source}")]
    Processing {
        tensor: String,
        step: &'static str,
        #[source]
        source: tensor_core::TensorError,
    },

    /// The operation was cancelled through its token.
    #[error("cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Descriptor(#[from] resource_descr::DescriptorError),

    #[error(transparent)]
    Tensor(#[from] tensor_core::TensorError),
}
