// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor operations.

use crate::{AxisId, Shape};

/// Errors that can occur during tensor operations.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The number of axis ids does not match the array rank.
    #[error("tensor has {rank} dimensions but {axes} axis ids")]
    RankMismatch { rank: usize, axes: usize },

    /// The provided buffer size does not match the expected size for the shape.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Two tensors have incompatible shapes for the requested operation.
    #[error("incompatible shapes for {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// An axis id is duplicated or missing.
    #[error("axis error in {op}: {detail}")]
    Axis { op: &'static str, detail: String },

    /// The requested axis does not exist on the tensor.
    #[error("axis '{axis}' not found in tensor with axes {axes:?}")]
    UnknownAxis { axis: AxisId, axes: Vec<AxisId> },

    /// A region lies outside of the tensor bounds.
    #[error("region out of bounds in {op}: {detail}")]
    OutOfBounds { op: &'static str, detail: String },

    /// A numeric computation failed (e.g., NaN or invalid parameter).
    #[error("numeric error in {op}: {detail}")]
    Numeric { op: &'static str, detail: String },

    /// Reading or writing a `.npy` file failed.
    #[error("npy i/o error for '{path}': {detail}")]
    Npy { path: String, detail: String },

    /// Reading or writing a raster image failed.
    #[error("image i/o error for '{path}': {detail}")]
    Image { path: String, detail: String },
}
