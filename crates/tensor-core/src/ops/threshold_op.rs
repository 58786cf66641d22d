// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Thresholding kernels: binarize and clip.

use crate::{Tensor, TensorError};

/// Sets every element to `1.0` if it is strictly greater than `threshold`,
/// `0.0` otherwise.
pub fn binarize(tensor: &mut Tensor, threshold: f32) {
    tensor.map_inplace(|v| if v > threshold { 1.0 } else { 0.0 });
}

/// Clamps every element into `[min, max]`.
///
/// # Errors
/// Returns [`TensorError::Numeric`] if `min > max`.
pub fn clip(tensor: &mut Tensor, min: f32, max: f32) -> Result<(), TensorError> {
    if min > max {
        return Err(TensorError::Numeric {
            op: "clip",
            detail: format!("min {min} exceeds max {max}"),
        });
    }
    tensor.map_inplace(|v| v.clamp(min, max));
    Ok(())
}
