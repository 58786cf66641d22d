// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Zero-mean / unit-variance normalization.

use super::scale_op::scale_linear;
use super::stats::{group_elements, mean_std, reduce_indices};
use crate::{AxisId, Tensor, TensorError};

/// Normalizes each group to zero mean and unit variance using statistics of
/// the tensor itself: `(x - mean) / (std + eps)`.
///
/// Statistics are computed over `reduce`. When `None`, every axis but the
/// batch axis is reduced, so each sample is normalized on its own.
pub fn zero_mean_unit_variance(
    tensor: &mut Tensor,
    reduce: Option<&[AxisId]>,
    eps: f32,
) -> Result<(), TensorError> {
    let reduce = reduce_indices(tensor, reduce)?;
    let groups = group_elements(tensor, &reduce);
    let stats: Vec<(f32, f32)> = groups.buckets(tensor).iter().map(|v| mean_std(v)).collect();

    for (v, &g) in tensor.data_mut().iter_mut().zip(&groups.ids) {
        let (mean, std) = stats[g];
        *v = (*v - mean) / (std + eps);
    }
    Ok(())
}

/// Normalizes with precomputed statistics: `(x - mean) / (std + eps)`.
///
/// `mean` and `std` follow the same length rules as
/// [`scale_linear`](super::scale_linear) for `along`.
pub fn normalize_fixed(
    tensor: &mut Tensor,
    mean: &[f32],
    std: &[f32],
    along: Option<&AxisId>,
    eps: f32,
) -> Result<(), TensorError> {
    if mean.len() != std.len() {
        return Err(TensorError::Numeric {
            op: "normalize_fixed",
            detail: format!("{} means but {} stds", mean.len(), std.len()),
        });
    }
    let gain: Vec<f32> = std.iter().map(|s| 1.0 / (s + eps)).collect();
    let offset: Vec<f32> = mean.iter().zip(&gain).map(|(m, g)| -m * g).collect();
    scale_linear(tensor, &gain, &offset, along)
}
