// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Grouped statistics shared by the normalization kernels.

use crate::{AxisId, Tensor, TensorError};

/// Assignment of every element (in logical order) to a reduction group.
pub(crate) struct Groups {
    /// Group id per element.
    pub ids: Vec<usize>,
    /// Number of distinct groups.
    pub count: usize,
}

impl Groups {
    /// Collects the element values of each group.
    pub fn buckets(&self, tensor: &Tensor) -> Vec<Vec<f32>> {
        let mut buckets = vec![Vec::new(); self.count];
        for (&v, &g) in tensor.data().iter().zip(&self.ids) {
            buckets[g].push(v);
        }
        buckets
    }
}

/// Resolves the axes to reduce over. `None` reduces over every axis except
/// the batch axis, so each sample of a batch gets its own statistics.
pub(crate) fn reduce_indices(
    tensor: &Tensor,
    reduce: Option<&[AxisId]>,
) -> Result<Vec<usize>, TensorError> {
    match reduce {
        None => Ok(tensor
            .axes()
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.is_batch())
            .map(|(d, _)| d)
            .collect()),
        Some(axes) => axes
            .iter()
            .map(|a| {
                tensor.axis_index(a).ok_or_else(|| TensorError::UnknownAxis {
                    axis: a.clone(),
                    axes: tensor.axes().to_vec(),
                })
            })
            .collect(),
    }
}

/// Groups elements by their coordinates on the axes that are *not* reduced.
pub(crate) fn group_elements(tensor: &Tensor, reduce: &[usize]) -> Groups {
    let dims = tensor.dims();
    let keep: Vec<usize> = (0..tensor.ndim()).filter(|d| !reduce.contains(d)).collect();
    let count = keep.iter().map(|&d| dims[d]).product();

    let ids = tensor
        .data()
        .indexed_iter()
        .map(|(idx, _)| keep.iter().fold(0, |id, &d| id * dims[d] + idx[d]))
        .collect();

    Groups { ids, count }
}

/// Computes the `p`-th percentile (0 to 100) of `values` with linear
/// interpolation between closest ranks.
///
/// Returns `None` for an empty slice. NaNs are ignored.
///
/// # Examples
/// ```
/// use tensor_core::ops::percentile;
/// assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0, 5.0], 50.0), Some(3.0));
/// assert_eq!(percentile(&[0.0, 10.0], 25.0), Some(2.5));
/// ```
pub fn percentile(values: &[f32], p: f64) -> Option<f32> {
    let mut sorted: Vec<f32> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Mean and population standard deviation.
pub(crate) fn mean_std(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean as f32, var.sqrt() as f32)
}
