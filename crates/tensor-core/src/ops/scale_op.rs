// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Linear and percentile-range scaling.

use super::stats::{group_elements, percentile, reduce_indices};
use crate::{AxisId, Tensor, TensorError};
use ndarray::Axis;

/// Computes `x * gain + offset`.
///
/// With `along = None`, `gain` and `offset` must each hold one value. With
/// `along = Some(axis)`, each must hold either one value or one value per
/// index of `axis` (e.g. a per-channel gain).
///
/// # Errors
/// Returns [`TensorError::UnknownAxis`] if `along` is not on the tensor and
/// [`TensorError::Numeric`] if the parameter lengths do not fit.
pub fn scale_linear(
    tensor: &mut Tensor,
    gain: &[f32],
    offset: &[f32],
    along: Option<&AxisId>,
) -> Result<(), TensorError> {
    match along {
        None => {
            let (g, o) = (single(gain, "gain")?, single(offset, "offset")?);
            tensor.map_inplace(|v| v * g + o);
        }
        Some(axis) => {
            let index = tensor.axis_index(axis).ok_or_else(|| TensorError::UnknownAxis {
                axis: axis.clone(),
                axes: tensor.axes().to_vec(),
            })?;
            let len = tensor.dims()[index];
            let gains = broadcast(gain, len, "gain")?;
            let offsets = broadcast(offset, len, "offset")?;
            for (i, mut lane) in tensor.data_mut().axis_iter_mut(Axis(index)).enumerate() {
                let (g, o) = (gains[i], offsets[i]);
                lane.mapv_inplace(|v| v * g + o);
            }
        }
    }
    Ok(())
}

/// Rescales each group so that its `min_percentile` maps to 0 and its
/// `max_percentile` maps to 1: `(x - lo) / (hi - lo + eps)`.
///
/// Statistics are computed over `reduce`. When `None`, every axis but the
/// batch axis is reduced.
pub fn scale_range(
    tensor: &mut Tensor,
    reduce: Option<&[AxisId]>,
    min_percentile: f64,
    max_percentile: f64,
    eps: f32,
) -> Result<(), TensorError> {
    if !(0.0..=100.0).contains(&min_percentile)
        || !(0.0..=100.0).contains(&max_percentile)
        || min_percentile >= max_percentile
    {
        return Err(TensorError::Numeric {
            op: "scale_range",
            detail: format!("invalid percentiles {min_percentile}..{max_percentile}"),
        });
    }

    let reduce = reduce_indices(tensor, reduce)?;
    let groups = group_elements(tensor, &reduce);
    let bounds: Vec<(f32, f32)> = groups
        .buckets(tensor)
        .iter()
        .map(|values| {
            let lo = percentile(values, min_percentile).unwrap_or(0.0);
            let hi = percentile(values, max_percentile).unwrap_or(1.0);
            (lo, hi)
        })
        .collect();

    for (v, &g) in tensor.data_mut().iter_mut().zip(&groups.ids) {
        let (lo, hi) = bounds[g];
        *v = (*v - lo) / (hi - lo + eps);
    }
    Ok(())
}

fn single(values: &[f32], name: &str) -> Result<f32, TensorError> {
    match values {
        [v] => Ok(*v),
        _ => Err(TensorError::Numeric {
            op: "scale_linear",
            detail: format!("{name} must be a single value without an axis, got {}", values.len()),
        }),
    }
}

fn broadcast(values: &[f32], len: usize, name: &str) -> Result<Vec<f32>, TensorError> {
    match values.len() {
        1 => Ok(vec![values[0]; len]),
        n if n == len => Ok(values.to_vec()),
        n => Err(TensorError::Numeric {
            op: "scale_linear",
            detail: format!("{name} has {n} values for an axis of size {len}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cyx() -> Tensor {
        Tensor::from_fn(AxisId::parse_compact("cyx"), &[2, 2, 2], |i| {
            (i[0] * 10 + i[1] * 2 + i[2]) as f32
        })
        .unwrap()
    }

    #[test]
    fn test_scale_linear_scalar() {
        let mut t = cyx();
        scale_linear(&mut t, &[2.0], &[1.0], None).unwrap();
        assert_eq!(t.data()[[0, 0, 0]], 1.0);
        assert_eq!(t.data()[[1, 1, 1]], 27.0);
    }

    #[test]
    fn test_scale_linear_per_channel() {
        let mut t = cyx();
        scale_linear(&mut t, &[1.0, 0.5], &[0.0, -5.0], Some(&"c".into())).unwrap();
        assert_eq!(t.data()[[0, 1, 1]], 3.0);
        assert_eq!(t.data()[[1, 0, 0]], 0.0);
        assert_eq!(t.data()[[1, 1, 1]], 1.5);
    }

    #[test]
    fn test_scale_linear_length_mismatch() {
        let mut t = cyx();
        assert!(scale_linear(&mut t, &[1.0, 2.0, 3.0], &[0.0], Some(&"c".into())).is_err());
        assert!(scale_linear(&mut t, &[1.0, 2.0], &[0.0], None).is_err());
    }

    #[test]
    fn test_scale_range_per_channel() {
        let mut t = cyx();
        scale_range(&mut t, Some(&AxisId::parse_compact("yx")), 0.0, 100.0, 0.0).unwrap();
        // Each channel spans 0..=3 after subtracting its own minimum.
        assert_eq!(t.data()[[0, 0, 0]], 0.0);
        assert!((t.data()[[0, 1, 1]] - 1.0).abs() < 1e-6);
        assert_eq!(t.data()[[1, 0, 0]], 0.0);
        assert!((t.data()[[1, 1, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_scale_range_rejects_inverted_percentiles() {
        let mut t = cyx();
        assert!(scale_range(&mut t, None, 90.0, 10.0, 1e-6).is_err());
    }
}
