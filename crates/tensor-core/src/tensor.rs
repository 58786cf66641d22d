// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Core named-axis tensor type.

use crate::{AxisId, FillMode, Shape, TensorError};
use ndarray::{ArrayD, Axis, Dimension, IxDyn, Slice};
use std::ops::Range;

/// An owned, n-dimensional `f32` tensor whose dimensions carry axis ids.
///
/// `Tensor` is the primary data carrier of the prediction pipeline. The axis
/// ids (`"b"`, `"c"`, `"y"`, `"x"`, ...) travel with the data so that shape
/// fitting and processing can address dimensions by meaning rather than by
/// position.
///
/// # Examples
/// ```
/// use tensor_core::{AxisId, Shape, Tensor};
/// let t = Tensor::zeros(AxisId::parse_compact("bcyx"), &[1, 1, 4, 4]).unwrap();
/// assert_eq!(t.size_of(&"y".into()), Some(4));
/// assert_eq!(t.shape(), Shape::new(vec![1, 1, 4, 4]));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    axes: Vec<AxisId>,
    data: ArrayD<f32>,
}

impl Tensor {
    /// Wraps an array, checking that there is exactly one unique axis id per dimension.
    pub fn new(axes: Vec<AxisId>, data: ArrayD<f32>) -> Result<Self, TensorError> {
        if axes.len() != data.ndim() {
            return Err(TensorError::RankMismatch {
                rank: data.ndim(),
                axes: axes.len(),
            });
        }
        for (i, axis) in axes.iter().enumerate() {
            if axes[..i].contains(axis) {
                return Err(TensorError::Axis {
                    op: "new",
                    detail: format!("duplicate axis '{axis}'"),
                });
            }
        }
        Ok(Self { axes, data })
    }

    /// Creates a tensor filled with zeros.
    pub fn zeros(axes: Vec<AxisId>, dims: &[usize]) -> Result<Self, TensorError> {
        Self::new(axes, ArrayD::zeros(IxDyn(dims)))
    }

    /// Creates a tensor from a flat, C-ordered slice of values.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{AxisId, Shape, Tensor};
    /// let t = Tensor::from_f32(AxisId::parse_compact("yx"), Shape::new(vec![2, 2]), &[1.0, 2.0, 3.0, 4.0]).unwrap();
    /// assert_eq!(t.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
    /// ```
    pub fn from_f32(axes: Vec<AxisId>, shape: Shape, values: &[f32]) -> Result<Self, TensorError> {
        let expected = shape.num_elements();
        if values.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: values.len(),
            });
        }
        let data = ArrayD::from_shape_vec(IxDyn(shape.dims()), values.to_vec()).map_err(|e| {
            TensorError::Numeric {
                op: "from_f32",
                detail: e.to_string(),
            }
        })?;
        Self::new(axes, data)
    }

    /// Creates a tensor by evaluating `f` at every index.
    pub fn from_fn<F>(axes: Vec<AxisId>, dims: &[usize], mut f: F) -> Result<Self, TensorError>
    where
        F: FnMut(&[usize]) -> f32,
    {
        let data = ArrayD::from_shape_fn(IxDyn(dims), |idx| f(idx.slice()));
        Self::new(axes, data)
    }

    /// Returns the axis ids in dimension order.
    pub fn axes(&self) -> &[AxisId] {
        &self.axes
    }

    /// Returns the tensor's shape.
    pub fn shape(&self) -> Shape {
        Shape::new(self.data.shape().to_vec())
    }

    /// Returns the dimension sizes.
    pub fn dims(&self) -> &[usize] {
        self.data.shape()
    }

    /// Returns the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Returns the position of `axis`, if present.
    pub fn axis_index(&self, axis: &AxisId) -> Option<usize> {
        self.axes.iter().position(|a| a == axis)
    }

    /// Returns the size of `axis`, if present.
    pub fn size_of(&self, axis: &AxisId) -> Option<usize> {
        self.axis_index(axis).map(|i| self.data.shape()[i])
    }

    /// Returns the underlying array.
    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    /// Returns the underlying array mutably.
    pub fn data_mut(&mut self) -> &mut ArrayD<f32> {
        &mut self.data
    }

    /// Consumes the tensor, returning its axes and array.
    pub fn into_parts(self) -> (Vec<AxisId>, ArrayD<f32>) {
        (self.axes, self.data)
    }

    /// Copies the elements into a flat vector in logical (C) order.
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }

    /// Applies `f` to every element in place.
    pub fn map_inplace<F: FnMut(f32) -> f32>(&mut self, mut f: F) {
        self.data.mapv_inplace(|v| f(v));
    }

    /// Pads every dimension by `(before, after)` elements.
    ///
    /// `widths` must contain one entry per dimension. Padded elements are
    /// filled according to `fill`.
    pub fn pad(&self, widths: &[(usize, usize)], fill: FillMode) -> Result<Tensor, TensorError> {
        if widths.len() != self.ndim() {
            return Err(TensorError::RankMismatch {
                rank: self.ndim(),
                axes: widths.len(),
            });
        }
        if widths.iter().all(|&(b, a)| b == 0 && a == 0) {
            return Ok(self.clone());
        }

        let src_dims = self.data.shape().to_vec();
        let new_dims: Vec<usize> = src_dims
            .iter()
            .zip(widths)
            .map(|(&d, &(b, a))| d + b + a)
            .collect();

        let data = match fill {
            FillMode::Zero => {
                let mut out = ArrayD::<f32>::zeros(IxDyn(&new_dims));
                let mut region = out.view_mut();
                for (d, (&len, &(before, _))) in src_dims.iter().zip(widths).enumerate() {
                    region.slice_axis_inplace(Axis(d), Slice::from(before..before + len));
                }
                region.assign(&self.data);
                out
            }
            FillMode::Edge => {
                if src_dims.iter().any(|&d| d == 0) {
                    return Err(TensorError::Numeric {
                        op: "pad",
                        detail: "edge fill requires a non-empty tensor".into(),
                    });
                }
                let mut src = vec![0usize; src_dims.len()];
                ArrayD::from_shape_fn(IxDyn(&new_dims), |idx| {
                    for (d, slot) in src.iter_mut().enumerate() {
                        let shifted = idx[d] as isize - widths[d].0 as isize;
                        *slot = shifted.clamp(0, src_dims[d] as isize - 1) as usize;
                    }
                    self.data[src.as_slice()]
                })
            }
        };

        Ok(Tensor {
            axes: self.axes.clone(),
            data,
        })
    }

    /// Copies out the region selected by one range per dimension.
    pub fn slice(&self, ranges: &[Range<usize>]) -> Result<Tensor, TensorError> {
        self.check_region("slice", ranges)?;
        let mut view = self.data.view();
        for (d, r) in ranges.iter().enumerate() {
            view.slice_axis_inplace(Axis(d), Slice::from(r.clone()));
        }
        Ok(Tensor {
            axes: self.axes.clone(),
            data: view.to_owned(),
        })
    }

    /// Writes `src` into this tensor starting at `offsets`.
    ///
    /// `src` must have the same axes in the same order and fit entirely.
    pub fn assign(&mut self, offsets: &[usize], src: &Tensor) -> Result<(), TensorError> {
        if src.axes != self.axes {
            return Err(TensorError::Axis {
                op: "assign",
                detail: format!("axes {:?} do not match {:?}", src.axes, self.axes),
            });
        }
        if offsets.len() != self.ndim() {
            return Err(TensorError::RankMismatch {
                rank: self.ndim(),
                axes: offsets.len(),
            });
        }
        let ranges: Vec<Range<usize>> = offsets
            .iter()
            .zip(src.dims())
            .map(|(&o, &len)| o..o + len)
            .collect();
        self.check_region("assign", &ranges)?;

        let mut view = self.data.view_mut();
        for (d, r) in ranges.iter().enumerate() {
            view.slice_axis_inplace(Axis(d), Slice::from(r.clone()));
        }
        view.assign(&src.data);
        Ok(())
    }

    /// Returns the largest absolute element-wise difference to `other`.
    ///
    /// A NaN on exactly one side counts as an infinite deviation.
    pub fn max_abs_diff(&self, other: &Tensor) -> Result<f64, TensorError> {
        if self.axes != other.axes || self.dims() != other.dims() {
            return Err(TensorError::ShapeMismatch {
                op: "max_abs_diff",
                lhs: self.shape(),
                rhs: other.shape(),
            });
        }
        let mut max = 0.0f64;
        for (&a, &b) in self.data.iter().zip(other.data.iter()) {
            let d = match (a.is_nan(), b.is_nan()) {
                (true, true) => 0.0,
                (true, false) | (false, true) => f64::INFINITY,
                (false, false) => (a as f64 - b as f64).abs(),
            };
            if d > max {
                max = d;
            }
        }
        Ok(max)
    }

    /// Reorders the dimensions to follow `axes`, which must be a permutation
    /// of the tensor's own axes.
    pub fn transpose_to(&self, axes: &[AxisId]) -> Result<Tensor, TensorError> {
        if axes.len() != self.axes.len() {
            return Err(TensorError::RankMismatch {
                rank: self.ndim(),
                axes: axes.len(),
            });
        }
        let mut perm = Vec::with_capacity(axes.len());
        for axis in axes {
            let i = self.axis_index(axis).ok_or_else(|| TensorError::UnknownAxis {
                axis: axis.clone(),
                axes: self.axes.clone(),
            })?;
            perm.push(i);
        }
        let data = self
            .data
            .view()
            .permuted_axes(perm)
            .as_standard_layout()
            .into_owned();
        Tensor::new(axes.to_vec(), data)
    }

    /// Adapts the tensor to the axis layout `target`.
    ///
    /// Axes missing from the tensor are inserted with size 1, singleton axes
    /// absent from `target` are dropped, and the result is transposed into
    /// `target` order. Dropping a non-singleton axis is an error.
    pub fn conform_to(&self, target: &[AxisId]) -> Result<Tensor, TensorError> {
        let mut axes = self.axes.clone();
        let mut data = self.data.clone();

        let mut i = 0;
        while i < axes.len() {
            if target.contains(&axes[i]) {
                i += 1;
                continue;
            }
            if data.shape()[i] != 1 {
                return Err(TensorError::Axis {
                    op: "conform_to",
                    detail: format!(
                        "cannot drop axis '{}' of size {}",
                        axes[i],
                        data.shape()[i]
                    ),
                });
            }
            data = data.index_axis_move(Axis(i), 0);
            axes.remove(i);
        }

        for axis in target {
            if !axes.contains(axis) {
                let at = data.ndim();
                data = data.insert_axis(Axis(at));
                axes.push(axis.clone());
            }
        }

        Tensor::new(axes, data)?.transpose_to(target)
    }

    fn check_region(&self, op: &'static str, ranges: &[Range<usize>]) -> Result<(), TensorError> {
        if ranges.len() != self.ndim() {
            return Err(TensorError::RankMismatch {
                rank: self.ndim(),
                axes: ranges.len(),
            });
        }
        for (d, r) in ranges.iter().enumerate() {
            let len = self.data.shape()[d];
            if r.start > r.end || r.end > len {
                return Err(TensorError::OutOfBounds {
                    op,
                    detail: format!(
                        "range {}..{} on axis '{}' of size {len}",
                        r.start, r.end, self.axes[d]
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yx(rows: usize, cols: usize) -> Tensor {
        Tensor::from_fn(AxisId::parse_compact("yx"), &[rows, cols], |i| {
            (i[0] * cols + i[1]) as f32
        })
        .unwrap()
    }

    #[test]
    fn test_new_rejects_rank_mismatch() {
        let r = Tensor::new(AxisId::parse_compact("yx"), ArrayD::zeros(IxDyn(&[2, 2, 2])));
        assert!(matches!(r, Err(TensorError::RankMismatch { rank: 3, axes: 2 })));
    }

    #[test]
    fn test_new_rejects_duplicate_axes() {
        let r = Tensor::zeros(AxisId::parse_compact("xx"), &[2, 2]);
        assert!(matches!(r, Err(TensorError::Axis { .. })));
    }

    #[test]
    fn test_pad_zero() {
        let t = yx(2, 2);
        let p = t.pad(&[(1, 0), (0, 1)], FillMode::Zero).unwrap();
        assert_eq!(p.dims(), &[3, 3]);
        assert_eq!(p.to_vec(), vec![0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn test_pad_edge() {
        let t = yx(1, 3);
        let p = t.pad(&[(0, 0), (2, 1)], FillMode::Edge).unwrap();
        assert_eq!(p.to_vec(), vec![0.0, 0.0, 0.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_pad_noop_is_clone() {
        let t = yx(3, 3);
        assert_eq!(t.pad(&[(0, 0), (0, 0)], FillMode::Edge).unwrap(), t);
    }

    #[test]
    fn test_slice_and_assign() {
        let t = yx(4, 4);
        let s = t.slice(&[1..3, 2..4]).unwrap();
        assert_eq!(s.to_vec(), vec![6.0, 7.0, 10.0, 11.0]);

        let mut z = Tensor::zeros(AxisId::parse_compact("yx"), &[4, 4]).unwrap();
        z.assign(&[1, 2], &s).unwrap();
        assert_eq!(z.slice(&[1..3, 2..4]).unwrap(), s);
        assert_eq!(z.data()[[0, 0]], 0.0);
    }

    #[test]
    fn test_slice_out_of_bounds() {
        let t = yx(2, 2);
        assert!(matches!(
            t.slice(&[0..3, 0..2]),
            Err(TensorError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_max_abs_diff() {
        let a = yx(2, 2);
        let mut b = a.clone();
        b.data_mut()[[1, 1]] += 0.5;
        assert!((a.max_abs_diff(&b).unwrap() - 0.5).abs() < 1e-9);

        b.data_mut()[[0, 0]] = f32::NAN;
        assert!(a.max_abs_diff(&b).unwrap().is_infinite());
        assert!(a.max_abs_diff(&yx(3, 2)).is_err());
    }

    #[test]
    fn test_transpose_to() {
        let t = yx(2, 3);
        let tt = t.transpose_to(&AxisId::parse_compact("xy")).unwrap();
        assert_eq!(tt.dims(), &[3, 2]);
        assert_eq!(tt.data()[[2, 1]], t.data()[[1, 2]]);
    }

    #[test]
    fn test_conform_to_inserts_and_drops() {
        let t = yx(2, 3);
        let c = t.conform_to(&AxisId::parse_compact("bcyx")).unwrap();
        assert_eq!(c.dims(), &[1, 1, 2, 3]);
        assert_eq!(c.to_vec(), t.to_vec());

        let back = c.conform_to(&AxisId::parse_compact("yx")).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_conform_to_refuses_non_singleton_drop() {
        let t = Tensor::zeros(AxisId::parse_compact("cyx"), &[3, 2, 2]).unwrap();
        assert!(t.conform_to(&AxisId::parse_compact("yx")).is_err());
    }
}
