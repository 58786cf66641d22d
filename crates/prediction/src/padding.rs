// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Padding inputs to admissible sizes and cropping results back.
//!
//! Padding is symmetric: `total / 2` elements go before the data and the
//! remainder after, so an odd amount puts the extra element at the end.
//! [`pad`] returns a [`CropDescriptor`] that undoes exactly what was added.

use crate::{PredictionError, PredictionPipeline};
use resource_descr::{AxisSize, TensorSpec};
use std::collections::BTreeMap;
use std::ops::Range;
use tensor_core::{AxisId, FillMode, Tensor};

/// Target size rule for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadMode {
    /// Pad up to exactly this size.
    Fixed(usize),
    /// Pad up to the next multiple of this divisor.
    Dynamic(usize),
}

impl PadMode {
    /// The padded size for an axis of length `len`.
    fn target(self, axis: &AxisId, len: usize) -> Result<usize, PredictionError> {
        match self {
            Self::Fixed(size) if size < len => Err(PredictionError::PaddingTooSmall {
                axis: axis.clone(),
                size: len,
                target: size,
            }),
            Self::Fixed(size) => Ok(size),
            Self::Dynamic(0) => Err(PredictionError::InvalidPadding(format!(
                "axis '{axis}': divisor must be positive"
            ))),
            Self::Dynamic(d) => Ok(len.div_ceil(d) * d),
        }
    }
}

/// Which axes to pad and how.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaddingSpec {
    pub axes: BTreeMap<AxisId, PadMode>,
    pub fill: FillMode,
}

impl PaddingSpec {
    pub fn new(fill: FillMode) -> Self {
        Self {
            axes: BTreeMap::new(),
            fill,
        }
    }

    pub fn with_axis(mut self, axis: impl Into<AxisId>, mode: PadMode) -> Self {
        self.axes.insert(axis.into(), mode);
        self
    }

    /// Dynamic padding to multiples of `divisor` on every spatial axis of
    /// `tensor`.
    pub fn dynamic(tensor: &Tensor, divisor: usize, fill: FillMode) -> Self {
        tensor
            .axes()
            .iter()
            .filter(|a| a.is_spatial())
            .fold(Self::new(fill), |spec, axis| {
                spec.with_axis(axis.clone(), PadMode::Dynamic(divisor))
            })
    }

    /// Derives the padding that brings `tensor` to an admissible size for
    /// the input described by `spec`.
    ///
    /// Fixed sizes become fixed mode. Parameterized sizes whose minimum is a
    /// multiple of the step become dynamic mode with the step as divisor;
    /// other parameterized sizes become fixed mode at the smallest admissible
    /// size. Referenced sizes and non-spatial axes are left alone.
    pub fn for_input(
        spec: &TensorSpec,
        tensor: &Tensor,
        fill: FillMode,
    ) -> Result<Self, PredictionError> {
        let mut padding = Self::new(fill);
        for axis in spec.axes.iter().filter(|a| a.kind.is_paddable()) {
            let len = tensor.size_of(&axis.id).ok_or_else(|| {
                PredictionError::ShapeMismatch(format!(
                    "tensor for '{}' has no axis '{}'",
                    spec.name, axis.id
                ))
            })?;
            let mode = match &axis.size {
                AxisSize::Fixed(size) => PadMode::Fixed(*size),
                AxisSize::Parameterized { min, step } if *step > 0 && min % step == 0 && len >= *min => {
                    PadMode::Dynamic(*step)
                }
                size @ AxisSize::Parameterized { .. } => {
                    let target = size.smallest_valid_at_least(len).ok_or_else(|| {
                        PredictionError::InvalidPadding(format!(
                            "axis '{}' of '{}' admits no size >= {len} ({size})",
                            axis.id, spec.name
                        ))
                    })?;
                    PadMode::Fixed(target)
                }
                AxisSize::Reference { .. } => continue,
            };
            padding.axes.insert(axis.id.clone(), mode);
        }
        Ok(padding)
    }
}

/// Amounts added by [`pad`], per axis id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CropDescriptor {
    pub axes: BTreeMap<AxisId, (usize, usize)>,
}

impl CropDescriptor {
    /// Whether nothing was padded.
    pub fn is_empty(&self) -> bool {
        self.axes.values().all(|&(b, a)| b == 0 && a == 0)
    }

    /// Removes the padding from `tensor`, matching axes by id.
    ///
    /// Axes of the descriptor the tensor does not have are skipped.
    pub fn crop(&self, tensor: &Tensor) -> Result<Tensor, PredictionError> {
        let ranges = tensor
            .axes()
            .iter()
            .zip(tensor.dims())
            .map(|(axis, &len)| match self.axes.get(axis) {
                Some(&(before, after)) if before + after > len => {
                    Err(PredictionError::ShapeMismatch(format!(
                        "cannot crop {before}+{after} from axis '{axis}' of size {len}"
                    )))
                }
                Some(&(before, after)) => Ok(before..len - after),
                None => Ok(0..len),
            })
            .collect::<Result<Vec<Range<usize>>, _>>()?;
        Ok(tensor.slice(&ranges)?)
    }
}

/// Pads `tensor` according to `spec`.
///
/// # Errors
/// * [`PredictionError::ShapeMismatch`] if `spec` names an axis the tensor
///   does not have.
/// * [`PredictionError::UnpaddableAxis`] for batch and channel axes.
/// * [`PredictionError::PaddingTooSmall`] if a fixed size is below the
///   current size.
pub fn pad(tensor: &Tensor, spec: &PaddingSpec) -> Result<(Tensor, CropDescriptor), PredictionError> {
    let mut widths = vec![(0, 0); tensor.ndim()];
    let mut crop = CropDescriptor::default();

    for (axis, mode) in &spec.axes {
        let index = tensor.axis_index(axis).ok_or_else(|| {
            PredictionError::ShapeMismatch(format!(
                "padding names axis '{axis}', tensor has {:?}",
                tensor.axes()
            ))
        })?;
        if axis.is_batch() || axis.is_channel() {
            return Err(PredictionError::UnpaddableAxis { axis: axis.clone() });
        }
        let len = tensor.dims()[index];
        let total = mode.target(axis, len)? - len;
        let before = total / 2;
        widths[index] = (before, total - before);
        crop.axes.insert(axis.clone(), widths[index]);
    }

    let padded = tensor.pad(&widths, spec.fill)?;
    if !crop.is_empty() {
        tracing::debug!("padded {:?} to {:?}", tensor.dims(), padded.dims());
    }
    Ok((padded, crop))
}

/// Pads a single-input model's input, runs the pipeline and crops every
/// output back to the input's extent.
///
/// Preprocessing runs before padding, so the fill never enters sample
/// statistics.
pub fn predict_with_padding(
    pipeline: &mut PredictionPipeline<'_>,
    tensor: &Tensor,
    spec: &PaddingSpec,
) -> Result<Vec<Tensor>, PredictionError> {
    let inputs = pipeline.descriptor().inputs().len();
    if inputs != 1 {
        return Err(PredictionError::ShapeMismatch(format!(
            "padded prediction needs a single-input model, this one has {inputs}"
        )));
    }
    let normalized = pipeline
        .preprocess(std::slice::from_ref(tensor))?
        .into_iter()
        .next()
        .ok_or_else(|| PredictionError::ShapeMismatch("model declares no input".into()))?;
    let (padded, crop) = pad(&normalized, spec)?;
    pipeline
        .apply_preprocessed(&[padded])?
        .iter()
        .map(|out| crop.crop(out))
        .collect()
}
