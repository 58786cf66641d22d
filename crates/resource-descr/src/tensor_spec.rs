// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor specifications: named tensors with per-axis size constraints.
//!
//! Each [`TensorSpec`] lists its axes in the order the model expects them.
//! An axis size is either fixed, parameterized (`min + k * step`), or a
//! function of another tensor's axis (`ref * scale + offset`). Output axes
//! may declare a halo: the border width the model cannot compute reliably.

use crate::ProcessingStep;
use std::fmt;
use tensor_core::{AxisId, DType};

/// The semantic role of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisKind {
    Batch,
    Channel,
    Space,
    Time,
    Index,
}

impl AxisKind {
    /// Whether shape fitting may change this axis.
    pub fn is_paddable(self) -> bool {
        matches!(self, Self::Space | Self::Time)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Channel => "channel",
            Self::Space => "space",
            Self::Time => "time",
            Self::Index => "index",
        }
    }
}

/// The admissible extent of an axis.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum AxisSize {
    /// Exactly this size.
    Fixed(usize),
    /// `min + k * step` for any `k >= 0`. A zero step admits only `min`.
    Parameterized { min: usize, step: usize },
    /// `round(size_of(tensor.axis) * scale + offset)`.
    Reference {
        tensor: String,
        axis: AxisId,
        #[serde(default = "default_scale")]
        scale: f64,
        #[serde(default)]
        offset: i64,
    },
}

fn default_scale() -> f64 {
    1.0
}

impl AxisSize {
    /// Whether `n` is admissible on its own.
    ///
    /// Reference sizes depend on another tensor and are checked through
    /// [`TensorSpec::check_dims`]; here they accept any size.
    pub fn is_valid(&self, n: usize) -> bool {
        match self {
            Self::Fixed(size) => n == *size,
            Self::Parameterized { min, step } => {
                if n < *min {
                    false
                } else if *step == 0 {
                    n == *min
                } else {
                    (n - min) % step == 0
                }
            }
            Self::Reference { .. } => true,
        }
    }

    /// The smallest admissible size that is `>= n`, if one exists.
    pub fn smallest_valid_at_least(&self, n: usize) -> Option<usize> {
        match self {
            Self::Fixed(size) => (n <= *size).then_some(*size),
            Self::Parameterized { min, step } => {
                if n <= *min {
                    Some(*min)
                } else if *step == 0 {
                    None
                } else {
                    let k = (n - min).div_ceil(*step);
                    Some(min + k * step)
                }
            }
            Self::Reference { .. } => None,
        }
    }

    /// The size implied by a referenced axis of size `referenced`.
    ///
    /// Returns `None` for non-reference sizes or a negative result.
    pub fn resolve(&self, referenced: usize) -> Option<usize> {
        match self {
            Self::Reference { scale, offset, .. } => {
                let size = (referenced as f64 * scale).round() as i64 + offset;
                usize::try_from(size).ok()
            }
            _ => None,
        }
    }

    /// The lower bound of admissible sizes, when known without references.
    pub fn min_size(&self) -> Option<usize> {
        match self {
            Self::Fixed(size) => Some(*size),
            Self::Parameterized { min, .. } => Some(*min),
            Self::Reference { .. } => None,
        }
    }

    /// The step between admissible sizes, when parameterized.
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::Parameterized { step, .. } => Some(*step),
            _ => None,
        }
    }
}

impl fmt::Display for AxisSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(size) => write!(f, "{size}"),
            Self::Parameterized { min, step } => write!(f, "{min}+k*{step}"),
            Self::Reference {
                tensor,
                axis,
                scale,
                offset,
            } => write!(f, "{tensor}.{axis}*{scale}{offset:+}"),
        }
    }
}

/// One axis of a tensor specification.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisDescr {
    pub id: AxisId,
    #[serde(rename = "type")]
    pub kind: AxisKind,
    pub size: AxisSize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub halo: usize,
}

fn is_zero(v: &usize) -> bool {
    *v == 0
}

impl AxisDescr {
    pub fn new(id: impl Into<AxisId>, kind: AxisKind, size: AxisSize) -> Self {
        Self {
            id: id.into(),
            kind,
            size,
            halo: 0,
        }
    }

    pub fn with_halo(mut self, halo: usize) -> Self {
        self.halo = halo;
        self
    }
}

/// A named model input or output.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TensorSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub axes: Vec<AxisDescr>,
    #[serde(default = "default_data_type")]
    pub data_type: DType,
    /// Steps applied to an input before the model runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preprocessing: Vec<ProcessingStep>,
    /// Steps applied to an output after the model runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub postprocessing: Vec<ProcessingStep>,
}

fn default_data_type() -> DType {
    DType::Float32
}

/// A tensor whose axes or sizes do not satisfy its specification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tensor '{tensor}': {detail}")]
pub struct ShapeViolation {
    pub tensor: String,
    pub detail: String,
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, axes: Vec<AxisDescr>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            axes,
            data_type: DType::Float32,
            preprocessing: Vec::new(),
            postprocessing: Vec::new(),
        }
    }

    /// Axis ids in declared order.
    pub fn axis_ids(&self) -> Vec<AxisId> {
        self.axes.iter().map(|a| a.id.clone()).collect()
    }

    pub fn axis(&self, id: &AxisId) -> Option<&AxisDescr> {
        self.axes.iter().find(|a| &a.id == id)
    }

    /// Declared halo of an axis (0 if absent).
    pub fn halo(&self, id: &AxisId) -> usize {
        self.axis(id).map_or(0, |a| a.halo)
    }

    /// Checks `dims` (in the order of `axes`) against this specification.
    ///
    /// `resolve(tensor, axis)` supplies the size of a referenced axis; a
    /// reference it cannot answer is a violation.
    pub fn check_dims(
        &self,
        axes: &[AxisId],
        dims: &[usize],
        resolve: &dyn Fn(&str, &AxisId) -> Option<usize>,
    ) -> Result<(), ShapeViolation> {
        let violation = |detail: String| ShapeViolation {
            tensor: self.name.clone(),
            detail,
        };

        let expected = self.axis_ids();
        if axes != expected.as_slice() {
            return Err(violation(format!(
                "expected axes {}, got {}",
                join_axes(&expected),
                join_axes(axes)
            )));
        }

        for (axis, &n) in self.axes.iter().zip(dims) {
            match &axis.size {
                AxisSize::Reference {
                    tensor, axis: ref_axis, ..
                } => {
                    let referenced = resolve(tensor, ref_axis).ok_or_else(|| {
                        violation(format!(
                            "axis '{}' references unknown size {tensor}.{ref_axis}",
                            axis.id
                        ))
                    })?;
                    let want = axis.size.resolve(referenced);
                    if want != Some(n) {
                        return Err(violation(format!(
                            "axis '{}' has size {n}, expected {} ({})",
                            axis.id,
                            want.map_or_else(|| "none".to_string(), |w| w.to_string()),
                            axis.size
                        )));
                    }
                }
                size if !size.is_valid(n) => {
                    return Err(violation(format!(
                        "axis '{}' has size {n}, expected {size}",
                        axis.id
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns a concise summary string for display.
    pub fn summary(&self) -> String {
        let axes: Vec<String> = self
            .axes
            .iter()
            .map(|a| {
                if a.halo > 0 {
                    format!("{}={} (halo {})", a.id, a.size, a.halo)
                } else {
                    format!("{}={}", a.id, a.size)
                }
            })
            .collect();
        format!(
            "{} [{}] {}, {} pre / {} post steps",
            self.name,
            axes.join(", "),
            self.data_type,
            self.preprocessing.len(),
            self.postprocessing.len()
        )
    }
}

fn join_axes(axes: &[AxisId]) -> String {
    let ids: Vec<&str> = axes.iter().map(AxisId::as_str).collect();
    format!("[{}]", ids.join(","))
}
