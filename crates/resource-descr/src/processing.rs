// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The closed set of pre- and post-processing steps.
//!
//! Steps are serialized as `{"name": "<step>", "kwargs": {...}}`. Unknown
//! step names and unknown parameters fail deserialization; parameter
//! combinations that parse but make no sense fail [`ProcessingStep::validate`].

use tensor_core::{AxisId, DType};

/// A scalar or a per-index list of values.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Values {
    One(f32),
    Many(Vec<f32>),
}

impl Values {
    pub fn as_slice(&self) -> &[f32] {
        match self {
            Self::One(v) => std::slice::from_ref(v),
            Self::Many(v) => v,
        }
    }

    fn one() -> Self {
        Self::One(1.0)
    }

    fn zero() -> Self {
        Self::One(0.0)
    }
}

fn default_eps() -> f32 {
    1e-6
}

fn default_max_percentile() -> f64 {
    100.0
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BinarizeParams {
    pub threshold: f32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClipParams {
    pub min: f32,
    pub max: f32,
}

/// `x * gain + offset`, optionally per index of `axis`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScaleLinearParams {
    #[serde(default = "Values::one")]
    pub gain: Values,
    #[serde(default = "Values::zero")]
    pub offset: Values,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<AxisId>,
}

/// Where normalization statistics come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMode {
    /// Computed at apply time from each sample of the batch.
    #[default]
    PerSample,
    /// Given in the manifest as `mean` / `std`.
    Fixed,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZeroMeanUnitVarianceParams {
    #[serde(default)]
    pub mode: NormalizeMode,
    /// Axes reduced when computing per-sample statistics. When absent, every
    /// axis except the batch axis is reduced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axes: Option<Vec<AxisId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<Values>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std: Option<Values>,
    /// Axis indexed by per-index fixed `mean` / `std`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<AxisId>,
    #[serde(default = "default_eps")]
    pub eps: f32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScaleRangeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axes: Option<Vec<AxisId>>,
    #[serde(default)]
    pub min_percentile: f64,
    #[serde(default = "default_max_percentile")]
    pub max_percentile: f64,
    #[serde(default = "default_eps")]
    pub eps: f32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnsureDtypeParams {
    pub dtype: DType,
}

/// One processing operation applied to a single tensor.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "name", content = "kwargs", rename_all = "snake_case")]
pub enum ProcessingStep {
    Binarize(BinarizeParams),
    Clip(ClipParams),
    ScaleLinear(ScaleLinearParams),
    Sigmoid,
    ZeroMeanUnitVariance(ZeroMeanUnitVarianceParams),
    ScaleRange(ScaleRangeParams),
    EnsureDtype(EnsureDtypeParams),
}

impl ProcessingStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Binarize(_) => "binarize",
            Self::Clip(_) => "clip",
            Self::ScaleLinear(_) => "scale_linear",
            Self::Sigmoid => "sigmoid",
            Self::ZeroMeanUnitVariance(_) => "zero_mean_unit_variance",
            Self::ScaleRange(_) => "scale_range",
            Self::EnsureDtype(_) => "ensure_dtype",
        }
    }

    /// Checks parameters against each other and against the axes of the
    /// tensor the step is attached to.
    pub fn validate(&self, axes: &[AxisId]) -> Result<(), String> {
        let has_axis = |id: &AxisId| -> Result<(), String> {
            if axes.contains(id) {
                Ok(())
            } else {
                Err(format!("{}: axis '{id}' is not on the tensor", self.name()))
            }
        };

        match self {
            Self::Binarize(p) => {
                if !p.threshold.is_finite() {
                    return Err("binarize: threshold must be finite".into());
                }
            }
            Self::Clip(p) => {
                if !(p.min < p.max) {
                    return Err(format!("clip: min {} must be below max {}", p.min, p.max));
                }
            }
            Self::ScaleLinear(p) => {
                let (g, o) = (p.gain.as_slice().len(), p.offset.as_slice().len());
                match &p.axis {
                    Some(axis) => has_axis(axis)?,
                    None if g != 1 || o != 1 => {
                        return Err("scale_linear: per-index gain/offset need an axis".into());
                    }
                    None => {}
                }
                if g == 0 || o == 0 || (g != o && g != 1 && o != 1) {
                    return Err(format!("scale_linear: {g} gains do not match {o} offsets"));
                }
            }
            Self::Sigmoid | Self::EnsureDtype(_) => {}
            Self::ZeroMeanUnitVariance(p) => {
                for axis in p.axes.iter().flatten() {
                    has_axis(axis)?;
                }
                match p.mode {
                    NormalizeMode::PerSample => {
                        if p.mean.is_some() || p.std.is_some() {
                            return Err(
                                "zero_mean_unit_variance: mean/std require mode 'fixed'".into()
                            );
                        }
                    }
                    NormalizeMode::Fixed => {
                        let (Some(mean), Some(std)) = (&p.mean, &p.std) else {
                            return Err(
                                "zero_mean_unit_variance: fixed mode needs mean and std".into()
                            );
                        };
                        let (mean, std) = (mean.as_slice(), std.as_slice());
                        if mean.len() != std.len() || mean.is_empty() {
                            return Err(format!(
                                "zero_mean_unit_variance: {} means but {} stds",
                                mean.len(),
                                std.len()
                            ));
                        }
                        if std.iter().any(|s| !(*s > 0.0)) {
                            return Err("zero_mean_unit_variance: std must be positive".into());
                        }
                        match &p.axis {
                            Some(axis) => has_axis(axis)?,
                            None if mean.len() != 1 => {
                                return Err(
                                    "zero_mean_unit_variance: per-index mean/std need an axis"
                                        .into(),
                                );
                            }
                            None => {}
                        }
                    }
                }
                if p.eps < 0.0 {
                    return Err("zero_mean_unit_variance: eps must be non-negative".into());
                }
            }
            Self::ScaleRange(p) => {
                for axis in p.axes.iter().flatten() {
                    has_axis(axis)?;
                }
                let range = 0.0..=100.0;
                if !range.contains(&p.min_percentile)
                    || !range.contains(&p.max_percentile)
                    || p.min_percentile >= p.max_percentile
                {
                    return Err(format!(
                        "scale_range: percentiles {}..{} must satisfy 0 <= min < max <= 100",
                        p.min_percentile, p.max_percentile
                    ));
                }
            }
        }
        Ok(())
    }

    /// Axes this step names, for reporting.
    pub fn referenced_axes(&self) -> Vec<&AxisId> {
        match self {
            Self::ScaleLinear(p) => p.axis.iter().collect(),
            Self::ZeroMeanUnitVariance(p) => {
                p.axes.iter().flatten().chain(p.axis.iter()).collect()
            }
            Self::ScaleRange(p) => p.axes.iter().flatten().collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bcyx() -> Vec<AxisId> {
        AxisId::parse_compact("bcyx")
    }

    fn parse(json: &str) -> ProcessingStep {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_steps() {
        assert_eq!(parse(r#"{"name": "sigmoid"}"#), ProcessingStep::Sigmoid);
        let step = parse(r#"{"name": "scale_linear", "kwargs": {"gain": [1.0, 2.0], "axis": "c"}}"#);
        let ProcessingStep::ScaleLinear(p) = &step else {
            panic!("wrong variant: {step:?}");
        };
        assert_eq!(p.gain.as_slice(), &[1.0, 2.0]);
        assert_eq!(p.offset.as_slice(), &[0.0]);
        step.validate(&bcyx()).unwrap();
    }

    #[test]
    fn test_unknown_step_and_parameter_rejected() {
        assert!(serde_json::from_str::<ProcessingStep>(r#"{"name": "blur"}"#).is_err());
        assert!(serde_json::from_str::<ProcessingStep>(
            r#"{"name": "clip", "kwargs": {"min": 0, "max": 1, "mode": "x"}}"#
        )
        .is_err());
    }

    #[test]
    fn test_clip_bounds_validated() {
        let bad = parse(r#"{"name": "clip", "kwargs": {"min": 1.0, "max": 1.0}}"#);
        assert!(bad.validate(&bcyx()).is_err());
        let good = parse(r#"{"name": "clip", "kwargs": {"min": 0.0, "max": 1.0}}"#);
        good.validate(&bcyx()).unwrap();
    }

    #[test]
    fn test_zero_mean_defaults_and_fixed_mode() {
        let step = parse(r#"{"name": "zero_mean_unit_variance", "kwargs": {"axes": ["x", "y"]}}"#);
        let ProcessingStep::ZeroMeanUnitVariance(p) = &step else {
            panic!("wrong variant: {step:?}");
        };
        assert_eq!(p.mode, NormalizeMode::PerSample);
        assert_eq!(p.eps, 1e-6);
        step.validate(&bcyx()).unwrap();

        let missing = parse(r#"{"name": "zero_mean_unit_variance", "kwargs": {"mode": "fixed"}}"#);
        assert!(missing.validate(&bcyx()).is_err());

        let zero_std = parse(
            r#"{"name": "zero_mean_unit_variance", "kwargs": {"mode": "fixed", "mean": 1.0, "std": 0.0}}"#,
        );
        assert!(zero_std.validate(&bcyx()).unwrap_err().contains("positive"));
    }

    #[test]
    fn test_axes_must_exist_on_tensor() {
        let step = parse(r#"{"name": "scale_range", "kwargs": {"axes": ["z"]}}"#);
        let err = step.validate(&bcyx()).unwrap_err();
        assert!(err.contains("'z'"));
    }

    #[test]
    fn test_scale_range_percentiles() {
        let step = parse(
            r#"{"name": "scale_range", "kwargs": {"min_percentile": 99.0, "max_percentile": 1.0}}"#,
        );
        assert!(step.validate(&bcyx()).is_err());
        let step = parse(r#"{"name": "scale_range", "kwargs": {"max_percentile": 120.0}}"#);
        assert!(step.validate(&bcyx()).is_err());
    }

    #[test]
    fn test_serialization_shape() {
        let step = ProcessingStep::Binarize(BinarizeParams { threshold: 0.5 });
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["name"], "binarize");
        assert_eq!(json["kwargs"]["threshold"], 0.5);
    }
}
