// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Execution of declared processing steps.

use crate::PredictionError;
use resource_descr::{NormalizeMode, ProcessingStep, ResourceDescriptor};
use tensor_core::{ops, Tensor, TensorError};

/// Applies one step to `tensor` in place.
pub fn apply_step(step: &ProcessingStep, tensor: &mut Tensor) -> Result<(), TensorError> {
    match step {
        ProcessingStep::Binarize(p) => ops::binarize(tensor, p.threshold),
        ProcessingStep::Clip(p) => ops::clip(tensor, p.min, p.max)?,
        ProcessingStep::ScaleLinear(p) => ops::scale_linear(
            tensor,
            p.gain.as_slice(),
            p.offset.as_slice(),
            p.axis.as_ref(),
        )?,
        ProcessingStep::Sigmoid => ops::sigmoid(tensor),
        ProcessingStep::ZeroMeanUnitVariance(p) => match (p.mode, &p.mean, &p.std) {
            (NormalizeMode::Fixed, Some(mean), Some(std)) => ops::normalize_fixed(
                tensor,
                mean.as_slice(),
                std.as_slice(),
                p.axis.as_ref(),
                p.eps,
            )?,
            (NormalizeMode::Fixed, _, _) => {
                return Err(TensorError::Numeric {
                    op: "zero_mean_unit_variance",
                    detail: "fixed mode needs mean and std".into(),
                })
            }
            (NormalizeMode::PerSample, _, _) => {
                ops::zero_mean_unit_variance(tensor, p.axes.as_deref(), p.eps)?
            }
        },
        ProcessingStep::ScaleRange(p) => ops::scale_range(
            tensor,
            p.axes.as_deref(),
            p.min_percentile,
            p.max_percentile,
            p.eps,
        )?,
        ProcessingStep::EnsureDtype(p) => ops::ensure_dtype(tensor, p.dtype),
    }
    Ok(())
}

/// Applies `steps` in order, attributing failures to `tensor_name`.
pub fn apply_steps(
    steps: &[ProcessingStep],
    tensor: &mut Tensor,
    tensor_name: &str,
) -> Result<(), PredictionError> {
    for step in steps {
        apply_step(step, tensor).map_err(|source| PredictionError::Processing {
            tensor: tensor_name.to_string(),
            step: step.name(),
            source,
        })?;
    }
    Ok(())
}

/// Runs every input's preprocessing on a copy of `inputs`.
///
/// Only the input count and axis order are checked; axis sizes are free, so
/// a whole sample can be prepared before it is cut into tiles.
pub fn preprocess_inputs(
    descriptor: &ResourceDescriptor,
    inputs: &[Tensor],
) -> Result<Vec<Tensor>, PredictionError> {
    if inputs.len() != descriptor.inputs().len() {
        return Err(PredictionError::ShapeMismatch(format!(
            "expected {} inputs, got {}",
            descriptor.inputs().len(),
            inputs.len()
        )));
    }
    descriptor
        .inputs()
        .iter()
        .zip(inputs)
        .map(|(spec, tensor)| {
            if tensor.axes() != spec.axis_ids().as_slice() {
                return Err(PredictionError::ShapeMismatch(format!(
                    "'{}' expects axes {:?}, got {:?}",
                    spec.name,
                    spec.axis_ids(),
                    tensor.axes()
                )));
            }
            let mut tensor = tensor.clone();
            apply_steps(&spec.preprocessing, &mut tensor, &spec.name)?;
            Ok(tensor)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_descr::{BinarizeParams, ClipParams, ScaleLinearParams, Values};
    use tensor_core::AxisId;

    fn row(values: &[f32]) -> Tensor {
        Tensor::from_f32(AxisId::parse_compact("x"), vec![values.len()].into(), values).unwrap()
    }

    #[test]
    fn test_steps_run_in_order() {
        let steps = vec![
            ProcessingStep::ScaleLinear(ScaleLinearParams {
                gain: Values::One(2.0),
                offset: Values::One(-1.0),
                axis: None,
            }),
            ProcessingStep::Binarize(BinarizeParams { threshold: 0.0 }),
        ];
        let mut t = row(&[0.25, 0.75]);
        apply_steps(&steps, &mut t, "raw").unwrap();
        assert_eq!(t.to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_sigmoid_step() {
        let mut t = row(&[0.0]);
        apply_steps(&[ProcessingStep::Sigmoid], &mut t, "raw").unwrap();
        assert!((t.to_vec()[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_failure_names_tensor_and_step() {
        let steps = vec![ProcessingStep::Clip(ClipParams { min: 1.0, max: 0.0 })];
        let err = apply_steps(&steps, &mut row(&[0.5]), "mask").unwrap_err();
        match err {
            PredictionError::Processing { tensor, step, .. } => {
                assert_eq!(tensor, "mask");
                assert_eq!(step, "clip");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
