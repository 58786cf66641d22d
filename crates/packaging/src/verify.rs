// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reproduction of stored test outputs.

use crate::PackageError;
use prediction::{with_pipeline, InferenceEngine, PipelineOptions, Tolerance};
use resource_descr::{ResourceDescriptor, WeightFormat};

/// Runs `format`'s weights on the test inputs and returns the largest
/// deviation from the test outputs.
///
/// # Errors
/// [`PackageError::UnreproducibleOutput`] if any output deviates beyond
/// `tolerance`.
pub fn verify_format(
    descriptor: &ResourceDescriptor,
    engine: &dyn InferenceEngine,
    format: WeightFormat,
    tolerance: Tolerance,
) -> Result<f64, PackageError> {
    let inputs = descriptor.load_test_inputs()?;
    let expected = descriptor.load_test_outputs()?;
    let options = PipelineOptions::default().with_weight_format(format);
    let actual = with_pipeline(descriptor, engine, &options, |p| p.apply(&inputs))?;

    let mut worst = 0.0f64;
    for ((spec, actual), expected) in descriptor.outputs().iter().zip(&actual).zip(&expected) {
        let deviation = Tolerance::deviation(actual, expected)?;
        if !tolerance.accepts(deviation) {
            return Err(PackageError::UnreproducibleOutput {
                format,
                tensor: spec.name.clone(),
                deviation,
                decimals: tolerance.decimals,
            });
        }
        worst = worst.max(deviation);
    }
    tracing::info!(
        "'{}' {} weights reproduce test outputs (max deviation {:e})",
        descriptor.name(),
        format,
        worst
    );
    Ok(worst)
}

/// Verifies every format `engine` can run.
///
/// Formats the engine does not support are skipped with a warning; at least
/// one format must be verified.
pub fn verify_all(
    descriptor: &ResourceDescriptor,
    engine: &dyn InferenceEngine,
    tolerance: Tolerance,
) -> Result<Vec<WeightFormat>, PackageError> {
    let mut verified = Vec::new();
    for &format in descriptor.weights().keys() {
        if !engine.supports(format) {
            tracing::warn!(
                "engine '{}' cannot run {} weights; skipping their verification",
                engine.name(),
                format
            );
            continue;
        }
        verify_format(descriptor, engine, format, tolerance)?;
        verified.push(format);
    }
    if verified.is_empty() {
        return Err(PackageError::Unverifiable {
            engine: engine.name().to_string(),
            formats: descriptor
                .weights()
                .keys()
                .map(|f| f.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        });
    }
    Ok(verified)
}
