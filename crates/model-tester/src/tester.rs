// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The checks a package must pass.
//!
//! ```text
//! manifest validation
//! package load              (only reported when it fails)
//! for each weight format:
//!     weight hash
//!     pipeline construction
//!     shape-fit sanity          (needs the pipeline)
//!     reproduce test outputs    (needs the pipeline)
//! ```
//!
//! Every check produces a [`CheckResult`]; a failing or erroring check never
//! stops the ones after it.

use crate::{CheckResult, CheckStatus, TestReport};
use prediction::padding::{pad, PaddingSpec};
use prediction::{InferenceEngine, PipelineOptions, PredictionPipeline, Tolerance};
use resource_descr::hash::sha256_path;
use resource_descr::{LocalResolver, Manifest, ResourceDescriptor, SourceResolver, WeightFormat};
use std::path::Path;
use tensor_core::{FillMode, Tensor};

pub const MANIFEST_VALIDATION: &str = "manifest validation";
pub const PACKAGE_LOAD: &str = "package load";
pub const WEIGHT_HASH: &str = "weight hash";
pub const PIPELINE_CONSTRUCTION: &str = "pipeline construction";
pub const SHAPE_FIT: &str = "shape-fit sanity";
pub const REPRODUCE_OUTPUTS: &str = "reproduce test outputs";

/// Runs certification checks with one engine.
pub struct ModelTester<'e> {
    engine: &'e dyn InferenceEngine,
    devices: Vec<prediction::Device>,
}

impl<'e> ModelTester<'e> {
    pub fn new(engine: &'e dyn InferenceEngine) -> Self {
        Self {
            engine,
            devices: PipelineOptions::default().devices,
        }
    }

    pub fn with_devices(mut self, devices: Vec<prediction::Device>) -> Self {
        self.devices = devices;
        self
    }

    /// Loads the package at `path` and tests it.
    ///
    /// The manifest is validated on its own before the package is loaded,
    /// so a structural error is reported under "manifest validation". When
    /// loading fails, the weight hashes are still checked from the manifest
    /// and the checks that need a pipeline are reported as errored.
    pub fn test_path(
        &self,
        path: &Path,
        formats: Option<&[WeightFormat]>,
        tolerance: Tolerance,
    ) -> TestReport {
        let package = path.display().to_string();
        let parsed = ResourceDescriptor::locate(path).and_then(|(root, manifest_path)| {
            Manifest::from_file(&manifest_path).map(|manifest| (root, manifest))
        });
        let (root, manifest) = match parsed {
            Ok(found) => found,
            Err(e) => {
                return finish(
                    package,
                    tolerance,
                    vec![CheckResult::failed(PACKAGE_LOAD, None, e.to_string())],
                )
            }
        };

        let validation = match manifest.validate() {
            Ok(()) => CheckResult::passed(MANIFEST_VALIDATION, None),
            Err(e) => CheckResult::failed(MANIFEST_VALIDATION, None, e.to_string()),
        };
        let valid = validation.status == CheckStatus::Passed;

        match ResourceDescriptor::from_manifest(manifest.clone(), &root, &LocalResolver) {
            Ok(descriptor) => self.run(&descriptor, formats, tolerance, validation),
            Err(e) => {
                let mut checks = vec![validation];
                if valid {
                    checks.push(CheckResult::failed(PACKAGE_LOAD, None, e.to_string()));
                }
                let formats: Vec<WeightFormat> = match formats {
                    Some(formats) => formats.to_vec(),
                    None => manifest.weights.keys().copied().collect(),
                };
                for format in formats {
                    let f = Some(format);
                    checks.push(match manifest.weights.get(&format) {
                        Some(entry) => match LocalResolver.resolve(&root, &entry.source) {
                            Ok(path) => check_hash(format, entry.sha256.as_deref(), &path),
                            Err(e) => CheckResult::errored(WEIGHT_HASH, f, e.to_string()),
                        },
                        None => CheckResult::errored(
                            WEIGHT_HASH,
                            f,
                            format!("package has no '{format}' weights"),
                        ),
                    });
                    for name in [PIPELINE_CONSTRUCTION, SHAPE_FIT, REPRODUCE_OUTPUTS] {
                        checks.push(CheckResult::errored(name, f, "package did not load"));
                    }
                }
                finish(manifest.name, tolerance, checks)
            }
        }
    }

    /// Tests `formats` (all shipped formats when `None`) of a package.
    ///
    /// A loaded descriptor has already passed validation, so its
    /// "manifest validation" check re-asserts that. Use
    /// [`Self::test_path`] to see validation failures as a check.
    pub fn test(
        &self,
        descriptor: &ResourceDescriptor,
        formats: Option<&[WeightFormat]>,
        tolerance: Tolerance,
    ) -> TestReport {
        let validation = match descriptor.manifest().validate() {
            Ok(()) => CheckResult::passed(MANIFEST_VALIDATION, None),
            Err(e) => CheckResult::failed(MANIFEST_VALIDATION, None, e.to_string()),
        };
        self.run(descriptor, formats, tolerance, validation)
    }

    fn run(
        &self,
        descriptor: &ResourceDescriptor,
        formats: Option<&[WeightFormat]>,
        tolerance: Tolerance,
        validation: CheckResult,
    ) -> TestReport {
        let mut checks = vec![validation];
        let formats: Vec<WeightFormat> = match formats {
            Some(formats) => formats.to_vec(),
            None => descriptor.weights().keys().copied().collect(),
        };
        for format in formats {
            checks.extend(self.test_format(descriptor, format, tolerance));
        }
        finish(descriptor.name().to_string(), tolerance, checks)
    }

    fn test_format(
        &self,
        descriptor: &ResourceDescriptor,
        format: WeightFormat,
        tolerance: Tolerance,
    ) -> Vec<CheckResult> {
        let f = Some(format);
        let mut checks = vec![check_weight_hash(descriptor, format)];

        let options = PipelineOptions {
            devices: self.devices.clone(),
            ..PipelineOptions::default().with_weight_format(format)
        };
        let mut pipeline = match PredictionPipeline::open(descriptor, self.engine, &options) {
            Ok(p) => {
                checks.push(CheckResult::passed(PIPELINE_CONSTRUCTION, f));
                p
            }
            Err(e) => {
                checks.push(CheckResult::failed(PIPELINE_CONSTRUCTION, f, e.to_string()));
                for name in [SHAPE_FIT, REPRODUCE_OUTPUTS] {
                    checks.push(CheckResult::errored(name, f, "no pipeline"));
                }
                return checks;
            }
        };

        let inputs = descriptor.load_test_inputs();
        let expected = descriptor.load_test_outputs();
        let (inputs, expected) = match (inputs, expected) {
            (Ok(i), Ok(e)) => (i, e),
            (Err(e), _) | (_, Err(e)) => {
                for name in [SHAPE_FIT, REPRODUCE_OUTPUTS] {
                    checks.push(CheckResult::errored(
                        name,
                        f,
                        format!("cannot load test tensors: {e}"),
                    ));
                }
                return checks;
            }
        };

        let outputs = pipeline.apply(&inputs);
        pipeline.close();

        checks.push(check_shape_fit(descriptor, format, &inputs, outputs.as_deref().ok()));
        checks.push(match outputs {
            Ok(outputs) => check_reproduction(descriptor, format, &outputs, &expected, tolerance),
            Err(e) => CheckResult::errored(REPRODUCE_OUTPUTS, f, e.to_string()),
        });
        checks
    }
}

fn finish(package: String, tolerance: Tolerance, checks: Vec<CheckResult>) -> TestReport {
    let report = TestReport {
        package,
        decimals: tolerance.decimals,
        checks,
    };
    if report.passed() {
        tracing::info!("'{}' passed {} checks", report.package, report.checks.len());
    } else {
        tracing::warn!(
            "'{}' failed {} of {} checks",
            report.package,
            report.problems().count(),
            report.checks.len()
        );
    }
    report
}

impl std::fmt::Debug for ModelTester<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelTester")
            .field("engine", &self.engine.name())
            .field("devices", &self.devices)
            .finish()
    }
}

fn check_weight_hash(descriptor: &ResourceDescriptor, format: WeightFormat) -> CheckResult {
    match (descriptor.weight_entry(format), descriptor.weight_path(format)) {
        (Some(entry), Some(path)) => check_hash(format, entry.sha256.as_deref(), path),
        _ => CheckResult::errored(
            WEIGHT_HASH,
            Some(format),
            format!("package has no '{format}' weights"),
        ),
    }
}

fn check_hash(format: WeightFormat, recorded: Option<&str>, path: &Path) -> CheckResult {
    let f = Some(format);
    let Some(recorded) = recorded else {
        return CheckResult::passed(WEIGHT_HASH, f).with_detail("no hash recorded");
    };
    match sha256_path(path) {
        Ok(actual) if actual.eq_ignore_ascii_case(recorded) => CheckResult::passed(WEIGHT_HASH, f),
        Ok(actual) => CheckResult::failed(
            WEIGHT_HASH,
            f,
            format!("recorded {recorded}, file hashes to {actual}"),
        ),
        Err(e) => CheckResult::errored(WEIGHT_HASH, f, e.to_string()),
    }
}

/// Test inputs fit their specs, padding them yields admissible sizes, and
/// the outputs (when the run succeeded) have the declared sizes.
fn check_shape_fit(
    descriptor: &ResourceDescriptor,
    format: WeightFormat,
    inputs: &[Tensor],
    outputs: Option<&[Tensor]>,
) -> CheckResult {
    let f = Some(format);
    if let Err(v) = descriptor.check_inputs(inputs) {
        return CheckResult::failed(SHAPE_FIT, f, format!("test input: {v}"));
    }

    let mut padded = Vec::with_capacity(inputs.len());
    for (spec, tensor) in descriptor.inputs().iter().zip(inputs) {
        let result = PaddingSpec::for_input(spec, tensor, FillMode::Zero)
            .and_then(|padding| pad(tensor, &padding));
        match result {
            Ok((t, _)) => padded.push(t),
            Err(e) => {
                return CheckResult::failed(SHAPE_FIT, f, format!("padding '{}': {e}", spec.name))
            }
        }
    }
    if let Err(v) = descriptor.check_inputs(&padded) {
        return CheckResult::failed(SHAPE_FIT, f, format!("padded input: {v}"));
    }

    match outputs {
        Some(outputs) => match descriptor.check_outputs(inputs, outputs) {
            Ok(()) => CheckResult::passed(SHAPE_FIT, f),
            Err(v) => CheckResult::failed(SHAPE_FIT, f, format!("output: {v}")),
        },
        None => CheckResult::passed(SHAPE_FIT, f).with_detail("outputs not checked, the run failed"),
    }
}

fn check_reproduction(
    descriptor: &ResourceDescriptor,
    format: WeightFormat,
    outputs: &[Tensor],
    expected: &[Tensor],
    tolerance: Tolerance,
) -> CheckResult {
    let f = Some(format);
    let mut worst = 0.0f64;
    let mut worst_tensor = "";
    for ((spec, actual), expected) in descriptor.outputs().iter().zip(outputs).zip(expected) {
        match Tolerance::deviation(actual, expected) {
            Ok(d) if d > worst || worst_tensor.is_empty() => {
                worst = d;
                worst_tensor = &spec.name;
            }
            Ok(_) => {}
            Err(e) => {
                return CheckResult::failed(REPRODUCE_OUTPUTS, f, format!("'{}': {e}", spec.name))
            }
        }
    }

    let result = if tolerance.accepts(worst) {
        CheckResult::passed(REPRODUCE_OUTPUTS, f)
    } else {
        CheckResult::failed(
            REPRODUCE_OUTPUTS,
            f,
            format!(
                "'{worst_tensor}' deviates beyond {} decimals (limit {:e})",
                tolerance.decimals,
                tolerance.threshold()
            ),
        )
    };
    result.with_deviation(worst)
}
