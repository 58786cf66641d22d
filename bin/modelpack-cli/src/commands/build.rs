// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `modelpack build-package`: assemble a package from a template, weights
//! and test tensors.

use super::load_package;
use anyhow::{bail, Context};
use packaging::{PackageBuilder, PackageTemplate, WeightSource};
use prediction::{ConvolutionEngine, PredictionConfig};
use resource_descr::TensorSpec;
use std::path::{Path, PathBuf};
use tensor_core::io::read_tensor_as;
use tensor_core::Tensor;

pub fn execute(
    config: &PredictionConfig,
    template: &Path,
    weights: &[String],
    test_inputs: &[PathBuf],
    test_outputs: &[PathBuf],
    out: &Path,
    parent: Option<&Path>,
) -> anyhow::Result<()> {
    let parent = parent.map(load_package).transpose()?;
    let template = PackageTemplate::from_file(template)?;
    let mut request = template.into_request();

    request.weights = weights
        .iter()
        .map(|w| WeightSource::parse(w))
        .collect::<Result<_, _>>()?;
    request.test_inputs = read_test_tensors("input", &request.inputs, test_inputs)?;
    request.test_outputs = read_test_tensors("output", &request.outputs, test_outputs)?;
    request.parent = parent.as_ref();

    let engine = ConvolutionEngine::default();
    let builder = PackageBuilder::new(&engine).with_tolerance(config.tolerance());
    let descriptor = builder
        .build(request, out)
        .with_context(|| format!("failed to build package at '{}'", out.display()))?;

    println!("  Built {}", descriptor.summary());
    println!("  Location: {}", out.display());
    if let Some(link) = descriptor.parent() {
        println!("  Derived from: {} ({})", link.id, &link.sha256[..12.min(link.sha256.len())]);
    }
    Ok(())
}

fn read_test_tensors(
    role: &str,
    specs: &[TensorSpec],
    paths: &[PathBuf],
) -> anyhow::Result<Vec<Tensor>> {
    if specs.len() != paths.len() {
        bail!(
            "the model has {} {role}(s) but {} test {role}(s) were given",
            specs.len(),
            paths.len()
        );
    }
    specs
        .iter()
        .zip(paths)
        .map(|(spec, path)| {
            read_tensor_as(path, &spec.axis_ids())
                .with_context(|| format!("failed to read test {role} '{}'", path.display()))
        })
        .collect()
}
