// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `modelpack add-weights` and `modelpack convert-weights`.

use super::parse_format;
use packaging::{PackageBuilder, WeightSource};
use prediction::{ConvolutionEngine, PredictionConfig};
use resource_descr::ResourceDescriptor;
use std::path::Path;
use weight_converter::WeightConverter;

pub fn add(
    config: &PredictionConfig,
    package: &Path,
    format: &str,
    weights: &Path,
) -> anyhow::Result<()> {
    let source = WeightSource::new(parse_format(format)?, weights);
    let engine = ConvolutionEngine::default();
    let descriptor = PackageBuilder::new(&engine)
        .with_tolerance(config.tolerance())
        .add_weights(package, &source)?;

    println!("  Added {} weights to '{}'", source.format, descriptor.name());
    print_formats(&descriptor);
    Ok(())
}

pub fn convert(config: &PredictionConfig, package: &Path, from: &str, to: &str) -> anyhow::Result<()> {
    let (from, to) = (parse_format(from)?, parse_format(to)?);
    let engine = ConvolutionEngine::default();
    let converter = WeightConverter::new();
    let descriptor = PackageBuilder::new(&engine)
        .with_tolerance(config.tolerance())
        .convert_and_add(package, from, to, &converter)?;

    println!("  Converted {from} -> {to} in '{}'", descriptor.name());
    print_formats(&descriptor);
    Ok(())
}

fn print_formats(descriptor: &ResourceDescriptor) {
    let formats: Vec<String> = descriptor.weights().keys().map(|f| f.to_string()).collect();
    println!("  Weight formats: {}", formats.join(", "));
}
