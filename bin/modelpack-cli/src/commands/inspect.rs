// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `modelpack inspect`: display a package's metadata, tensors and weights.

use super::{load_package, truncate};
use resource_descr::TensorSpec;
use std::path::Path;

pub fn execute(package: &Path) -> anyhow::Result<()> {
    let descriptor = load_package(package)?;
    let manifest = descriptor.manifest();

    // ── Summary ────────────────────────────────────────────────
    println!("  Package: {}", manifest.name);
    if let Some(id) = &manifest.id {
        println!("  Id:      {id}");
    }
    if let Some(version) = &manifest.version {
        println!("  Version: {version}");
    }
    println!("  License: {}", manifest.license);
    println!("  Format:  {}", manifest.format_version);
    println!("  SHA-256: {}", descriptor.sha256());
    println!("  {}", truncate(&manifest.description, 72));
    if !manifest.authors.is_empty() {
        let names: Vec<&str> = manifest.authors.iter().map(|a| a.name.as_str()).collect();
        println!("  Authors: {}", names.join(", "));
    }
    if let Some(parent) = descriptor.parent() {
        println!("  Parent:  {} ({})", parent.id, parent.sha256);
    }
    println!();

    // ── Tensors ────────────────────────────────────────────────
    println!("  Inputs");
    for spec in descriptor.inputs() {
        print_tensor(spec);
    }
    println!("  Outputs");
    for spec in descriptor.outputs() {
        print_tensor(spec);
    }
    println!();

    // ── Weights ────────────────────────────────────────────────
    println!("  {:<32} {:<28} {:<14} {:>14}", "Format", "Source", "SHA-256", "Parent");
    println!("  {}", "-".repeat(92));
    for (format, entry) in descriptor.weights() {
        let hash = entry
            .sha256
            .as_deref()
            .map(|h| truncate(h, 14))
            .unwrap_or_else(|| "-".into());
        let parent = entry.parent.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "  {:<32} {:<28} {:<14} {:>14}",
            format.as_str(),
            truncate(&entry.source, 28),
            hash,
            parent
        );
    }
    println!();

    println!(
        "  Test data: {} input(s), {} output(s)",
        descriptor.test_input_paths().len(),
        descriptor.test_output_paths().len()
    );
    Ok(())
}

fn print_tensor(spec: &TensorSpec) {
    let axes: Vec<String> = spec
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
    println!("   {:<16} {:<8} [{}]", spec.name, spec.data_type.to_string(), axes.join(", "));
    for step in &spec.preprocessing {
        println!("     pre:  {}", step.name());
    }
    for step in &spec.postprocessing {
        println!("     post: {}", step.name());
    }
}
