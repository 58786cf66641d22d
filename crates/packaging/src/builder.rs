// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Building packages and adding weights to them.
//!
//! A build is staged in `<out_dir>.partial` and moved into place only after
//! the package loads and reproduces its test outputs, so a failed build
//! leaves nothing at `out_dir`. Adding weights writes the new manifest only
//! after every format has been re-verified.

use crate::verify::verify_all;
use crate::{BuildRequest, Documentation, PackageError, PackageMetadata, WeightSource};
use prediction::{InferenceEngine, Tolerance};
use resource_descr::hash::sha256_path;
use resource_descr::{
    LocalResolver, Manifest, ResourceDescriptor, TensorSpec, WeightEntry, WeightFormat,
    FORMAT_VERSION, MANIFEST_FILE,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tensor_core::io::write_npy_tensor;
use tensor_core::Tensor;
use weight_converter::WeightConverter;

/// README file name inside a package.
pub const README_FILE: &str = "README.md";

/// Assembles and extends packages, verifying them with `engine`.
pub struct PackageBuilder<'e> {
    engine: &'e dyn InferenceEngine,
    tolerance: Tolerance,
}

impl<'e> PackageBuilder<'e> {
    pub fn new(engine: &'e dyn InferenceEngine) -> Self {
        Self {
            engine,
            tolerance: Tolerance::default(),
        }
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Writes a verified package to `out_dir`, which must not exist.
    ///
    /// The parent, if any, is only read.
    pub fn build(
        &self,
        request: BuildRequest<'_>,
        out_dir: &Path,
    ) -> Result<ResourceDescriptor, PackageError> {
        if out_dir.exists() {
            return Err(PackageError::DestinationExists {
                path: out_dir.display().to_string(),
            });
        }
        let staging = staging_path(out_dir);
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| PackageError::io(&staging, e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| PackageError::io(&staging, e))?;

        if let Err(e) = self.stage(&request, &staging) {
            remove_quietly(&staging);
            return Err(e);
        }
        fs::rename(&staging, out_dir).map_err(|e| PackageError::io(out_dir, e))?;

        let descriptor = ResourceDescriptor::load(out_dir)?;
        tracing::info!("built package {}", descriptor.summary());
        Ok(descriptor)
    }

    fn stage(&self, request: &BuildRequest<'_>, staging: &Path) -> Result<(), PackageError> {
        check_request(request)?;

        let mut weights = BTreeMap::new();
        for source in &request.weights {
            let entry = copy_weights(source, staging)?;
            weights.insert(source.format, entry);
        }

        let test_inputs = write_test_tensors(staging, "test_input", &request.inputs, &request.test_inputs)?;
        let test_outputs =
            write_test_tensors(staging, "test_output", &request.outputs, &request.test_outputs)?;

        let readme = staging.join(README_FILE);
        match &request.documentation {
            Some(Documentation::Text(text)) => {
                fs::write(&readme, text).map_err(|e| PackageError::io(&readme, e))?
            }
            Some(Documentation::File(path)) => {
                fs::copy(path, &readme).map_err(|e| PackageError::io(path, e))?;
            }
            None => fs::write(&readme, render_readme(request))
                .map_err(|e| PackageError::io(&readme, e))?,
        }

        let meta = &request.metadata;
        let manifest = Manifest {
            format_version: FORMAT_VERSION.to_string(),
            name: meta.name.clone(),
            description: meta.description.clone(),
            id: meta.id.clone(),
            version: meta.version.clone(),
            authors: meta.authors.clone(),
            license: meta.license.clone(),
            citations: meta.citations.clone(),
            tags: meta.tags.clone(),
            documentation: Some(README_FILE.to_string()),
            inputs: request.inputs.clone(),
            outputs: request.outputs.clone(),
            weights,
            test_inputs,
            test_outputs,
            parent: request.parent.map(ResourceDescriptor::parent_link),
        };
        manifest.write_to(&staging.join(MANIFEST_FILE))?;

        let descriptor = ResourceDescriptor::load(staging)?;
        verify_all(&descriptor, self.engine, self.tolerance)?;
        Ok(())
    }

    /// Adds one more weight format to an existing package.
    ///
    /// Existing entries are carried over unchanged and every format is
    /// re-verified before the manifest is replaced. On failure the package
    /// is left as it was.
    pub fn add_weights(
        &self,
        package_dir: &Path,
        source: &WeightSource,
    ) -> Result<ResourceDescriptor, PackageError> {
        let descriptor = ResourceDescriptor::load(package_dir)?;
        if descriptor.weight_entry(source.format).is_some() {
            return Err(PackageError::FormatExists {
                format: source.format,
            });
        }
        let dest = package_dir.join(source.format.default_file_name());
        if dest.exists() {
            return Err(PackageError::DestinationExists {
                path: dest.display().to_string(),
            });
        }

        let entry = copy_weights(source, package_dir)?;
        self.commit_entry(&descriptor, source.format, entry, &dest)
    }

    /// Converts existing weights with `converter` and adds the result.
    pub fn convert_and_add(
        &self,
        package_dir: &Path,
        from: WeightFormat,
        to: WeightFormat,
        converter: &WeightConverter<'_>,
    ) -> Result<ResourceDescriptor, PackageError> {
        let descriptor = ResourceDescriptor::load(package_dir)?;
        if descriptor.weight_entry(to).is_some() {
            return Err(PackageError::FormatExists { format: to });
        }
        let entry = converter.convert(&descriptor, from, to, package_dir)?;
        let dest = package_dir.join(&entry.source);
        self.commit_entry(&descriptor, to, entry, &dest)
    }

    fn commit_entry(
        &self,
        descriptor: &ResourceDescriptor,
        format: WeightFormat,
        entry: WeightEntry,
        written: &Path,
    ) -> Result<ResourceDescriptor, PackageError> {
        let package_dir = descriptor.root();
        let mut manifest = descriptor.manifest().clone();
        manifest.weights.insert(format, entry);

        let verified = ResourceDescriptor::from_manifest(manifest.clone(), package_dir, &LocalResolver)
            .map_err(PackageError::from)
            .and_then(|extended| verify_all(&extended, self.engine, self.tolerance));
        if let Err(e) = verified {
            remove_quietly(written);
            return Err(e);
        }

        let manifest_path = package_dir.join(MANIFEST_FILE);
        let partial = package_dir.join(format!("{MANIFEST_FILE}.partial"));
        manifest.write_to(&partial)?;
        fs::rename(&partial, &manifest_path).map_err(|e| PackageError::io(&manifest_path, e))?;

        let updated = ResourceDescriptor::load(package_dir)?;
        tracing::info!("added {} weights: {}", format, updated.summary());
        Ok(updated)
    }
}

impl std::fmt::Debug for PackageBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageBuilder")
            .field("engine", &self.engine.name())
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

fn staging_path(out_dir: &Path) -> PathBuf {
    let mut name = out_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "package".into());
    name.push(".partial");
    out_dir.with_file_name(name)
}

fn check_request(request: &BuildRequest<'_>) -> Result<(), PackageError> {
    if request.weights.is_empty() {
        return Err(PackageError::InvalidRequest("no weights given".into()));
    }
    let mut seen = Vec::new();
    for w in &request.weights {
        if seen.contains(&w.format) {
            return Err(PackageError::InvalidRequest(format!(
                "'{}' weights given twice",
                w.format
            )));
        }
        seen.push(w.format);
    }
    for (kind, specs, tensors) in [
        ("test inputs", &request.inputs, &request.test_inputs),
        ("test outputs", &request.outputs, &request.test_outputs),
    ] {
        if specs.len() != tensors.len() {
            return Err(PackageError::InvalidRequest(format!(
                "{} {kind} for {} tensors",
                tensors.len(),
                specs.len()
            )));
        }
    }
    Ok(())
}

/// Copies a weight file (or directory) under its format's default name and
/// describes it.
fn copy_weights(source: &WeightSource, package_dir: &Path) -> Result<WeightEntry, PackageError> {
    let file_name = source.format.default_file_name();
    let dest = package_dir.join(file_name);
    if source.path.is_dir() {
        copy_dir(&source.path, &dest)?;
    } else {
        fs::copy(&source.path, &dest).map_err(|e| PackageError::io(&source.path, e))?;
    }
    let sha256 = sha256_path(&dest)?;
    tracing::debug!("copied {} weights to {}", source.format, dest.display());
    Ok(WeightEntry {
        source: file_name.to_string(),
        sha256: Some(sha256),
        parent: None,
        version: source.version.clone(),
        parameter_count: source.parameter_count,
    })
}

fn copy_dir(from: &Path, to: &Path) -> Result<(), PackageError> {
    fs::create_dir_all(to).map_err(|e| PackageError::io(to, e))?;
    for entry in fs::read_dir(from).map_err(|e| PackageError::io(from, e))? {
        let entry = entry.map_err(|e| PackageError::io(from, e))?;
        let target = to.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| PackageError::io(&entry.path(), e))?;
        }
    }
    Ok(())
}

/// Writes `<prefix>_<i>.npy` per tensor in the axis order of its spec.
fn write_test_tensors(
    dir: &Path,
    prefix: &str,
    specs: &[TensorSpec],
    tensors: &[Tensor],
) -> Result<Vec<String>, PackageError> {
    specs
        .iter()
        .zip(tensors)
        .enumerate()
        .map(|(i, (spec, tensor))| {
            let name = format!("{prefix}_{i}.npy");
            let conformed = tensor.conform_to(&spec.axis_ids())?;
            write_npy_tensor(&dir.join(&name), &conformed)?;
            Ok(name)
        })
        .collect()
}

fn render_readme(request: &BuildRequest<'_>) -> String {
    let meta: &PackageMetadata = &request.metadata;
    let mut s = format!("# {}\n\n", meta.name);
    if !meta.description.is_empty() {
        s.push_str(&format!("{}\n\n", meta.description));
    }
    if !meta.authors.is_empty() {
        let names: Vec<&str> = meta.authors.iter().map(|a| a.name.as_str()).collect();
        s.push_str(&format!("Authors: {}\n\n", names.join(", ")));
    }
    if !meta.license.is_empty() {
        s.push_str(&format!("License: {}\n\n", meta.license));
    }
    s.push_str("## Tensors\n\n");
    for spec in request.inputs.iter().chain(&request.outputs) {
        s.push_str(&format!("- {}\n", spec.summary()));
    }
    s.push_str("\n## Weights\n\n");
    for w in &request.weights {
        s.push_str(&format!("- {} (`{}`)\n", w.format, w.format.default_file_name()));
    }
    if let Some(parent) = request.parent {
        s.push_str(&format!("\nDerived from {}.\n", parent.id()));
    }
    s
}

fn remove_quietly(path: &Path) {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    if let Err(e) = removed {
        tracing::warn!("could not clean up '{}': {e}", path.display());
    }
}
