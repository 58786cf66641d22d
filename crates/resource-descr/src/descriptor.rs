// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Loading a package into an immutable [`ResourceDescriptor`].
//!
//! Loading parses and validates the manifest, resolves every file reference
//! against the package root, checks recorded weight hashes and records the
//! manifest hash. A descriptor is never mutated afterwards; deriving a new
//! package produces a new [`Manifest`] value.

use crate::hash::sha256_path;
use crate::{
    DescriptorError, LocalResolver, Manifest, ParentLink, ShapeViolation, SourceResolver,
    TensorSpec, WeightEntry, WeightFormat, WeightPriority,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tensor_core::io::read_npy_tensor;
use tensor_core::{AxisId, Tensor};

/// Default manifest filename inside a package directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// A validated model package with all references resolved.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    manifest: Manifest,
    root: PathBuf,
    manifest_sha256: String,
    weight_paths: BTreeMap<WeightFormat, PathBuf>,
    test_input_paths: Vec<PathBuf>,
    test_output_paths: Vec<PathBuf>,
    documentation_path: Option<PathBuf>,
}

impl ResourceDescriptor {
    /// Loads a package from a directory or a manifest path, resolving
    /// references on the local filesystem.
    ///
    /// # Example
    /// ```no_run
    /// use resource_descr::ResourceDescriptor;
    /// use std::path::Path;
    ///
    /// let descr = ResourceDescriptor::load(Path::new("./packages/unet2d")).unwrap();
    /// println!("{} has {} weight formats", descr.name(), descr.weights().len());
    /// ```
    pub fn load(source: &Path) -> Result<Self, DescriptorError> {
        Self::load_with(source, &LocalResolver)
    }

    /// Loads a package using a custom [`SourceResolver`].
    pub fn load_with(source: &Path, resolver: &dyn SourceResolver) -> Result<Self, DescriptorError> {
        let (root, manifest_path) = Self::locate(source)?;
        let manifest = Manifest::from_file(&manifest_path)?;
        Self::from_manifest(manifest, &root, resolver)
    }

    /// Returns the package root and manifest path for a directory or a
    /// manifest path.
    pub fn locate(source: &Path) -> Result<(PathBuf, PathBuf), DescriptorError> {
        let (root, manifest_path) = if source.is_dir() {
            (source.to_path_buf(), source.join(MANIFEST_FILE))
        } else {
            let root = source
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            (root.to_path_buf(), source.to_path_buf())
        };
        if !manifest_path.is_file() {
            return Err(DescriptorError::UnresolvedSource {
                reference: manifest_path.display().to_string(),
                detail: "no manifest found".into(),
            });
        }
        Ok((root, manifest_path))
    }

    /// Builds a descriptor from an in-memory manifest whose references are
    /// relative to `root`.
    pub fn from_manifest(
        manifest: Manifest,
        root: &Path,
        resolver: &dyn SourceResolver,
    ) -> Result<Self, DescriptorError> {
        manifest.validate()?;

        let mut weight_paths = BTreeMap::new();
        for (format, entry) in &manifest.weights {
            let path = resolver.resolve(root, &entry.source)?;
            if let Some(recorded) = &entry.sha256 {
                let actual = sha256_path(&path)?;
                if !actual.eq_ignore_ascii_case(recorded) {
                    return Err(DescriptorError::validation(
                        format!("weights.{format}.sha256"),
                        format!("recorded {recorded} but '{}' hashes to {actual}", entry.source),
                    ));
                }
            }
            tracing::debug!("resolved {format} weights to {}", path.display());
            weight_paths.insert(*format, path);
        }

        let resolve_all = |refs: &[String]| -> Result<Vec<PathBuf>, DescriptorError> {
            refs.iter().map(|r| resolver.resolve(root, r)).collect()
        };
        let test_input_paths = resolve_all(&manifest.test_inputs)?;
        let test_output_paths = resolve_all(&manifest.test_outputs)?;
        let documentation_path = manifest
            .documentation
            .as_deref()
            .map(|doc| resolver.resolve(root, doc))
            .transpose()?;

        let manifest_sha256 = manifest.sha256()?;
        tracing::info!(
            "loaded '{}' from {} ({} weight formats)",
            manifest.name,
            root.display(),
            manifest.weights.len()
        );

        Ok(Self {
            manifest,
            root: root.to_path_buf(),
            manifest_sha256,
            weight_paths,
            test_input_paths,
            test_output_paths,
            documentation_path,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// The package id, falling back to its name.
    pub fn id(&self) -> &str {
        self.manifest.id.as_deref().unwrap_or(&self.manifest.name)
    }

    /// Package root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// SHA-256 of the manifest as loaded.
    pub fn sha256(&self) -> &str {
        &self.manifest_sha256
    }

    pub fn inputs(&self) -> &[TensorSpec] {
        &self.manifest.inputs
    }

    pub fn outputs(&self) -> &[TensorSpec] {
        &self.manifest.outputs
    }

    pub fn weights(&self) -> &BTreeMap<WeightFormat, WeightEntry> {
        &self.manifest.weights
    }

    pub fn weight_entry(&self, format: WeightFormat) -> Option<&WeightEntry> {
        self.manifest.weights.get(&format)
    }

    /// Resolved location of a weight format's file.
    pub fn weight_path(&self, format: WeightFormat) -> Option<&Path> {
        self.weight_paths.get(&format).map(PathBuf::as_path)
    }

    pub fn test_input_paths(&self) -> &[PathBuf] {
        &self.test_input_paths
    }

    pub fn test_output_paths(&self) -> &[PathBuf] {
        &self.test_output_paths
    }

    pub fn documentation_path(&self) -> Option<&Path> {
        self.documentation_path.as_deref()
    }

    pub fn parent(&self) -> Option<&ParentLink> {
        self.manifest.parent.as_ref()
    }

    /// Picks a weight format by `priority` among those this package ships.
    pub fn select_weights(
        &self,
        priority: &WeightPriority,
        accept: impl Fn(WeightFormat) -> bool,
    ) -> Option<WeightFormat> {
        priority.select(self.manifest.weights.keys(), accept)
    }

    /// Reads the stored test inputs, labelled with the input axes.
    pub fn load_test_inputs(&self) -> Result<Vec<Tensor>, DescriptorError> {
        load_tensors(&self.manifest.inputs, &self.test_input_paths)
    }

    /// Reads the stored test outputs, labelled with the output axes.
    pub fn load_test_outputs(&self) -> Result<Vec<Tensor>, DescriptorError> {
        load_tensors(&self.manifest.outputs, &self.test_output_paths)
    }

    /// Checks count, axis order and every axis size of `inputs`.
    pub fn check_inputs(&self, inputs: &[Tensor]) -> Result<(), ShapeViolation> {
        check_count("inputs", self.inputs().len(), inputs.len())?;
        let resolve = |name: &str, axis: &AxisId| size_in(self.inputs(), inputs, name, axis);
        for (spec, tensor) in self.inputs().iter().zip(inputs) {
            spec.check_dims(tensor.axes(), tensor.dims(), &resolve)?;
        }
        Ok(())
    }

    /// Checks `outputs` against the output specs, resolving references
    /// against the `inputs` that produced them.
    pub fn check_outputs(&self, inputs: &[Tensor], outputs: &[Tensor]) -> Result<(), ShapeViolation> {
        check_count("outputs", self.outputs().len(), outputs.len())?;
        let resolve = |name: &str, axis: &AxisId| {
            size_in(self.inputs(), inputs, name, axis)
                .or_else(|| size_in(self.outputs(), outputs, name, axis))
        };
        for (spec, tensor) in self.outputs().iter().zip(outputs) {
            spec.check_dims(tensor.axes(), tensor.dims(), &resolve)?;
        }
        Ok(())
    }

    /// The link a derived package records to this one.
    pub fn parent_link(&self) -> ParentLink {
        ParentLink {
            id: self.id().to_string(),
            sha256: self.manifest_sha256.clone(),
        }
    }

    /// A copy of this manifest, without identity, that records this package
    /// as its parent. The original is untouched.
    pub fn derive(&self) -> Manifest {
        let mut manifest = self.manifest.clone();
        manifest.id = None;
        manifest.version = None;
        manifest.parent = Some(self.parent_link());
        manifest
    }

    /// Returns a concise summary string for display.
    pub fn summary(&self) -> String {
        let formats: Vec<&str> = self.manifest.weights.keys().map(|f| f.as_str()).collect();
        let mut s = format!(
            "{}: {} input(s), {} output(s), weights: {}, sha256 {}",
            self.manifest.name,
            self.manifest.inputs.len(),
            self.manifest.outputs.len(),
            formats.join(", "),
            &self.manifest_sha256[..12.min(self.manifest_sha256.len())],
        );
        if let Some(parent) = &self.manifest.parent {
            s.push_str(&format!(", derived from {}", parent.id));
        }
        s
    }
}

fn load_tensors(specs: &[TensorSpec], paths: &[PathBuf]) -> Result<Vec<Tensor>, DescriptorError> {
    specs
        .iter()
        .zip(paths)
        .map(|(spec, path)| read_npy_tensor(path, spec.axis_ids()).map_err(DescriptorError::from))
        .collect()
}

fn check_count(what: &str, expected: usize, actual: usize) -> Result<(), ShapeViolation> {
    if expected == actual {
        Ok(())
    } else {
        Err(ShapeViolation {
            tensor: what.to_string(),
            detail: format!("expected {expected} tensors, got {actual}"),
        })
    }
}

fn size_in(specs: &[TensorSpec], tensors: &[Tensor], name: &str, axis: &AxisId) -> Option<usize> {
    let index = specs.iter().position(|s| s.name == name)?;
    tensors.get(index)?.size_of(axis)
}
