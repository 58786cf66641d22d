// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON package manifest parsing and validation.
//!
//! The manifest (`manifest.json`) describes the model's tensors, the weight
//! formats the package ships, its test tensors and its lineage. All file
//! references are relative to the package root.
//!
//! # Format
//! ```json
//! {
//!   "format_version": "0.1.0",
//!   "name": "nuclei-unet2d",
//!   "description": "2D nucleus segmentation",
//!   "authors": [{ "name": "A. Author" }],
//!   "license": "MIT",
//!   "documentation": "README.md",
//!   "inputs": [{
//!     "name": "raw",
//!     "axes": [
//!       { "id": "b", "type": "batch", "size": 1 },
//!       { "id": "c", "type": "channel", "size": 1 },
//!       { "id": "y", "type": "space", "size": { "min": 16, "step": 16 } },
//!       { "id": "x", "type": "space", "size": { "min": 16, "step": 16 } }
//!     ],
//!     "preprocessing": [{ "name": "zero_mean_unit_variance", "kwargs": { "axes": ["y", "x"] } }]
//!   }],
//!   "outputs": [ ... ],
//!   "weights": { "safetensors": { "source": "weights.safetensors", "sha256": "…" } },
//!   "test_inputs": ["test_input_0.npy"],
//!   "test_outputs": ["test_output_0.npy"]
//! }
//! ```

use crate::hash::sha256_bytes;
use crate::{AxisSize, DescriptorError, TensorSpec, WeightEntry, WeightFormat};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Manifest schema version written by this crate.
pub const FORMAT_VERSION: &str = "0.1.0";

fn default_format_version() -> String {
    FORMAT_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Citation {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Identifies the package another package was derived from.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParentLink {
    /// The parent's `id`, or its name when it has none.
    pub id: String,
    /// SHA-256 of the parent's manifest.
    pub sha256: String,
}

/// Top-level package manifest, deserialized from `manifest.json`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default = "default_format_version")]
    pub format_version: String,
    /// Human-readable model name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Documentation file reference, relative to the package root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
    /// Weight entries keyed by format; at most one per format.
    pub weights: BTreeMap<WeightFormat, WeightEntry>,
    /// One `.npy` reference per input, in input order.
    pub test_inputs: Vec<String>,
    /// One `.npy` reference per output, in output order.
    pub test_outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentLink>,
}

impl Manifest {
    /// Loads a manifest from a JSON file path.
    pub fn from_file(path: &Path) -> Result<Self, DescriptorError> {
        let content = std::fs::read_to_string(path).map_err(|e| DescriptorError::io(path, e))?;
        Self::from_json(&content)
    }

    /// Parses a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, DescriptorError> {
        let manifest: Self = serde_json::from_str(json)?;
        Ok(manifest)
    }

    /// Pretty-printed JSON, as written into packages.
    pub fn to_json(&self) -> Result<String, DescriptorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the manifest as pretty-printed JSON.
    pub fn write_to(&self, path: &Path) -> Result<(), DescriptorError> {
        std::fs::write(path, self.to_json()?).map_err(|e| DescriptorError::io(path, e))
    }

    /// SHA-256 of the canonical (compact) JSON serialization.
    ///
    /// Field order is fixed by the struct and weights are kept sorted by
    /// format, so equal manifests always hash equally.
    pub fn sha256(&self) -> Result<String, DescriptorError> {
        let bytes = serde_json::to_vec(self)?;
        Ok(sha256_bytes(&bytes))
    }

    /// Looks up an input or output specification by name.
    pub fn tensor(&self, name: &str) -> Option<&TensorSpec> {
        self.inputs
            .iter()
            .chain(&self.outputs)
            .find(|t| t.name == name)
    }

    /// Validates that the manifest is internally consistent.
    ///
    /// Checks:
    /// - The name is non-empty; at least one input, output and weight entry.
    /// - Tensor names are unique, and axis ids are unique per tensor.
    /// - Axis sizes are positive; references point at existing axes.
    /// - Halos appear only on outputs and leave a non-empty interior.
    /// - Processing steps sit on the right side and their parameters and
    ///   axes are valid for their tensor.
    /// - There is one test tensor per input and per output.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.name.trim().is_empty() {
            return Err(DescriptorError::validation("name", "must not be empty"));
        }
        if self.inputs.is_empty() {
            return Err(DescriptorError::validation("inputs", "at least one input is required"));
        }
        if self.outputs.is_empty() {
            return Err(DescriptorError::validation("outputs", "at least one output is required"));
        }

        let mut names = HashSet::new();
        for spec in self.inputs.iter().chain(&self.outputs) {
            if spec.name.trim().is_empty() {
                return Err(DescriptorError::validation("tensor.name", "must not be empty"));
            }
            if !names.insert(spec.name.as_str()) {
                return Err(DescriptorError::validation(
                    format!("tensor '{}'", spec.name),
                    "duplicate tensor name",
                ));
            }
        }

        for spec in &self.inputs {
            self.validate_tensor(spec, true)?;
        }
        for spec in &self.outputs {
            self.validate_tensor(spec, false)?;
        }

        if self.weights.is_empty() {
            return Err(DescriptorError::validation("weights", "at least one weight entry is required"));
        }
        for (format, entry) in &self.weights {
            let field = format!("weights.{format}");
            if entry.source.trim().is_empty() {
                return Err(DescriptorError::validation(field, "source must not be empty"));
            }
            if let Some(hash) = &entry.sha256 {
                if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(DescriptorError::validation(field, "sha256 must be 64 hex digits"));
                }
            }
            if entry.parent == Some(*format) {
                return Err(DescriptorError::validation(field, "a format cannot be its own parent"));
            }
        }

        if self.test_inputs.len() != self.inputs.len() {
            return Err(DescriptorError::validation(
                "test_inputs",
                format!(
                    "{} test inputs for {} inputs",
                    self.test_inputs.len(),
                    self.inputs.len()
                ),
            ));
        }
        if self.test_outputs.len() != self.outputs.len() {
            return Err(DescriptorError::validation(
                "test_outputs",
                format!(
                    "{} test outputs for {} outputs",
                    self.test_outputs.len(),
                    self.outputs.len()
                ),
            ));
        }

        if let Some(parent) = &self.parent {
            if parent.id.is_empty() || parent.sha256.len() != 64 {
                return Err(DescriptorError::validation(
                    "parent",
                    "needs an id and a 64-digit sha256",
                ));
            }
        }

        Ok(())
    }

    fn validate_tensor(&self, spec: &TensorSpec, is_input: bool) -> Result<(), DescriptorError> {
        let field = |what: &str| format!("{}.{what}", spec.name);

        if spec.axes.is_empty() {
            return Err(DescriptorError::validation(field("axes"), "at least one axis is required"));
        }
        let mut ids = HashSet::new();
        for axis in &spec.axes {
            let at = field(&format!("axes.{}", axis.id));
            if !ids.insert(&axis.id) {
                return Err(DescriptorError::validation(at, "duplicate axis id"));
            }
            match &axis.size {
                AxisSize::Fixed(0) => {
                    return Err(DescriptorError::validation(at, "fixed size must be positive"));
                }
                AxisSize::Parameterized { min: 0, .. } => {
                    return Err(DescriptorError::validation(at, "minimum size must be positive"));
                }
                AxisSize::Reference {
                    tensor, axis: ref_axis, scale, ..
                } => {
                    let target = self.tensor(tensor).ok_or_else(|| {
                        DescriptorError::validation(&at, format!("references unknown tensor '{tensor}'"))
                    })?;
                    if target.axis(ref_axis).is_none() {
                        return Err(DescriptorError::validation(
                            at,
                            format!("references unknown axis '{tensor}.{ref_axis}'"),
                        ));
                    }
                    if target.name == spec.name && ref_axis == &axis.id {
                        return Err(DescriptorError::validation(at, "references itself"));
                    }
                    if !(scale.is_finite() && *scale > 0.0) {
                        return Err(DescriptorError::validation(at, "scale must be positive"));
                    }
                }
                _ => {}
            }

            if axis.halo > 0 {
                if is_input {
                    return Err(DescriptorError::validation(at, "halo is only allowed on outputs"));
                }
                if let Some(min) = self.min_size(&axis.size) {
                    if 2 * axis.halo >= min {
                        return Err(DescriptorError::validation(
                            at,
                            format!("halo {} leaves no interior in size {min}", axis.halo),
                        ));
                    }
                }
            }
        }

        let (steps, misplaced, side) = if is_input {
            (&spec.preprocessing, &spec.postprocessing, "postprocessing")
        } else {
            (&spec.postprocessing, &spec.preprocessing, "preprocessing")
        };
        if !misplaced.is_empty() {
            let role = if is_input { "inputs" } else { "outputs" };
            return Err(DescriptorError::validation(
                field(side),
                format!("not allowed on {role}"),
            ));
        }
        let axis_ids = spec.axis_ids();
        for (i, step) in steps.iter().enumerate() {
            step.validate(&axis_ids)
                .map_err(|detail| DescriptorError::validation(field(&format!("processing[{i}]")), detail))?;
        }
        Ok(())
    }

    /// Smallest size an axis can take, following one level of reference.
    fn min_size(&self, size: &AxisSize) -> Option<usize> {
        match size {
            AxisSize::Reference { tensor, axis, .. } => {
                let referenced = self.tensor(tensor)?.axis(axis)?.size.min_size()?;
                size.resolve(referenced)
            }
            other => other.min_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_manifest_json() -> &'static str {
        r#"{
            "name": "nuclei-unet2d",
            "description": "2D nucleus segmentation",
            "authors": [{ "name": "A. Author", "affiliation": "Lab" }],
            "license": "MIT",
            "tags": ["segmentation", "nuclei"],
            "inputs": [{
                "name": "raw",
                "axes": [
                    { "id": "b", "type": "batch", "size": 1 },
                    { "id": "c", "type": "channel", "size": 1 },
                    { "id": "y", "type": "space", "size": { "min": 16, "step": 16 } },
                    { "id": "x", "type": "space", "size": { "min": 16, "step": 16 } }
                ],
                "preprocessing": [
                    { "name": "zero_mean_unit_variance", "kwargs": { "axes": ["y", "x"] } }
                ]
            }],
            "outputs": [{
                "name": "mask",
                "axes": [
                    { "id": "b", "type": "batch", "size": 1 },
                    { "id": "c", "type": "channel", "size": 1 },
                    { "id": "y", "type": "space", "size": { "tensor": "raw", "axis": "y" }, "halo": 4 },
                    { "id": "x", "type": "space", "size": { "tensor": "raw", "axis": "x" }, "halo": 4 }
                ],
                "postprocessing": [{ "name": "sigmoid" }]
            }],
            "weights": { "safetensors": { "source": "weights.safetensors" } },
            "test_inputs": ["test_input_0.npy"],
            "test_outputs": ["test_output_0.npy"]
        }"#
    }

    fn sample() -> Manifest {
        Manifest::from_json(sample_manifest_json()).unwrap()
    }

    #[test]
    fn test_parse_manifest() {
        let m = sample();
        assert_eq!(m.name, "nuclei-unet2d");
        assert_eq!(m.format_version, FORMAT_VERSION);
        assert_eq!(m.inputs[0].axes.len(), 4);
        assert_eq!(m.outputs[0].halo(&"x".into()), 4);
        assert!(m.weights.contains_key(&WeightFormat::SafeTensors));
    }

    #[test]
    fn test_validate_ok() {
        sample().validate().unwrap();
    }

    #[test]
    fn test_validate_test_tensor_counts() {
        let mut m = sample();
        m.test_outputs.clear();
        let err = m.validate().unwrap_err().to_string();
        assert!(err.contains("test_outputs"));
    }

    #[test]
    fn test_validate_duplicate_tensor_names() {
        let mut m = sample();
        m.outputs[0].name = "raw".into();
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_validate_halo_rules() {
        let mut m = sample();
        m.inputs[0].axes[2].halo = 2;
        assert!(m.validate().unwrap_err().to_string().contains("only allowed on outputs"));

        let mut m = sample();
        // Referenced minimum is 16, so a halo of 8 leaves no interior.
        m.outputs[0].axes[3].halo = 8;
        assert!(m.validate().unwrap_err().to_string().contains("no interior"));
    }

    #[test]
    fn test_validate_bad_reference() {
        let mut m = sample();
        m.outputs[0].axes[2].size = AxisSize::Reference {
            tensor: "raw".into(),
            axis: "z".into(),
            scale: 1.0,
            offset: 0,
        };
        assert!(m.validate().unwrap_err().to_string().contains("unknown axis"));
    }

    #[test]
    fn test_validate_processing_side_and_axes() {
        let mut m = sample();
        m.outputs[0].preprocessing = m.inputs[0].preprocessing.clone();
        assert!(m.validate().is_err());

        let mut m = sample();
        m.outputs[0].axes.retain(|a| a.id.as_str() != "x");
        m.outputs[0].postprocessing = m.inputs[0].preprocessing.clone();
        m.inputs[0].preprocessing.clear();
        assert!(m.validate().unwrap_err().to_string().contains("'x'"));
    }

    #[test]
    fn test_validate_empty_weights_and_bad_hash() {
        let mut m = sample();
        m.weights.clear();
        assert!(m.validate().is_err());

        let mut m = sample();
        if let Some(entry) = m.weights.get_mut(&WeightFormat::SafeTensors) {
            entry.sha256 = Some("abc".into());
        }
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = sample_manifest_json().replace("\"license\"", "\"licence\"");
        assert!(matches!(
            Manifest::from_json(&json),
            Err(DescriptorError::Parse(_))
        ));
    }

    #[test]
    fn test_sha256_is_stable_and_content_sensitive() {
        let m = sample();
        let h1 = m.sha256().unwrap();
        let reparsed = Manifest::from_json(&m.to_json().unwrap()).unwrap();
        assert_eq!(h1, reparsed.sha256().unwrap());
        assert_eq!(h1.len(), 64);

        let mut changed = m.clone();
        changed.description.push('!');
        assert_ne!(h1, changed.sha256().unwrap());
    }

    #[test]
    fn test_serde_roundtrip() {
        let m = sample();
        let back = Manifest::from_json(&m.to_json().unwrap()).unwrap();
        assert_eq!(back, m);
    }
}
