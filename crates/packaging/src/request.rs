// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! What goes into a package.

use crate::PackageError;
use resource_descr::{Author, Citation, ResourceDescriptor, TensorSpec, WeightFormat};
use std::path::{Path, PathBuf};
use tensor_core::Tensor;

/// Identity and descriptive fields of a package.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A weight file to include.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSource {
    pub format: WeightFormat,
    /// A file, or a directory for bundle formats.
    pub path: PathBuf,
    pub version: Option<String>,
    pub parameter_count: Option<u64>,
}

impl WeightSource {
    pub fn new(format: WeightFormat, path: impl Into<PathBuf>) -> Self {
        Self {
            format,
            path: path.into(),
            version: None,
            parameter_count: None,
        }
    }

    /// Parses `format=path`, as given on the command line.
    pub fn parse(arg: &str) -> Result<Self, PackageError> {
        let (format, path) = arg.split_once('=').ok_or_else(|| {
            PackageError::InvalidRequest(format!("expected FORMAT=PATH, got '{arg}'"))
        })?;
        let format = format.parse::<WeightFormat>().map_err(PackageError::InvalidRequest)?;
        Ok(Self::new(format, path))
    }
}

/// Package documentation.
#[derive(Debug, Clone, PartialEq)]
pub enum Documentation {
    /// Markdown text written as the README.
    Text(String),
    /// An existing file copied in as the README.
    File(PathBuf),
}

/// Everything [`PackageBuilder::build`](crate::PackageBuilder::build) needs.
#[derive(Debug, Clone)]
pub struct BuildRequest<'p> {
    pub metadata: PackageMetadata,
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
    pub weights: Vec<WeightSource>,
    /// One tensor per input, in input order.
    pub test_inputs: Vec<Tensor>,
    /// One tensor per output, in output order.
    pub test_outputs: Vec<Tensor>,
    /// A README is generated from the metadata when absent.
    pub documentation: Option<Documentation>,
    /// The package this one is derived from.
    pub parent: Option<&'p ResourceDescriptor>,
}

/// A JSON template holding the metadata and tensor specifications of a
/// package, as read by the command line.
///
/// # Format
/// ```json
/// {
///   "name": "nuclei-unet2d",
///   "description": "2D nucleus segmentation",
///   "license": "MIT",
///   "inputs": [ ... ],
///   "outputs": [ ... ],
///   "documentation": "README.md"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct PackageTemplate {
    #[serde(flatten)]
    pub metadata: PackageMetadata,
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
    /// Documentation file, relative to the template.
    #[serde(default)]
    pub documentation: Option<PathBuf>,
}

impl PackageTemplate {
    pub fn from_file(path: &Path) -> Result<Self, PackageError> {
        let content = std::fs::read_to_string(path).map_err(|e| PackageError::io(path, e))?;
        let mut template: Self = serde_json::from_str(&content)
            .map_err(|e| PackageError::InvalidRequest(format!("{}: {e}", path.display())))?;
        if let (Some(doc), Some(dir)) = (&template.documentation, path.parent()) {
            template.documentation = Some(dir.join(doc));
        }
        Ok(template)
    }

    /// A request with this template's metadata and specs and no data yet.
    pub fn into_request<'p>(self) -> BuildRequest<'p> {
        BuildRequest {
            metadata: self.metadata,
            inputs: self.inputs,
            outputs: self.outputs,
            weights: Vec::new(),
            test_inputs: Vec::new(),
            test_outputs: Vec::new(),
            documentation: self.documentation.map(Documentation::File),
            parent: None,
        }
    }
}
