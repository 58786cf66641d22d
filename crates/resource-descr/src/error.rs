// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for manifest parsing, validation and loading.

/// Errors that can occur when describing or loading a model package.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// A package file could not be read or written.
    #[error("i/o error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The manifest JSON is malformed or does not match the schema.
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    /// The manifest parsed but violates a structural rule.
    #[error("invalid manifest field '{field}': {detail}")]
    Validation { field: String, detail: String },

    /// A file reference in the manifest could not be resolved.
    #[error("unresolved source '{reference}': {detail}")]
    UnresolvedSource { reference: String, detail: String },

    /// A test tensor file could not be decoded.
    #[error(transparent)]
    Tensor(#[from] tensor_core::TensorError),
}

impl DescriptorError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn validation(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            detail: detail.into(),
        }
    }
}
