// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for weight conversion.

use resource_descr::WeightFormat;

/// Errors that can occur while converting weights.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// The pair is not in the conversion table.
    #[error("unsupported conversion: {from} -> {to}")]
    UnsupportedConversion { from: WeightFormat, to: WeightFormat },

    /// The pair needs a graph exporter and none was configured.
    #[error("conversion {from} -> {to} needs a graph exporter, none is configured")]
    ExporterUnavailable { from: WeightFormat, to: WeightFormat },

    /// The package does not ship the source format.
    #[error("package has no '{format}' weights to convert from")]
    MissingSource { format: WeightFormat },

    /// The destination file already exists.
    #[error("refusing to overwrite '{path}'")]
    DestinationExists { path: String },

    /// A tensor element type has no representation in the target format.
    #[error("tensor '{tensor}' has element type {dtype}, which cannot be converted")]
    UnsupportedDtype { tensor: String, dtype: String },

    /// Reading or writing a SafeTensors file failed.
    #[error("SafeTensors error on '{path}': {detail}")]
    SafeTensors { path: String, detail: String },

    /// Reading or writing a NumPy archive failed.
    #[error("NumPy archive error on '{path}': {detail}")]
    Npz { path: String, detail: String },

    /// A graph exporter reported a failure.
    #[error("exporter '{exporter}' failed: {detail}")]
    Export { exporter: String, detail: String },

    #[error("i/o error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Descriptor(#[from] resource_descr::DescriptorError),
}

impl ConversionError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
