// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for package assembly.

use resource_descr::WeightFormat;

/// Errors that can occur while building or extending a package.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// Running the model on the test inputs does not give the test outputs.
    #[error(
        "'{format}' weights do not reproduce test output '{tensor}': \
         max deviation {deviation:e} exceeds {decimals} decimals"
    )]
    UnreproducibleOutput {
        format: WeightFormat,
        tensor: String,
        deviation: f64,
        decimals: u32,
    },

    /// None of the package's weight formats can be run by the engine.
    #[error("engine '{engine}' can verify none of the weight formats ({formats})")]
    Unverifiable { engine: String, formats: String },

    /// The package already has weights in this format.
    #[error("package already has '{format}' weights")]
    FormatExists { format: WeightFormat },

    /// The target path is already taken.
    #[error("refusing to overwrite '{path}'")]
    DestinationExists { path: String },

    /// The build request is inconsistent.
    #[error("invalid build request: {0}")]
    InvalidRequest(String),

    #[error("i/o error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Descriptor(#[from] resource_descr::DescriptorError),

    #[error(transparent)]
    Prediction(#[from] prediction::PredictionError),

    #[error(transparent)]
    Conversion(#[from] weight_converter::ConversionError),

    #[error(transparent)]
    Tensor(#[from] tensor_core::TensorError),
}

impl PackageError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
