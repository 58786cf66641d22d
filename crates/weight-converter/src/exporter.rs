// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The seam for conversions that need the originating framework.

use crate::ConversionError;
use resource_descr::{ResourceDescriptor, WeightFormat};
use std::path::Path;

/// Exports a model graph from one framework format into another.
///
/// Implementations typically drive the originating framework (tracing a
/// PyTorch module, saving a Keras model) using the package's test inputs as
/// example data.
pub trait GraphExporter: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Whether this exporter handles `from -> to`.
    fn supports(&self, from: WeightFormat, to: WeightFormat) -> bool;

    /// Writes the `to` variant of `descriptor`'s `source` weights to `dest`.
    fn export(
        &self,
        descriptor: &ResourceDescriptor,
        from: WeightFormat,
        to: WeightFormat,
        source: &Path,
        dest: &Path,
    ) -> Result<(), ConversionError>;
}
