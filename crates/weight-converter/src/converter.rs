// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The conversion table and the [`WeightConverter`] entry point.

use crate::{native, ConversionError, GraphExporter};
use resource_descr::hash::sha256_path;
use resource_descr::{ResourceDescriptor, WeightEntry, WeightFormat};
use std::path::Path;

/// How a supported conversion is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    /// Performed in-process by [`native`].
    Native,
    /// Delegated to a [`GraphExporter`].
    GraphExport,
}

/// Looks up `from -> to` in the closed conversion table.
pub fn route(from: WeightFormat, to: WeightFormat) -> Option<ConversionKind> {
    use WeightFormat::*;
    match (from, to) {
        (SafeTensors, NumpyArchive) | (NumpyArchive, SafeTensors) => Some(ConversionKind::Native),
        (PytorchStateDict, Torchscript)
        | (PytorchStateDict, Onnx)
        | (KerasHdf5, TensorflowSavedModelBundle) => Some(ConversionKind::GraphExport),
        _ => None,
    }
}

/// Converts a package's weights from one format to another.
///
/// # Example
/// ```no_run
/// use resource_descr::{ResourceDescriptor, WeightFormat};
/// use std::path::Path;
/// use weight_converter::WeightConverter;
///
/// let descr = ResourceDescriptor::load(Path::new("./packages/unet2d")).unwrap();
/// let entry = WeightConverter::new()
///     .convert(&descr, WeightFormat::SafeTensors, WeightFormat::NumpyArchive, Path::new("/tmp"))
///     .unwrap();
/// println!("wrote {}", entry.source);
/// ```
#[derive(Default)]
pub struct WeightConverter<'a> {
    exporter: Option<&'a dyn GraphExporter>,
}

impl<'a> WeightConverter<'a> {
    /// A converter limited to native conversions.
    pub fn new() -> Self {
        Self { exporter: None }
    }

    /// Adds an exporter for framework graph conversions.
    pub fn with_exporter(mut self, exporter: &'a dyn GraphExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Writes the `to` variant of `descriptor`'s `from` weights into
    /// `out_dir` and describes it.
    ///
    /// The returned entry's `source` is the file name inside `out_dir`, its
    /// `parent` is `from` and its `sha256` covers the written file. On
    /// failure nothing is left behind in `out_dir`.
    pub fn convert(
        &self,
        descriptor: &ResourceDescriptor,
        from: WeightFormat,
        to: WeightFormat,
        out_dir: &Path,
    ) -> Result<WeightEntry, ConversionError> {
        let kind = route(from, to).ok_or(ConversionError::UnsupportedConversion { from, to })?;
        let source = descriptor
            .weight_path(from)
            .ok_or(ConversionError::MissingSource { format: from })?;

        let file_name = to.default_file_name();
        let dest = out_dir.join(file_name);
        if dest.exists() {
            return Err(ConversionError::DestinationExists {
                path: dest.display().to_string(),
            });
        }

        let converted = match kind {
            ConversionKind::Native => native::convert(from, to, source, &dest).map(Some),
            ConversionKind::GraphExport => {
                let exporter = self
                    .exporter
                    .filter(|e| e.supports(from, to))
                    .ok_or(ConversionError::ExporterUnavailable { from, to })?;
                tracing::info!("delegating {from} -> {to} export to '{}'", exporter.name());
                exporter
                    .export(descriptor, from, to, source, &dest)
                    .map(|()| descriptor.weight_entry(from).and_then(|e| e.parameter_count))
            }
        };
        let parameter_count = match converted {
            Ok(count) => count,
            Err(e) => {
                remove_partial(&dest);
                return Err(e);
            }
        };
        if !dest.exists() {
            return Err(ConversionError::Export {
                exporter: self.exporter.map_or("native", |e| e.name()).to_string(),
                detail: format!("no output was written to '{}'", dest.display()),
            });
        }

        let sha256 = sha256_path(&dest)?;
        tracing::info!(
            "converted '{}' weights {from} -> {to} into {}",
            descriptor.name(),
            dest.display()
        );
        Ok(WeightEntry {
            source: file_name.to_string(),
            sha256: Some(sha256),
            parent: Some(from),
            version: descriptor.weight_entry(from).and_then(|e| e.version.clone()),
            parameter_count,
        })
    }
}

fn remove_partial(dest: &Path) {
    let removed = if dest.is_dir() {
        std::fs::remove_dir_all(dest)
    } else if dest.exists() {
        std::fs::remove_file(dest)
    } else {
        Ok(())
    };
    if let Err(e) = removed {
        tracing::warn!("could not remove partial conversion output {}: {e}", dest.display());
    }
}

impl std::fmt::Debug for WeightConverter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightConverter")
            .field("exporter", &self.exporter.map(|e| e.name()))
            .finish()
    }
}
