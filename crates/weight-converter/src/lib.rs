// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # weight-converter
//!
//! Produces a new weight format for a packaged model from one it already
//! ships.
//!
//! The set of conversions is closed (see [`route`]):
//! - SafeTensors ⇄ NumPy archive are performed natively and are lossless:
//!   the same tensor names, element types and bytes end up in the output.
//! - Graph exports (PyTorch state dict to TorchScript or ONNX, Keras HDF5 to
//!   a TensorFlow SavedModel) need the originating framework and are
//!   delegated to a caller-supplied [`GraphExporter`].
//! - Every other pair fails with [`ConversionError::UnsupportedConversion`].
//!
//! The converter only writes the new file and describes it as a
//! [`WeightEntry`](resource_descr::WeightEntry); checking that the new
//! weights reproduce the package's test outputs is done by the packaging
//! layer before the entry is added to a manifest.

mod converter;
mod error;
mod exporter;
pub mod native;

pub use converter::{route, ConversionKind, WeightConverter};
pub use error::ConversionError;
pub use exporter::GraphExporter;
