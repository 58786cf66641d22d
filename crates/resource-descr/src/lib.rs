// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # resource-descr
//!
//! The description of a packaged model: what tensors it consumes and
//! produces, how they are pre- and post-processed, which weight formats it
//! ships, and how it was derived.
//!
//! - [`Manifest`]: the serde model of `manifest.json`, with structural
//!   validation and a canonical SHA-256.
//! - [`TensorSpec`] / [`AxisDescr`] / [`AxisSize`]: per-tensor axis
//!   constraints, including sizes that reference another tensor.
//! - [`ProcessingStep`]: the closed set of processing operations.
//! - [`WeightFormat`] / [`WeightEntry`] / [`WeightPriority`]: weight
//!   variants and the explicit selection order between them.
//! - [`ResourceDescriptor`]: a loaded, validated, immutable package whose
//!   file references have all been resolved.
//! - [`SourceResolver`]: the seam through which references become paths.
//!
//! # Package layout
//! A package is a directory holding:
//! - `manifest.json`: see [`Manifest`].
//! - one file (or directory) per weight format.
//! - test input / output tensors as `.npy`.
//! - optionally a `README.md` documentation file.
//!
//! # Example
//! ```no_run
//! use resource_descr::ResourceDescriptor;
//! use std::path::Path;
//!
//! let descr = ResourceDescriptor::load(Path::new("./packages/unet2d")).unwrap();
//! println!("{}", descr.summary());
//! for input in descr.inputs() {
//!     println!("  {}", input.summary());
//! }
//! ```

mod descriptor;
mod error;
pub mod hash;
mod manifest;
mod processing;
mod resolver;
mod tensor_spec;
mod weights;

pub use descriptor::{ResourceDescriptor, MANIFEST_FILE};
pub use error::DescriptorError;
pub use manifest::{Author, Citation, Manifest, ParentLink, FORMAT_VERSION};
pub use processing::{
    BinarizeParams, ClipParams, EnsureDtypeParams, NormalizeMode, ProcessingStep,
    ScaleLinearParams, ScaleRangeParams, Values, ZeroMeanUnitVarianceParams,
};
pub use resolver::{LocalResolver, SourceResolver};
pub use tensor_spec::{AxisDescr, AxisKind, AxisSize, ShapeViolation, TensorSpec};
pub use weights::{WeightEntry, WeightFormat, WeightPriority};
