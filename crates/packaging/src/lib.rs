// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # packaging
//!
//! Builds model packages from weights, tensor specifications and test data,
//! and extends existing packages with more weight formats.
//!
//! Nothing is published unverified: a package is only moved into place, and
//! a manifest only replaced, once every weight format the engine can run
//! reproduces the stored test outputs within tolerance.

mod builder;
mod error;
mod request;
pub mod verify;

pub use builder::{PackageBuilder, README_FILE};
pub use error::PackageError;
pub use request::{BuildRequest, Documentation, PackageMetadata, PackageTemplate, WeightSource};
