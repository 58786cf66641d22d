// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Named-axis tensors and the element-wise kernels used by model
//! pre- and post-processing.
//!
//! This crate provides:
//! - [`Tensor`]: an n-dimensional `f32` tensor backed by `ndarray`, whose
//!   dimensions carry axis ids (`"b"`, `"c"`, `"y"`, `"x"`, ...).
//! - [`Shape`]: runtime shape descriptor used in error messages and checks.
//! - [`DType`]: declared element types of model tensors.
//! - Shape-fitting primitives: [`Tensor::pad`], [`Tensor::slice`],
//!   [`Tensor::assign`].
//! - Processing kernels: binarize, clip, sigmoid, linear and percentile
//!   scaling, zero-mean/unit-variance normalization, dtype rounding.
//! - File interchange: `.npy` arrays and raster images (see [`io`]).
//!
//! Every kernel mutates a single tensor in place. Axis ids travel with the
//! data, so reordering never loses meaning.

mod axis;
mod dtype;
mod error;
pub mod io;
pub mod ops;
mod shape;
mod tensor;

pub use axis::{AxisId, FillMode};
pub use dtype::DType;
pub use error::TensorError;
pub use shape::Shape;
pub use tensor::Tensor;
