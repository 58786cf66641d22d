// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element-wise processing kernels.
//!
//! Each kernel mutates exactly one tensor in place and never looks at any
//! other tensor. Statistics-based kernels reduce over a caller-chosen subset
//! of axes; the remaining axes index independent groups (e.g. reducing over
//! `y`,`x` yields per-channel statistics).

mod cast_op;
mod normalize_op;
mod scale_op;
mod sigmoid_op;
mod stats;
mod threshold_op;

pub use cast_op::ensure_dtype;
pub use normalize_op::{normalize_fixed, zero_mean_unit_variance};
pub use scale_op::{scale_linear, scale_range};
pub use sigmoid_op::sigmoid;
pub use stats::percentile;
pub use threshold_op::{binarize, clip};
