// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Numeric tolerance for comparing model outputs.

use tensor_core::{Tensor, TensorError};

/// Agreement to a number of decimal places.
///
/// Two tensors agree when `max |a - b| < 1.5 * 10^-decimals`, the same rule
/// as NumPy's `assert_array_almost_equal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Tolerance {
    pub decimals: u32,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self { decimals: 4 }
    }
}

impl Tolerance {
    pub fn new(decimals: u32) -> Self {
        Self { decimals }
    }

    /// The exclusive bound on the absolute deviation.
    pub fn threshold(&self) -> f64 {
        1.5 * 10f64.powi(-(self.decimals as i32))
    }

    pub fn accepts(&self, deviation: f64) -> bool {
        deviation < self.threshold()
    }

    /// Maximum absolute deviation between `actual` and `expected`.
    ///
    /// `actual` is first brought to `expected`'s axis order.
    pub fn deviation(actual: &Tensor, expected: &Tensor) -> Result<f64, TensorError> {
        actual.conform_to(expected.axes())?.max_abs_diff(expected)
    }
}
