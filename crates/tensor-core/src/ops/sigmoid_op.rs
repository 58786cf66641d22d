// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Logistic sigmoid activation.

use crate::Tensor;

/// Applies `1 / (1 + exp(-x))` element-wise.
///
/// Uses the sign-split form so that large negative inputs do not overflow.
pub fn sigmoid(tensor: &mut Tensor) {
    tensor.map_inplace(|x| {
        if x >= 0.0 {
            1.0 / (1.0 + (-x).exp())
        } else {
            let e = x.exp();
            e / (1.0 + e)
        }
    });
}
