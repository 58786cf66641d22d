// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Conformance of values to a declared element type.

use crate::{DType, Tensor};

/// Rounds and saturates values so they are representable in `dtype`.
///
/// Floating-point types leave the tensor unchanged; `float32` data cannot
/// hold more than `f32` precision anyway.
pub fn ensure_dtype(tensor: &mut Tensor, dtype: DType) {
    if let Some((lo, hi)) = dtype.integer_range() {
        let (lo, hi) = (lo as f32, hi as f32);
        tensor.map_inplace(|v| if v.is_nan() { 0.0 } else { v.round().clamp(lo, hi) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AxisId;

    #[test]
    fn test_ensure_uint8() {
        let mut t = Tensor::from_f32(
            AxisId::parse_compact("x"),
            vec![4].into(),
            &[-3.0, 1.4, 1.6, 300.0],
        )
        .unwrap();
        ensure_dtype(&mut t, DType::Uint8);
        assert_eq!(t.to_vec(), vec![0.0, 1.0, 2.0, 255.0]);
    }

    #[test]
    fn test_ensure_float_is_noop() {
        let mut t = Tensor::from_f32(AxisId::parse_compact("x"), vec![1].into(), &[0.25]).unwrap();
        ensure_dtype(&mut t, DType::Float32);
        assert_eq!(t.to_vec(), vec![0.25]);
    }
}
