// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Declared element data types of model tensors.

/// Enumerates the element types a model may declare for its tensors.
///
/// Computation always happens in `f32`; the declared type decides how values
/// are rounded and clamped by the `ensure_dtype` kernel and is recorded in
/// the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 32-bit IEEE 754 floating point.
    Float32,
    /// 64-bit IEEE 754 floating point.
    Float64,
    /// 8-bit unsigned integer.
    Uint8,
    /// 16-bit unsigned integer.
    Uint16,
    /// 32-bit unsigned integer.
    Uint32,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
}

impl DType {
    /// Returns a human-readable label for this data type.
    pub fn as_str(self) -> &'static str {
        match self {
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Uint8 => "uint8",
            DType::Uint16 => "uint16",
            DType::Uint32 => "uint32",
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
        }
    }

    /// Returns the representable `(min, max)` range for integer types.
    pub fn integer_range(self) -> Option<(f64, f64)> {
        match self {
            DType::Uint8 => Some((0.0, u8::MAX as f64)),
            DType::Uint16 => Some((0.0, u16::MAX as f64)),
            DType::Uint32 => Some((0.0, u32::MAX as f64)),
            DType::Int8 => Some((i8::MIN as f64, i8::MAX as f64)),
            DType::Int16 => Some((i16::MIN as f64, i16::MAX as f64)),
            DType::Int32 => Some((i32::MIN as f64, i32::MAX as f64)),
            DType::Int64 => Some((i64::MIN as f64, i64::MAX as f64)),
            DType::Float32 | DType::Float64 => None,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
