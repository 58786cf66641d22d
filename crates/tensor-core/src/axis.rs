// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Axis identifiers and padding fill modes.

use std::fmt;

/// Identifier of a tensor axis, e.g. `"b"`, `"c"`, `"y"`, `"x"`.
///
/// Axis ids are compared by value; a tensor never holds the same id twice.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AxisId(String);

impl AxisId {
    /// Creates an axis id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits a compact axis string such as `"bcyx"` into one id per character.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::AxisId;
    /// let axes = AxisId::parse_compact("bcyx");
    /// assert_eq!(axes.len(), 4);
    /// assert_eq!(axes[2].as_str(), "y");
    /// ```
    pub fn parse_compact(axes: &str) -> Vec<AxisId> {
        axes.chars().map(|c| AxisId(c.to_string())).collect()
    }

    /// Returns `true` for the batch axis.
    pub fn is_batch(&self) -> bool {
        self.0 == "b"
    }

    /// Returns `true` for the channel axis.
    pub fn is_channel(&self) -> bool {
        self.0 == "c"
    }

    /// Returns `true` for spatial axes (`x`, `y`, `z`).
    pub fn is_spatial(&self) -> bool {
        matches!(self.0.as_str(), "x" | "y" | "z")
    }
}

impl fmt::Display for AxisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AxisId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<char> for AxisId {
    fn from(id: char) -> Self {
        Self(id.to_string())
    }
}

/// Value used for elements added by [`crate::Tensor::pad`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// Constant zero.
    #[default]
    Zero,
    /// Replicates the nearest edge element.
    Edge,
}

impl FillMode {
    /// Parses a fill mode from a config or CLI string.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "zero" | "zeros" | "constant" => Some(Self::Zero),
            "edge" | "replicate" | "nearest" => Some(Self::Edge),
            _ => None,
        }
    }
}
