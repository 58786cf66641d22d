// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Owned dimension lists for construction and error reporting.

use std::fmt;

/// The extents of a [`crate::Tensor`], outermost first.
///
/// # Examples
/// ```
/// use tensor_core::Shape;
/// let s = Shape::new(vec![1, 1, 100, 100]);
/// assert_eq!(s.rank(), 4);
/// assert_eq!(s.num_elements(), 10_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Product of all extents; 1 for rank 0.
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(usize::to_string).collect();
        write!(f, "[{}]", dims.join("x"))
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_zero_has_one_element() {
        let s = Shape::new(vec![]);
        assert_eq!(s.rank(), 0);
        assert_eq!(s.num_elements(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::new(vec![1, 1, 112, 96]).to_string(), "[1x1x112x96]");
    }

    #[test]
    fn test_from_conversions() {
        let a: Shape = vec![2, 3].into();
        let b: Shape = (&[2, 3][..]).into();
        assert_eq!(a, b);
    }
}
