// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Resolution of manifest file references to local paths.

use crate::DescriptorError;
use std::path::{Path, PathBuf};

/// Turns a manifest reference into a readable local path.
///
/// Implementations that fetch remote content plug in here; the crate itself
/// only ships [`LocalResolver`].
pub trait SourceResolver: Send + Sync {
    /// Resolves `reference` relative to the package `root`.
    fn resolve(&self, root: &Path, reference: &str) -> Result<PathBuf, DescriptorError>;
}

/// Resolves relative paths, absolute paths and `file://` URIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalResolver;

impl SourceResolver for LocalResolver {
    fn resolve(&self, root: &Path, reference: &str) -> Result<PathBuf, DescriptorError> {
        let unresolved = |detail: &str| DescriptorError::UnresolvedSource {
            reference: reference.to_string(),
            detail: detail.to_string(),
        };

        let local = match reference.split_once("://") {
            Some(("file", rest)) => rest,
            Some((scheme, _)) => {
                return Err(unresolved(&format!(
                    "scheme '{scheme}' is not local; fetch it first"
                )))
            }
            None => reference,
        };
        if local.is_empty() {
            return Err(unresolved("empty reference"));
        }

        let path = Path::new(local);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        if !path.exists() {
            return Err(unresolved(&format!("{} does not exist", path.display())));
        }
        Ok(path)
    }
}
