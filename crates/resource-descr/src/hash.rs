// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! SHA-256 content hashing of files, directories and byte strings.

use crate::DescriptorError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::Path;

/// Hex-encoded SHA-256 of a byte slice.
pub fn sha256_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hex-encoded SHA-256 of a file, or of a directory's files.
///
/// Directory hashes cover every regular file below it, visited in sorted
/// relative-path order, with each relative path mixed in before the file
/// content (saved-model bundles are directories).
pub fn sha256_path(path: &Path) -> Result<String, DescriptorError> {
    let mut hasher = Sha256::new();
    if path.is_dir() {
        let mut files = Vec::new();
        collect_files(path, path, &mut files)?;
        files.sort();
        for rel in files {
            hasher.update(rel.as_bytes());
            hasher.update([0u8]);
            stream_into(&path.join(&rel), &mut hasher)?;
        }
    } else {
        stream_into(path, &mut hasher)?;
    }
    Ok(hex::encode(hasher.finalize()))
}

fn stream_into(path: &Path, hasher: &mut Sha256) -> Result<(), DescriptorError> {
    let mut file = File::open(path).map_err(|e| DescriptorError::io(path, e))?;
    std::io::copy(&mut file, hasher).map_err(|e| DescriptorError::io(path, e))?;
    Ok(())
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), DescriptorError> {
    let entries = std::fs::read_dir(dir).map_err(|e| DescriptorError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| DescriptorError::io(dir, e))?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_bytes_known_vector() {
        assert_eq!(
            sha256_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_file_hash_matches_bytes_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.bin");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(sha256_path(&path).unwrap(), sha256_bytes(b"abc"));
    }

    #[test]
    fn test_directory_hash_is_order_independent_and_content_sensitive() {
        let a = tempfile::tempdir().unwrap();
        std::fs::create_dir(a.path().join("variables")).unwrap();
        std::fs::write(a.path().join("saved_model.pb"), b"graph").unwrap();
        std::fs::write(a.path().join("variables/data"), b"vars").unwrap();
        let first = sha256_path(a.path()).unwrap();
        assert_eq!(first, sha256_path(a.path()).unwrap());

        std::fs::write(a.path().join("variables/data"), b"VARS").unwrap();
        assert_ne!(first, sha256_path(a.path()).unwrap());
    }
}
