//! Content-addressed code assets.
//!
//! A function's code is either a directory or a prebuilt `.zip`. Its
//! fingerprint is a SHA-256 over a length-prefixed stream of every file's
//! relative path and contents, walked in sorted order, so the same tree
//! hashes the same wherever it is checked out.

use crate::error::Result;
use crate::stack::Stack;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Fingerprint a code artifact on disk.
pub fn fingerprint(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    if path.is_file() {
        write_tag(&mut hasher, 0x01);
        write_bytes(&mut hasher, &fs::read(path)?);
    } else {
        write_tag(&mut hasher, 0x02);
        let mut files = Vec::new();
        collect_files(path, path, &mut files)?;
        files.sort();
        for relative in files {
            write_str(&mut hasher, &relative);
            write_bytes(&mut hasher, &fs::read(path.join(&relative))?);
        }
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Fingerprint raw bytes, for artifacts that are not read from disk.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    write_tag(&mut hasher, 0x03);
    write_bytes(&mut hasher, bytes);
    format!("{:x}", hasher.finalize())
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            // Forward slashes so the fingerprint does not depend on the host OS.
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(parts.join("/"));
        }
    }
    Ok(())
}

fn write_tag(hasher: &mut Sha256, tag: u8) {
    hasher.update([tag]);
}

fn write_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

fn write_str(hasher: &mut Sha256, value: &str) {
    write_bytes(hasher, value.as_bytes());
}

/// One packaged artifact and where the deployment tool should upload it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    pub source_path: PathBuf,
    /// `file` for prebuilt archives, `directory` when the tool must zip it.
    pub packaging: &'static str,
    pub object_key: String,
    pub functions: Vec<String>,
}

/// Assets keyed by fingerprint. Functions sharing code share one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetManifest {
    pub version: u32,
    pub files: BTreeMap<String, AssetEntry>,
}

impl AssetManifest {
    pub fn from_stack(stack: &Stack) -> Self {
        let mut files: BTreeMap<String, AssetEntry> = BTreeMap::new();
        for function in stack.functions().values() {
            let code = &function.code;
            let entry = files
                .entry(code.fingerprint.clone())
                .or_insert_with(|| AssetEntry {
                    source_path: code.path.clone(),
                    packaging: if code.path.is_file() { "file" } else { "directory" },
                    object_key: code.object_key(),
                    functions: Vec::new(),
                });
            entry.functions.push(function.name.to_string());
        }
        Self { version: 1, files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_tree(root: &Path) {
        fs::create_dir_all(root.join("lib")).unwrap();
        fs::write(root.join("index.js"), "exports.handler = async () => ({});").unwrap();
        fs::write(root.join("lib/util.js"), "module.exports = {};").unwrap();
    }

    #[test]
    fn test_fingerprint_is_stable_across_locations() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        write_tree(a.path());
        write_tree(b.path());

        let fa = fingerprint(a.path()).unwrap();
        assert_eq!(fa.len(), 64);
        assert_eq!(fa, fingerprint(b.path()).unwrap());
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let temp = tempfile::tempdir().unwrap();
        write_tree(temp.path());
        let before = fingerprint(temp.path()).unwrap();

        fs::write(temp.path().join("lib/util.js"), "module.exports = { x: 1 };").unwrap();
        assert_ne!(before, fingerprint(temp.path()).unwrap());
    }

    #[test]
    fn test_fingerprint_sees_renames() {
        let temp = tempfile::tempdir().unwrap();
        write_tree(temp.path());
        let before = fingerprint(temp.path()).unwrap();

        fs::rename(temp.path().join("index.js"), temp.path().join("main.js")).unwrap();
        assert_ne!(before, fingerprint(temp.path()).unwrap());
    }

    #[test]
    fn test_zip_file_fingerprint() {
        let temp = tempfile::tempdir().unwrap();
        let zip = temp.path().join("bundle.zip");
        fs::write(&zip, b"PK\x03\x04fake").unwrap();
        let fp = fingerprint(&zip).unwrap();
        assert_ne!(fp, fingerprint_bytes(b"PK\x03\x04fake"));
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        assert!(fingerprint(&temp.path().join("nope")).is_err());
    }
}
