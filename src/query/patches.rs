// src/query/patches.rs

//! Local patches of a source package (`patches/patch-*`)

use super::PkgQuery;
use crate::error::Result;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const PATCH_PREFIX: &str = "patch-";

/// Size and first line of one patch file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchInfo {
    pub name: String,
    pub size: Option<u64>,
    pub first_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PatchInfo {
    fn read(path: &Path, name: String) -> Self {
        let result = fs::metadata(path).and_then(|meta| {
            let mut line = String::new();
            BufReader::new(File::open(path)?).read_line(&mut line)?;
            Ok((meta.len(), line.trim().to_string()))
        });

        match result {
            Ok((size, first_line)) => Self {
                name,
                size: Some(size),
                first_line: Some(first_line),
                error: None,
            },
            Err(e) => {
                warn!("Cannot read patch {}: {}", path.display(), e);
                Self {
                    name,
                    size: None,
                    first_line: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Sorted `patch-*` files of a patches directory; none if it is absent
fn patch_files(patches_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !patches_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut patches = Vec::new();
    for entry in fs::read_dir(patches_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(PATCH_PREFIX) && entry.file_type()?.is_file() {
            patches.push((name, entry.path()));
        }
    }
    patches.sort();
    Ok(patches)
}

impl PkgQuery {
    fn package_patches(&self, name: &str) -> Result<Vec<(String, PathBuf)>> {
        let location = self.locate_source(name, None)?;
        patch_files(&location.path.join("patches"))
    }

    /// Names of the package's patch files
    pub fn list_patches(&self, name: &str) -> Result<Vec<String>> {
        self.operation("list_patches", || {
            Ok(self
                .package_patches(name)?
                .into_iter()
                .map(|(patch, _)| patch)
                .collect())
        })
    }

    pub fn count_patches(&self, name: &str) -> Result<usize> {
        self.operation("count_patches", || Ok(self.package_patches(name)?.len()))
    }

    /// Size and first line of each patch; unreadable patches carry an error
    pub fn patch_info(&self, name: &str) -> Result<Vec<PatchInfo>> {
        self.operation("patch_info", || {
            Ok(self
                .package_patches(name)?
                .into_iter()
                .map(|(patch, path)| PatchInfo::read(&path, patch))
                .collect())
        })
    }
}
