// src/db/models.rs

//! Data models for installed-package database entries

use crate::error::{Error, Result};
use crate::packages::binary::{BinaryMetadata, COMMENT_FNAME, METADATA_FILES};
use crate::packages::PackageRecord;
use crate::version::{split_pkgname, UNKNOWN_VERSION};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One `name-version/` directory of the package database
#[derive(Debug, Clone)]
pub struct InstalledEntry {
    /// Directory name, normally `name-version`
    pub pkgname: String,
    pub path: PathBuf,
    pub metadata: BinaryMetadata,
}

impl InstalledEntry {
    /// Load every metadata file of an entry directory
    pub fn load(dir: &Path) -> Result<Self> {
        let pkgname = entry_name(dir)?;

        let mut files = BTreeMap::new();
        for fname in METADATA_FILES {
            if let Some(content) = read_if_present(&dir.join(fname))? {
                files.insert(fname.to_string(), content);
            }
        }

        let metadata = BinaryMetadata::from_files(&pkgname, &files)?;
        Ok(Self {
            pkgname,
            path: dir.to_path_buf(),
            metadata,
        })
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    pub fn to_record(&self) -> PackageRecord {
        self.metadata.to_record(true, None)
    }
}

/// Name, version and comment of an entry, read without the packing list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    pub name: String,
    pub version: String,
    pub comment: Option<String>,
}

impl EntrySummary {
    pub fn load(dir: &Path) -> Result<Self> {
        let pkgname = entry_name(dir)?;
        let (name, version) = split_pkgname(&pkgname);
        let comment = read_if_present(&dir.join(COMMENT_FNAME))?
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(Self {
            name: name.to_string(),
            version: version.unwrap_or(UNKNOWN_VERSION).to_string(),
            comment,
        })
    }
}

fn entry_name(dir: &Path) -> Result<String> {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::PackageParsing(format!("Invalid database entry {}", dir.display())))
}

fn read_if_present(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::PackageParsing(format!("Cannot read {}: {}", path.display(), e))),
    }
}
