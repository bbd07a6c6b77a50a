// src/db/mod.rs

//! Installed-package database
//!
//! The database is a flat directory (`PKG_DBDIR`) holding one
//! `name-version/` subdirectory per installed package. Entries are read
//! fresh on every call; nothing is cached between queries.

pub mod models;

pub use models::{EntrySummary, InstalledEntry};

use crate::error::{Error, Result};
use crate::version::split_pkgname;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Handle on a package database directory
#[derive(Debug, Clone)]
pub struct PkgDb {
    root: PathBuf,
}

impl PkgDb {
    /// Open an existing package database
    ///
    /// # Arguments
    ///
    /// * `path` - The `PKG_DBDIR` directory
    ///
    /// # Returns
    ///
    /// * `Result<PkgDb>` - `Error::NotFound` if the directory does not exist
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(Error::NotFound(format!(
                "Package database {}",
                path.display()
            )));
        }
        debug!("Opened package database at {}", path.display());
        Ok(Self {
            root: path.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted `name-version` names of every entry
    pub fn pkgnames(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            // pkgdb.byfile.db and friends are plain files
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Bare names of every installed package
    pub fn installed_names(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .pkgnames()?
            .iter()
            .map(|pkgname| split_pkgname(pkgname).0.to_string())
            .collect())
    }

    /// Entry directory name for a bare package name or a full `name-version`
    pub fn find(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .pkgnames()?
            .into_iter()
            .find(|pkgname| pkgname == name || split_pkgname(pkgname).0 == name))
    }

    pub fn entry_path(&self, pkgname: &str) -> PathBuf {
        self.root.join(pkgname)
    }

    /// Load the full entry of an installed package
    ///
    /// Fails with `Error::PackageNotFound` when nothing by that name is
    /// installed.
    pub fn get(&self, name: &str) -> Result<InstalledEntry> {
        let pkgname = self
            .find(name)?
            .ok_or_else(|| Error::PackageNotFound(format!("{} is not installed", name)))?;
        InstalledEntry::load(&self.entry_path(&pkgname))
    }

    /// Like [`PkgDb::get`] but absence is `Ok(None)`
    pub fn get_optional(&self, name: &str) -> Result<Option<InstalledEntry>> {
        match self.find(name)? {
            Some(pkgname) => InstalledEntry::load(&self.entry_path(&pkgname)).map(Some),
            None => Ok(None),
        }
    }
}
