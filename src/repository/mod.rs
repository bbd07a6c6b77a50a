// src/repository/mod.rs

//! Repository resolution
//!
//! A repository is either a local pkgsrc-style tree (`category/package/`
//! directories) or a remote mirror. Only local trees take part in
//! filesystem resolution; remote entries are kept so the configuration
//! round-trips and are reached only through [`client`].
//!
//! Priority is list position: [`RepositoryResolver::locate`] returns the
//! first hit in configured order, while listing and searching accumulate
//! over every repository. Listings are ordered by repository, then category,
//! then package name, whether or not the scan runs in parallel.

pub mod client;

use crate::error::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One configured repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RepositoryDescriptor {
    Local { path: PathBuf },
    Remote { url: String },
}

impl RepositoryDescriptor {
    /// Root directory of a local repository
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            RepositoryDescriptor::Local { path } => Some(path),
            RepositoryDescriptor::Remote { .. } => None,
        }
    }
}

/// A package directory found in a local repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageLocation {
    /// Root of the repository the package was found in
    pub repository: PathBuf,
    pub category: String,
    pub name: String,
    /// Full path of the package directory
    pub path: PathBuf,
}

impl PackageLocation {
    /// `category/name`, the pkgsrc package path
    pub fn pkgpath(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }
}

/// Resolves package names against the configured repositories
#[derive(Debug, Clone)]
pub struct RepositoryResolver {
    repositories: Vec<RepositoryDescriptor>,
}

impl RepositoryResolver {
    pub fn new(repositories: Vec<RepositoryDescriptor>) -> Self {
        Self { repositories }
    }

    pub fn repositories(&self) -> &[RepositoryDescriptor] {
        &self.repositories
    }

    /// Local repository roots that currently exist, in priority order
    fn local_roots(&self) -> impl Iterator<Item = &Path> {
        self.repositories.iter().filter_map(|repo| match repo.local_path() {
            Some(path) if path.is_dir() => Some(path),
            Some(path) => {
                debug!("Skipping missing repository root {}", path.display());
                None
            }
            None => None,
        })
    }

    /// Find a package by exact (case-sensitive) directory name
    ///
    /// Returns the hit from the first repository that has one.
    pub fn locate(&self, name: &str, category: Option<&str>) -> Result<Option<PackageLocation>> {
        for root in self.local_roots() {
            let categories = match category {
                Some(cat) => vec![cat.to_string()],
                None => list_subdirectories(root)?,
            };

            for cat in categories {
                let path = root.join(&cat).join(name);
                if path.is_dir() {
                    debug!("Located {} at {}", name, path.display());
                    return Ok(Some(PackageLocation {
                        repository: root.to_path_buf(),
                        category: cat,
                        name: name.to_string(),
                        path,
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Every package of every local repository, optionally restricted to one
    /// category
    pub fn list_all(&self, category: Option<&str>) -> Result<Vec<PackageLocation>> {
        self.scan(category, |_| true)
    }

    /// Packages whose name contains `pattern`, ignoring case
    pub fn search(&self, pattern: &str, category: Option<&str>) -> Result<Vec<PackageLocation>> {
        let needle = pattern.to_lowercase();
        self.scan(category, |name| name.to_lowercase().contains(&needle))
    }

    fn scan<F>(&self, category: Option<&str>, matches: F) -> Result<Vec<PackageLocation>>
    where
        F: Fn(&str) -> bool + Sync,
    {
        let mut found = Vec::new();

        for root in self.local_roots() {
            let categories = match category {
                Some(cat) if root.join(cat).is_dir() => vec![cat.to_string()],
                Some(_) => continue,
                None => list_subdirectories(root)?,
            };

            let per_category: Vec<Vec<PackageLocation>> = categories
                .par_iter()
                .map(|cat| {
                    let dir = root.join(cat);
                    let packages = match list_subdirectories(&dir) {
                        Ok(packages) => packages,
                        Err(e) => {
                            warn!("Cannot read category {}: {}", dir.display(), e);
                            return Vec::new();
                        }
                    };
                    packages
                        .into_iter()
                        .filter(|name| matches(name))
                        .map(|name| PackageLocation {
                            repository: root.to_path_buf(),
                            category: cat.clone(),
                            path: dir.join(&name),
                            name,
                        })
                        .collect()
                })
                .collect();

            found.extend(per_category.into_iter().flatten());
        }

        Ok(found)
    }
}

/// Sorted names of the visible subdirectories of `dir`
fn list_subdirectories(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}
