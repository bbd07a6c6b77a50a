// src/query/installed.rs

//! Operations on the installed-package database

use super::PkgQuery;
use crate::db::EntrySummary;
use crate::error::{Error, Result};
use crate::packages::{BinaryPackage, PackageFormat, SourceRecipe};
use crate::version::{split_pkgname, VersionKey, UNKNOWN_VERSION};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

const NO_COMMENT: &str = "No comment available";
const HISTORY_LINES: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Name,
    Version,
    Comment,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "name" => Ok(SortKey::Name),
            "version" => Ok(SortKey::Version),
            "comment" => Ok(SortKey::Comment),
            _ => Err(format!("Invalid sort key: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(format!("Invalid sort order: {}", s)),
        }
    }
}

/// Parse a sort option, falling back to the default with a warning
pub fn parse_or_default<T>(raw: &str) -> T
where
    T: FromStr<Err = String> + Default,
{
    raw.parse().unwrap_or_else(|e| {
        warn!("{}, using the default", e);
        T::default()
    })
}

/// One row of the installed listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutdatedStatus {
    Outdated,
    UpToDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutdatedEntry {
    pub name: String,
    pub category: String,
    pub installed_version: String,
    pub source_version: String,
    pub status: OutdatedStatus,
}

/// File manifest differences between a package file and its installed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactVerification {
    pub name: String,
    /// In the package file but not installed
    pub missing: Vec<String>,
    /// Installed but not in the package file
    pub extra: Vec<String>,
}

impl ArtifactVerification {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

fn compare_rows(a: &InstalledPackage, b: &InstalledPackage, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Version => VersionKey::parse(&a.version).cmp(&VersionKey::parse(&b.version)),
        SortKey::Comment => a.comment.to_lowercase().cmp(&b.comment.to_lowercase()),
    }
}

/// Whether a log line names the package `name`
///
/// `name` may be a bare package name or a full `name-version`.
fn mentions_package(line: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let versioned = split_pkgname(name).1.is_some();

    line.match_indices(name).any(|(start, _)| {
        let before = line[..start].chars().next_back();
        if before.is_some_and(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.')) {
            return false;
        }
        let mut rest = line[start + name.len()..].chars();
        if versioned {
            return rest.next().is_none_or(|c| !(c.is_alphanumeric() || c == '.'));
        }
        rest.next() == Some('-') && rest.next().is_some_and(|c| c.is_ascii_digit())
    })
}

impl PkgQuery {
    /// Every installed package, sorted
    ///
    /// Entries that cannot be read keep their slot with `error` set.
    pub fn list_installed(&self, sort_by: SortKey, order: SortOrder) -> Result<Vec<InstalledPackage>> {
        self.operation("list_installed", || {
            let db = self.pkgdb()?;

            let mut rows: Vec<InstalledPackage> = db
                .pkgnames()?
                .into_iter()
                .map(|pkgname| match EntrySummary::load(&db.entry_path(&pkgname)) {
                    Ok(summary) => InstalledPackage {
                        name: summary.name,
                        version: summary.version,
                        comment: summary.comment.unwrap_or_else(|| NO_COMMENT.to_string()),
                        error: None,
                    },
                    Err(e) => {
                        warn!("{}: {}", pkgname, e);
                        let (name, version) = split_pkgname(&pkgname);
                        InstalledPackage {
                            name: name.to_string(),
                            version: version.unwrap_or(UNKNOWN_VERSION).to_string(),
                            comment: NO_COMMENT.to_string(),
                            error: Some(e.to_string()),
                        }
                    }
                })
                .collect();

            rows.sort_by(|a, b| {
                let ordering = compare_rows(a, b, sort_by);
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
            Ok(rows)
        })
    }

    /// Compare installed versions with the source tree
    ///
    /// Packages are matched by name; the first repository holding the name
    /// wins. Up-to-date packages are listed only with `show_all`.
    pub fn check_outdated(&self, show_all: bool) -> Result<Vec<OutdatedEntry>> {
        self.operation("check_outdated", || {
            self.require_source()?;
            let db = self.pkgdb()?;

            let installed: HashMap<String, String> = db
                .pkgnames()?
                .iter()
                .filter_map(|pkgname| match split_pkgname(pkgname) {
                    (name, Some(version)) => Some((name.to_string(), version.to_string())),
                    (_, None) => None,
                })
                .collect();

            let mut seen = HashSet::new();
            let candidates: Vec<_> = self
                .resolver
                .list_all(None)?
                .into_iter()
                .filter(|loc| installed.contains_key(&loc.name) && seen.insert(loc.name.clone()))
                .collect();
            debug!("{} installed package(s) found in the source tree", candidates.len());

            let entries: Vec<Option<OutdatedEntry>> = candidates
                .par_iter()
                .map(|loc| {
                    let source_version = match SourceRecipe::read_makefile(&loc.path) {
                        Ok(make) => make.version(),
                        Err(e) => {
                            warn!("Skipping {}: {}", loc.pkgpath(), e);
                            return None;
                        }
                    };
                    if source_version == UNKNOWN_VERSION {
                        warn!("Skipping {}: no literal version in Makefile", loc.pkgpath());
                        return None;
                    }

                    let installed_version = installed.get(&loc.name)?.clone();
                    let status = if VersionKey::parse(&installed_version) == VersionKey::parse(&source_version) {
                        OutdatedStatus::UpToDate
                    } else {
                        OutdatedStatus::Outdated
                    };
                    if status == OutdatedStatus::UpToDate && !show_all {
                        return None;
                    }

                    Some(OutdatedEntry {
                        name: loc.name.clone(),
                        category: loc.category.clone(),
                        installed_version,
                        source_version,
                        status,
                    })
                })
                .collect();

            let entries: Vec<OutdatedEntry> = entries.into_iter().flatten().collect();
            info!(
                "{} outdated package(s)",
                entries.iter().filter(|e| e.status == OutdatedStatus::Outdated).count()
            );
            Ok(entries)
        })
    }

    /// Files recorded for an installed package
    pub fn list_package_files(&self, name: &str) -> Result<Vec<String>> {
        self.operation("list_package_files", || {
            let entry = self.pkgdb()?.get(name)?;
            if entry.metadata.files.is_empty() {
                warn!("No files recorded for {}", entry.pkgname);
            }
            Ok(entry.metadata.files)
        })
    }

    /// Packages that declare they require `name` (`+REQUIRED_BY`)
    pub fn reverse_dependencies(&self, name: &str) -> Result<Vec<String>> {
        self.operation("reverse_dependencies", || {
            Ok(self.pkgdb()?.get(name)?.metadata.required_by)
        })
    }

    /// Last lines of the installation log that mention `name`
    ///
    /// A bare name matches only as `name-<version>`, so `bash` does not
    /// pick up `bash-completion`.
    pub fn history(&self, name: &str) -> Result<Vec<String>> {
        self.operation("history", || {
            let log = &self.config.install_log;
            if !log.is_file() {
                return Err(Error::NotFound(format!("Installation log {}", log.display())));
            }

            let content = fs::read_to_string(log)?;
            let lines: Vec<String> = content
                .lines()
                .filter(|line| mentions_package(line, name))
                .map(|line| line.trim().to_string())
                .collect();
            let skip = lines.len().saturating_sub(HISTORY_LINES);
            Ok(lines.into_iter().skip(skip).collect())
        })
    }

    /// Compare a package file's manifest with the installed entry
    pub fn verify_artifact(&self, artifact: &Path) -> Result<ArtifactVerification> {
        self.operation("verify_artifact", || {
            let package = BinaryPackage::parse(artifact)?;
            let entry = self.pkgdb()?.get(package.name())?;

            let packaged: BTreeSet<&String> = package.files().iter().collect();
            let installed: BTreeSet<&String> = entry.metadata.files.iter().collect();

            let result = ArtifactVerification {
                name: package.name().to_string(),
                missing: packaged.difference(&installed).map(|f| f.to_string()).collect(),
                extra: installed.difference(&packaged).map(|f| f.to_string()).collect(),
            };
            if !result.is_clean() {
                warn!(
                    "{}: {} missing, {} extra file(s)",
                    result.name,
                    result.missing.len(),
                    result.extra.len()
                );
            }
            Ok(result)
        })
    }
}
