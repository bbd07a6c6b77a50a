// src/query/mod.rs

//! Package metadata resolution engine
//!
//! `PkgQuery` ties the repository resolver, the package database and the
//! metadata parsers together. Each public operation is independent: it reads
//! the filesystem fresh, builds its result and returns it. Operations are
//! spread over the submodules by concern.
//!
//! Every operation runs through [`PkgQuery::operation`], which logs the
//! operation boundary and reports stray I/O failures as parse errors so the
//! caller always receives either data or one error value.

pub mod distfiles;
pub mod docs;
pub mod installed;
pub mod patches;
pub mod search;

pub use distfiles::{DistfileReport, DistfileStatus};
pub use docs::{Changelog, ChangelogOrigin, Description, TodoContent, TodoFile};
pub use installed::{
    parse_or_default, ArtifactVerification, InstalledPackage, OutdatedEntry, OutdatedStatus,
    SortKey, SortOrder,
};
pub use patches::PatchInfo;
pub use search::{MaintainerHit, SearchHit};

use crate::config::Config;
use crate::db::{InstalledEntry, PkgDb};
use crate::error::{Error, Result};
use crate::packages::{BinaryPackage, PackageFormat, PackageRecord, Provenance, SourceRecipe};
use crate::repository::client::ChangelogSource;
use crate::repository::{PackageLocation, RepositoryResolver};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Where `resolve` looks for a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupMode {
    /// Source recipe in the configured repositories
    Source,
    /// Installed database entry, or a package file reconciled against it
    Binary { artifact: Option<PathBuf> },
}

/// Dependency lists of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    pub name: String,
    pub dependencies: Vec<String>,
    pub build_dependencies: Vec<String>,
    pub runtime_dependencies: Vec<String>,
}

/// The resolution engine
pub struct PkgQuery {
    config: Config,
    resolver: RepositoryResolver,
    changelog_source: Option<Box<dyn ChangelogSource>>,
}

impl PkgQuery {
    /// Create an engine from a validated configuration
    ///
    /// Fails with `Error::Configuration` when no search source is enabled or
    /// the package database path is unusable.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let resolver = RepositoryResolver::new(config.repositories());
        Ok(Self {
            config,
            resolver,
            changelog_source: None,
        })
    }

    /// Use `source` instead of the HTTP mirror for changelog fetches
    pub fn with_changelog_source(mut self, source: Box<dyn ChangelogSource>) -> Self {
        self.changelog_source = Some(source);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &RepositoryResolver {
        &self.resolver
    }

    /// Run one public operation, logging its boundary
    ///
    /// Domain errors pass through; raw I/O errors become
    /// `Error::PackageParsing` carrying the original message.
    pub(crate) fn operation<T, F>(&self, name: &str, op: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        debug!("{}: start", name);
        match op() {
            Ok(value) => {
                debug!("{}: done", name);
                Ok(value)
            }
            Err(Error::Io(e)) => {
                error!("{}: {}", name, e);
                Err(Error::PackageParsing(e.to_string()))
            }
            Err(e) => {
                warn!("{}: {}", name, e);
                Err(e)
            }
        }
    }

    fn require_source(&self) -> Result<()> {
        if self.config.search_source {
            Ok(())
        } else {
            Err(Error::Configuration("Source tree search is disabled".to_string()))
        }
    }

    /// Open the package database, if binary search is enabled
    pub(crate) fn pkgdb(&self) -> Result<PkgDb> {
        if !self.config.search_binary {
            return Err(Error::Configuration(
                "Package database search is disabled".to_string(),
            ));
        }
        PkgDb::open(&self.config.pkg_dbdir)
    }

    /// Locate a source package or fail with `Error::PackageNotFound`
    pub(crate) fn locate_source(&self, name: &str, category: Option<&str>) -> Result<PackageLocation> {
        self.require_source()?;
        self.resolver.locate(name, category)?.ok_or_else(|| {
            Error::PackageNotFound(match category {
                Some(cat) => format!("{}/{}", cat, name),
                None => name.to_string(),
            })
        })
    }

    /// Locate and build one package record
    pub fn resolve(&self, name: &str, mode: &LookupMode) -> Result<PackageRecord> {
        self.operation("resolve", || match mode {
            LookupMode::Source => {
                let location = self.locate_source(name, None)?;
                Ok(SourceRecipe::parse(&location.path)?.to_record())
            }
            LookupMode::Binary { artifact: None } => Ok(self.pkgdb()?.get(name)?.to_record()),
            LookupMode::Binary {
                artifact: Some(path),
            } => self.resolve_artifact(name, path),
        })
    }

    fn resolve_artifact(&self, name: &str, path: &Path) -> Result<PackageRecord> {
        let package = BinaryPackage::parse(path)?;
        if package.name() != name && package.metadata().pkgname != name {
            warn!(
                "{} contains {}, not {}",
                path.display(),
                package.metadata().pkgname,
                name
            );
        }

        let mut record = package.to_record();
        if !self.config.search_binary {
            return Ok(record);
        }

        match self.pkgdb()?.get_optional(package.name())? {
            Some(entry) => reconcile(&mut record, &entry),
            None => debug!("{} is not installed", package.name()),
        }
        Ok(record)
    }

    /// Files provided by a package
    pub fn provides(&self, name: &str, mode: &LookupMode) -> Result<Vec<String>> {
        let record = self.resolve(name, mode)?;
        Ok(record.files)
    }

    /// Dependency lists of a package
    pub fn depends(&self, name: &str, mode: &LookupMode) -> Result<DependencyReport> {
        let record = self.resolve(name, mode)?;
        Ok(DependencyReport {
            name: record.name,
            dependencies: record.dependencies,
            build_dependencies: record.build_dependencies,
            runtime_dependencies: record.runtime_dependencies,
        })
    }
}

/// Enrich a package file record with its installed database entry
fn reconcile(record: &mut PackageRecord, entry: &InstalledEntry) {
    let installed = entry.to_record();

    if record.comment.is_none() {
        record.comment = installed.comment;
    }
    if record.description.is_none() {
        record.description = installed.description;
    }
    if record.categories.is_empty() {
        record.categories = installed.categories;
    }
    if let Provenance::Binary(details) = &mut record.provenance {
        details.installed = true;
        details.installed_version = Some(entry.version().to_string());
        if details.size.is_none() {
            details.size = entry.metadata.size;
        }
        if details.build_info.is_empty() {
            details.build_info = entry.metadata.build_info.clone();
        }
        if details.origin.is_none() {
            details.origin = entry.metadata.origin().map(str::to_string);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::Config;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// A source tree and a package database under one temporary directory
    pub struct Fixture {
        pub dir: TempDir,
    }

    impl Fixture {
        pub fn new() -> Self {
            let dir = TempDir::new().unwrap();
            fs::create_dir_all(dir.path().join("pkgsrc")).unwrap();
            fs::create_dir_all(dir.path().join("pkgdb")).unwrap();
            Self { dir }
        }

        pub fn pkgsrc(&self) -> PathBuf {
            self.dir.path().join("pkgsrc")
        }

        pub fn pkgdb(&self) -> PathBuf {
            self.dir.path().join("pkgdb")
        }

        pub fn config(&self) -> Config {
            Config {
                pkgsrc_dir: self.pkgsrc(),
                pkg_dbdir: self.pkgdb(),
                install_log: self.dir.path().join("pkg.log"),
                ..Config::default()
            }
        }

        pub fn add_recipe(&self, pkgpath: &str, makefile: &str) -> PathBuf {
            let dir = self.pkgsrc().join(pkgpath);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("Makefile"), makefile).unwrap();
            dir
        }

        pub fn add_installed(&self, pkgname: &str, contents: &str, comment: Option<&str>) -> PathBuf {
            let dir = self.pkgdb().join(pkgname);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("+CONTENTS"), contents).unwrap();
            if let Some(comment) = comment {
                fs::write(dir.join("+COMMENT"), comment).unwrap();
            }
            dir
        }

        pub fn write(&self, relative: &str, content: &str) {
            let path = self.dir.path().join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
    }
}
