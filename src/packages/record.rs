// src/packages/record.rs

//! The normalized package record
//!
//! Source recipes and binary packages carry different metadata. Fields both
//! provide live on [`PackageRecord`] directly; provenance-specific fields
//! live in [`Provenance`], so a source record can never expose a binary
//! size and a binary record can never expose master sites.

use crate::packages::traits::Dependency;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Metadata of one package, built fresh for each query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub comment: Option<String>,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub files: Vec<String>,
    /// Runtime then build dependencies, without duplicates
    pub dependencies: Vec<String>,
    pub build_dependencies: Vec<String>,
    pub runtime_dependencies: Vec<String>,
    pub license: Option<String>,
    pub maintainer: Option<String>,
    pub homepage: Option<String>,
    pub has_man_pages: bool,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Provenance {
    Source(SourceDetails),
    Binary(BinaryDetails),
}

/// Fields only a source recipe provides
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SourceDetails {
    /// `category/name`
    pub pkgpath: String,
    pub path: PathBuf,
    pub master_sites: Vec<String>,
}

/// Fields only a binary package provides
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BinaryDetails {
    /// `category/name` the package was built from
    pub origin: Option<String>,
    pub size: Option<u64>,
    pub build_info: BTreeMap<String, String>,
    /// Whether the package database has an entry with this name
    pub installed: bool,
    pub installed_version: Option<String>,
    /// Package file the metadata was read from, if any
    pub artifact: Option<PathBuf>,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            comment: None,
            description: None,
            categories: Vec::new(),
            files: Vec::new(),
            dependencies: Vec::new(),
            build_dependencies: Vec::new(),
            runtime_dependencies: Vec::new(),
            license: None,
            maintainer: None,
            homepage: None,
            has_man_pages: false,
            provenance,
        }
    }

    /// Fill the three dependency lists from parsed dependencies
    pub fn set_dependencies(&mut self, deps: &[Dependency]) {
        self.runtime_dependencies = unique(deps.iter().filter(|d| !d.is_build_time()));
        self.build_dependencies = unique(deps.iter().filter(|d| d.is_build_time()));

        let mut all = self.runtime_dependencies.clone();
        for name in &self.build_dependencies {
            if !all.contains(name) {
                all.push(name.clone());
            }
        }
        self.dependencies = all;
    }

    pub fn is_source(&self) -> bool {
        matches!(self.provenance, Provenance::Source(_))
    }

    /// Download mirrors; always empty for binary records
    pub fn master_sites(&self) -> &[String] {
        match &self.provenance {
            Provenance::Source(src) => &src.master_sites,
            Provenance::Binary(_) => &[],
        }
    }

    /// Package size in bytes; only binary records carry one
    pub fn size(&self) -> Option<u64> {
        match &self.provenance {
            Provenance::Binary(bin) => bin.size,
            Provenance::Source(_) => None,
        }
    }

    pub fn origin(&self) -> Option<&str> {
        match &self.provenance {
            Provenance::Binary(bin) => bin.origin.as_deref(),
            Provenance::Source(_) => None,
        }
    }

    pub fn build_info(&self) -> Option<&BTreeMap<String, String>> {
        match &self.provenance {
            Provenance::Binary(bin) => Some(&bin.build_info),
            Provenance::Source(_) => None,
        }
    }
}

fn unique<'a>(deps: impl Iterator<Item = &'a Dependency>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for dep in deps {
        if !names.contains(&dep.name) {
            names.push(dep.name.clone());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::traits::DependencyType;

    #[test]
    fn test_set_dependencies_splits_and_dedups() {
        let deps = vec![
            Dependency::from_pattern("python39>=3.9", DependencyType::Runtime),
            Dependency::from_pattern("py-setuptools>=0:../../devel/py-setuptools", DependencyType::Tool),
            Dependency::from_pattern("python39-3.9.7", DependencyType::Build),
            Dependency::from_pattern("python39>=3.9", DependencyType::Runtime),
        ];

        let mut record = PackageRecord::new("py-six", "1.16.0", Provenance::Source(SourceDetails::default()));
        record.set_dependencies(&deps);

        assert_eq!(record.runtime_dependencies, vec!["python39"]);
        assert_eq!(record.build_dependencies, vec!["py-setuptools", "python39"]);
        assert_eq!(record.dependencies, vec!["python39", "py-setuptools"]);
    }

    #[test]
    fn test_provenance_fields_do_not_alias() {
        let source = PackageRecord::new(
            "py-six",
            "1.16.0",
            Provenance::Source(SourceDetails {
                master_sites: vec!["https://pypi.org/".to_string()],
                ..SourceDetails::default()
            }),
        );
        assert_eq!(source.master_sites().len(), 1);
        assert_eq!(source.size(), None);
        assert!(source.build_info().is_none());

        let binary = PackageRecord::new(
            "py39-six",
            "1.16.0",
            Provenance::Binary(BinaryDetails {
                size: Some(1024),
                ..BinaryDetails::default()
            }),
        );
        assert!(binary.master_sites().is_empty());
        assert_eq!(binary.size(), Some(1024));
        assert!(!binary.is_source());
    }
}
