// src/query/search.rs

//! Name and maintainer searches over the source tree

use super::PkgQuery;
use crate::error::Result;
use crate::packages::SourceRecipe;
use crate::repository::{PackageLocation, RepositoryDescriptor, RepositoryResolver};
use crate::version::UNKNOWN_VERSION;
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// One package matched by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub name: String,
    pub category: String,
    /// `category/name`
    pub path: String,
    pub version: String,
    pub comment: Option<String>,
    pub master_sites: Vec<String>,
    pub repository: PathBuf,
}

/// One package whose maintainer matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaintainerHit {
    pub name: String,
    pub path: String,
    pub maintainer: String,
}

impl SearchHit {
    fn from_location(location: PackageLocation) -> Self {
        let (version, comment, master_sites) = match SourceRecipe::read_makefile(&location.path) {
            Ok(make) => (make.version(), make.get("COMMENT"), make.words("MASTER_SITES")),
            Err(e) => {
                warn!("{}", e);
                (UNKNOWN_VERSION.to_string(), None, Vec::new())
            }
        };

        Self {
            path: location.pkgpath(),
            name: location.name,
            category: location.category,
            repository: location.repository,
            version,
            comment,
            master_sites,
        }
    }
}

/// Match a maintainer value against a search identifier, ignoring case
///
/// In email mode the identifier may occur anywhere in the value; in name
/// mode only in the part before the first `@`.
pub fn maintainer_matches(value: &str, identifier: &str, by_email: bool) -> bool {
    let needle = identifier.to_lowercase();
    let haystack = if by_email {
        value
    } else {
        value.split('@').next().unwrap_or(value)
    };
    !haystack.is_empty() && haystack.to_lowercase().contains(&needle)
}

impl PkgQuery {
    /// Packages whose directory name contains `pattern`, ignoring case
    ///
    /// No match is an empty list, not an error.
    pub fn search_by_name(&self, pattern: &str, category: Option<&str>) -> Result<Vec<SearchHit>> {
        self.operation("search_by_name", || {
            self.require_source()?;
            let locations = self.resolver.search(pattern, category)?;
            info!("{} package(s) match {}", locations.len(), pattern);

            Ok(locations
                .into_par_iter()
                .map(SearchHit::from_location)
                .collect())
        })
    }

    /// Packages of the default source tree whose maintainer matches
    pub fn search_by_maintainer(&self, identifier: &str, by_email: bool) -> Result<Vec<MaintainerHit>> {
        self.operation("search_by_maintainer", || {
            self.require_source()?;
            let tree = RepositoryResolver::new(vec![RepositoryDescriptor::Local {
                path: self.config.pkgsrc_dir.clone(),
            }]);
            let locations = tree.list_all(None)?;
            debug!("Scanning {} recipes for maintainer {}", locations.len(), identifier);

            let hits: Vec<Option<MaintainerHit>> = locations
                .par_iter()
                .map(|location| {
                    let make = match SourceRecipe::read_makefile(&location.path) {
                        Ok(make) => make,
                        Err(e) => {
                            debug!("{}", e);
                            return None;
                        }
                    };
                    let maintainer = make.get("MAINTAINER")?;
                    maintainer_matches(&maintainer, identifier, by_email).then(|| MaintainerHit {
                        name: location.name.clone(),
                        path: location.pkgpath(),
                        maintainer,
                    })
                })
                .collect();

            Ok(hits.into_iter().flatten().collect())
        })
    }

    /// Keep only the hits whose package is installed
    pub fn filter_installed(&self, hits: Vec<SearchHit>) -> Result<Vec<SearchHit>> {
        self.operation("filter_installed", || {
            let installed = self.pkgdb()?.installed_names()?;
            Ok(hits
                .into_iter()
                .filter(|hit| installed.contains(&hit.name))
                .collect())
        })
    }
}
