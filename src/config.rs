// src/config.rs

//! Engine configuration
//!
//! A [`Config`] is built once at process start and handed to
//! [`crate::query::PkgQuery::new`]. Values are layered, lowest precedence
//! first:
//!
//! 1. built-in defaults
//! 2. `mk.conf` files (`PKGSRCDIR`, `PKG_DBDIR`, `DISTDIR`)
//! 3. an optional TOML file
//! 4. environment variables of the same names as in `mk.conf`
//!
//! Environment access goes through a lookup closure so nothing below the
//! loader reads ambient state.

use crate::error::{Error, Result};
use crate::repository::RepositoryDescriptor;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_PKGSRC_DIR: &str = "/usr/pkgsrc";
pub const DEFAULT_PKG_DBDIR: &str = "/usr/pkg/pkgdb";
pub const DEFAULT_INSTALL_LOG: &str = "/var/log/pkg.log";
pub const DEFAULT_CHANGELOG_URL: &str =
    "https://cdn.netbsd.org/pub/pkgsrc/current/pkgsrc/doc/CHANGES-{year}";
pub const DEFAULT_CHANGELOG_TIMEOUT_SECS: u64 = 10;

/// `mk.conf` locations, read in order (later files win)
pub const MK_CONF_PATHS: &[&str] = &["/usr/pkg/etc/mk.conf", "/etc/mk.conf"];

const KEY_PKGSRCDIR: &str = "PKGSRCDIR";
const KEY_PKG_DBDIR: &str = "PKG_DBDIR";
const KEY_DISTDIR: &str = "DISTDIR";

/// Resolved configuration for a query session
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Root of the default pkgsrc source tree
    pub pkgsrc_dir: PathBuf,
    /// Installed-package database directory
    pub pkg_dbdir: PathBuf,
    /// Distfile cache; `<pkgsrc_dir>/distfiles` when unset
    pub distdir: Option<PathBuf>,
    /// Ordered repositories; empty means just `pkgsrc_dir`
    pub repositories: Vec<RepositoryDescriptor>,
    pub search_source: bool,
    pub search_binary: bool,
    pub install_log: PathBuf,
    /// Changelog URL template containing `{year}`
    pub changelog_url: String,
    pub changelog_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pkgsrc_dir: PathBuf::from(DEFAULT_PKGSRC_DIR),
            pkg_dbdir: PathBuf::from(DEFAULT_PKG_DBDIR),
            distdir: None,
            repositories: Vec::new(),
            search_source: true,
            search_binary: true,
            install_log: PathBuf::from(DEFAULT_INSTALL_LOG),
            changelog_url: DEFAULT_CHANGELOG_URL.to_string(),
            changelog_timeout_secs: DEFAULT_CHANGELOG_TIMEOUT_SECS,
        }
    }
}

/// On-disk TOML layout; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    pkgsrc_dir: Option<PathBuf>,
    pkg_dbdir: Option<PathBuf>,
    distdir: Option<PathBuf>,
    repositories: Option<Vec<RepositoryDescriptor>>,
    search_source: Option<bool>,
    search_binary: Option<bool>,
    install_log: Option<PathBuf>,
    changelog_url: Option<String>,
    changelog_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from the standard locations and the process
    /// environment
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mk_confs: Vec<PathBuf> = MK_CONF_PATHS.iter().map(PathBuf::from).collect();
        Self::load_with(config_file, &mk_confs, |key| std::env::var(key).ok())
    }

    /// Load configuration with explicit `mk.conf` paths and environment lookup
    pub fn load_with<F>(config_file: Option<&Path>, mk_confs: &[PathBuf], env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        for mk_conf in mk_confs {
            if mk_conf.is_file() {
                let content = std::fs::read_to_string(mk_conf)?;
                config.apply_mk_conf(&content, mk_conf);
            }
        }

        if let Some(path) = config_file {
            if !path.is_file() {
                return Err(Error::Configuration(format!(
                    "Configuration file {} does not exist",
                    path.display()
                )));
            }
            let content = std::fs::read_to_string(path)?;
            let file: ConfigFile = toml::from_str(&content).map_err(|e| {
                Error::Configuration(format!("Invalid configuration file {}: {}", path.display(), e))
            })?;
            config.apply_file(file);
        }

        for key in [KEY_PKGSRCDIR, KEY_PKG_DBDIR, KEY_DISTDIR] {
            if let Some(value) = env(key).filter(|v| !v.is_empty()) {
                debug!("{} overridden by environment: {}", key, value);
                config.set_variable(key, &value);
            }
        }

        Ok(config)
    }

    fn apply_mk_conf(&mut self, content: &str, source: &Path) {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim_end_matches(['?', ':', '+']).trim();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if self.set_variable(key, value) {
                debug!("{} found in {}: {}", key, source.display(), value);
            }
        }
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(v) = file.pkgsrc_dir {
            self.pkgsrc_dir = v;
        }
        if let Some(v) = file.pkg_dbdir {
            self.pkg_dbdir = v;
        }
        if let Some(v) = file.distdir {
            self.distdir = Some(v);
        }
        if let Some(v) = file.repositories {
            self.repositories = v;
        }
        if let Some(v) = file.search_source {
            self.search_source = v;
        }
        if let Some(v) = file.search_binary {
            self.search_binary = v;
        }
        if let Some(v) = file.install_log {
            self.install_log = v;
        }
        if let Some(v) = file.changelog_url {
            self.changelog_url = v;
        }
        if let Some(v) = file.changelog_timeout_secs {
            self.changelog_timeout_secs = v;
        }
    }

    /// Set a pkgsrc-style variable; returns false for unrecognised keys
    fn set_variable(&mut self, key: &str, value: &str) -> bool {
        match key {
            KEY_PKGSRCDIR => self.pkgsrc_dir = PathBuf::from(value),
            KEY_PKG_DBDIR => self.pkg_dbdir = PathBuf::from(value),
            KEY_DISTDIR => self.distdir = Some(PathBuf::from(value)),
            _ => return false,
        }
        true
    }

    /// Check the configuration is usable. Called once by the engine.
    pub fn validate(&self) -> Result<()> {
        if !self.search_source && !self.search_binary {
            return Err(Error::Configuration(
                "At least one search source must be enabled (source tree or package database)"
                    .to_string(),
            ));
        }
        if self.search_binary && !self.pkg_dbdir.is_dir() {
            return Err(Error::Configuration(format!(
                "Package database {} is not a directory",
                self.pkg_dbdir.display()
            )));
        }
        Ok(())
    }

    /// Repositories in priority order
    pub fn repositories(&self) -> Vec<RepositoryDescriptor> {
        if self.repositories.is_empty() {
            vec![RepositoryDescriptor::Local {
                path: self.pkgsrc_dir.clone(),
            }]
        } else {
            self.repositories.clone()
        }
    }

    pub fn distdir(&self) -> PathBuf {
        self.distdir
            .clone()
            .unwrap_or_else(|| self.pkgsrc_dir.join("distfiles"))
    }

    pub fn changelog_url_for(&self, year: i32) -> String {
        self.changelog_url.replace("{year}", &year.to_string())
    }

    pub fn changelog_timeout(&self) -> Duration {
        Duration::from_secs(self.changelog_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = Config::load_with(None, &[], no_env).unwrap();
        assert_eq!(config.pkgsrc_dir, PathBuf::from("/usr/pkgsrc"));
        assert_eq!(config.distdir(), PathBuf::from("/usr/pkgsrc/distfiles"));
        assert_eq!(
            config.repositories(),
            vec![RepositoryDescriptor::Local {
                path: PathBuf::from("/usr/pkgsrc")
            }]
        );
        assert!(config.search_source && config.search_binary);
    }

    #[test]
    fn test_mk_conf_then_env_precedence() {
        let dir = TempDir::new().unwrap();
        let mk_conf = dir.path().join("mk.conf");
        std::fs::write(
            &mk_conf,
            "# local settings\nPKGSRCDIR=/home/pkgsrc\nPKG_DBDIR?= /var/db/pkg\nCFLAGS+= -O2\n",
        )
        .unwrap();

        let env: HashMap<&str, &str> = [("PKG_DBDIR", "/opt/pkgdb")].into_iter().collect();
        let config = Config::load_with(None, &[mk_conf], |k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.pkgsrc_dir, PathBuf::from("/home/pkgsrc"));
        assert_eq!(config.pkg_dbdir, PathBuf::from("/opt/pkgdb"));
        assert_eq!(config.distdir(), PathBuf::from("/home/pkgsrc/distfiles"));
    }

    #[test]
    fn test_toml_file_overrides_mk_conf() {
        let dir = TempDir::new().unwrap();
        let mk_conf = dir.path().join("mk.conf");
        std::fs::write(&mk_conf, "PKGSRCDIR=/home/pkgsrc\nDISTDIR=/data/distfiles\n").unwrap();
        let toml_path = dir.path().join("nbpkgquery.toml");
        std::fs::write(
            &toml_path,
            r#"
pkgsrc_dir = "/srv/pkgsrc"
search_binary = false

[[repositories]]
kind = "local"
path = "/srv/pkgsrc"

[[repositories]]
kind = "remote"
url = "https://cdn.netbsd.org/pub/pkgsrc/current/pkgsrc"
"#,
        )
        .unwrap();

        let config = Config::load_with(Some(&toml_path), &[mk_conf], no_env).unwrap();
        assert_eq!(config.pkgsrc_dir, PathBuf::from("/srv/pkgsrc"));
        assert_eq!(config.distdir(), PathBuf::from("/data/distfiles"));
        assert!(!config.search_binary);
        assert_eq!(config.repositories().len(), 2);
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let toml_path = dir.path().join("bad.toml");
        std::fs::write(&toml_path, "no_such_key = 1\n").unwrap();

        let result = Config::load_with(Some(&toml_path), &[], no_env);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_validate_requires_a_search_source() {
        let config = Config {
            search_source: false,
            search_binary: false,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_validate_checks_database_directory() {
        let config = Config {
            pkg_dbdir: PathBuf::from("/nonexistent/pkgdb"),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let dir = TempDir::new().unwrap();
        let config = Config {
            pkg_dbdir: dir.path().to_path_buf(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_changelog_url_for_year() {
        let config = Config::default();
        assert_eq!(
            config.changelog_url_for(2024),
            "https://cdn.netbsd.org/pub/pkgsrc/current/pkgsrc/doc/CHANGES-2024"
        );
    }
}
