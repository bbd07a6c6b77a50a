// src/query/docs.rs

//! Descriptions, TODO files and yearly changelogs of the source tree

use super::PkgQuery;
use crate::error::{Error, Result};
use crate::packages::{PackageFormat, SourceRecipe};
use crate::repository::client::{ChangelogSource, MirrorClient};
use chrono::Datelike;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// First year with a pkgsrc changelog
pub const FIRST_CHANGELOG_YEAR: i32 = 1990;

/// Long description of a source package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Description {
    pub name: String,
    pub description: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TodoContent {
    Missing,
    Empty,
    Lines { lines: Vec<String> },
    Unreadable { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoFile {
    pub file: PathBuf,
    #[serde(flatten)]
    pub content: TodoContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangelogOrigin {
    Local,
    Web,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Changelog {
    pub year: i32,
    pub source: ChangelogOrigin,
    pub lines: Vec<String>,
}

fn split_lines(content: &str) -> Vec<String> {
    content.trim().lines().map(str::to_string).collect()
}

fn read_todo(file: PathBuf) -> TodoFile {
    let content = match fs::read_to_string(&file) {
        Ok(text) if text.trim().is_empty() => TodoContent::Empty,
        Ok(text) => TodoContent::Lines {
            lines: split_lines(&text),
        },
        Err(e) if e.kind() == ErrorKind::NotFound => TodoContent::Missing,
        Err(e) => {
            warn!("Cannot read {}: {}", file.display(), e);
            TodoContent::Unreadable {
                message: e.to_string(),
            }
        }
    };
    TodoFile { file, content }
}

impl PkgQuery {
    /// Description and categories of a source package
    pub fn describe(&self, name: &str) -> Result<Description> {
        self.operation("describe", || {
            let location = self.locate_source(name, None)?;
            let recipe = SourceRecipe::parse(&location.path)?;
            let description = recipe.description().ok_or_else(|| {
                Error::PackageParsing(format!("No description for {}", location.pkgpath()))
            })?;

            Ok(Description {
                name: recipe.name().to_string(),
                description: description.to_string(),
                categories: recipe.to_record().categories,
            })
        })
    }

    /// `TODO` and `wip/TODO` at the top of the source tree
    pub fn read_todo_files(&self) -> Result<Vec<TodoFile>> {
        self.operation("read_todo_files", || {
            let root = &self.config.pkgsrc_dir;
            Ok(vec![
                read_todo(root.join("TODO")),
                read_todo(root.join("wip").join("TODO")),
            ])
        })
    }

    /// The `CHANGES-<year>` file, from `doc/` if present, otherwise the mirror
    pub fn fetch_changelog(&self, year: i32) -> Result<Changelog> {
        self.operation("fetch_changelog", || {
            let current = chrono::Local::now().year();
            if !(FIRST_CHANGELOG_YEAR..=current).contains(&year) {
                return Err(Error::InvalidArgument(format!(
                    "Year {} must be between {} and {}",
                    year, FIRST_CHANGELOG_YEAR, current
                )));
            }

            let local = self
                .config
                .pkgsrc_dir
                .join("doc")
                .join(format!("CHANGES-{}", year));
            if local.is_file() {
                debug!("Reading {}", local.display());
                let content = fs::read_to_string(&local)?;
                return Ok(Changelog {
                    year,
                    source: ChangelogOrigin::Local,
                    lines: split_lines(&content),
                });
            }

            let url = self.config.changelog_url_for(year);
            let content = match &self.changelog_source {
                Some(source) => source.fetch(&url)?,
                None => MirrorClient::new(self.config.changelog_timeout())?.fetch(&url)?,
            };
            info!("Fetched changelog for {}", year);

            Ok(Changelog {
                year,
                source: ChangelogOrigin::Web,
                lines: split_lines(&content),
            })
        })
    }
}
