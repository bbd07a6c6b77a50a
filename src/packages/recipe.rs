// src/packages/recipe.rs

//! Source recipe parser
//!
//! A recipe is a package directory in a pkgsrc tree: a `Makefile` of
//! `VAR= value` assignments plus optional `DESCR`, `PLIST` and `distinfo`
//! files. Conditionals and targets are not evaluated; every assignment in
//! the file is applied in order and `${VAR}` references are expanded only
//! against variables set in the same Makefile.

use crate::error::{Error, Result};
use crate::packages::record::{PackageRecord, Provenance, SourceDetails};
use crate::packages::traits::{Dependency, DependencyType, PackageFormat};
use crate::version::{split_pkgname, UNKNOWN_VERSION};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const MAX_EXPANSION_DEPTH: usize = 8;

/// Variables assigned in one Makefile
#[derive(Debug, Clone, Default)]
pub struct MakeVars {
    vars: HashMap<String, String>,
    includes: Vec<String>,
}

impl MakeVars {
    pub fn parse(content: &str) -> Self {
        let mut make = MakeVars::default();

        for line in logical_lines(content) {
            if line.starts_with('\t') {
                continue;
            }
            let line = strip_comment(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(directive) = line.strip_prefix('.') {
                let directive = directive.trim_start();
                if let Some(target) = directive.strip_prefix("include") {
                    let target = target.trim().trim_matches('"');
                    if !target.is_empty() {
                        make.includes.push(target.to_string());
                    }
                }
                continue;
            }

            make.apply_assignment(line);
        }

        make
    }

    fn apply_assignment(&mut self, line: &str) {
        let Some(eq) = line.find('=') else {
            return;
        };
        let (lhs, value) = (&line[..eq], line[eq + 1..].trim());

        let (name, op) = match lhs.chars().last() {
            Some(c @ ('+' | '?' | ':' | '!')) => (lhs[..lhs.len() - 1].trim(), Some(c)),
            _ => (lhs.trim(), None),
        };
        if name.is_empty() || !is_identifier(name) {
            return;
        }

        match op {
            Some('+') => {
                let entry = self.vars.entry(name.to_string()).or_default();
                if !entry.is_empty() && !value.is_empty() {
                    entry.push(' ');
                }
                entry.push_str(value);
            }
            Some('?') => {
                self.vars
                    .entry(name.to_string())
                    .or_insert_with(|| value.to_string());
            }
            // Shell assignments cannot be evaluated here
            Some('!') => {}
            _ => {
                self.vars.insert(name.to_string(), value.to_string());
            }
        }
    }

    /// Raw value of a variable
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Value of a variable with same-file references expanded
    pub fn get(&self, name: &str) -> Option<String> {
        self.raw(name)
            .map(|value| self.expand(value))
            .filter(|value| !value.is_empty())
    }

    /// Whitespace-separated words of a variable, expanded
    pub fn words(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// `.include` targets in file order
    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    /// Expand `${VAR}` references to variables set in this file
    ///
    /// References with modifiers or to unknown variables stay verbatim.
    pub fn expand(&self, value: &str) -> String {
        self.expand_depth(value, 0)
    }

    fn expand_depth(&self, value: &str, depth: usize) -> String {
        if depth >= MAX_EXPANSION_DEPTH || !value.contains("${") {
            return value.to_string();
        }

        let mut out = String::with_capacity(value.len());
        let mut rest = value;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = closing_brace(after) else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };

            let inner = &after[..end];
            match self.vars.get(inner) {
                Some(v) if is_identifier(inner) => out.push_str(&self.expand_depth(v, depth + 1)),
                _ => {
                    out.push_str("${");
                    out.push_str(inner);
                    out.push('}');
                }
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }

    /// Package version from `PKGNAME` or `DISTNAME` plus `PKGREVISION`
    ///
    /// Falls back to `unknown` when neither variable yields a literal
    /// version.
    pub fn version(&self) -> String {
        let base = ["PKGNAME", "DISTNAME"]
            .iter()
            .filter_map(|var| self.get(var))
            .find_map(|pkgname| match split_pkgname(&pkgname) {
                (_, Some(version)) if is_literal_version(version) => Some(version.to_string()),
                _ => None,
            });

        let Some(base) = base else {
            return UNKNOWN_VERSION.to_string();
        };

        match self.get("PKGREVISION") {
            Some(rev) if !rev.is_empty() && rev.chars().all(|c| c.is_ascii_digit()) => {
                format!("{}nb{}", base, rev)
            }
            _ => base,
        }
    }
}

/// Join backslash-continued lines
fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for raw in content.lines() {
        match raw.strip_suffix('\\') {
            Some(head) => {
                current.push_str(head);
                current.push(' ');
            }
            None => {
                current.push_str(raw);
                lines.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Drop everything from the first unescaped `#`
fn strip_comment(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'#') => {
                out.push('#');
                chars.next();
            }
            '#' => break,
            _ => out.push(c),
        }
    }
    out
}

fn closing_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn is_literal_version(version: &str) -> bool {
    version.starts_with(|c: char| c.is_ascii_digit())
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '~'))
}

/// Parsed source recipe
#[derive(Debug, Clone)]
pub struct SourceRecipe {
    path: PathBuf,
    category: String,
    name: String,
    version: String,
    comment: Option<String>,
    description: Option<String>,
    categories: Vec<String>,
    master_sites: Vec<String>,
    maintainer: Option<String>,
    homepage: Option<String>,
    license: Option<String>,
    files: Vec<String>,
    dependencies: Vec<Dependency>,
}

impl SourceRecipe {
    /// Read only the Makefile of a recipe directory
    ///
    /// Used by scans that need a single variable, such as maintainer search.
    pub fn read_makefile(dir: &Path) -> Result<MakeVars> {
        let makefile = dir.join("Makefile");
        let content = fs::read_to_string(&makefile).map_err(|e| {
            Error::PackageParsing(format!("Cannot read {}: {}", makefile.display(), e))
        })?;
        Ok(MakeVars::parse(&content))
    }

    /// Maintainer address from the Makefile
    pub fn maintainer(&self) -> Option<&str> {
        self.maintainer.as_deref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `category/name`
    pub fn pkgpath(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }
}

/// Contents of an optional recipe file; absence is not an error
fn read_optional(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            debug!("No readable {}: {}", path.display(), e);
            None
        }
    }
}

fn plist_files(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('@'))
        .map(str::to_string)
        .collect()
}

fn recipe_dependencies(make: &MakeVars) -> Vec<Dependency> {
    let mut deps = Vec::new();
    for (var, dep_type) in [
        ("DEPENDS", DependencyType::Runtime),
        ("BUILD_DEPENDS", DependencyType::Build),
        ("TOOL_DEPENDS", DependencyType::Tool),
    ] {
        deps.extend(
            make.words(var)
                .iter()
                .map(|pattern| Dependency::from_pattern(pattern, dep_type)),
        );
    }

    // ../../category/package/buildlink3.mk pulls in a library dependency
    for include in make.includes() {
        let Some(dir) = include.strip_suffix("/buildlink3.mk") else {
            continue;
        };
        let Some(name) = dir.rsplit('/').next().filter(|n| !n.is_empty()) else {
            continue;
        };
        let pattern = format!("{}:{}", name, dir);
        deps.push(Dependency::from_pattern(&pattern, DependencyType::Runtime));
    }
    deps
}

impl PackageFormat for SourceRecipe {
    fn parse(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(Error::PackageParsing(format!(
                "{} is not a package directory",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::PackageParsing(format!("Invalid package path {}", path.display())))?;
        let category = path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let make = Self::read_makefile(path)?;
        debug!("Parsed Makefile of {}/{}", category, name);

        let description = read_optional(&path.join("DESCR"))
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let files = read_optional(&path.join("PLIST"))
            .map(|plist| plist_files(&plist))
            .unwrap_or_default();

        let mut categories = make.words("CATEGORIES");
        if categories.is_empty() && !category.is_empty() {
            categories.push(category.clone());
        }

        Ok(Self {
            version: make.version(),
            comment: make.get("COMMENT"),
            description,
            categories,
            master_sites: make.words("MASTER_SITES"),
            maintainer: make.get("MAINTAINER"),
            homepage: make.get("HOMEPAGE"),
            license: make.get("LICENSE"),
            files,
            dependencies: recipe_dependencies(&make),
            path: path.to_path_buf(),
            category,
            name,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn files(&self) -> &[String] {
        &self.files
    }

    fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    fn to_record(&self) -> PackageRecord {
        let mut record = PackageRecord::new(
            self.name.clone(),
            self.version.clone(),
            Provenance::Source(SourceDetails {
                pkgpath: self.pkgpath(),
                path: self.path.clone(),
                master_sites: self.master_sites.clone(),
            }),
        );
        record.comment = self.comment.clone();
        record.description = self.description.clone();
        record.categories = self.categories.clone();
        record.files = self.files.clone();
        record.license = self.license.clone();
        record.maintainer = self.maintainer.clone();
        record.homepage = self.homepage.clone();
        record.has_man_pages = self
            .files
            .iter()
            .any(|f| f.starts_with("man/") || f.contains("/man/") || f.starts_with("${PKGMANDIR}/"));
        record.set_dependencies(&self.dependencies);
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PY_SIX_MAKEFILE: &str = "\
# $NetBSD: Makefile,v 1.40 2023/01/01 00:00:00 wiz Exp $

DISTNAME=\tsix-1.16.0
PKGNAME=\t${PYPKGPREFIX}-${DISTNAME}
CATEGORIES=\tlang python
MASTER_SITES=\t${MASTER_SITE_PYPI:=s/six/}

MAINTAINER=\tpkgsrc-users@NetBSD.org
HOMEPAGE=\thttps://github.com/benjaminp/six
COMMENT=\tPython 2/3 compatibility library
LICENSE=\tmit

DEPENDS+=\t${PYPKGPREFIX}-setuptools>=0:../../devel/py-setuptools
TOOL_DEPENDS+=\t${PYPKGPREFIX}-wheel-[0-9]*:../../devel/py-wheel

.include \"../../lang/python/egg.mk\"
.include \"../../mk/bsd.pkg.mk\"
";

    #[test]
    fn test_makevars_operators() {
        let make = MakeVars::parse(
            "FOO=\ta\nFOO+=\tb\nBAR?=\tkeep\nBAR?=\tignored\nBAZ:=\tx\nSH!=\tuname\n",
        );
        assert_eq!(make.raw("FOO"), Some("a b"));
        assert_eq!(make.raw("BAR"), Some("keep"));
        assert_eq!(make.raw("BAZ"), Some("x"));
        assert_eq!(make.raw("SH"), None);
    }

    #[test]
    fn test_makevars_continuation_and_comments() {
        let make = MakeVars::parse("SITES=\thttp://a/ \\\n\thttp://b/ # trailing\nCOMMENT=\tC\\# bindings\n");
        assert_eq!(make.words("SITES"), vec!["http://a/", "http://b/"]);
        assert_eq!(make.get("COMMENT").as_deref(), Some("C# bindings"));
    }

    #[test]
    fn test_makevars_ignores_target_commands() {
        let make = MakeVars::parse("post-install:\n\tcd ${WRKSRC} && make FOO=bar\n");
        assert_eq!(make.raw("FOO"), None);
    }

    #[test]
    fn test_expand_same_file_only() {
        let make = MakeVars::parse("DISTNAME=\tfoo-1.0\nPKGNAME=\t${DISTNAME:S/foo/bar/}\nX=\t${DISTNAME} ${UNSET}\n");
        assert_eq!(make.get("X").as_deref(), Some("foo-1.0 ${UNSET}"));
        assert_eq!(make.get("PKGNAME").as_deref(), Some("${DISTNAME:S/foo/bar/}"));
    }

    #[test]
    fn test_version_from_pkgname_or_distname() {
        let make = MakeVars::parse("DISTNAME=\tsix-1.16.0\nPKGNAME=\t${PYPKGPREFIX}-${DISTNAME}\n");
        assert_eq!(make.version(), "1.16.0");

        let make = MakeVars::parse("DISTNAME=\tbash-5.2.15\nPKGREVISION=\t2\n");
        assert_eq!(make.version(), "5.2.15nb2");

        let make = MakeVars::parse("DISTNAME=\t${GITHUB_PROJECT}-${VERSION}\n");
        assert_eq!(make.version(), UNKNOWN_VERSION);

        assert_eq!(MakeVars::parse("").version(), UNKNOWN_VERSION);
    }

    fn write_recipe(root: &Path) -> PathBuf {
        let dir = root.join("lang/py-six");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Makefile"), PY_SIX_MAKEFILE).unwrap();
        fs::write(dir.join("DESCR"), "Six is a Python 2 and 3 compatibility library.\n").unwrap();
        fs::write(
            dir.join("PLIST"),
            "@comment $NetBSD$\n${PYSITELIB}/six.py\nman/man1/six.1\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_parse_recipe() {
        let root = TempDir::new().unwrap();
        let dir = write_recipe(root.path());

        let recipe = SourceRecipe::parse(&dir).unwrap();
        assert_eq!(recipe.name(), "py-six");
        assert_eq!(recipe.version(), "1.16.0");
        assert_eq!(recipe.comment(), Some("Python 2/3 compatibility library"));
        assert_eq!(recipe.pkgpath(), "lang/py-six");
        assert_eq!(recipe.maintainer(), Some("pkgsrc-users@NetBSD.org"));
        assert_eq!(recipe.files().len(), 2);

        let record = recipe.to_record();
        assert_eq!(record.categories, vec!["lang", "python"]);
        assert_eq!(record.runtime_dependencies, vec!["py-setuptools"]);
        assert_eq!(record.build_dependencies, vec!["py-wheel"]);
        assert_eq!(record.license.as_deref(), Some("mit"));
        assert!(record.has_man_pages);
        assert_eq!(record.master_sites(), &["${MASTER_SITE_PYPI:=s/six/}".to_string()]);
    }

    #[test]
    fn test_buildlink_includes_are_runtime_dependencies() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("graphics/foo");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("Makefile"),
            "DISTNAME=\tfoo-2.0\n.include \"../../graphics/png/buildlink3.mk\"\n.include \"../../mk/bsd.pkg.mk\"\n",
        )
        .unwrap();

        let record = SourceRecipe::parse(&dir).unwrap().to_record();
        assert_eq!(record.runtime_dependencies, vec!["png"]);
        assert_eq!(record.categories, vec!["graphics"]);
        assert!(record.description.is_none());
        assert!(!record.has_man_pages);
    }

    #[test]
    fn test_missing_makefile_is_parse_error() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("devel/empty");
        fs::create_dir_all(&dir).unwrap();

        assert!(matches!(SourceRecipe::parse(&dir), Err(Error::PackageParsing(_))));
    }
}
