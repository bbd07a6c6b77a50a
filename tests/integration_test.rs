// tests/integration_test.rs

//! Integration tests for nbpkgquery
//!
//! These tests build a small pkgsrc tree and package database on disk and
//! drive the engine through its public API.

use flate2::write::GzEncoder;
use flate2::Compression;
use nbpkgquery::checksum::ChecksumAlgorithm;
use nbpkgquery::packages::Provenance;
use nbpkgquery::query::{DistfileStatus, OutdatedStatus, SortKey, SortOrder};
use nbpkgquery::repository::RepositoryDescriptor;
use nbpkgquery::{Config, Error, LookupMode, PkgQuery};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PY_SIX_MAKEFILE: &str = "\
# $NetBSD: Makefile,v 1.40 2023/04/12 10:00:00 adam Exp $

DISTNAME=\tsix-1.16.0
PKGNAME=\t${PYPKGPREFIX}-${DISTNAME}
CATEGORIES=\tlang python
MASTER_SITES=\t${MASTER_SITE_PYPI:=s/six/}

MAINTAINER=\tpkgsrc-users@NetBSD.org
HOMEPAGE=\thttps://github.com/benjaminp/six
COMMENT=\tPython 2/3 compatibility library
LICENSE=\tmit

USE_LANGUAGES=\t# none

.include \"../../lang/python/wheel.mk\"
.include \"../../mk/bsd.pkg.mk\"
";

struct Tree {
    dir: TempDir,
}

impl Tree {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pkgsrc")).unwrap();
        fs::create_dir_all(dir.path().join("pkgdb")).unwrap();
        Self { dir }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn write(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn config(&self) -> Config {
        Config {
            pkgsrc_dir: self.path("pkgsrc"),
            pkg_dbdir: self.path("pkgdb"),
            install_log: self.path("pkg.log"),
            ..Config::default()
        }
    }

    fn query(&self) -> PkgQuery {
        PkgQuery::new(self.config()).unwrap()
    }
}

fn write_package_file(path: &Path, entries: &[(&str, &str)]) {
    let file = fs::File::create(path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

#[test]
fn test_search_by_name_end_to_end() {
    let tree = Tree::new();
    tree.write("pkgsrc/lang/py-six/Makefile", PY_SIX_MAKEFILE);
    tree.write("pkgsrc/devel/libtool/Makefile", "DISTNAME=\tlibtool-2.4.7\n");

    let hits = tree.query().search_by_name("six", None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "lang/py-six");
    assert_eq!(hits[0].version, "1.16.0");
    assert_eq!(hits[0].comment.as_deref(), Some("Python 2/3 compatibility library"));
}

#[test]
fn test_source_record_has_no_binary_fields() {
    let tree = Tree::new();
    tree.write("pkgsrc/lang/py-six/Makefile", PY_SIX_MAKEFILE);
    tree.write("pkgsrc/lang/py-six/DESCR", "Six is a Python 2 and 3 compatibility library.\n");

    let record = tree.query().resolve("py-six", &LookupMode::Source).unwrap();
    assert_eq!(record.version, "1.16.0");
    assert_eq!(record.maintainer.as_deref(), Some("pkgsrc-users@NetBSD.org"));
    assert_eq!(record.master_sites().len(), 1);
    assert_eq!(record.size(), None);
    assert_eq!(record.origin(), None);
    assert!(record.build_info().is_none());

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["provenance"]["kind"], "source");
    assert_eq!(json["provenance"]["pkgpath"], "lang/py-six");
}

#[test]
fn test_repository_priority() {
    let tree = Tree::new();
    tree.write("overlay/lang/py-six/Makefile", "DISTNAME=\tsix-1.17.0\n");
    tree.write("pkgsrc/lang/py-six/Makefile", PY_SIX_MAKEFILE);

    let config = Config {
        repositories: vec![
            RepositoryDescriptor::Remote {
                url: "https://cdn.netbsd.org/pub/pkgsrc/current/pkgsrc".to_string(),
            },
            RepositoryDescriptor::Local {
                path: tree.path("overlay"),
            },
            RepositoryDescriptor::Local {
                path: tree.path("pkgsrc"),
            },
        ],
        ..tree.config()
    };
    let query = PkgQuery::new(config).unwrap();

    let record = query.resolve("py-six", &LookupMode::Source).unwrap();
    assert_eq!(record.version, "1.17.0");

    let hits = query.search_by_name("py-six", Some("lang")).unwrap();
    let versions: Vec<_> = hits.iter().map(|h| h.version.as_str()).collect();
    assert_eq!(versions, vec!["1.17.0", "1.16.0"]);
}

#[test]
fn test_verify_distfiles_reports_both_digests() {
    let tree = Tree::new();
    tree.write("pkgsrc/devel/foo/Makefile", "DISTNAME=\tfoo-1.0\n");
    tree.write(
        "pkgsrc/devel/foo/distinfo",
        "$NetBSD$\n\nSHA1 (foo-1.0.tar.gz) = abcdabcdabcdabcdabcdabcdabcdabcdabcdabcd\n\
         Size (foo-1.0.tar.gz) = 6 bytes\n",
    );
    tree.write("pkgsrc/distfiles/foo-1.0.tar.gz", "hello\n");

    let reports = tree
        .query()
        .verify_distfiles("foo", "devel", ChecksumAlgorithm::Sha1)
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].file, "foo-1.0.tar.gz");
    assert_eq!(
        reports[0].status,
        DistfileStatus::Mismatch {
            expected: "abcdabcdabcdabcdabcdabcdabcdabcdabcdabcd".to_string(),
            computed: "f572d396fae9206628714fb2ce00f72e94f2258f".to_string(),
        }
    );
}

#[test]
fn test_check_outdated_end_to_end() {
    let tree = Tree::new();
    tree.write("pkgsrc/shells/zsh/Makefile", "DISTNAME=\tzsh-6.3\n");
    tree.write("pkgsrc/shells/tcsh/Makefile", "DISTNAME=\ttcsh-6.24.10\n");
    tree.write("pkgdb/zsh-6.2/+CONTENTS", "@name zsh-6.2\n");
    tree.write("pkgdb/tcsh-6.24.10/+CONTENTS", "@name tcsh-6.24.10\n");

    let query = tree.query();
    let outdated = query.check_outdated(false).unwrap();
    assert_eq!(outdated.len(), 1);
    assert_eq!(outdated[0].name, "zsh");
    assert_eq!(outdated[0].status, OutdatedStatus::Outdated);

    let all = query.check_outdated(true).unwrap();
    assert_eq!(all.len(), 2);
    assert!(all
        .iter()
        .any(|e| e.name == "tcsh" && e.status == OutdatedStatus::UpToDate));
}

#[test]
fn test_list_installed_with_bogus_sort_falls_back() {
    let tree = Tree::new();
    tree.write("pkgdb/zsh-5.9/+COMMENT", "The Z shell\n");
    tree.write("pkgdb/bash-5.2.15/+COMMENT", "The GNU Bourne Again Shell\n");
    tree.write("pkgdb/curl-8.4.0nb1/+COMMENT", "Client that groks URLs\n");

    let sort_by: SortKey = nbpkgquery::query::parse_or_default("bogus");
    let order: SortOrder = nbpkgquery::query::parse_or_default("sideways");
    let rows = tree.query().list_installed(sort_by, order).unwrap();

    let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["bash", "curl", "zsh"]);
    assert_eq!(rows[1].version, "8.4.0nb1");
}

#[test]
fn test_package_file_reconciled_with_database() {
    let tree = Tree::new();
    let contents = "@name py39-six-1.16.0\n@pkgdep python39>=3.9\n@cwd /usr/pkg\nlib/six.py\n";
    tree.write("pkgdb/py39-six-1.16.0/+CONTENTS", contents);
    tree.write("pkgdb/py39-six-1.16.0/+SIZE_PKG", "40960\n");
    tree.write("pkgdb/py39-six-1.16.0/+BUILD_INFO", "PKGPATH=lang/py-six\nOPSYS=NetBSD\n");

    let artifact = tree.path("py39-six-1.16.0.tgz");
    write_package_file(
        &artifact,
        &[
            ("+CONTENTS", contents),
            ("+COMMENT", "Python 2/3 compatibility library\n"),
            ("lib/six.py", "# six\n"),
        ],
    );

    let record = tree
        .query()
        .resolve(
            "py39-six",
            &LookupMode::Binary {
                artifact: Some(artifact),
            },
        )
        .unwrap();

    assert_eq!(record.comment.as_deref(), Some("Python 2/3 compatibility library"));
    assert_eq!(record.runtime_dependencies, vec!["python39"]);
    assert_eq!(record.size(), Some(40960));
    assert_eq!(record.origin(), Some("lang/py-six"));
    assert!(record.master_sites().is_empty());
    match &record.provenance {
        Provenance::Binary(details) => {
            assert!(details.installed);
            assert_eq!(details.installed_version.as_deref(), Some("1.16.0"));
        }
        Provenance::Source(_) => panic!("expected a binary record"),
    }
}

#[test]
fn test_standalone_package_file_is_valid() {
    let tree = Tree::new();
    let artifact = tree.path("nginx-1.25.3.tgz");
    write_package_file(&artifact, &[("+CONTENTS", "@name nginx-1.25.3\nsbin/nginx\n")]);

    let record = tree
        .query()
        .resolve(
            "nginx",
            &LookupMode::Binary {
                artifact: Some(artifact),
            },
        )
        .unwrap();
    assert_eq!(record.version, "1.25.3");
    match &record.provenance {
        Provenance::Binary(details) => assert!(!details.installed),
        Provenance::Source(_) => panic!("expected a binary record"),
    }
}

#[test]
fn test_verify_artifact_reports_missing_and_extra() {
    let tree = Tree::new();
    tree.write(
        "pkgdb/nginx-1.25.3/+CONTENTS",
        "@name nginx-1.25.3\nsbin/nginx\nshare/nginx/old.html\n",
    );
    let artifact = tree.path("nginx-1.25.3.tgz");
    write_package_file(
        &artifact,
        &[("+CONTENTS", "@name nginx-1.25.3\nsbin/nginx\nshare/nginx/index.html\n")],
    );

    let result = tree.query().verify_artifact(&artifact).unwrap();
    assert_eq!(result.missing, vec!["share/nginx/index.html"]);
    assert_eq!(result.extra, vec!["share/nginx/old.html"]);
}

#[test]
fn test_not_found_is_distinct_from_empty() {
    let tree = Tree::new();
    let query = tree.query();

    assert!(query.search_by_name("nothing", None).unwrap().is_empty());
    assert!(matches!(
        query.resolve("nothing", &LookupMode::Source),
        Err(Error::PackageNotFound(_))
    ));
}

#[test]
fn test_config_layers_feed_the_engine() {
    let tree = Tree::new();
    tree.write("mk.conf", "PKGSRCDIR=\t/nonexistent\nPKG_DBDIR?=\t/nonexistent/pkgdb\n");
    tree.write("pkgsrc/lang/py-six/Makefile", PY_SIX_MAKEFILE);

    let env: HashMap<&str, String> = HashMap::from([
        ("PKGSRCDIR", tree.path("pkgsrc").display().to_string()),
        ("PKG_DBDIR", tree.path("pkgdb").display().to_string()),
    ]);
    let config = Config::load_with(None, &[tree.path("mk.conf")], |key| env.get(key).cloned()).unwrap();
    assert_eq!(config.pkgsrc_dir, tree.path("pkgsrc"));

    let query = PkgQuery::new(config).unwrap();
    assert_eq!(query.search_by_name("six", None).unwrap().len(), 1);
}
