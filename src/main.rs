// src/main.rs

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use nbpkgquery::checksum::ChecksumAlgorithm;
use nbpkgquery::packages::Provenance;
use nbpkgquery::query::{
    parse_or_default, DistfileStatus, OutdatedStatus, SearchHit, SortKey, SortOrder, TodoContent,
};
use nbpkgquery::{Config, LookupMode, PackageRecord, PkgQuery};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "nbpkgquery")]
#[command(author, version, about = "Query pkgsrc source trees and installed packages", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where to look a package up
#[derive(Args, Debug, Clone)]
struct LookupArgs {
    /// Use the installed-package database instead of the source tree
    #[arg(short, long)]
    binary: bool,

    /// Read metadata from a binary package file
    #[arg(short, long, value_name = "FILE")]
    artifact: Option<PathBuf>,
}

impl LookupArgs {
    fn mode(&self) -> LookupMode {
        if self.binary || self.artifact.is_some() {
            LookupMode::Binary {
                artifact: self.artifact.clone(),
            }
        } else {
            LookupMode::Source
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show everything known about a package
    Info {
        name: String,
        #[command(flatten)]
        lookup: LookupArgs,
    },
    /// Search the source tree by package name
    Search {
        pattern: String,
        /// Restrict the search to one category
        #[arg(short, long)]
        category: Option<String>,
        /// Only show installed packages
        #[arg(short, long)]
        installed: bool,
    },
    /// Search the source tree by maintainer
    Maintainer {
        identifier: String,
        /// Match the part before '@' only
        #[arg(short, long)]
        name: bool,
    },
    /// Show the long description of a source package
    Describe { name: String },
    /// List installed packages
    List {
        /// Sort by name, version or comment
        #[arg(short, long, default_value = "name")]
        sort_by: String,
        /// asc or desc
        #[arg(short, long, default_value = "asc")]
        order: String,
    },
    /// List the files of an installed package
    Files { name: String },
    /// List the files a package provides
    Provides {
        name: String,
        #[command(flatten)]
        lookup: LookupArgs,
    },
    /// Show the dependencies of a package
    Depends {
        name: String,
        #[command(flatten)]
        lookup: LookupArgs,
    },
    /// Show which installed packages require a package
    Rdepends { name: String },
    /// Show installation log entries for a package
    History { name: String },
    /// Compare a binary package file with its installed files
    Verify { artifact: PathBuf },
    /// Show installed packages that differ from the source tree
    Outdated {
        /// Include up-to-date packages
        #[arg(short, long)]
        all: bool,
    },
    /// Verify the distfiles of a package against its distinfo
    Distfiles {
        package: String,
        #[arg(short, long)]
        category: String,
        /// Checksum algorithm (sha1 or sha512)
        #[arg(long, default_value = "sha1")]
        algorithm: ChecksumAlgorithm,
    },
    /// List the local patches of a source package
    Patches {
        name: String,
        /// Only print the number of patches
        #[arg(long, conflicts_with = "details")]
        count: bool,
        /// Show size and first line of each patch
        #[arg(long)]
        details: bool,
    },
    /// Show the TODO files of the source tree
    Todo,
    /// Show the pkgsrc changelog of a year
    Changelog { year: i32 },
    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Print `value` as JSON, or through `text` otherwise
fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T)) -> nbpkgquery::Result<()> {
    if json {
        let rendered = serde_json::to_string_pretty(value)
            .map_err(|e| nbpkgquery::Error::PackageParsing(e.to_string()))?;
        println!("{}", rendered);
    } else {
        text(value);
    }
    Ok(())
}

fn print_lines(lines: &[String], empty: &str) {
    if lines.is_empty() {
        println!("{}", empty);
    }
    for line in lines {
        println!("{}", line);
    }
}

fn print_record(record: &PackageRecord) {
    println!("{} {}", record.name, record.version);
    if let Some(comment) = &record.comment {
        println!("  Comment: {}", comment);
    }
    if !record.categories.is_empty() {
        println!("  Categories: {}", record.categories.join(" "));
    }
    if let Some(maintainer) = &record.maintainer {
        println!("  Maintainer: {}", maintainer);
    }
    if let Some(homepage) = &record.homepage {
        println!("  Homepage: {}", homepage);
    }
    if let Some(license) = &record.license {
        println!("  License: {}", license);
    }
    match &record.provenance {
        Provenance::Source(src) => {
            println!("  Path: {}", src.pkgpath);
            for site in &src.master_sites {
                println!("  Master site: {}", site);
            }
        }
        Provenance::Binary(bin) => {
            if let Some(origin) = &bin.origin {
                println!("  Origin: {}", origin);
            }
            if let Some(size) = bin.size {
                println!("  Size: {} bytes", size);
            }
            match &bin.installed_version {
                Some(version) => println!("  Installed: {}", version),
                None => println!("  Installed: no"),
            }
        }
    }
    println!("  Files: {}", record.files.len());
    println!("  Dependencies: {}", record.dependencies.len());
    println!("  Man pages: {}", if record.has_man_pages { "yes" } else { "no" });
    if let Some(description) = &record.description {
        println!();
        println!("{}", description);
    }
}

fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No packages found.");
        return;
    }
    for hit in hits {
        println!(
            "{} ({}) {}",
            hit.path,
            hit.version,
            hit.comment.as_deref().unwrap_or("")
        );
    }
    println!("\nTotal: {} package(s)", hits.len());
}

fn run(cli: &Cli) -> nbpkgquery::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let query = PkgQuery::new(config)?;
    let json = cli.json;

    match &cli.command {
        Commands::Info { name, lookup } => {
            let record = query.resolve(name, &lookup.mode())?;
            emit(json, &record, print_record)
        }
        Commands::Search {
            pattern,
            category,
            installed,
        } => {
            let mut hits = query.search_by_name(pattern, category.as_deref())?;
            if *installed {
                hits = query.filter_installed(hits)?;
            }
            emit(json, &hits, |hits| print_hits(hits))
        }
        Commands::Maintainer { identifier, name } => {
            let hits = query.search_by_maintainer(identifier, !name)?;
            emit(json, &hits, |hits| {
                let lines: Vec<String> = hits
                    .iter()
                    .map(|h| format!("{} ({})", h.path, h.maintainer))
                    .collect();
                print_lines(&lines, "No packages found.");
            })
        }
        Commands::Describe { name } => {
            let descr = query.describe(name)?;
            emit(json, &descr, |d| {
                println!("{} [{}]\n", d.name, d.categories.join(" "));
                println!("{}", d.description);
            })
        }
        Commands::List { sort_by, order } => {
            let sort_by: SortKey = parse_or_default(sort_by);
            let order: SortOrder = parse_or_default(order);
            let rows = query.list_installed(sort_by, order)?;
            emit(json, &rows, |rows| {
                for row in rows {
                    match &row.error {
                        Some(e) => println!("{:<30} {:<16} error: {}", row.name, row.version, e),
                        None => println!("{:<30} {:<16} {}", row.name, row.version, row.comment),
                    }
                }
                println!("\nTotal: {} package(s)", rows.len());
            })
        }
        Commands::Files { name } => {
            let files = query.list_package_files(name)?;
            emit(json, &files, |f| print_lines(f, "No files recorded."))
        }
        Commands::Provides { name, lookup } => {
            let files = query.provides(name, &lookup.mode())?;
            emit(json, &files, |f| print_lines(f, "No files found."))
        }
        Commands::Depends { name, lookup } => {
            let deps = query.depends(name, &lookup.mode())?;
            emit(json, &deps, |d| {
                println!("Runtime: {}", d.runtime_dependencies.join(" "));
                println!("Build: {}", d.build_dependencies.join(" "));
            })
        }
        Commands::Rdepends { name } => {
            let required_by = query.reverse_dependencies(name)?;
            emit(json, &required_by, |r| print_lines(r, "Not required by any package."))
        }
        Commands::History { name } => {
            let lines = query.history(name)?;
            emit(json, &lines, |l| print_lines(l, "No history."))
        }
        Commands::Verify { artifact } => {
            let result = query.verify_artifact(artifact)?;
            emit(json, &result, |r| {
                if r.is_clean() {
                    println!("{}: all files match", r.name);
                    return;
                }
                for file in &r.missing {
                    println!("missing: {}", file);
                }
                for file in &r.extra {
                    println!("extra: {}", file);
                }
            })
        }
        Commands::Outdated { all } => {
            let entries = query.check_outdated(*all)?;
            emit(json, &entries, |entries| {
                if entries.is_empty() {
                    println!("All installed packages are up to date.");
                }
                for e in entries {
                    let status = match e.status {
                        OutdatedStatus::Outdated => "outdated",
                        OutdatedStatus::UpToDate => "up to date",
                    };
                    println!(
                        "{}/{}: {} -> {} ({})",
                        e.category, e.name, e.installed_version, e.source_version, status
                    );
                }
            })
        }
        Commands::Distfiles {
            package,
            category,
            algorithm,
        } => {
            let reports = query.verify_distfiles(package, category, *algorithm)?;
            emit(json, &reports, |reports| {
                if reports.is_empty() {
                    println!("No distfiles to verify.");
                }
                for r in reports {
                    match &r.status {
                        DistfileStatus::Valid => println!("{}: valid", r.file),
                        DistfileStatus::Mismatch { expected, computed } => println!(
                            "{}: mismatch (expected {}, computed {})",
                            r.file, expected, computed
                        ),
                        DistfileStatus::NotFound => println!("{}: not found", r.file),
                        DistfileStatus::Error { message } => println!("{}: {}", r.file, message),
                    }
                }
            })
        }
        Commands::Patches {
            name,
            count,
            details,
        } => {
            if *count {
                let count = query.count_patches(name)?;
                emit(json, &count, |c| println!("{}", c))
            } else if *details {
                let info = query.patch_info(name)?;
                emit(json, &info, |info| {
                    for p in info {
                        match (&p.error, p.size) {
                            (Some(e), _) => println!("{}: {}", p.name, e),
                            (None, size) => println!(
                                "{}: {} bytes, {}",
                                p.name,
                                size.unwrap_or(0),
                                p.first_line.as_deref().unwrap_or("")
                            ),
                        }
                    }
                })
            } else {
                let patches = query.list_patches(name)?;
                emit(json, &patches, |p| print_lines(p, "No patches."))
            }
        }
        Commands::Todo => {
            let todos = query.read_todo_files()?;
            emit(json, &todos, |todos| {
                for todo in todos {
                    println!("== {}", todo.file.display());
                    match &todo.content {
                        TodoContent::Missing => println!("(missing)"),
                        TodoContent::Empty => println!("(empty)"),
                        TodoContent::Lines { lines } => print_lines(lines, ""),
                        TodoContent::Unreadable { message } => println!("(unreadable: {})", message),
                    }
                }
            })
        }
        Commands::Changelog { year } => {
            let changelog = query.fetch_changelog(*year)?;
            info!("Changelog {} read from {:?}", year, changelog.source);
            emit(json, &changelog, |c| print_lines(&c.lines, "Empty changelog."))
        }
        Commands::Completions { .. } => Ok(()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    if let Commands::Completions { shell } = &cli.command {
        generate(*shell, &mut Cli::command(), "nbpkgquery", &mut io::stdout());
        return Ok(());
    }

    if let Err(e) = run(&cli) {
        if cli.json {
            println!("{}", serde_json::json!({ "error": e.to_string() }));
            std::process::exit(1);
        }
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_lookup_mode_from_flags() {
        let cli = Cli::try_parse_from(["nbpkgquery", "info", "bash", "--binary"]).unwrap();
        match cli.command {
            Commands::Info { lookup, .. } => {
                assert_eq!(lookup.mode(), LookupMode::Binary { artifact: None })
            }
            _ => panic!("expected info"),
        }

        let cli = Cli::try_parse_from(["nbpkgquery", "depends", "bash", "-a", "bash-5.2.tgz"]).unwrap();
        match cli.command {
            Commands::Depends { lookup, .. } => assert_eq!(
                lookup.mode(),
                LookupMode::Binary {
                    artifact: Some(PathBuf::from("bash-5.2.tgz"))
                }
            ),
            _ => panic!("expected depends"),
        }
    }

    #[test]
    fn test_distfiles_requires_category() {
        assert!(Cli::try_parse_from(["nbpkgquery", "distfiles", "py-six"]).is_err());

        let cli = Cli::try_parse_from([
            "nbpkgquery", "--json", "distfiles", "py-six", "-c", "lang", "--algorithm", "sha512",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Distfiles { algorithm, .. } => assert_eq!(algorithm, ChecksumAlgorithm::Sha512),
            _ => panic!("expected distfiles"),
        }
    }

    #[test]
    fn test_list_accepts_any_sort_string() {
        let cli = Cli::try_parse_from(["nbpkgquery", "list", "--sort-by", "bogus"]).unwrap();
        match cli.command {
            Commands::List { sort_by, .. } => {
                assert_eq!(parse_or_default::<SortKey>(&sort_by), SortKey::Name)
            }
            _ => panic!("expected list"),
        }
    }
}
