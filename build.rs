// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn lookup_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("binary")
            .short('b')
            .long("binary")
            .action(ArgAction::SetTrue)
            .help("Use the installed-package database instead of the source tree"),
    )
    .arg(
        Arg::new("artifact")
            .short('a')
            .long("artifact")
            .value_name("FILE")
            .help("Read metadata from a binary package file"),
    )
}

fn build_cli() -> Command {
    Command::new("nbpkgquery")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Query pkgsrc source trees and installed packages")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Configuration file (TOML)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print results as JSON"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(lookup_args(
            Command::new("info")
                .about("Show everything known about a package")
                .arg(Arg::new("name").required(true)),
        ))
        .subcommand(
            Command::new("search")
                .about("Search the source tree by package name")
                .arg(Arg::new("pattern").required(true))
                .arg(
                    Arg::new("category")
                        .short('c')
                        .long("category")
                        .help("Restrict the search to one category"),
                )
                .arg(
                    Arg::new("installed")
                        .short('i')
                        .long("installed")
                        .action(ArgAction::SetTrue)
                        .help("Only show installed packages"),
                ),
        )
        .subcommand(
            Command::new("maintainer")
                .about("Search the source tree by maintainer")
                .arg(Arg::new("identifier").required(true))
                .arg(
                    Arg::new("name")
                        .short('n')
                        .long("name")
                        .action(ArgAction::SetTrue)
                        .help("Match the part before '@' only"),
                ),
        )
        .subcommand(
            Command::new("describe")
                .about("Show the long description of a source package")
                .arg(Arg::new("name").required(true)),
        )
        .subcommand(
            Command::new("list")
                .about("List installed packages")
                .arg(
                    Arg::new("sort_by")
                        .short('s')
                        .long("sort-by")
                        .default_value("name")
                        .help("Sort by name, version or comment"),
                )
                .arg(
                    Arg::new("order")
                        .short('o')
                        .long("order")
                        .default_value("asc")
                        .help("asc or desc"),
                ),
        )
        .subcommand(
            Command::new("files")
                .about("List the files of an installed package")
                .arg(Arg::new("name").required(true)),
        )
        .subcommand(lookup_args(
            Command::new("provides")
                .about("List the files a package provides")
                .arg(Arg::new("name").required(true)),
        ))
        .subcommand(lookup_args(
            Command::new("depends")
                .about("Show the dependencies of a package")
                .arg(Arg::new("name").required(true)),
        ))
        .subcommand(
            Command::new("rdepends")
                .about("Show which installed packages require a package")
                .arg(Arg::new("name").required(true)),
        )
        .subcommand(
            Command::new("history")
                .about("Show installation log entries for a package")
                .arg(Arg::new("name").required(true)),
        )
        .subcommand(
            Command::new("verify")
                .about("Compare a binary package file with its installed files")
                .arg(Arg::new("artifact").required(true)),
        )
        .subcommand(
            Command::new("outdated")
                .about("Show installed packages that differ from the source tree")
                .arg(
                    Arg::new("all")
                        .short('a')
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .help("Include up-to-date packages"),
                ),
        )
        .subcommand(
            Command::new("distfiles")
                .about("Verify the distfiles of a package against its distinfo")
                .arg(Arg::new("package").required(true))
                .arg(Arg::new("category").short('c').long("category").required(true))
                .arg(
                    Arg::new("algorithm")
                        .long("algorithm")
                        .default_value("sha1")
                        .help("Checksum algorithm (sha1 or sha512)"),
                ),
        )
        .subcommand(
            Command::new("patches")
                .about("List the local patches of a source package")
                .arg(Arg::new("name").required(true))
                .arg(
                    Arg::new("count")
                        .long("count")
                        .action(ArgAction::SetTrue)
                        .help("Only print the number of patches"),
                )
                .arg(
                    Arg::new("details")
                        .long("details")
                        .action(ArgAction::SetTrue)
                        .help("Show size and first line of each patch"),
                ),
        )
        .subcommand(Command::new("todo").about("Show the TODO files of the source tree"))
        .subcommand(
            Command::new("changelog")
                .about("Show the pkgsrc changelog of a year")
                .arg(Arg::new("year").required(true)),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("nbpkgquery.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
