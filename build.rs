// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "/etc/rpmsolve/rpmsolve.toml";

fn build_cli() -> Command {
    Command::new("rpmsolve")
        .version(env!("CARGO_PKG_VERSION"))
        .author("rpmsolve contributors")
        .about("RPM dependency resolver")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .default_value(DEFAULT_CONFIG_PATH)
                .help("Configuration file"),
        )
        .arg(
            Arg::new("installed")
                .short('i')
                .long("installed")
                .value_name("PATH")
                .global(true)
                .help("Metadata file describing the installed packages (overrides the config)"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Verbose resolver logging"),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolve a transaction against the configured repositories")
                .arg(
                    Arg::new("install")
                        .long("install")
                        .value_name("PKG")
                        .action(ArgAction::Append)
                        .help("Package to install (name or full key)"),
                )
                .arg(
                    Arg::new("update")
                        .long("update")
                        .value_name("PKG")
                        .action(ArgAction::Append)
                        .help("Installed package to update"),
                )
                .arg(
                    Arg::new("remove")
                        .long("remove")
                        .value_name("PKG")
                        .action(ArgAction::Append)
                        .help("Installed package to remove"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the result as JSON"),
                ),
        )
        .subcommand(
            Command::new("scenario")
                .about("Run a self-contained scenario file and compare with its expectation")
                .arg(Arg::new("path").required(true).help("Path to the scenario (JSON)")),
        )
        .subcommand(
            Command::new("search")
                .about("Search available packages by name, summary, description or url")
                .arg(Arg::new("query").required(true)),
        )
        .subcommand(
            Command::new("info")
                .about("Show the dependencies of an available package")
                .arg(Arg::new("name").required(true).help("Package name or full key")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell to generate completions for"),
                ),
        )
}

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = env::var("CARGO_MANIFEST_DIR")
        .map_err(|e| io::Error::new(io::ErrorKind::NotFound, e))?;
    let man_dir = PathBuf::from(manifest_dir).join("man");
    fs::create_dir_all(&man_dir)?;

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer)?;

    fs::write(man_dir.join("rpmsolve.1"), buffer)?;
    Ok(())
}
