// src/main.rs

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use rpmsolve::config::{Config, DEFAULT_CONFIG_PATH};
use rpmsolve::packages::PackageRef;
use rpmsolve::repository::{self, MemoryRepo, PackageIter, RepoSet, Repository};
use rpmsolve::scenario::{self, Report, Scenario};
use rpmsolve::transaction::{Resolution, Resolver};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "rpmsolve")]
#[command(author, version, about = "RPM dependency resolver", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Metadata file describing the installed packages (overrides the config)
    #[arg(short, long, global = true)]
    installed: Option<PathBuf>,

    /// Verbose resolver logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a transaction against the configured repositories
    Resolve {
        /// Package to install (name or full key)
        #[arg(long = "install", value_name = "PKG")]
        install: Vec<String>,
        /// Installed package to update
        #[arg(long = "update", value_name = "PKG")]
        update: Vec<String>,
        /// Installed package to remove
        #[arg(long = "remove", value_name = "PKG")]
        remove: Vec<String>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a self-contained scenario file and compare with its expectation
    Scenario {
        /// Path to the scenario (JSON)
        path: PathBuf,
    },
    /// Search available packages by name, summary, description or url
    Search {
        query: String,
    },
    /// Show the dependencies of an available package
    Info {
        /// Package name or full key
        name: String,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Load the configuration, falling back to defaults when the file is absent
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!("No configuration at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let config = Config::load(path)
        .with_context(|| format!("Failed to load configuration {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn open_installed(path: Option<&Path>) -> Result<Box<dyn Repository>> {
    match path {
        Some(path) => repository::open_path("installed", path)
            .with_context(|| format!("Failed to open installed packages {}", path.display())),
        None => {
            warn!("No installed package list configured, assuming an empty system");
            Ok(Box::new(MemoryRepo::new("installed", "Installed")))
        }
    }
}

fn lookup(packages: PackageIter<'_>, target: &str, source: &str) -> Result<PackageRef> {
    scenario::find_package(packages, target)
        .ok_or_else(|| anyhow::anyhow!("No package {} among {} packages", target, source))
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    init_logging(cli.debug || config.main.debug);

    match cli.command {
        Commands::Resolve {
            install,
            update,
            remove,
            json,
        } => {
            let installed_path = cli.installed.as_deref().or(config.main.installed.as_deref());
            let installed = open_installed(installed_path)?;
            let repos = RepoSet::from_config(&config)?;

            let mut resolver = Resolver::new(installed.as_ref(), &repos)
                .with_config(&config.main)
                .with_progress(|progress| debug!("Resolver progress: {:?}", progress));

            for target in &install {
                let pkg = lookup(repos.list_all()?, target, "available")?;
                if !resolver.add_install(pkg)? {
                    info!("{} is already part of the transaction", target);
                }
            }
            for target in &update {
                let pkg = lookup(installed.list_all()?, target, "installed")?;
                if !resolver.add_update(pkg)? {
                    info!("No update available for {}", target);
                }
            }
            for target in &remove {
                let pkg = lookup(installed.list_all()?, target, "installed")?;
                resolver.add_remove(pkg)?;
            }

            let resolution = resolver.resolve()?;
            let report = Report::new(resolution, resolver.transaction());

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render());
            }

            Ok(match resolution {
                Resolution::Ok => ExitCode::SUCCESS,
                Resolution::Unresolved => ExitCode::FAILURE,
            })
        }
        Commands::Scenario { path } => {
            info!("Running scenario {}", path.display());
            let scenario = Scenario::load(&path)
                .with_context(|| format!("Failed to load scenario {}", path.display()))?;
            let report = scenario.run()?;
            print!("{}", report.render());

            let mismatches = scenario.check(&report);
            if mismatches.is_empty() {
                return Ok(ExitCode::SUCCESS);
            }

            for mismatch in &mismatches {
                eprintln!("mismatch: {}", mismatch);
            }
            Ok(ExitCode::FAILURE)
        }
        Commands::Search { query } => {
            let repos = RepoSet::from_config(&config)?;
            let mut found = 0;

            for pkg in repos.search_details(&query)? {
                found += 1;
                println!(
                    "{} [{}] {}",
                    pkg.key(),
                    pkg.repo_id,
                    pkg.summary.as_deref().unwrap_or("")
                );
            }

            if found == 0 {
                println!("No packages matching '{}'", query);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Info { name } => {
            let repos = RepoSet::from_config(&config)?;
            let pkg = lookup(repos.list_all()?, &name, "available")?;

            println!("Package: {}", pkg.key());
            println!("Repository: {}", pkg.repo_id);
            if let Some(summary) = &pkg.summary {
                println!("Summary: {}", summary);
            }
            if let Some(license) = &pkg.license {
                println!("License: {}", license);
            }
            if let Some(url) = &pkg.url {
                println!("URL: {}", url);
            }

            let sections = [
                ("Provides", pkg.provides()?),
                ("Requires", pkg.requires()?),
                ("Conflicts", pkg.conflicts()?),
                ("Obsoletes", pkg.obsoletes()?),
            ];
            for (title, deps) in sections {
                if deps.is_empty() {
                    continue;
                }
                println!("{}:", title);
                for dep in deps {
                    println!("  {}", dep);
                }
            }

            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "rpmsolve", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}
