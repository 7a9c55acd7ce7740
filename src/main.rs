//! # pbuild CLI Entry Point
//!
//! Parses arguments with clap and hands off to the library:
//! - `build` - build every application of the project
//! - `clean` - prune old builds and archives
//! - `builds` - list build directories
//! - `completion` - shell completions

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::path::{Path, PathBuf};

use pbuild::build::{self, BuildSettings, Builder};
use pbuild::config::ProjectConfig;
use pbuild::project;
use pbuild::ui;

/// Exit status when at least one application failed to build.
const EXIT_BUILD_FAILED: i32 = 2;

#[cfg(windows)]
#[link(name = "kernel32")]
unsafe extern "system" {
    fn SetConsoleOutputCP(wCodePageID: u32) -> i32;
}

#[cfg(windows)]
fn enable_windows_utf8_console() {
    unsafe {
        SetConsoleOutputCP(65001);
    }
}

#[cfg(not(windows))]
fn enable_windows_utf8_console() {}

#[derive(Parser)]
#[command(name = "pbuild")]
#[command(about = "Local builds for web application projects", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project's applications into builds/
    Build {
        /// Project root (default: search upwards from the current directory)
        #[arg(long)]
        project: Option<PathBuf>,
        /// Environment ID used in the build name (default: the current branch)
        #[arg(long)]
        env: Option<String>,
        /// Use absolute links instead of relative ones
        #[arg(short = 'a', long = "abslinks")]
        absolute_links: bool,
        /// Do not remove old builds afterwards
        #[arg(long)]
        no_clean: bool,
        /// Do not use or save build archives
        #[arg(long)]
        no_archive: bool,
        /// Drush: clone projects with git instead of downloading them
        #[arg(long)]
        working_copy: bool,
        /// Drush: number of projects made at the same time
        #[arg(long)]
        concurrency: Option<u32>,
        /// Drush: disable the download cache
        #[arg(long)]
        no_cache: bool,
        /// Show tree IDs, commands and cleanup details
        #[arg(short, long)]
        verbose: bool,
    },
    /// Remove old builds and build archives
    Clean {
        #[arg(long)]
        project: Option<PathBuf>,
        /// Number of builds to keep
        #[arg(long)]
        keep: Option<usize>,
        /// Delete builds older than this many seconds
        #[arg(long)]
        ttl: Option<u64>,
        #[arg(short, long)]
        verbose: bool,
    },
    /// List build directories
    Builds {
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Generate shell completions
    Completion { shell: Shell },
}

fn main() {
    enable_windows_utf8_console();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_BUILD_FAILED),
        Err(e) => {
            eprintln!("{} {:#}", "x Error:".red(), e);
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Commands::Build {
            project,
            env,
            absolute_links,
            no_clean,
            no_archive,
            working_copy,
            concurrency,
            no_cache,
            verbose,
        } => {
            let root = locate_project(project.as_deref())?;
            let config = ProjectConfig::load(&root)?;

            let environment_id = match env {
                Some(env) => env.clone(),
                None => project::detect_environment_id(&root)?,
            };
            let mut settings = BuildSettings::new(environment_id);
            settings.verbose = *verbose;
            settings.no_clean = *no_clean || config.build.no_clean.unwrap_or(false);
            settings.no_archive = *no_archive || config.build.no_archive.unwrap_or(false);
            settings.absolute_links =
                *absolute_links || config.build.absolute_links.unwrap_or(false);
            if let Some(n) = concurrency.or(config.drush.concurrency) {
                settings.drush.concurrency = n;
            }
            settings.drush.working_copy =
                *working_copy || config.drush.working_copy.unwrap_or(false);
            settings.drush.no_cache = *no_cache || config.drush.no_cache.unwrap_or(false);

            println!(
                "{} Building {} for environment {}",
                "ℹ".blue(),
                root.display(),
                settings.environment_id.cyan()
            );
            let report = Builder::new(&settings).build_project(&root)?;
            Ok(report.success())
        }

        Commands::Clean {
            project,
            keep,
            ttl,
            verbose,
        } => {
            let root = locate_project(project.as_deref())?;
            let config = ProjectConfig::load(&root)?;
            let keep = keep
                .or(config.clean.keep)
                .unwrap_or(build::CLEAN_COMMAND_KEEP);
            let ttl = ttl.or(config.clean.ttl).unwrap_or(build::CLEAN_COMMAND_TTL);

            let builds = build::clean_builds(&root, ttl, keep, *verbose)?;
            if builds.deleted == 0 && builds.kept == 0 {
                println!("{} There are no builds to delete", "ℹ".blue());
            } else {
                println!(
                    "{} Deleted {} build(s), kept {}",
                    "✓".green(),
                    builds.deleted,
                    builds.kept
                );
            }

            let archives =
                build::clean_archives(&root, build::ARCHIVE_TTL, build::ARCHIVE_KEEP, *verbose)?;
            if archives.deleted > 0 {
                println!(
                    "{} Deleted {} archive(s), kept {}",
                    "✓".green(),
                    archives.deleted,
                    archives.kept
                );
            }
            Ok(true)
        }

        Commands::Builds { project } => {
            let root = locate_project(project.as_deref())?;
            ui::print_builds(&build::list_builds(&root)?);
            Ok(true)
        }

        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(true)
        }
    }
}

/// The explicit `--project`, or the nearest enclosing project.
fn locate_project(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let path = path
            .canonicalize()
            .with_context(|| format!("Project not found: {}", path.display()))?;
        if !project::repository_root(&path).is_dir() {
            anyhow::bail!("No repository/ directory in {}", path.display());
        }
        return Ok(path);
    }

    let cwd = std::env::current_dir()?;
    project::find_project_root(&cwd).with_context(|| {
        format!(
            "Not inside a project: no repository/ checkout above {}",
            cwd.display()
        )
    })
}
