use super::clean::{self, ARCHIVE_KEEP, ARCHIVE_TTL, BUILD_KEEP, BUILD_TTL, CleanResult};
use super::hooks::warn_about_hooks;
use super::settings::BuildSettings;
use crate::cache;
use crate::config::{self, APP_CONFIG_FILE};
use crate::filesystem::{Filesystem, FsError};
use crate::project;
use crate::shell::{CommandRunner, Shell};
use crate::toolchain::Registry;
use anyhow::{Result, bail};
use chrono::{Local, NaiveDateTime};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Directories never searched for applications.
const SKIP_DIRS: [&str; 2] = ["vendor", "node_modules"];

/// Step of an application build, for failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Config,
    Toolchain,
    Prepare,
    Build,
    Archive,
    Extract,
    Install,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Config => "config",
            Phase::Toolchain => "toolchain",
            Phase::Prepare => "prepare",
            Phase::Build => "build",
            Phase::Archive => "archive",
            Phase::Extract => "extract",
            Phase::Install => "install",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppOutcome {
    /// The toolchain built the application
    Built { archived: bool },
    /// The build directory was extracted from a saved archive
    Restored,
    /// No toolchain recognized the application
    Undetected,
    Failed { phase: Phase, message: String },
}

#[derive(Debug, Clone)]
pub struct AppReport {
    pub name: String,
    pub build_dir: PathBuf,
    pub outcome: AppOutcome,
}

impl AppReport {
    pub fn success(&self) -> bool {
        matches!(
            self.outcome,
            AppOutcome::Built { .. } | AppOutcome::Restored
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProjectReport {
    pub apps: Vec<AppReport>,
    pub builds_cleaned: Option<CleanResult>,
    pub archives_cleaned: Option<CleanResult>,
}

impl ProjectReport {
    /// True only when every application was built or restored.
    pub fn success(&self) -> bool {
        self.apps.iter().all(AppReport::success)
    }
}

/// Drives the builds of every application in a project.
pub struct Builder<'a> {
    settings: &'a BuildSettings,
    registry: Registry,
    files: Filesystem,
    /// Makes the command runner for archives and toolchain builds
    runner: Box<dyn Fn() -> Box<dyn CommandRunner>>,
}

impl<'a> Builder<'a> {
    pub fn new(settings: &'a BuildSettings) -> Self {
        Self::with_registry(settings, Registry::default())
    }

    pub fn with_registry(settings: &'a BuildSettings, registry: Registry) -> Self {
        let verbose = settings.verbose;
        Self {
            settings,
            registry,
            files: Filesystem::new(Box::new(Shell::new(verbose))),
            runner: Box::new(move || -> Box<dyn CommandRunner> { Box::new(Shell::new(verbose)) }),
        }
    }

    /// Run external tools through runners made by `runner` instead of the system shell.
    pub fn with_runner(mut self, runner: impl Fn() -> Box<dyn CommandRunner> + 'static) -> Self {
        self.files = Filesystem::new(runner());
        self.runner = Box::new(runner);
        self
    }

    /// Build all applications under `<project_root>/repository`.
    ///
    /// A missing repository is an error. Application failures are reported in
    /// the returned [`ProjectReport`] and never stop the other applications.
    pub fn build_project(&self, project_root: &Path) -> Result<ProjectReport> {
        let start_time = Instant::now();
        let repository = project::repository_root(project_root);
        if !repository.is_dir() {
            bail!("Repository not found: {}", repository.display());
        }

        let apps = applications(&repository)?;
        let name = build_name(
            Local::now().naive_local(),
            &self.settings.environment_id,
        );
        let build_root = project::builds_dir(project_root).join(&name);
        let multi = apps.len() > 1;

        let mut report = ProjectReport::default();
        for app_root in &apps {
            let build_dir = if multi {
                build_root.join(app_slug(&repository, app_root))
            } else {
                build_root.clone()
            };
            report
                .apps
                .push(self.build_app(app_root, project_root, &build_dir, !multi));
        }

        if !self.settings.no_clean {
            println!("{} Cleaning up...", "ℹ".blue());
            report.builds_cleaned = self.log_clean(
                "builds",
                clean::clean_builds(project_root, BUILD_TTL, BUILD_KEEP, self.settings.verbose),
            );
            report.archives_cleaned = self.log_clean(
                "archives",
                clean::clean_archives(
                    project_root,
                    ARCHIVE_TTL,
                    ARCHIVE_KEEP,
                    self.settings.verbose,
                ),
            );
        }

        if report.success() {
            println!(
                "{} Finished in {:.2}s",
                "✓".green(),
                start_time.elapsed().as_secs_f64()
            );
        } else {
            let failed = report.apps.iter().filter(|a| !a.success()).count();
            println!(
                "{} {} of {} application(s) failed to build",
                "x".red(),
                failed,
                report.apps.len()
            );
        }
        Ok(report)
    }

    fn log_clean(&self, what: &str, result: Result<CleanResult>) -> Option<CleanResult> {
        match result {
            Ok(r) => {
                if self.settings.verbose && r.deleted > 0 {
                    println!("   Deleted {} old {}", r.deleted, what);
                }
                Some(r)
            }
            Err(e) => {
                println!("{} Failed to clean {}: {:#}", "!".yellow(), what, e);
                None
            }
        }
    }

    /// Build one application into `build_dir`.
    ///
    /// With archives enabled, a saved archive for the application's tree ID
    /// replaces the build step. Install always runs.
    pub fn build_app(
        &self,
        app_root: &Path,
        project_root: &Path,
        build_dir: &Path,
        link_www: bool,
    ) -> AppReport {
        let mut report = AppReport {
            name: dir_name(app_root),
            build_dir: build_dir.to_path_buf(),
            outcome: AppOutcome::Undetected,
        };

        let app_config = match config::load_app_config(app_root) {
            Ok(c) => c,
            Err(e) => return report.fail(Phase::Config, e),
        };
        if let Some(name) = &app_config.name {
            report.name = name.clone();
        }

        let toolchain = match self.registry.resolve(app_root, &app_config) {
            Ok(Some(t)) => t,
            Ok(None) => {
                println!(
                    "{} Could not detect a toolchain for application {}",
                    "!".yellow(),
                    report.name.bold()
                );
                return report;
            }
            Err(e) => return report.fail(Phase::Toolchain, e.into()),
        };

        let staged = match toolchain.prepare(build_dir, app_root, project_root, self.settings) {
            Ok(s) => s.with_runner((self.runner)()),
            Err(e) => return report.fail(Phase::Prepare, e),
        };
        let staged = if link_www {
            staged
        } else {
            staged.without_www_link()
        };

        let tree_id = if self.settings.no_archive {
            None
        } else {
            match cache::compute_tree_id(app_root) {
                Ok(id) => {
                    if self.settings.verbose {
                        println!("   Tree ID: {}", id);
                    }
                    Some(id)
                }
                Err(reason) => {
                    if self.settings.verbose {
                        println!("   Not using build archives: {}", reason);
                    }
                    None
                }
            }
        };

        let archive = tree_id
            .as_ref()
            .and_then(|id| cache::find_archive(project_root, id));

        if let Some(archive) = archive {
            println!(
                "{} Extracting archive for application {}...",
                "ℹ".blue(),
                report.name.bold()
            );
            let pb = spinner("Extracting...");
            let extracted = self.files.extract_archive(&archive, build_dir);
            pb.finish_and_clear();
            if let Err(e) = extracted {
                return report.fail(Phase::Extract, e);
            }
            report.outcome = AppOutcome::Restored;
        } else {
            println!(
                "{} Building application {} using the toolchain {}",
                "ℹ".blue(),
                report.name.bold(),
                toolchain.key().cyan()
            );
            if let Err(e) = staged.build() {
                return report.fail(Phase::Build, e);
            }

            let mut archived = false;
            if let Some(id) = &tree_id {
                println!("{} Saving build archive...", "ℹ".blue());
                let pb = spinner("Archiving...");
                let saved = self
                    .files
                    .archive_dir(build_dir, &cache::archive_path(project_root, id));
                pb.finish_and_clear();
                match saved {
                    Ok(()) => archived = true,
                    Err(e) if matches!(e.downcast_ref::<FsError>(), Some(FsError::TarNotFound)) => {
                        return report.fail(Phase::Archive, e);
                    }
                    Err(e) => {
                        println!("{} Failed to save build archive: {:#}", "!".yellow(), e);
                    }
                }
            }
            report.outcome = AppOutcome::Built { archived };
        }

        if let Err(e) = staged.install() {
            return report.fail(Phase::Install, e);
        }

        warn_about_hooks(&app_config.hooks);

        println!(
            "{} Build complete for application {}",
            "✓".green(),
            report.name.bold()
        );
        if self.settings.verbose {
            println!("   Output: {}", build_dir.display());
        }
        report
    }
}

impl AppReport {
    fn fail(mut self, phase: Phase, error: anyhow::Error) -> Self {
        let message = format!("{:#}", error);
        println!(
            "{} Build failed for application {} during {}: {}",
            "x".red(),
            self.name.bold(),
            phase,
            message
        );
        self.outcome = AppOutcome::Failed { phase, message };
        self
    }
}

/// Find the applications in a repository checkout.
///
/// Every directory holding an application config is an application. Without
/// any, the repository root is the single application.
pub fn applications(repository: &Path) -> Result<Vec<PathBuf>> {
    let mut apps = Vec::new();
    let walker = WalkDir::new(repository)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.') && !SKIP_DIRS.contains(&&*name)
        });

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.file_name() == APP_CONFIG_FILE
            && let Some(dir) = entry.path().parent()
        {
            apps.push(dir.to_path_buf());
        }
    }

    if apps.is_empty() {
        apps.push(repository.to_path_buf());
    }
    Ok(apps)
}

/// `<YYYY-MM-DD--HH-MM-SS>--<environment>`, safe to use as a directory name.
pub fn build_name(now: NaiveDateTime, environment_id: &str) -> String {
    let env: String = environment_id
        .chars()
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect();
    format!("{}--{}", now.format("%Y-%m-%d--%H-%M-%S"), env)
}

fn app_slug(repository: &Path, app_root: &Path) -> String {
    let relative = app_root.strip_prefix(repository).unwrap_or(app_root);
    let slug = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "app".to_string()
    } else {
        slug
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("   {spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
