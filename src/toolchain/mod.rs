//! Toolchain detection and dispatch
//!
//! A toolchain knows how to detect, build and install one kind of
//! application. The set of toolchains is closed; the [`Registry`] holds them
//! in priority order and the first match wins, so more specific detectors
//! must come before more general ones.

pub mod drupal;
pub mod static_site;
pub mod symfony;
pub mod types;

pub use types::{BuildContext, ToolchainError};

use crate::build::BuildSettings;
use crate::config::AppConfig;
use crate::filesystem::Filesystem;
use crate::project;
use crate::shell::{CommandRunner, Shell};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Supported toolchains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toolchain {
    /// Drupal sites, built with drush make or mirrored from the repository
    Drupal,
    /// Symfony applications, built with composer
    Symfony,
    /// Plain HTML/PHP documents, copied as-is
    Static,
}

impl Toolchain {
    /// Default detection order.
    pub const ALL: [Toolchain; 3] = [Toolchain::Drupal, Toolchain::Symfony, Toolchain::Static];

    pub fn key(&self) -> &'static str {
        match self {
            Toolchain::Drupal => drupal::KEY,
            Toolchain::Symfony => symfony::KEY,
            Toolchain::Static => static_site::KEY,
        }
    }

    pub fn detect(&self, app_root: &Path) -> bool {
        match self {
            Toolchain::Drupal => drupal::detect(app_root),
            Toolchain::Symfony => symfony::detect(app_root),
            Toolchain::Static => static_site::detect(app_root),
        }
    }

    /// Stage a build of `app_root` into `build_dir`.
    ///
    /// Nothing is copied yet; this sets up link mode and the directories the
    /// build and install steps write into.
    pub fn prepare<'a>(
        &self,
        build_dir: &Path,
        app_root: &Path,
        project_root: &Path,
        settings: &'a BuildSettings,
    ) -> Result<StagedBuild<'a>> {
        let ctx = BuildContext {
            build_dir: build_dir.to_path_buf(),
            app_root: app_root.to_path_buf(),
            project_root: project_root.to_path_buf(),
            settings,
            link_www: true,
        };

        if let Some(parent) = build_dir.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::create_dir_all(ctx.shared_dir())
            .with_context(|| format!("Failed to create {}", ctx.shared_dir().display()))?;

        let mut files = Filesystem::new(Box::new(Shell::new(settings.verbose)));
        files.set_relative_links(!settings.absolute_links);

        Ok(StagedBuild {
            toolchain: *self,
            ctx,
            files,
        })
    }
}

impl std::fmt::Display for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// One application build, between `prepare` and `install`.
pub struct StagedBuild<'a> {
    toolchain: Toolchain,
    ctx: BuildContext<'a>,
    files: Filesystem,
}

impl<'a> StagedBuild<'a> {
    /// Leave `<project>/www` alone (multi-application projects).
    pub fn without_www_link(mut self) -> Self {
        self.ctx.link_www = false;
        self
    }

    /// Run external tools through `runner` instead of the system shell.
    pub fn with_runner(mut self, runner: Box<dyn CommandRunner>) -> Self {
        let relative = self.files.relative_links();
        self.files = Filesystem::new(runner);
        self.files.set_relative_links(relative);
        self
    }

    /// Produce the build output in the build directory.
    pub fn build(&self) -> Result<()> {
        match self.toolchain {
            Toolchain::Drupal => drupal::build(&self.ctx, &self.files),
            Toolchain::Symfony => symfony::build(&self.ctx, &self.files),
            Toolchain::Static => static_site::build(&self.ctx, &self.files),
        }
    }

    /// Finalize a build, whether it was built or restored from an archive.
    pub fn install(&self) -> Result<()> {
        match self.toolchain {
            Toolchain::Drupal => drupal::install(&self.ctx, &self.files)?,
            Toolchain::Symfony => symfony::install(&self.ctx, &self.files)?,
            Toolchain::Static => static_site::install(&self.ctx, &self.files)?,
        }

        if self.ctx.link_www {
            let www = project::www_link(&self.ctx.project_root);
            self.files
                .symlink(&self.web_root(), &www)
                .with_context(|| format!("Failed to link {}", www.display()))?;
        }
        Ok(())
    }

    /// The directory served as the document root.
    pub fn web_root(&self) -> PathBuf {
        match self.toolchain {
            Toolchain::Symfony => symfony::web_root(&self.ctx),
            Toolchain::Drupal | Toolchain::Static => self.ctx.build_dir.clone(),
        }
    }
}

/// Ordered list of toolchains, first match wins.
#[derive(Debug, Clone)]
pub struct Registry {
    toolchains: Vec<Toolchain>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Toolchain::ALL.to_vec())
    }
}

impl Registry {
    pub fn new(toolchains: Vec<Toolchain>) -> Self {
        Self { toolchains }
    }

    pub fn find(&self, key: &str) -> Option<Toolchain> {
        self.toolchains.iter().copied().find(|t| t.key() == key)
    }

    /// Pick the toolchain for an application.
    ///
    /// An explicit `toolstack` key must exist (no fallback to detection).
    /// Otherwise `Ok(None)` means nothing detected the application.
    pub fn resolve(
        &self,
        app_root: &Path,
        config: &AppConfig,
    ) -> Result<Option<Toolchain>, ToolchainError> {
        if let Some(key) = &config.toolstack {
            return self
                .find(key)
                .map(Some)
                .ok_or_else(|| ToolchainError::NotFound(key.clone()));
        }
        Ok(self.toolchains.iter().copied().find(|t| t.detect(app_root)))
    }
}
