//! Drupal sites.
//!
//! With a `project.make` file the site is assembled by `drush make`. Without
//! one, the repository already holds a full Drupal tree and the build mirrors
//! it with symlinks. `sites/default` is always a real directory in the build
//! so shared files can be linked into it without touching the repository.

use super::BuildContext;
use crate::filesystem::Filesystem;
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::Path;

pub const KEY: &str = "php:drupal";

const MAKE_FILE: &str = "project.make";

/// Never mirrored into a vanilla build.
const BLACKLIST: [&str; 3] = ["*.make", ".platform", ".platform.app.yaml"];

pub fn detect(app_root: &Path) -> bool {
    has_make_file(app_root)
        || app_root.join("includes").join("bootstrap.inc").exists()
        || app_root
            .join("core")
            .join("includes")
            .join("bootstrap.inc")
            .exists()
}

fn has_make_file(app_root: &Path) -> bool {
    let pattern = format!(
        "{}/*.make",
        glob::Pattern::escape(&app_root.to_string_lossy())
    );
    glob::glob(&pattern)
        .map(|mut paths| paths.any(|p| p.is_ok()))
        .unwrap_or(false)
}

pub fn build(ctx: &BuildContext, files: &Filesystem) -> Result<()> {
    let make_file = ctx.app_root.join(MAKE_FILE);
    if make_file.exists() {
        build_make(ctx, files, &make_file)
    } else {
        build_vanilla(ctx, files)
    }
}

fn build_make(ctx: &BuildContext, files: &Filesystem, make_file: &Path) -> Result<()> {
    let runner = files.runner();
    if !runner.command_exists("drush") {
        return Err(anyhow::anyhow!(
            "Drush is required to build {} but was not found.\n\n\
            💡 Tip: install drush, or commit a full Drupal tree instead of a make file.",
            make_file.display()
        ));
    }

    let drush = &ctx.settings.drush;
    let mut args = vec![
        "make".to_string(),
        "--yes".to_string(),
        format!("--concurrency={}", drush.concurrency),
    ];
    if drush.working_copy {
        args.push("--working-copy".to_string());
    }
    if drush.no_cache {
        args.push("--no-cache".to_string());
    }
    args.push(make_file.to_string_lossy().to_string());
    args.push(ctx.build_dir.to_string_lossy().to_string());

    println!("   {} Running drush make...", "📦".blue());
    runner
        .run_checked("drush", &args, Some(&ctx.app_root))
        .context("drush make failed")?;
    Ok(())
}

fn build_vanilla(ctx: &BuildContext, files: &Filesystem) -> Result<()> {
    let sites = ctx.app_root.join("sites");
    let default = sites.join("default");

    if !default.is_dir() {
        return files.symlink_all(&ctx.app_root, &ctx.build_dir, true, &BLACKLIST);
    }

    let mut top_blacklist = BLACKLIST.to_vec();
    top_blacklist.push("sites");
    files.symlink_all(&ctx.app_root, &ctx.build_dir, true, &top_blacklist)?;

    let build_sites = ctx.build_dir.join("sites");
    files.symlink_all(&sites, &build_sites, true, &["default"])?;
    files.symlink_all(
        &default,
        &build_sites.join("default"),
        true,
        &["files", "settings.local.php"],
    )
}

/// Link shared files and local settings into `sites/default`.
pub fn install(ctx: &BuildContext, files: &Filesystem) -> Result<()> {
    let shared = ctx.shared_dir();
    let shared_files = shared.join("files");
    fs::create_dir_all(&shared_files)
        .with_context(|| format!("Failed to create {}", shared_files.display()))?;

    let sites_default = ctx.build_dir.join("sites").join("default");
    if !sites_default.is_dir() {
        return Ok(());
    }

    files.symlink(&shared_files, &sites_default.join("files"))?;

    let local_settings = shared.join("settings.local.php");
    if local_settings.exists() {
        files.symlink(&local_settings, &sites_default.join("settings.local.php"))?;
    }
    Ok(())
}
