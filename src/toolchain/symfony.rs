//! Symfony applications: copy the source, then `composer install` in the build.

use super::BuildContext;
use crate::filesystem::Filesystem;
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

pub const KEY: &str = "php:symfony";

const FRAMEWORK_PACKAGES: [&str; 2] = ["symfony/symfony", "symfony/framework-bundle"];

/// A `composer.json` requiring the Symfony framework.
pub fn detect(app_root: &Path) -> bool {
    let Ok(content) = fs::read_to_string(app_root.join("composer.json")) else {
        return false;
    };
    let Ok(manifest) = serde_json::from_str::<serde_json::Value>(&content) else {
        return false;
    };
    manifest
        .get("require")
        .and_then(|r| r.as_object())
        .is_some_and(|require| FRAMEWORK_PACKAGES.iter().any(|p| require.contains_key(*p)))
}

pub fn build(ctx: &BuildContext, files: &Filesystem) -> Result<()> {
    files.copy_all(&ctx.app_root, &ctx.build_dir)?;

    let runner = files.runner();
    if !runner.command_exists("composer") {
        return Err(anyhow::anyhow!(
            "Composer is required to build a Symfony application but was not found."
        ));
    }

    println!("   {} Running composer install...", "📦".blue());
    let args = vec![
        "install".to_string(),
        "--no-progress".to_string(),
        "--no-interaction".to_string(),
        format!("--working-dir={}", ctx.build_dir.display()),
    ];
    runner
        .run_checked("composer", &args, Some(&ctx.build_dir))
        .context("composer install failed")?;
    Ok(())
}

pub fn install(_ctx: &BuildContext, _files: &Filesystem) -> Result<()> {
    Ok(())
}

/// `web/` (Symfony 2/3) or `public/` (Symfony 4+).
pub fn web_root(ctx: &BuildContext) -> PathBuf {
    ["web", "public"]
        .iter()
        .map(|d| ctx.build_dir.join(d))
        .find(|p| p.is_dir())
        .unwrap_or_else(|| ctx.build_dir.clone())
}
