//! Retention of old builds and build archives.
//!
//! The same pass is used for `builds/` and `.build-archives/`:
//!
//! - hidden entries and blacklisted names are skipped (never deleted or counted)
//! - entries older than `ttl` seconds are deleted (`ttl == 0` disables this)
//! - once `keep_max` entries are kept, the rest are deleted (`keep_max == 0` disables this)
//!
//! Entries are visited newest first, so `keep_max` keeps the newest ones.

use crate::cache::ARCHIVE_DIR;
use crate::filesystem::Filesystem;
use crate::project;
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Builds older than a day are removed after each build.
pub const BUILD_TTL: u64 = 86_400;
pub const BUILD_KEEP: usize = 10;

/// Archives are cheaper to keep than whole build trees.
pub const ARCHIVE_TTL: u64 = 604_800;
pub const ARCHIVE_KEEP: usize = 10;

/// Defaults of the `clean` command.
pub const CLEAN_COMMAND_KEEP: usize = 5;
pub const CLEAN_COMMAND_TTL: u64 = 86_400;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanResult {
    pub deleted: usize,
    pub kept: usize,
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    path: PathBuf,
    modified: SystemTime,
}

/// Prune `directory`. A missing directory is `(0, 0)`, not an error.
pub fn clean_directory(
    directory: &Path,
    ttl: u64,
    keep_max: usize,
    blacklist: &[String],
    verbose: bool,
) -> Result<CleanResult> {
    let mut result = CleanResult::default();
    if !directory.is_dir() {
        return Ok(result);
    }

    let now = SystemTime::now();
    let files = Filesystem::default();

    for entry in sorted_entries(directory, blacklist)? {
        let age = now
            .duration_since(entry.modified)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        let expired = ttl != 0 && age > ttl;
        let over_limit = keep_max != 0 && result.kept >= keep_max;

        if expired || over_limit {
            if verbose {
                println!("   {} Deleting: {}", "🗑️".red(), entry.name);
            }
            if files.remove(&entry.path) {
                result.deleted += 1;
            } else {
                println!("   {} Failed to delete {}", "x".red(), entry.path.display());
            }
        } else {
            result.kept += 1;
        }
    }

    Ok(result)
}

/// Entries eligible for pruning, newest first (ties broken by name, descending).
fn sorted_entries(directory: &Path, blacklist: &[String]) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    let read = fs::read_dir(directory)
        .with_context(|| format!("Failed to read {}", directory.display()))?;

    for entry in read.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || blacklist.contains(&name) {
            continue;
        }
        let modified = entry
            .path()
            .symlink_metadata()
            .and_then(|m| m.modified())
            .unwrap_or_else(|_| SystemTime::now());
        entries.push(Entry {
            name,
            path: entry.path(),
            modified,
        });
    }

    entries.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| b.name.cmp(&a.name))
    });
    Ok(entries)
}

/// Remove old builds, sparing the one `www` points at.
pub fn clean_builds(
    project_root: &Path,
    ttl: u64,
    keep_max: usize,
    verbose: bool,
) -> Result<CleanResult> {
    let blacklist: Vec<String> = active_build(project_root).into_iter().collect();
    clean_directory(
        &project::builds_dir(project_root),
        ttl,
        keep_max,
        &blacklist,
        verbose,
    )
}

/// Remove old build archives.
pub fn clean_archives(
    project_root: &Path,
    ttl: u64,
    keep_max: usize,
    verbose: bool,
) -> Result<CleanResult> {
    clean_directory(&project_root.join(ARCHIVE_DIR), ttl, keep_max, &[], verbose)
}

/// Name of the build directory the `www` link currently points into.
pub fn active_build(project_root: &Path) -> Option<String> {
    let www = project::www_link(project_root);
    let meta = fs::symlink_metadata(&www).ok()?;
    if !meta.file_type().is_symlink() {
        return None;
    }
    let target = fs::read_link(&www).ok()?;
    let target = if target.is_relative() {
        project_root.join(target)
    } else {
        target
    };

    let builds = project::builds_dir(project_root);
    let first_component = |t: &Path, b: &Path| {
        t.strip_prefix(b)
            .ok()
            .and_then(|rel| rel.components().next())
            .map(|c| c.as_os_str().to_string_lossy().to_string())
    };

    first_component(&target, &builds)
        .or_else(|| {
            let t = target.canonicalize().ok()?;
            let b = builds.canonicalize().ok()?;
            first_component(&t, &b)
        })
        .or_else(|| target.file_name().map(|n| n.to_string_lossy().to_string()))
}

/// A build directory, for listings.
#[derive(Debug, Clone)]
pub struct BuildEntry {
    pub name: String,
    pub age: Duration,
    pub active: bool,
}

/// All builds, newest first.
pub fn list_builds(project_root: &Path) -> Result<Vec<BuildEntry>> {
    let dir = project::builds_dir(project_root);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let active = active_build(project_root);
    let now = SystemTime::now();
    Ok(sorted_entries(&dir, &[])?
        .into_iter()
        .map(|e| BuildEntry {
            active: active.as_deref() == Some(e.name.as_str()),
            age: now.duration_since(e.modified).unwrap_or(Duration::ZERO),
            name: e.name,
        })
        .collect())
}
