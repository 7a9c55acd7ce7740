//! Project layout.
//!
//! ```text
//! <project>/
//!   repository/             git checkout (input)
//!   builds/<ts>--<env>/     one directory per build
//!   .build-archives/        tree-ID addressed archives
//!   shared/                 files linked into every build
//!   www -> builds/...       the active build
//! ```

use crate::config::REPOSITORY_DIR;
use crate::git::RepoInspector;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const BUILDS_DIR: &str = "builds";
pub const SHARED_DIR: &str = "shared";
pub const WWW_LINK: &str = "www";

pub fn repository_root(project_root: &Path) -> PathBuf {
    project_root.join(REPOSITORY_DIR)
}

pub fn builds_dir(project_root: &Path) -> PathBuf {
    project_root.join(BUILDS_DIR)
}

pub fn shared_dir(project_root: &Path) -> PathBuf {
    project_root.join(SHARED_DIR)
}

pub fn www_link(project_root: &Path) -> PathBuf {
    project_root.join(WWW_LINK)
}

/// Walk up from `start` to the first directory containing a `repository/` checkout.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().ok()?;
    start
        .ancestors()
        .find(|dir| {
            let repo = dir.join(REPOSITORY_DIR);
            repo.is_dir() && repo.join(".git").exists()
        })
        .map(Path::to_path_buf)
}

/// The environment a local build is for: the checked-out branch of the repository.
pub fn detect_environment_id(project_root: &Path) -> Result<String> {
    let inspector = RepoInspector::open(&repository_root(project_root))?;
    inspector
        .current_branch()
        .context("Could not determine the current environment (detached HEAD?)")
}
