//! Tree-hash addressed build archives.
//!
//! A build is reusable when the application's files are in the same state as
//! when the build was made. That state is summarized by a tree ID:
//!
//! - the git tree listing of the application at `HEAD` (minus `.platform`)
//! - the path and content hash of every modified or untracked file
//! - the path of every uncommitted deletion
//!
//! Archives live at `<project>/.build-archives/<tree-id>.tar.gz`.

use crate::git::RepoInspector;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Directory (relative to the project root) holding build archives.
pub const ARCHIVE_DIR: &str = ".build-archives";

/// Configuration directory that never affects a build's tree ID.
pub const RESERVED_DIR: &str = ".platform";

/// Above this many changed files the tree ID is not computed.
pub const MAX_CHANGED_FILES: usize = 5000;

/// A fingerprint of an application's committed and uncommitted file state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeId(String);

impl TreeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TreeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a tree ID could not be computed. Never fatal: the build just skips the cache.
#[derive(Debug)]
pub enum Unavailable {
    /// git could not describe the directory (not a repository, no commits, ...)
    Inspector(String),
    /// More than [`MAX_CHANGED_FILES`] modified/untracked files
    TooManyFiles,
}

impl std::fmt::Display for Unavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unavailable::Inspector(msg) => write!(f, "{}", msg),
            Unavailable::TooManyFiles => write!(
                f,
                "more than {} modified or untracked files",
                MAX_CHANGED_FILES
            ),
        }
    }
}

/// Compute the tree ID of the application at `app_root`.
pub fn compute_tree_id(app_root: &Path) -> Result<TreeId, Unavailable> {
    compute_tree_id_bounded(app_root, MAX_CHANGED_FILES)
}

fn compute_tree_id_bounded(app_root: &Path, max_files: usize) -> Result<TreeId, Unavailable> {
    let inspect = |e: anyhow::Error| Unavailable::Inspector(format!("{:#}", e));

    let inspector = RepoInspector::open(app_root).map_err(inspect)?;
    let tree = inspector.list_tree("HEAD", app_root).map_err(inspect)?;

    let mut hashes = vec![sha256_hex(strip_reserved(&tree).as_bytes())];

    let changed = inspector
        .list_changed_files(app_root, RESERVED_DIR)
        .map_err(inspect)?;

    let scope = app_root
        .canonicalize()
        .map_err(|e| inspect(e.into()))?;

    let mut count = 0;
    for path in changed {
        let relative = path
            .strip_prefix(&scope)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        if path.is_file() {
            count += 1;
            if count > max_files {
                return Err(Unavailable::TooManyFiles);
            }
            hashes.push(hash_file(&relative, &path).map_err(inspect)?);
        } else if fs::symlink_metadata(&path).is_err() {
            hashes.push(sha256_hex(format!("deleted:{}", relative).as_bytes()));
        }
    }

    Ok(TreeId(sha256_hex(hashes.join(" ").as_bytes())))
}

/// Drop the reserved directory's entry from an `ls-tree` listing.
fn strip_reserved(listing: &str) -> String {
    listing
        .lines()
        .filter(|line| line.rsplit('\t').next() != Some(RESERVED_DIR))
        .map(|line| format!("{}\n", line))
        .collect()
}

/// Where the archive for `tree_id` lives (whether or not it exists yet).
pub fn archive_path(project_root: &Path, tree_id: &TreeId) -> PathBuf {
    project_root
        .join(ARCHIVE_DIR)
        .join(format!("{}.tar.gz", tree_id))
}

/// The archive for `tree_id`, if one has been saved.
pub fn find_archive(project_root: &Path, tree_id: &TreeId) -> Option<PathBuf> {
    let path = archive_path(project_root, tree_id);
    path.is_file().then_some(path)
}

/// Hash of `name`, a NUL byte, then the content of `path`.
fn hash_file(name: &str, path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .with_context(|| format!("Failed to open {} for hashing", path.display()))?;

    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    let mut buffer = [0u8; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testutil::{commit_all, init_repo};
    use tempfile::TempDir;

    fn app_with_commit() -> (TempDir, git2::Repository) {
        let tmp = TempDir::new().unwrap();
        let repo = init_repo(tmp.path());
        fs::write(tmp.path().join("index.php"), "<?php echo 1;").unwrap();
        fs::create_dir_all(tmp.path().join(".platform")).unwrap();
        fs::write(tmp.path().join(".platform").join("routes.yaml"), "a: b").unwrap();
        commit_all(&repo, "init");
        (tmp, repo)
    }

    #[test]
    fn test_tree_id_is_deterministic() {
        let (tmp, _repo) = app_with_commit();
        fs::write(tmp.path().join("untracked.txt"), "local").unwrap();
        let a = compute_tree_id(tmp.path()).unwrap();
        let b = compute_tree_id(tmp.path()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_untracked_content_changes_tree_id() {
        let (tmp, _repo) = app_with_commit();
        fs::write(tmp.path().join("notes.txt"), "one").unwrap();
        let before = compute_tree_id(tmp.path()).unwrap();
        fs::write(tmp.path().join("notes.txt"), "two").unwrap();
        let after = compute_tree_id(tmp.path()).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_tracked_file_changes_tree_id() {
        let (tmp, repo) = app_with_commit();
        let before = compute_tree_id(tmp.path()).unwrap();

        fs::write(tmp.path().join("extra.php"), "x").unwrap();
        commit_all(&repo, "add");
        let added = compute_tree_id(tmp.path()).unwrap();
        assert_ne!(before, added);

        fs::remove_file(tmp.path().join("extra.php")).unwrap();
        commit_all(&repo, "remove");
        let removed = compute_tree_id(tmp.path()).unwrap();
        assert_eq!(before, removed);
    }

    #[test]
    fn test_uncommitted_delete_changes_tree_id() {
        let (tmp, _repo) = app_with_commit();
        let before = compute_tree_id(tmp.path()).unwrap();
        fs::remove_file(tmp.path().join("index.php")).unwrap();
        let after = compute_tree_id(tmp.path()).unwrap();
        assert_ne!(before, after);
        assert_eq!(after, compute_tree_id(tmp.path()).unwrap());
    }

    #[test]
    fn test_staged_delete_changes_tree_id() {
        let (tmp, repo) = app_with_commit();
        fs::write(tmp.path().join("old.html"), "old").unwrap();
        commit_all(&repo, "add old");
        let before = compute_tree_id(tmp.path()).unwrap();

        let mut index = repo.index().unwrap();
        index.remove_path(Path::new("old.html")).unwrap();
        index.write().unwrap();
        fs::remove_file(tmp.path().join("old.html")).unwrap();
        assert_ne!(before, compute_tree_id(tmp.path()).unwrap());
    }

    #[test]
    fn test_untracked_rename_changes_tree_id() {
        let (tmp, _repo) = app_with_commit();
        fs::write(tmp.path().join("about.html"), "<p>us</p>").unwrap();
        let before = compute_tree_id(tmp.path()).unwrap();
        fs::rename(
            tmp.path().join("about.html"),
            tmp.path().join("contact.html"),
        )
        .unwrap();
        assert_ne!(before, compute_tree_id(tmp.path()).unwrap());
    }

    #[test]
    fn test_reserved_directory_is_ignored() {
        let (tmp, repo) = app_with_commit();
        let before = compute_tree_id(tmp.path()).unwrap();

        // Untracked change inside .platform
        fs::write(tmp.path().join(".platform").join("services.yaml"), "db").unwrap();
        assert_eq!(before, compute_tree_id(tmp.path()).unwrap());

        // Committed change inside .platform
        commit_all(&repo, "platform config");
        assert_eq!(before, compute_tree_id(tmp.path()).unwrap());
    }

    #[test]
    fn test_not_a_repository_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        if git2::Repository::discover(tmp.path()).is_ok() {
            return;
        }
        assert!(matches!(
            compute_tree_id(tmp.path()),
            Err(Unavailable::Inspector(_))
        ));
    }

    #[test]
    fn test_too_many_files_is_unavailable() {
        let (tmp, _repo) = app_with_commit();
        let dir = tmp.path().join("generated");
        fs::create_dir_all(&dir).unwrap();
        for i in 0..=MAX_CHANGED_FILES {
            fs::write(dir.join(format!("f{}.txt", i)), i.to_string()).unwrap();
        }
        assert!(matches!(
            compute_tree_id(tmp.path()),
            Err(Unavailable::TooManyFiles)
        ));
    }

    #[test]
    fn test_bound_allows_exactly_max_files() {
        let (tmp, _repo) = app_with_commit();
        for i in 0..3 {
            fs::write(tmp.path().join(format!("f{}.txt", i)), "x").unwrap();
        }
        assert!(compute_tree_id_bounded(tmp.path(), 3).is_ok());
        fs::write(tmp.path().join("f3.txt"), "x").unwrap();
        assert!(matches!(
            compute_tree_id_bounded(tmp.path(), 3),
            Err(Unavailable::TooManyFiles)
        ));
    }

    #[test]
    fn test_strip_reserved_only_drops_exact_name() {
        let listing = "040000 tree aaa\t.platform\n100644 blob bbb\tmy.platform\n";
        assert_eq!(strip_reserved(listing), "100644 blob bbb\tmy.platform\n");
    }

    #[test]
    fn test_archive_path_layout() {
        let id = TreeId("abc".to_string());
        let path = archive_path(Path::new("/proj"), &id);
        assert_eq!(path, PathBuf::from("/proj/.build-archives/abc.tar.gz"));
        assert!(find_archive(Path::new("/definitely/missing"), &id).is_none());
    }
}
