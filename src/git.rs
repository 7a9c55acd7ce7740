//! Read-only repository inspection.
//!
//! The build cache never hashes tracked files itself: it asks git for the
//! tree listing at a commit and for the list of files that differ from it.

use anyhow::{Context, Result};
use git2::{Repository, Status, StatusOptions};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub struct RepoInspector {
    repo: Repository,
    workdir: PathBuf,
}

impl RepoInspector {
    /// Open the repository containing `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .with_context(|| format!("Not a git repository: {}", path.display()))?;
        let workdir = repo
            .workdir()
            .context("Repository has no working directory")?
            .canonicalize()?;
        Ok(Self { repo, workdir })
    }

    /// The `ls-tree` style listing of `scope` at `reference`, one entry per line:
    /// `<mode> <type> <oid>\t<name>`.
    pub fn list_tree(&self, reference: &str, scope: &Path) -> Result<String> {
        let relative = self.relative_scope(scope)?;
        let root = self
            .repo
            .revparse_single(reference)
            .with_context(|| format!("Unknown revision: {}", reference))?
            .peel_to_tree()?;

        let tree = if relative.as_os_str().is_empty() {
            root
        } else {
            root.get_path(&relative)?
                .to_object(&self.repo)?
                .peel_to_tree()
                .with_context(|| format!("{} is not a directory at {}", relative.display(), reference))?
        };

        let mut listing = String::new();
        for entry in tree.iter() {
            let kind = entry.kind().map(|k| k.str()).unwrap_or("blob");
            writeln!(
                listing,
                "{:06o} {} {}\t{}",
                entry.filemode(),
                kind,
                entry.id(),
                entry.name().unwrap_or_default()
            )?;
        }
        Ok(listing)
    }

    /// Modified, deleted, staged and untracked files under `scope` (ignored files
    /// excluded), as absolute paths in git's path order. Deleted paths no longer exist.
    ///
    /// Anything with a path component named `exclude` below `scope` is left out.
    pub fn list_changed_files(&self, scope: &Path, exclude: &str) -> Result<Vec<PathBuf>> {
        let relative = self.relative_scope(scope)?;

        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .exclude_submodules(true)
            .sort_case_sensitively(true);
        if !relative.as_os_str().is_empty() {
            opts.pathspec(relative.to_string_lossy().replace('\\', "/"));
        }

        let wanted = Status::WT_NEW
            | Status::WT_MODIFIED
            | Status::WT_DELETED
            | Status::WT_TYPECHANGE
            | Status::WT_RENAMED
            | Status::INDEX_NEW
            | Status::INDEX_MODIFIED
            | Status::INDEX_DELETED
            | Status::INDEX_TYPECHANGE
            | Status::INDEX_RENAMED;

        let statuses = self.repo.statuses(Some(&mut opts))?;
        let mut files = Vec::new();
        for entry in statuses.iter() {
            if !entry.status().intersects(wanted) {
                continue;
            }
            let Some(path) = entry.path() else {
                continue;
            };
            let path = Path::new(path);
            let below_scope = path.strip_prefix(&relative).unwrap_or(path);
            if below_scope.components().any(|c| c.as_os_str() == exclude) {
                continue;
            }
            files.push(self.workdir.join(path));
        }
        Ok(files)
    }

    /// Short name of the checked-out branch, if HEAD points at one.
    pub fn current_branch(&self) -> Option<String> {
        let head = self.repo.head().ok()?;
        if !head.is_branch() {
            return None;
        }
        head.shorthand().map(String::from)
    }

    fn relative_scope(&self, scope: &Path) -> Result<PathBuf> {
        let scope = scope
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", scope.display()))?;
        let relative = scope.strip_prefix(&self.workdir).with_context(|| {
            format!(
                "{} is outside the repository {}",
                scope.display(),
                self.workdir.display()
            )
        })?;
        Ok(relative.to_path_buf())
    }
}
