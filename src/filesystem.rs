//! Filesystem operations shared by the build engine and the toolchains.
//!
//! - Removal that reports failure as `false` instead of aborting
//! - Recursive copy (skipping `.git`)
//! - Symlink mirroring of a directory with glob blacklists
//! - Relative/absolute link targets
//! - gzipped tar archives through the system `tar`

use crate::shell::{CommandRunner, Shell};
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Candidate archive binaries, probed in order.
const TAR_CANDIDATES: [&str; 3] = ["tar", "tar.exe", "bsdtar.exe"];

/// Entries never copied or linked.
const ALWAYS_SKIP: [&str; 1] = [".git"];

/// Error type for filesystem operations callers may want to branch on
#[derive(Debug)]
pub enum FsError {
    /// None of the tar candidates could be launched
    TarNotFound,
    NotADirectory(PathBuf),
    ArchiveNotFound(PathBuf),
    DestinationNotWritable(PathBuf),
    /// A regular file is in the way of a link
    FileExists(PathBuf),
    IoError(std::io::Error),
}

impl std::fmt::Display for FsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FsError::TarNotFound => write!(f, "Tar command not found"),
            FsError::NotADirectory(p) => write!(f, "Not a directory: {}", p.display()),
            FsError::ArchiveNotFound(p) => write!(f, "Archive not found: {}", p.display()),
            FsError::DestinationNotWritable(p) => {
                write!(f, "Destination not writable: {}", p.display())
            }
            FsError::FileExists(p) => write!(f, "File exists: {}", p.display()),
            FsError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for FsError {}

impl From<std::io::Error> for FsError {
    fn from(e: std::io::Error) -> Self {
        FsError::IoError(e)
    }
}

pub struct Filesystem {
    relative_links: bool,
    copy_if_symlink_unavailable: bool,
    runner: Box<dyn CommandRunner>,
}

impl Default for Filesystem {
    fn default() -> Self {
        Self::new(Box::new(Shell::default()))
    }
}

impl Filesystem {
    pub fn new(runner: Box<dyn CommandRunner>) -> Self {
        Self {
            relative_links: false,
            copy_if_symlink_unavailable: true,
            runner,
        }
    }

    /// Use relative link targets. Ignored on Windows.
    pub fn set_relative_links(&mut self, relative: bool) {
        self.relative_links = relative && !cfg!(windows);
    }

    pub fn relative_links(&self) -> bool {
        self.relative_links
    }

    /// Copy files when a link cannot be created (on by default).
    pub fn set_copy_if_symlink_unavailable(&mut self, copy: bool) {
        self.copy_if_symlink_unavailable = copy;
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// Delete a file, link or directory tree. A missing path counts as removed.
    pub fn remove(&self, path: &Path) -> bool {
        let meta = match fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(e) => return e.kind() == std::io::ErrorKind::NotFound,
        };
        let result = if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            remove_link_or_file(path)
        };
        result.is_ok()
    }

    /// Delete a directory and everything in it.
    pub fn rmdir(&self, dir: &Path) -> Result<bool> {
        if !dir.is_dir() {
            return Err(FsError::NotADirectory(dir.to_path_buf()).into());
        }
        Ok(self.remove(dir))
    }

    /// The current user's home directory.
    pub fn home_directory() -> Option<PathBuf> {
        dirs::home_dir()
    }

    /// Copy every file and folder from `source` into `destination`, skipping `.git`.
    pub fn copy_all(&self, source: &Path, destination: &Path) -> Result<()> {
        if !source.is_dir() {
            return Err(FsError::NotADirectory(source.to_path_buf()).into());
        }
        fs::create_dir_all(destination)
            .with_context(|| format!("Failed to create {}", destination.display()))?;

        let walker = WalkDir::new(source)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !ALWAYS_SKIP.iter().any(|s| e.file_name() == *s));

        for entry in walker {
            let entry = entry?;
            let relative = entry.path().strip_prefix(source)?;
            let target = destination.join(relative);
            let ft = entry.file_type();

            if ft.is_dir() {
                fs::create_dir_all(&target)?;
            } else if ft.is_symlink() {
                let link_target = fs::read_link(entry.path())?;
                if fs::symlink_metadata(&target).is_ok() {
                    remove_link_or_file(&target)?;
                }
                create_link(&link_target, &target)
                    .with_context(|| format!("Failed to link {}", target.display()))?;
            } else {
                fs::copy(entry.path(), &target).with_context(|| {
                    format!(
                        "Failed to copy {} to {}",
                        entry.path().display(),
                        target.display()
                    )
                })?;
            }
        }
        Ok(())
    }

    /// Create (or replace) `link` pointing at `target`.
    pub fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        if fs::symlink_metadata(link).is_ok() && !self.remove(link) {
            return Err(anyhow::anyhow!("Failed to replace {}", link.display()));
        }
        let link_target = if self.relative_links {
            make_path_relative(target, link)
        } else {
            target.to_path_buf()
        };
        self.link_or_copy(target, &link_target, link)
    }

    /// Symlink every top-level entry of `source` into `destination`.
    ///
    /// `.git` and anything matching a `blacklist` glob (relative to `source`)
    /// is skipped. Existing links are replaced; an existing regular file is
    /// left alone when `skip_existing`, otherwise it is an error.
    pub fn symlink_all(
        &self,
        source: &Path,
        destination: &Path,
        skip_existing: bool,
        blacklist: &[&str],
    ) -> Result<()> {
        fs::create_dir_all(destination)
            .with_context(|| format!("Failed to create {}", destination.display()))?;

        // Links must point at absolute locations before being made relative.
        let source = source
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", source.display()))?;
        let destination = destination.canonicalize()?;

        let mut skip: Vec<String> = ALWAYS_SKIP.iter().map(|s| s.to_string()).collect();
        let escaped = glob::Pattern::escape(&source.to_string_lossy());
        for pattern in blacklist {
            let full = format!("{}/{}", escaped, pattern);
            for matched in glob::glob(&full)?.flatten() {
                if let Ok(relative) = matched.strip_prefix(&source) {
                    skip.push(relative.to_string_lossy().to_string());
                }
            }
        }

        for entry in fs::read_dir(&source)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if skip.contains(&name) {
                continue;
            }

            let source_file = source.join(&name);
            let link_file = destination.join(&name);

            if let Ok(meta) = fs::symlink_metadata(&link_file) {
                if meta.file_type().is_symlink() {
                    remove_link_or_file(&link_file)?;
                } else if skip_existing {
                    continue;
                } else {
                    return Err(FsError::FileExists(link_file).into());
                }
            }

            let link_target = if self.relative_links {
                make_path_relative(&source_file, &link_file)
            } else {
                source_file.clone()
            };
            self.link_or_copy(&source_file, &link_target, &link_file)?;
        }
        Ok(())
    }

    fn link_or_copy(&self, source: &Path, link_target: &Path, link: &Path) -> Result<()> {
        match create_link(link_target, link) {
            Ok(()) => Ok(()),
            Err(_) if self.copy_if_symlink_unavailable => {
                if source.is_dir() {
                    self.copy_all(source, link)
                } else {
                    fs::copy(source, link)
                        .map(|_| ())
                        .with_context(|| format!("Failed to copy {}", source.display()))
                }
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to create link {}", link.display()))),
        }
    }

    /// Create a gzipped tar archive of the contents of `dir`.
    ///
    /// The archive is written next to `destination` and renamed into place,
    /// so readers only ever see complete archives.
    pub fn archive_dir(&self, dir: &Path, destination: &Path) -> Result<()> {
        let tar = self.tar_executable()?;
        if !dir.is_dir() {
            return Err(FsError::NotADirectory(dir.to_path_buf()).into());
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let partial = partial_path(destination);
        let args = vec![
            "-czp".to_string(),
            format!("-C{}", dir.display()),
            format!("-f{}", partial.display()),
            ".".to_string(),
        ];
        if let Err(e) = self.runner.run_checked(tar, &args, None) {
            let _ = fs::remove_file(&partial);
            return Err(e.context(format!("Failed to archive {}", dir.display())));
        }
        fs::rename(&partial, destination)
            .with_context(|| format!("Failed to move archive to {}", destination.display()))?;
        Ok(())
    }

    /// Extract a gzipped tar archive into `destination`, creating it if needed.
    pub fn extract_archive(&self, archive: &Path, destination: &Path) -> Result<()> {
        if !archive.is_file() {
            return Err(FsError::ArchiveNotFound(archive.to_path_buf()).into());
        }
        let parent = destination.parent().unwrap_or(Path::new("."));
        let writable = fs::metadata(parent)
            .map(|m| !m.permissions().readonly())
            .unwrap_or(false);
        if !writable {
            return Err(FsError::DestinationNotWritable(destination.to_path_buf()).into());
        }

        let tar = self.tar_executable()?;
        fs::create_dir_all(destination)
            .with_context(|| format!("Failed to create {}", destination.display()))?;

        let args = vec![
            "-xzp".to_string(),
            format!("-C{}", destination.display()),
            format!("-f{}", archive.display()),
        ];
        self.runner
            .run_checked(tar, &args, None)
            .with_context(|| format!("Failed to extract {}", archive.display()))?;

        // tar restores the archived mtime of `.`; the extracted build is new.
        if let Err(e) = touch(destination) {
            println!(
                "   {} Could not update the modification time of {}: {}",
                "!".yellow(),
                destination.display(),
                e
            );
        }
        Ok(())
    }

    fn tar_executable(&self) -> Result<&'static str, FsError> {
        TAR_CANDIDATES
            .into_iter()
            .find(|c| self.runner.command_exists(c))
            .ok_or(FsError::TarNotFound)
    }
}

/// Path of `end_path` as seen from the directory that will contain `start_path`.
///
/// `start_path` is the (possibly not yet existing) link.
pub fn make_path_relative(end_path: &Path, start_path: &Path) -> PathBuf {
    let start_dir = start_path.parent().unwrap_or(Path::new(""));
    let end: Vec<Component> = end_path.components().collect();
    let start: Vec<Component> = start_dir.components().collect();

    let common = end
        .iter()
        .zip(start.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..start.len() {
        result.push("..");
    }
    for component in &end[common..] {
        result.push(component.as_os_str());
    }
    if result.as_os_str().is_empty() {
        result.push(".");
    }
    result
}

fn touch(path: &Path) -> std::io::Result<()> {
    fs::File::open(path)?.set_modified(SystemTime::now())
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".partial-{}", std::process::id()));
    destination.with_file_name(name)
}

// Directory symlinks on Windows need remove_dir, everything else remove_file.
fn remove_link_or_file(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if cfg!(windows) => fs::remove_dir(path).map_err(|_| e),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn create_link(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_link(target: &Path, link: &Path) -> std::io::Result<()> {
    let resolved = match link.parent() {
        Some(parent) if target.is_relative() => parent.join(target),
        _ => target.to_path_buf(),
    };
    if resolved.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}
