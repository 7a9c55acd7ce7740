use crate::build::BuildSettings;
use std::path::PathBuf;

/// Everything a toolchain needs to know about one application build.
#[derive(Debug, Clone)]
pub struct BuildContext<'a> {
    /// Output directory, `<project>/builds/<timestamp>--<env>[/<app>]`
    pub build_dir: PathBuf,

    /// The application inside the repository
    pub app_root: PathBuf,

    pub project_root: PathBuf,

    pub settings: &'a BuildSettings,

    /// Point `<project>/www` at this build once installed
    pub link_www: bool,
}

impl BuildContext<'_> {
    /// Files kept across builds, e.g. uploaded files and local settings.
    pub fn shared_dir(&self) -> PathBuf {
        crate::project::shared_dir(&self.project_root)
    }
}

/// Error type for toolchain resolution
#[derive(Debug)]
pub enum ToolchainError {
    /// The application names a toolchain key no variant answers to
    NotFound(String),
}

impl std::fmt::Display for ToolchainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolchainError::NotFound(key) => write!(f, "Toolchain not found: {}", key),
        }
    }
}

impl std::error::Error for ToolchainError {}
