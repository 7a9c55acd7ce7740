/// Options for one build run. Built once, then only read.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Environment the build is for, used in the build directory name
    pub environment_id: String,
    pub verbose: bool,
    /// Skip the retention pass after building
    pub no_clean: bool,
    /// Neither use nor create build archives
    pub no_archive: bool,
    /// Use absolute symlink targets instead of relative ones
    pub absolute_links: bool,
    pub drush: DrushOptions,
}

/// Pass-through options for `drush make`.
#[derive(Debug, Clone)]
pub struct DrushOptions {
    /// Number of projects processed at the same time
    pub concurrency: u32,
    /// Clone modules with git instead of downloading releases
    pub working_copy: bool,
    /// Disable the pm-download cache
    pub no_cache: bool,
}

impl Default for DrushOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            working_copy: false,
            no_cache: false,
        }
    }
}

impl BuildSettings {
    pub fn new(environment_id: impl Into<String>) -> Self {
        Self {
            environment_id: environment_id.into(),
            verbose: false,
            no_clean: false,
            no_archive: false,
            absolute_links: false,
            drush: DrushOptions::default(),
        }
    }
}
