use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};

/// Per-application configuration file name.
pub const APP_CONFIG_FILE: &str = ".platform.app.yaml";

/// Project-level defaults file, at the project root.
pub const PROJECT_CONFIG_FILE: &str = "pbuild.toml";

/// Directory name that never yields a default application name.
pub const REPOSITORY_DIR: &str = "repository";

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AppConfig {
    pub name: Option<String>,
    pub toolstack: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hooks: Hooks,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct Hooks {
    #[serde(default, deserialize_with = "one_or_many")]
    pub build: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub deploy: Vec<String>,
}

impl Hooks {
    pub fn is_empty(&self) -> bool {
        self.build.is_empty() && self.deploy.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) if s.trim().is_empty() => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Load `.platform.app.yaml` from `app_root`.
///
/// A missing file is an empty config. When no name is declared, the name of
/// the directory above the application is used, unless that is `repository`.
pub fn load_app_config(app_root: &Path) -> Result<AppConfig> {
    let path = app_root.join(APP_CONFIG_FILE);
    let mut config = if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if content.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
    } else {
        AppConfig::default()
    };

    if config.name.is_none() {
        let parent = app_root
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string());
        if let Some(dir) = parent
            && dir != REPOSITORY_DIR
        {
            config.name = Some(dir);
        }
    }

    Ok(config)
}

/// Build defaults from `~/.pbuild/config.toml` and `<project>/pbuild.toml`.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct ProjectConfig {
    pub build: BuildDefaults,
    pub clean: CleanDefaults,
    pub drush: DrushDefaults,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct BuildDefaults {
    pub no_archive: Option<bool>,
    pub no_clean: Option<bool>,
    pub absolute_links: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct CleanDefaults {
    pub keep: Option<usize>,
    pub ttl: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct DrushDefaults {
    pub concurrency: Option<u32>,
    pub working_copy: Option<bool>,
    pub no_cache: Option<bool>,
}

impl ProjectConfig {
    /// Load the user-wide file, then let the project file override it field by field.
    pub fn load(project_root: &Path) -> Result<Self> {
        let mut config = match global_config_path() {
            Some(path) => Self::load_file(&path)?,
            None => Self::default(),
        };
        config.merge(Self::load_file(&project_root.join(PROJECT_CONFIG_FILE))?);
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| {
            format!(
                "Failed to parse {} - check for syntax errors",
                path.display()
            )
        })
    }

    fn merge(&mut self, other: Self) {
        let b = other.build;
        self.build.no_archive = b.no_archive.or(self.build.no_archive);
        self.build.no_clean = b.no_clean.or(self.build.no_clean);
        self.build.absolute_links = b.absolute_links.or(self.build.absolute_links);

        let c = other.clean;
        self.clean.keep = c.keep.or(self.clean.keep);
        self.clean.ttl = c.ttl.or(self.clean.ttl);

        let d = other.drush;
        self.drush.concurrency = d.concurrency.or(self.drush.concurrency);
        self.drush.working_copy = d.working_copy.or(self.drush.working_copy);
        self.drush.no_cache = d.no_cache.or(self.drush.no_cache);
    }
}

fn global_config_path() -> Option<PathBuf> {
    crate::filesystem::Filesystem::home_directory()
        .map(|home| home.join(".pbuild").join("config.toml"))
}
