mod clean;
mod core;
mod hooks;
mod settings;

pub use clean::{
    ARCHIVE_KEEP, ARCHIVE_TTL, BUILD_KEEP, BUILD_TTL, BuildEntry, CLEAN_COMMAND_KEEP,
    CLEAN_COMMAND_TTL, CleanResult, active_build, clean_archives, clean_builds, clean_directory,
    list_builds,
};
pub use core::{
    AppOutcome, AppReport, Builder, Phase, ProjectReport, applications, build_name,
};
pub use hooks::warn_about_hooks;
pub use settings::{BuildSettings, DrushOptions};
