//! Static documents. The most general detector, so it goes last in the registry.

use super::BuildContext;
use crate::filesystem::Filesystem;
use anyhow::Result;
use std::path::Path;

pub const KEY: &str = "static";

pub fn detect(app_root: &Path) -> bool {
    app_root.join("index.html").is_file() || app_root.join("index.php").is_file()
}

pub fn build(ctx: &BuildContext, files: &Filesystem) -> Result<()> {
    files.copy_all(&ctx.app_root, &ctx.build_dir)
}

pub fn install(_ctx: &BuildContext, _files: &Filesystem) -> Result<()> {
    Ok(())
}
