//! Git repository queries (best effort, via the ambient `git` binary).

use crate::utils::exec::Cmd;
use anyhow::{Context, Result};
use std::path::Path;

/// Return the commit hash of HEAD for the repository containing `dir`.
pub fn head(dir: &Path) -> Result<String> {
    Cmd::new("git")
        .args(["rev-parse", "HEAD"])
        .cwd(dir)
        .run_combined()
        .context("unable to call git")
}
