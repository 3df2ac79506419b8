//! Resolved application configuration.
//!
//! One `AppConfig` value is built from the CLI in `main` and threaded
//! by reference into every constructor that needs it. There are no
//! per-module globals; the debug flag lives in the logger only.

use crate::cli::Cli;
use crate::project::BuildOptions;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything the build/serve actions need, with all paths absolute.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host interface the dev server binds on.
    pub host: String,
    /// Port the dev server binds on.
    pub port: u16,
    /// Source project root containing the Go wasm module.
    pub www_dir: PathBuf,
    /// Build output root. The merged tree lives in `www` below it.
    pub build_dir: PathBuf,
    /// Verbose logging.
    pub debug: bool,
    /// Extensions rewritten as build-info templates (leading dot included).
    pub template_patterns: Vec<String>,
    /// Parsed value of the --extra JSON file, exposed as `{{.Extra}}`.
    pub extra: Option<serde_json::Value>,
    /// Recompute every file hash instead of trusting ModTime.
    pub force_refresh: bool,
    /// Run `go generate ./...` before every build.
    pub generate: bool,
}

impl AppConfig {
    /// Resolve CLI arguments into an absolute-path configuration.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let cwd = env::current_dir().context("unable to get current working directory")?;

        let www_dir = absolutize(&cwd, cli.www.clone().unwrap_or_default());
        let build_dir = absolutize(
            &cwd,
            cli.dir
                .clone()
                .unwrap_or_else(|| env::temp_dir().join("wasmdev")),
        );

        let extra = match &cli.extra {
            Some(path) => {
                let raw = fs::read(path)
                    .with_context(|| format!("unable to open extra file: {}", path.display()))?;
                let value = serde_json::from_slice(&raw)
                    .with_context(|| format!("invalid json in extra file: {}", path.display()))?;
                Some(value)
            }
            None => None,
        };

        Ok(Self {
            host: cli.host.clone(),
            port: cli.port,
            www_dir,
            build_dir,
            debug: cli.debug,
            template_patterns: cli.template_patterns.clone(),
            extra,
            force_refresh: cli.force_refresh,
            generate: cli.generate,
        })
    }

    /// Directory the merged output is assembled into and served from.
    pub fn www_build_dir(&self) -> PathBuf {
        self.build_dir.join("www")
    }

    /// Build options for one action. `serve` passes `hot_reload = true`.
    pub fn build_options(&self, hot_reload: bool) -> BuildOptions {
        BuildOptions {
            force: self.force_refresh,
            hot_reload,
            go_generate: self.generate,
            template_patterns: self.template_patterns.clone(),
            extra: self.extra.clone(),
        }
    }
}

/// Resolve a possibly-relative path against `cwd`.
fn absolutize(cwd: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolutize_relative() {
        let cwd = PathBuf::from("/work");
        assert_eq!(
            absolutize(&cwd, PathBuf::from("app")),
            PathBuf::from("/work/app")
        );
        assert_eq!(absolutize(&cwd, PathBuf::new()), PathBuf::from("/work"));
    }

    #[test]
    fn test_absolutize_absolute_untouched() {
        let cwd = PathBuf::from("/work");
        assert_eq!(
            absolutize(&cwd, PathBuf::from("/opt/app")),
            PathBuf::from("/opt/app")
        );
    }
}
