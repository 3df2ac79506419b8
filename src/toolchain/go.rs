//! Go toolchain backend.

use super::{Module, Toolchain};
use crate::debug;
use crate::utils::exec::Cmd;
use anyhow::{Context, Result, bail};
use std::path::Path;

/// Toolchain implementation shelling out to the ambient `go` binary.
#[derive(Debug, Default)]
pub struct GoToolchain;

impl GoToolchain {
    pub fn new() -> Self {
        Self
    }
}

impl Toolchain for GoToolchain {
    fn mod_tidy(&self, dir: &Path) -> Result<String> {
        Cmd::new("go")
            .args(["mod", "tidy"])
            .cwd(dir)
            .run_combined()
            .context("cannot go mod tidy")
    }

    fn mod_list(&self, dir: &Path) -> Result<Vec<Module>> {
        let output = Cmd::new("go")
            .args(["list", "-m", "-json", "all"])
            .cwd(dir)
            .run()
            .context("unable to list modules")?;
        parse_mod_list(&output.stdout)
    }

    fn generate(&self, dir: &Path) -> Result<String> {
        Cmd::new("go")
            .args(["generate", "./..."])
            .cwd(dir)
            .run_combined()
            .context("cannot go generate")
    }

    fn build_wasm(&self, module: &Module, out: &Path) -> Result<()> {
        // entry point by convention: <module>/cmd/wasm
        let package = format!("{}/cmd/wasm", module.path);
        Cmd::new("go")
            .arg("build")
            .arg("-o")
            .arg(out)
            .arg(&package)
            .cwd(&module.dir)
            .env("GOOS", "js")
            .env("GOARCH", "wasm")
            .run()?;
        Ok(())
    }

    fn env(&self, name: &str) -> Result<String> {
        let text = Cmd::new("go").args(["env", name]).run_combined()?;
        Ok(text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_owned())
    }

    fn version(&self) -> Result<String> {
        Cmd::new("go")
            .arg("version")
            .run_combined()
            .context("unable to run go version")
    }
}

/// Parse the output of `go list -m -json all`: a stream of
/// concatenated JSON objects, one per module.
fn parse_mod_list(raw: &[u8]) -> Result<Vec<Module>> {
    let mut modules = Vec::new();
    for parsed in serde_json::Deserializer::from_slice(raw).into_iter::<Module>() {
        let module = parsed.context("unable to parse module listing")?;
        if module.dir.as_os_str().is_empty() {
            // not downloaded, nothing on disk to hash
            debug!("gotool"; "ignoring module without directory: {}", module.path);
            continue;
        }
        modules.push(module);
    }

    if modules.is_empty() {
        bail!("module listing is empty");
    }

    Ok(modules)
}
