//! Compiler toolchain collaborator.
//!
//! The build engine never talks to the `go` binary directly; it goes
//! through the [`Toolchain`] trait so tests can substitute a fake
//! toolchain and the engine stays agnostic of subprocess details.
//! Failures carry the tool's combined stdout/stderr verbatim; nothing
//! here parses diagnostics beyond surfacing them.

mod go;

pub use go::GoToolchain;

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Descriptor for one module of the project, as reported by the
/// toolchain's module listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Module {
    /// Canonical module name (import path).
    #[serde(rename = "Path")]
    pub path: String,
    /// True for the project's main module.
    #[serde(rename = "Main", default)]
    pub main: bool,
    /// Local directory where the module's sources reside. Empty for
    /// modules that have not been downloaded.
    #[serde(rename = "Dir", default)]
    pub dir: PathBuf,
    /// Opaque version string, e.g. `v1.2.3` or a pseudo-version.
    #[serde(rename = "Version", default)]
    pub version: String,
}

/// Operations the build engine requires from the ambient toolchain.
pub trait Toolchain: Send + Sync {
    /// Best-effort dependency materialization. Returns diagnostics.
    fn mod_tidy(&self, dir: &Path) -> Result<String>;

    /// All modules in declared order; the first one is the main module.
    /// Entries without a local directory are dropped.
    fn mod_list(&self, dir: &Path) -> Result<Vec<Module>>;

    /// Optional codegen pre-step. Returns diagnostics.
    fn generate(&self, dir: &Path) -> Result<String>;

    /// Compile the module's conventional wasm entry point to `out`.
    fn build_wasm(&self, module: &Module, out: &Path) -> Result<()>;

    /// Read a toolchain-provided environment variable.
    fn env(&self, name: &str) -> Result<String>;

    /// Human-readable toolchain version.
    fn version(&self) -> Result<String>;
}
