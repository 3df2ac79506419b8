//! In-memory project state and the end-to-end build pipeline.
//!
//! A [`Project`] keeps one hash tree per module static subtree, one
//! for the main module's full source tree, and one for the target
//! directory. A single uber-hash over the source trees decides whether
//! anything needs to be rebuilt at all; the target tree drives the
//! minimal copy/prune sync.

mod info;
mod sync;
mod template;

pub use info::BuildInfo;
pub use template::TemplateError;

use crate::hashtree::{Digest, Node, read_dir};
use crate::toolchain::{Module, Toolchain};
use crate::utils::exec::Cmd;
use crate::utils::{fsx, git};
use crate::{debug, log};
use anyhow::{Context, Result, bail};
use sha2::{Digest as _, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const WASM_FILENAME: &str = "app.wasm";
const WASM_BRIDGE_FILENAME: &str = "wasm_exec.js";
const GO_ROOT_JS_BRIDGE: &str = "misc/wasm/wasm_exec.js";
const STATIC_FOLDER: &str = "static";

/// Template patterns applied when the user gives none.
pub const DEFAULT_TEMPLATE_PATTERNS: [&str; 5] =
    [".gohtml", ".gocss", ".gojs", ".gojson", ".goxml"];

/// Options for one build.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Rehash every file instead of trusting ModTime.
    pub force: bool,
    /// Tell templates the page should long-poll for new versions.
    pub hot_reload: bool,
    /// Run the toolchain's codegen step before building.
    pub go_generate: bool,
    /// Extensions processed as build-info templates.
    pub template_patterns: Vec<String>,
    /// User-supplied template values.
    pub extra: Option<serde_json::Value>,
}

impl BuildOptions {
    /// Options with the default template patterns set.
    pub fn with_defaults() -> Self {
        Self {
            template_patterns: DEFAULT_TEMPLATE_PATTERNS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            ..Self::default()
        }
    }
}

/// Compile failure report: toolchain or template output that belongs
/// on the served page rather than in the process exit code.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CompileReport {
    pub message: String,
}

/// Result of one build. Fatal problems (I/O, toolchain missing) are
/// reported through `anyhow::Error` instead.
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    /// Something changed and the target was rebuilt.
    Built(Digest),
    /// The uber-hash matched the previous build; nothing was touched.
    Unchanged(Digest),
    /// The pipeline ran, but the page now carries an error card.
    CompileError(CompileReport),
}

/// One module paired with the hash tree of a subtree of it.
struct Part {
    module: Module,
    tree: Node,
}

impl Part {
    fn new(module: Module) -> Self {
        Self {
            module,
            tree: Node::root(),
        }
    }

    /// Sync the tree with the filesystem state of `module.dir/sub_dir`.
    /// A missing directory leaves an empty tree.
    fn refresh(&mut self, force: bool, sub_dir: &str) -> Result<()> {
        let dir = if sub_dir.is_empty() {
            self.module.dir.clone()
        } else {
            self.module.dir.join(sub_dir)
        };

        let exists = dir.is_dir();
        if force || !exists {
            self.tree = Node::root();
        }
        if !exists {
            return Ok(());
        }

        read_dir(&dir, &mut self.tree, force)
            .with_context(|| format!("unable to hash src: {}", dir.display()))
    }
}

/// Project state kept in memory across builds so ModTime shortcuts
/// stay hot.
pub struct Project {
    toolchain: Box<dyn Toolchain>,
    /// Directory of the main Go module.
    src_path: PathBuf,
    /// Target directory everything is merged into.
    dst_path: PathBuf,
    /// Static subtrees of all modules; index 0 is the main module.
    parts: Vec<Part>,
    /// Full source tree of the main module.
    main: Option<Part>,
    /// Hash tree of the target directory.
    dst: Node,
    /// Absolute target paths the prune pass must never delete.
    extra_dst_files: Vec<PathBuf>,
    last_build_hash: Digest,
}

impl Project {
    pub fn new(dst_path: PathBuf, src_path: PathBuf, toolchain: Box<dyn Toolchain>) -> Self {
        Self {
            toolchain,
            src_path,
            dst_path,
            parts: Vec::new(),
            main: None,
            dst: Node::root(),
            extra_dst_files: Vec::new(),
            last_build_hash: [0; 32],
        }
    }

    /// Sync all module trees into the destination and compile the web
    /// assembly. Returns the outcome with the hash of this build.
    pub fn build(&mut self, opts: &BuildOptions) -> Result<BuildOutcome> {
        fs::create_dir_all(&self.dst_path).with_context(|| {
            format!("unable to create build directory: {}", self.dst_path.display())
        })?;
        self.provide_wasm_bridge()?;

        self.load_mods().context("unable to load modules")?;
        self.refresh(opts.force)
            .context("unable to refresh file hashes")?;

        // compare only source hashes: target-side churn must not force
        // copy work that would create invalid intermediate states
        let uber_hash = self.src_hash();
        if uber_hash == self.last_build_hash {
            debug!("build"; "hash unchanged, no build required: {}", hex::encode(uber_hash));
            return Ok(BuildOutcome::Unchanged(uber_hash));
        }

        if opts.go_generate {
            let prints = self
                .toolchain
                .generate(&self.src_path)
                .context("failed to go generate")?;
            if !prints.is_empty() {
                debug!("gotool"; "{prints}");
            }
            self.refresh(true)
                .context("unable to refresh file hashes")?;
        }

        // zero the last hash now: a partially failed build must never
        // look like a successful cached state
        self.last_build_hash = [0; 32];

        self.sync().context("cannot sync file trees")?;

        let mut build_info =
            BuildInfo::new(hex::encode(uber_hash), opts.hot_reload, opts.extra.clone());

        match Cmd::new("hostname").run_combined() {
            Ok(host) => build_info.host = host,
            Err(e) => log!("build"; "unable to read hostname: {e}"),
        }
        match git::head(&self.src_path) {
            Ok(commit) => build_info.commit = commit,
            Err(e) => debug!("build"; "unable to read git head: {e}"),
        }
        match self.toolchain.version() {
            Ok(version) => build_info.compiler = version,
            Err(e) => log!("build"; "unable to get compiler version: {e}"),
        }

        let wasm_out = self.dst_path.join(WASM_FILENAME);
        match self
            .toolchain
            .build_wasm(self.main_module()?, &wasm_out)
        {
            Ok(()) => {
                debug!("build"; "wasm build successful");
                build_info.wasm = true;
            }
            Err(e) => {
                debug!("build"; "wasm build failed");
                build_info.compile_error = Some(format!("{e:#}"));
            }
        }

        self.apply_templates(&mut build_info, &opts.template_patterns)?;

        if build_info.has_error() {
            let message = build_info.compile_error.unwrap_or_default();
            return Ok(BuildOutcome::CompileError(CompileReport { message }));
        }

        self.last_build_hash = uber_hash;
        debug!("build"; "build completed: {}", hex::encode(uber_hash));
        Ok(BuildOutcome::Built(uber_hash))
    }

    fn main_module(&self) -> Result<&Module> {
        self.parts
            .first()
            .map(|part| &part.module)
            .context("modules not loaded")
    }

    /// Place the toolchain's JS runtime bridge next to the artifact.
    /// Both are protected from the prune pass.
    fn provide_wasm_bridge(&mut self) -> Result<()> {
        let go_root = self
            .toolchain
            .env("GOROOT")
            .context("unable to determine GOROOT")?;
        if go_root.is_empty() {
            bail!("unable to determine GOROOT");
        }

        let bridge = self.dst_path.join(WASM_BRIDGE_FILENAME);
        fsx::copy_file(&bridge, &Path::new(&go_root).join(GO_ROOT_JS_BRIDGE))
            .context("unable to provide wasm-js-bridge")?;

        self.remember_extra(bridge);
        let wasm = self.dst_path.join(WASM_FILENAME);
        self.remember_extra(wasm);
        Ok(())
    }

    fn remember_extra(&mut self, path: PathBuf) {
        if !self.extra_dst_files.contains(&path) {
            self.extra_dst_files.push(path);
        }
    }

    /// Refresh the module list, keeping cached parts alive when the
    /// resolved (dir, version) pairs are unchanged so ModTime shortcuts
    /// survive across builds.
    fn load_mods(&mut self) -> Result<()> {
        let prints = self
            .toolchain
            .mod_tidy(&self.src_path)
            .context("unable to go mod tidy")?;
        if !prints.is_empty() {
            debug!("gotool"; "{prints}");
        }

        let mods = self
            .toolchain
            .mod_list(&self.src_path)
            .context("unable to list modules")?;
        if mods.first().map(|m| m.main) != Some(true) {
            bail!("no main module found: {}", self.src_path.display());
        }

        let unchanged = mods.len() == self.parts.len()
            && mods.iter().zip(&self.parts).all(|(module, part)| {
                module.dir == part.module.dir && module.version == part.module.version
            });

        if !unchanged {
            debug!("build"; "modules have changed, reloading all modules");
            self.main = Some(Part::new(mods[0].clone()));
            self.parts = mods.into_iter().map(Part::new).collect();
        }

        Ok(())
    }

    /// Sync all hash trees with the filesystem. `force` drops every
    /// cached hash first.
    fn refresh(&mut self, force: bool) -> Result<()> {
        for part in &mut self.parts {
            part.refresh(force, STATIC_FOLDER)
                .with_context(|| format!("unable to refresh module: {}", part.module.path))?;
        }

        let main = self.main.as_mut().context("modules not loaded")?;
        main.refresh(force, "").context("unable to refresh main root")?;

        if force {
            self.dst = Node::root();
        }
        read_dir(&self.dst_path, &mut self.dst, force).context("unable to hash dst")
    }

    /// Uber-hash over all source trees: every static subtree in module
    /// order, then the main module's full source tree.
    fn src_hash(&self) -> Digest {
        let mut hasher = Sha256::new();
        for part in &self.parts {
            hasher.update(part.tree.hash);
        }
        if let Some(main) = &self.main {
            hasher.update(main.tree.hash);
        }
        hasher.finalize().into()
    }

    /// Apply build info to every file matching a template pattern. The
    /// first failure becomes the compile error and stops the stage.
    fn apply_templates(&self, build_info: &mut BuildInfo, patterns: &[String]) -> Result<()> {
        for file in fsx::list_files(&self.dst_path)? {
            let Some(ext) = file.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            let ext = format!(".{}", ext.to_ascii_lowercase());
            if !patterns.iter().any(|p| p.eq_ignore_ascii_case(&ext)) {
                continue;
            }

            debug!("build"; "found template file: {}", file.display());
            if let Err(e) = build_info.apply_to_file(&file) {
                log!("error"; "template error: {e:#}");
                if build_info.compile_error.is_none() {
                    build_info.compile_error = Some(format!("{e:#}"));
                }
                break;
            }
        }

        Ok(())
    }
}
