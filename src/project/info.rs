//! Per-build metadata exposed to templates.

use super::template::{self, Fields, Value};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

/// Basic information about one build, used as the template context.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Time of this build.
    pub time: DateTime<Local>,
    /// Hex hash uniquely identifying this build.
    pub version: String,
    /// Compile error text, if the toolchain or a template failed.
    pub compile_error: Option<String>,
    /// True if the server should be polled at /api/v1/poll/version.
    pub hot_reload: bool,
    /// True if the web assembly artifact (app.wasm) is available.
    pub wasm: bool,
    /// Commit hash; empty if the project is not in a git repository.
    pub commit: String,
    /// Host name.
    pub host: String,
    /// Compiler which created the wasm build.
    pub compiler: String,
    /// User-supplied values from the --extra file.
    pub extra: Option<serde_json::Value>,
}

impl BuildInfo {
    pub fn new(version: String, hot_reload: bool, extra: Option<serde_json::Value>) -> Self {
        Self {
            time: Local::now(),
            version,
            compile_error: None,
            hot_reload,
            wasm: false,
            commit: String::new(),
            host: String::new(),
            compiler: String::new(),
            extra,
        }
    }

    /// True if something went wrong while building.
    pub fn has_error(&self) -> bool {
        self.compile_error.is_some()
    }

    /// Html formatted error card. Check `has_error` before.
    ///
    /// Lines prefixed `exit status` are rendered neutral, everything
    /// else in red.
    pub fn error_html(&self) -> String {
        let text = self.compile_error.as_deref().unwrap_or_default();

        let mut html = String::new();
        html.push_str("<div class=\"h-screen bg-gray-600 p-10\">");
        html.push_str(
            "<div class=\"bg-white max-w-6xl p-1 rounded overflow-hidden shadow-lg dark:bg-gray-800\">\n",
        );
        html.push_str("<p class=\"text-xl text-red-600\">build error</p>");

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with("exit status") {
                html.push_str("<p class=\"text-base medium\">");
            } else {
                html.push_str("<p class=\"text-base text-red-600 medium\">");
            }
            html.push_str(line);
            html.push_str("</p>\n");
        }

        html.push_str("</div>\n");
        html.push_str("</div>\n");
        html
    }

    /// Render the given file with this build info and write it back.
    ///
    /// A `.go<ext>` file is written as `.<ext>` and the original is
    /// removed; any other extension is rewritten in place. Returns the
    /// written file name.
    pub fn apply_to_file(&self, path: &Path) -> Result<PathBuf> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("unable to read template file: {}", path.display()))?;

        let rendered = template::render(&raw, self)
            .map_err(|e| anyhow!("{}: {e}", path.display()))?;

        let target = strip_go_extension(path);
        fs::write(&target, rendered)
            .with_context(|| format!("unable to write target file: {}", target.display()))?;

        if target != path {
            fs::remove_file(path)
                .with_context(|| format!("cannot remove template source: {}", path.display()))?;
        }

        Ok(target)
    }

    fn extra_field(&self, rest: &str) -> Option<Value> {
        let extra = self.extra.as_ref()?;
        let pointer = format!("/{}", rest.replace('.', "/"));
        extra.pointer(&pointer).map(json_value)
    }
}

impl Fields for BuildInfo {
    fn field(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("Extra.") {
            return self.extra_field(rest);
        }

        match path {
            "Time" => Some(Value::Text(self.time.to_rfc3339())),
            "Version" => Some(Value::Text(self.version.clone())),
            "CompileError" => Some(Value::Text(
                self.compile_error.clone().unwrap_or_default(),
            )),
            "HasError" => Some(Value::Bool(self.has_error())),
            "Error" => Some(Value::Text(self.error_html())),
            "HotReload" => Some(Value::Bool(self.hot_reload)),
            "Wasm" => Some(Value::Bool(self.wasm)),
            "Commit" => Some(Value::Text(self.commit.clone())),
            "Host" => Some(Value::Text(self.host.clone())),
            "Compiler" => Some(Value::Text(self.compiler.clone())),
            "Extra" => Some(match &self.extra {
                Some(value) => json_value(value),
                None => Value::Bool(false),
            }),
            _ => None,
        }
    }
}

fn json_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Bool(false),
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

/// `index.gohtml` becomes `index.html`; other names stay untouched.
fn strip_go_extension(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.len() > 2 && ext.to_ascii_lowercase().starts_with("go") => {
            path.with_extension(&ext[2..])
        }
        _ => path.to_owned(),
    }
}
