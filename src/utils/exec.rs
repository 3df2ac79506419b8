//! External command execution.
//!
//! Thin builder around `std::process::Command`. Failures carry the
//! subprocess's combined stdout/stderr in the error message so callers
//! can surface compiler diagnostics without parsing them.
//!
//! ```ignore
//! let out = Cmd::new("go").args(["mod", "tidy"]).cwd(dir).run_combined()?;
//! ```

use anyhow::{Context, Result, bail};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Command builder for external process execution.
#[derive(Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Add a single argument.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_owned());
        }
        self
    }

    /// Set the working directory.
    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Add an environment variable (parent environment is inherited).
    pub fn env<K: AsRef<str>, V: AsRef<str>>(mut self, key: K, value: V) -> Self {
        self.envs
            .push((key.as_ref().to_owned(), value.as_ref().to_owned()));
        self
    }

    /// Execute the command. Non-zero exit becomes an error carrying the
    /// combined output.
    pub fn run(self) -> Result<Output> {
        let name = self.program.to_string_lossy().to_string();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(self.envs.iter().cloned());

        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .with_context(|| format!("failed to execute `{name}`"))?;

        if !output.status.success() {
            bail!("{}", format_failure(&name, &output));
        }

        Ok(output)
    }

    /// Execute and return trimmed stdout+stderr as one string.
    pub fn run_combined(self) -> Result<String> {
        let output = self.run()?;
        Ok(combined_text(&output).trim().to_owned())
    }
}

/// Concatenate stdout and stderr lossily.
fn combined_text(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    text
}

/// Error text for a failed command: status line plus combined output.
fn format_failure(name: &str, output: &Output) -> String {
    let mut msg = format!("`{name}` failed with {}", output.status);
    let text = combined_text(output);
    let text = text.trim();
    if !text.is_empty() {
        msg.push('\n');
        msg.push_str(text);
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_builder() {
        let cmd = Cmd::new("echo").arg("hello").args(["world"]).cwd("/tmp");
        assert_eq!(cmd.program, OsString::from("echo"));
        assert_eq!(cmd.args.len(), 2);
        assert_eq!(cmd.cwd, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_simple_command() {
        let output = Cmd::new("echo").arg("hello").run().unwrap();
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("hello"));
    }

    #[test]
    fn test_failure_carries_output() {
        let err = Cmd::new("sh")
            .args(["-c", "echo boom >&2; exit 3"])
            .run()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("boom"), "missing stderr in: {msg}");
        assert!(msg.contains("failed"));
    }

    #[test]
    fn test_run_combined_merges_streams() {
        let text = Cmd::new("sh")
            .args(["-c", "echo out; echo err >&2"])
            .run_combined()
            .unwrap();
        assert!(text.contains("out"));
        assert!(text.contains("err"));
    }
}
