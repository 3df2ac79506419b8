//! Remote deployment over SFTP.
//!
//! Thin collaborator around the OpenSSH client tools: the remote
//! target directory is created with `ssh`, then the local tree is
//! copied with `scp` (which speaks SFTP). When a password is given it
//! is passed to `sshpass` through the environment so it never shows up
//! in a process listing; without one, key/agent auth applies.

use crate::log;
use crate::utils::exec::Cmd;
use anyhow::{Context, Result, bail};
use std::path::Path;

/// Upload the contents of `src` into `dst` on the remote host.
pub fn sync_sftp(
    dst: &str,
    src: &Path,
    host: &str,
    user: &str,
    password: &str,
    port: u16,
) -> Result<()> {
    if !src.is_dir() {
        bail!("deploy source is not a directory: {}", src.display());
    }
    if host.is_empty() || user.is_empty() {
        bail!("deploy host and user are required");
    }

    let remote = format!("{user}@{host}");
    log!("deploy"; "uploading {} -> {}:{}", src.display(), remote, dst);

    remote_cmd("ssh", password)
        .args(["-p", &port.to_string()])
        .arg(&remote)
        .arg(format!("mkdir -p '{dst}'"))
        .run()
        .context("unable to create remote directory")?;

    // `src/.` copies the directory contents, not the directory itself
    remote_cmd("scp", password)
        .args(["-r", "-P", &port.to_string()])
        .arg(src.join("."))
        .arg(format!("{remote}:{dst}"))
        .run()
        .context("unable to upload files")?;

    log!("deploy"; "done");
    Ok(())
}

/// Wrap an OpenSSH client invocation with `sshpass -e` when password
/// authentication was requested.
fn remote_cmd(program: &str, password: &str) -> Cmd {
    if password.is_empty() {
        Cmd::new(program)
    } else {
        Cmd::new("sshpass")
            .arg("-e")
            .arg(program)
            .env("SSHPASS", password)
    }
}
