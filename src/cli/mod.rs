//! Action runners wiring the components together.

mod args;

pub use args::{Action, Cli, DeployArgs};

use crate::config::AppConfig;
use crate::livebuild::Builder;
use crate::log;
use crate::project::Project;
use crate::server::{HttpServer, VersionBus};
use crate::toolchain::GoToolchain;
use crate::watch::FsWatcher;
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::sync::Arc;

fn new_project(config: &AppConfig) -> Project {
    Project::new(
        config.www_build_dir(),
        config.www_dir.clone(),
        Box::new(GoToolchain::new()),
    )
}

/// One-shot build. A compile error lands on the built page and still
/// exits zero; only fatal problems fail the action.
pub fn run_build(config: &AppConfig) -> Result<()> {
    log!("build"; "build dir {}", config.build_dir.display());

    let builder = Builder::new(new_project(config), config.build_options(false), |_| {});
    builder.build()?;
    Ok(())
}

/// Initial build, then watch + rebuild + serve until interrupted.
pub fn run_serve(config: &AppConfig) -> Result<()> {
    log!("serve"; "build dir {}", config.build_dir.display());

    let bus = Arc::new(VersionBus::new());

    let notify_bus = Arc::clone(&bus);
    let builder = Arc::new(Builder::new(
        new_project(config),
        config.build_options(true),
        move |version| notify_bus.notify(&version),
    ));

    builder
        .build()
        .context("unable to create initial build")?;

    let rebuild = Arc::clone(&builder);
    let watcher = FsWatcher::new(
        config.www_dir.clone(),
        Box::new(move || {
            if let Err(e) = rebuild.build() {
                log!("error"; "failed to build project: {e:#}");
            }
        }),
    )
    .context("failed to init filesystem watcher")?;
    log!("watch"; "watching {}", watcher.root().display());

    HttpServer::new(&config.host, config.port, config.www_build_dir(), bus).run()
}

/// Drop the whole build directory.
pub fn run_clean(config: &AppConfig) -> Result<()> {
    match fs::remove_dir_all(&config.build_dir) {
        Ok(()) => {
            log!("clean"; "removed {}", config.build_dir.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| {
            format!("cannot clean build dir: {}", config.build_dir.display())
        }),
    }
}

/// Upload a local tree to the configured SFTP target.
pub fn run_deploy(args: &DeployArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("unable to get current working directory")?;
    let src = if args.src.is_absolute() {
        args.src.clone()
    } else {
        cwd.join(&args.src)
    };

    crate::deploy::sync_sftp(&args.dst, &src, &args.host, &args.user, &args.password, args.port)
}
