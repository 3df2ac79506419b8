//! Serialized build driver.
//!
//! Wraps one [`Project`] so that the initial build and watcher-driven
//! rebuilds can never interleave, and publishes the version of every
//! changed successful build through a caller-supplied hook (the serve
//! action wires this to the version bus).

use crate::project::{BuildOptions, BuildOutcome, Project};
use crate::{debug, log};
use anyhow::Result;
use parking_lot::Mutex;
use std::time::Instant;

pub struct Builder {
    /// The mutex doubles as the build lock: whoever builds holds the
    /// only reference to the project state.
    project: Mutex<Project>,
    opts: BuildOptions,
    on_built: Box<dyn Fn(String) + Send + Sync>,
}

impl Builder {
    pub fn new(
        project: Project,
        opts: BuildOptions,
        on_built: impl Fn(String) + Send + Sync + 'static,
    ) -> Self {
        Self {
            project: Mutex::new(project),
            opts,
            on_built: Box::new(on_built),
        }
    }

    /// Run one build now. Concurrent callers queue on the lock.
    ///
    /// A compile error is a completed build whose output is the error
    /// page, not a failure; only fatal problems surface as `Err`.
    pub fn build(&self) -> Result<BuildOutcome> {
        let mut project = self.project.lock();

        let start = Instant::now();
        let outcome = project.build(&self.opts)?;
        log!("build"; "build duration: {:?}", start.elapsed());

        match &outcome {
            BuildOutcome::Built(hash) => {
                let version = hex::encode(hash);
                log!("build"; "built {version}");
                (self.on_built)(version);
            }
            BuildOutcome::Unchanged(_) => {
                debug!("build"; "nothing changed");
            }
            BuildOutcome::CompileError(report) => {
                log!("error"; "compile error:\n{}", report.message);
            }
        }

        Ok(outcome)
    }
}
