use thiserror::Error;

/// Top-level error taxonomy for the sandbox launcher.
///
/// Only failures that abort an invocation *before* a [`crate::Verdict`] can
/// be produced are represented here; expected runtime outcomes (time limit,
/// memory limit, signals, nonzero exit, and even a failed exec of the user
/// binary) are modeled as `Verdict` variants, not errors, since all of those
/// still flow back through the supervisor's report.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// Cgroup directory/file setup, namespace setup, or clone failed.
    #[error("{0}")]
    Setup(String),
}

impl SandboxError {
    pub fn setup(msg: impl ToString) -> Self {
        Self::Setup(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SandboxError>;
