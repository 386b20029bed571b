use std::path::PathBuf;

use thiserror::Error;

use super::session_config::ConfigError;

/// Failures that prevent a tracking session from starting or finishing cleanly.
///
/// Acquisition failures are deliberately absent: a missing camera disables
/// tracking but never stops the session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to load face detection model: {0}")]
    ModelLoad(String),
    #[error("scene has no object named '{0}'")]
    MissingTarget(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to open output {path}: {reason}")]
    Output { path: PathBuf, reason: String },
    #[error("renderer failed: {0}")]
    Render(String),
}
