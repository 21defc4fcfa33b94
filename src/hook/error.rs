use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while matching or running hook scripts.
///
/// None of these abort sibling properties or future notifications; the
/// dispatcher logs them and moves on.
#[derive(Debug, Error)]
pub enum HookError {
    /// Failed to list the hook root or a hook directory.
    #[error("failed to read hook directory '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HookError {
    pub fn read_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadDir {
            path: path.into(),
            source,
        }
    }
}
