//! Errors raised while building documentation.

/// Errors that can occur during a build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to spawn `{command}`: {source}. Is it installed?")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Reference generator exited with {}", describe_code(.code))]
    ReferenceFailed { code: Option<i32> },

    #[error("Background task failed: {0}")]
    Join(String),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl From<tokio::task::JoinError> for BuildError {
    fn from(err: tokio::task::JoinError) -> Self {
        BuildError::Join(err.to_string())
    }
}
