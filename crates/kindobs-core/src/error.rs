//! Error types for kindobs-core

use thiserror::Error;

/// Errors raised while invoking an external command
#[derive(Error, Debug)]
pub enum ExecError {
    /// The executable could not be started (missing from PATH, not executable, ...)
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing the stdin payload or waiting on the child failed
    #[error("I/O error while running `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited with a non-zero status
    #[error("`{program}` exited with code {code}")]
    NonZeroExit { program: String, code: i32 },

    /// Captured stdout was not valid UTF-8
    #[error("`{program}` produced non UTF-8 output")]
    InvalidOutput { program: String },
}

impl ExecError {
    /// Exit code to hand back to the CI runner for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecError::NonZeroExit { code, .. } => *code,
            _ => 1,
        }
    }
}

/// Errors in the run configuration or CI context
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required input was empty or absent
    #[error("input required and not supplied: {0}")]
    MissingInput(&'static str),

    /// A numeric CI variable could not be parsed
    #[error("{name} is not a number: {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    /// The event payload file could not be read or parsed
    #[error("failed to load event payload from {path}: {reason}")]
    EventPayload { path: String, reason: String },
}

/// Top-level error for setup and teardown
#[derive(Error, Debug)]
pub enum KindobsError {
    /// Command execution error
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// YAML serialisation error
    #[error("YAML serialisation error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialisation error
    #[error("JSON serialisation error: {0}")]
    Json(#[from] serde_json::Error),

    /// The cluster reported no nodes to scrape
    #[error("cluster reported no nodes")]
    NoNodes,

    /// One or more teardown steps failed under the best-effort policy
    #[error("teardown finished with {failed} failed step(s)")]
    Teardown { failed: usize, exit_code: i32 },
}

impl KindobsError {
    /// Process exit code for this error.
    ///
    /// Mirrors the first failing subprocess; everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            KindobsError::Exec(e) => e.exit_code(),
            KindobsError::Teardown { exit_code, .. } => *exit_code,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_zero_exit_keeps_code() {
        let err = KindobsError::from(ExecError::NonZeroExit {
            program: "helm".to_string(),
            code: 3,
        });
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "`helm` exited with code 3");
    }

    #[test]
    fn test_spawn_failure_maps_to_one() {
        let err = ExecError::Spawn {
            program: "kind".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(err.exit_code(), 1);
        assert_eq!(KindobsError::NoNodes.exit_code(), 1);
    }
}
