#[derive(Debug, thiserror::Error)]
pub enum DockerError {
    #[error("docker CLI not found — install: https://docs.docker.com/engine/install/")]
    NotFound { source: std::io::Error },

    #[error("docker {command} failed\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("docker output was not valid UTF-8")]
    InvalidUtf8 { source: std::string::FromUtf8Error },

    #[error("failed to write to docker stdin")]
    StdinWrite { source: std::io::Error },

    #[error("failed to open build context {path}")]
    OpenInput {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read docker output")]
    ReadOutput { source: std::io::Error },
}

impl DockerError {
    /// Failure of `docker <args>`; only the subcommand is kept since the
    /// remaining arguments may carry build-arg values.
    pub(crate) fn command_failed(args: &[String], stderr: String) -> Self {
        Self::CommandFailed {
            command: args.first().cloned().unwrap_or_default(),
            stderr,
        }
    }
}
