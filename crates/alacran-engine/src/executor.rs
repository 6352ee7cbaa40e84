use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;

use alacran_core::BuildLog;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::docker::DockerError;

const DOCKER_BIN: &str = "docker";

/// Number of trailing stderr lines kept for error reports.
const STDERR_TAIL: usize = 10;

/// Abstraction over docker CLI execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait DockerExecutor: Send + Sync {
    /// Execute a docker command and capture stdout.
    async fn exec(&self, args: &[String]) -> Result<String, DockerError>;

    /// Execute a docker command, appending every output line to `log`.
    async fn exec_streaming(&self, args: &[String], log: &BuildLog) -> Result<(), DockerError>;

    /// Like [`DockerExecutor::exec_streaming`], with `input` piped to stdin.
    async fn exec_streaming_from_file(
        &self,
        args: &[String],
        input: &Path,
        log: &BuildLog,
    ) -> Result<(), DockerError>;

    /// Execute a docker command with data piped to stdin.
    async fn exec_with_stdin(
        &self,
        args: &[String],
        stdin_data: &[u8],
    ) -> Result<String, DockerError>;
}

/// Real docker CLI executor.
pub struct RealExecutor;

impl DockerExecutor for RealExecutor {
    async fn exec(&self, args: &[String]) -> Result<String, DockerError> {
        let output = Command::new(DOCKER_BIN)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DockerError::NotFound { source: e })?;

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| DockerError::InvalidUtf8 { source: e })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            Err(DockerError::command_failed(args, stderr))
        }
    }

    async fn exec_streaming(&self, args: &[String], log: &BuildLog) -> Result<(), DockerError> {
        stream_into_log(args, Stdio::null(), log).await
    }

    async fn exec_streaming_from_file(
        &self,
        args: &[String],
        input: &Path,
        log: &BuildLog,
    ) -> Result<(), DockerError> {
        let file = std::fs::File::open(input).map_err(|e| DockerError::OpenInput {
            path: input.to_path_buf(),
            source: e,
        })?;
        stream_into_log(args, Stdio::from(file), log).await
    }

    async fn exec_with_stdin(
        &self,
        args: &[String],
        stdin_data: &[u8],
    ) -> Result<String, DockerError> {
        let mut child = Command::new(DOCKER_BIN)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DockerError::NotFound { source: e })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(stdin_data)
                .await
                .map_err(|e| DockerError::StdinWrite { source: e })?;
            stdin
                .shutdown()
                .await
                .map_err(|e| DockerError::StdinWrite { source: e })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| DockerError::NotFound { source: e })?;

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| DockerError::InvalidUtf8 { source: e })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            Err(DockerError::command_failed(args, stderr))
        }
    }
}

async fn stream_into_log(args: &[String], stdin: Stdio, log: &BuildLog) -> Result<(), DockerError> {
    let mut child = Command::new(DOCKER_BIN)
        .args(args)
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| DockerError::NotFound { source: e })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout_result, stderr_result, status) = tokio::join!(
        forward_lines(stdout, log),
        forward_lines(stderr, log),
        child.wait(),
    );
    stdout_result.map_err(|e| DockerError::ReadOutput { source: e })?;
    let stderr_tail = stderr_result.map_err(|e| DockerError::ReadOutput { source: e })?;
    let status = status.map_err(|e| DockerError::NotFound { source: e })?;

    if status.success() {
        Ok(())
    } else {
        let mut detail = Vec::from(stderr_tail).join("\n");
        if detail.trim().is_empty() {
            detail = format!("exit code: {status}");
        }
        Err(DockerError::command_failed(args, detail))
    }
}

/// Append each line of `reader` to `log`, returning the last few lines.
async fn forward_lines<R>(reader: Option<R>, log: &BuildLog) -> std::io::Result<VecDeque<String>>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(STDERR_TAIL);
    let Some(reader) = reader else {
        return Ok(tail);
    };

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if tail.len() == STDERR_TAIL {
            tail.pop_front();
        }
        tail.push_back(line.clone());
        log.append(line);
    }
    Ok(tail)
}
