use std::io::Write;
use std::path::Path;
use std::process::Stdio;

use alacran_core::RepoSource;
use secrecy::ExposeSecret;
use tokio::process::Command;

/// Git operations the build pipeline needs.
#[allow(async_fn_in_trait)]
pub trait GitClient: Send + Sync {
    /// Clone `source.branch` of `source.repo` into `dest`.
    async fn clone_repo(&self, source: &RepoSource, dest: &Path) -> Result<(), GitError>;

    /// Commit hash of HEAD in the working tree at `dir`.
    async fn last_hash(&self, dir: &Path) -> Result<String, GitError>;
}

/// Git operations over the `git` binary.
pub struct GitCli;

impl GitClient for GitCli {
    async fn clone_repo(&self, source: &RepoSource, dest: &Path) -> Result<(), GitError> {
        let password = source.password.expose_secret();
        let url = authenticated_url(&source.repo, &source.user, password);

        let mut command = Command::new("git");
        command
            .args(clone_args(&source.branch, &url))
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Held until the clone finishes; the key file is deleted on drop.
        let key_file = match source.ssh_key.as_ref().map(|k| k.expose_secret()) {
            Some(key) if !key.trim().is_empty() => {
                let file = write_ssh_key(key)?;
                command.env(
                    "GIT_SSH_COMMAND",
                    format!(
                        "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=no",
                        file.path().display()
                    ),
                );
                Some(file)
            }
            _ => None,
        };

        tracing::debug!(repo = %source.repo, branch = %source.branch, dest = %dest.display(), "git clone");
        let output = command
            .output()
            .await
            .map_err(|e| GitError::NotFound { source: e })?;
        drop(key_file);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::CloneFailed {
                repo: source.repo.clone(),
                stderr: redact(stderr.trim(), password),
            });
        }

        // The clone records its URL in .git/config, which ends up in the build context.
        if url != source.repo {
            let output = Command::new("git")
                .args(reset_remote_args(&source.repo))
                .current_dir(dest)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await
                .map_err(|e| GitError::NotFound { source: e })?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(GitError::ResetRemote {
                    repo: source.repo.clone(),
                    stderr: redact(stderr.trim(), password),
                });
            }
        }
        Ok(())
    }

    async fn last_hash(&self, dir: &Path) -> Result<String, GitError> {
        let output = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| GitError::NotFound { source: e })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::RevParse {
                dir: dir.to_path_buf(),
                stderr: stderr.trim().to_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}

impl GitCli {
    pub async fn version(&self) -> Result<String, GitError> {
        let output = Command::new("git")
            .arg("--version")
            .output()
            .await
            .map_err(|e| GitError::NotFound { source: e })?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}

/// `git clone` arguments up to the destination. `--` keeps a URL that starts
/// with a dash from being parsed as an option.
fn clone_args(branch: &str, url: &str) -> Vec<String> {
    vec![
        "clone".to_owned(),
        "--recurse-submodules".to_owned(),
        format!("--branch={branch}"),
        "--".to_owned(),
        url.to_owned(),
    ]
}

fn reset_remote_args(repo: &str) -> Vec<String> {
    vec![
        "remote".to_owned(),
        "set-url".to_owned(),
        "--".to_owned(),
        "origin".to_owned(),
        repo.to_owned(),
    ]
}

fn write_ssh_key(key: &str) -> Result<tempfile::NamedTempFile, GitError> {
    let mut file = tempfile::NamedTempFile::new().map_err(|e| GitError::SshKey { source: e })?;
    file.write_all(key.as_bytes())
        .map_err(|e| GitError::SshKey { source: e })?;
    if !key.ends_with('\n') {
        file.write_all(b"\n")
            .map_err(|e| GitError::SshKey { source: e })?;
    }
    file.flush().map_err(|e| GitError::SshKey { source: e })?;
    Ok(file)
}

/// Embed `user:password` into an HTTP(S) repository URL.
///
/// URLs of other schemes, and requests without a user, are returned unchanged.
pub fn authenticated_url(repo: &str, user: &str, password: &str) -> String {
    if user.is_empty() {
        return repo.to_owned();
    }
    let Some((scheme, rest)) = repo.split_once("://") else {
        return repo.to_owned();
    };
    if scheme != "https" && scheme != "http" {
        return repo.to_owned();
    }
    // Existing credentials win over the supplied ones.
    let host_part = rest.split('/').next().unwrap_or_default();
    if host_part.contains('@') {
        return repo.to_owned();
    }
    if password.is_empty() {
        format!("{scheme}://{}@{rest}", encode_userinfo(user))
    } else {
        format!(
            "{scheme}://{}:{}@{rest}",
            encode_userinfo(user),
            encode_userinfo(password)
        )
    }
}

fn encode_userinfo(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn redact(text: &str, password: &str) -> String {
    if password.is_empty() {
        return text.to_owned();
    }
    text.replace(&encode_userinfo(password), "***")
        .replace(password, "***")
}

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git CLI not found — install git to build from repositories")]
    NotFound { source: std::io::Error },

    #[error("git clone of {repo} failed: {stderr}")]
    CloneFailed { repo: String, stderr: String },

    #[error("failed to reset origin of {repo} after clone: {stderr}")]
    ResetRemote { repo: String, stderr: String },

    #[error("failed to read HEAD commit in {dir}: {stderr}")]
    RevParse {
        dir: std::path::PathBuf,
        stderr: String,
    },

    #[error("failed to write ssh key for git")]
    SshKey { source: std::io::Error },
}
