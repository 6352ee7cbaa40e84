use std::fmt;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;

/// Where the source of a new application version comes from.
///
/// Downstream build stages never look at the variant: they only see the
/// populated working directory and the commit hash it produced.
#[derive(Debug, Clone)]
pub enum ImageSource {
    UploadedTar(UploadedTar),
    Repo(RepoSource),
    InlineDefinition(InlineDefinition),
}

/// A source tarball already stored on local disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedTar {
    pub uploaded_tar_path: PathBuf,
    #[serde(default)]
    pub git_hash: String,
}

/// A remote git repository to clone.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSource {
    #[serde(default)]
    pub user: String,
    #[serde(default = "empty_secret")]
    pub password: SecretString,
    #[serde(default)]
    pub ssh_key: Option<SecretString>,
    pub repo: String,
    pub branch: String,
}

/// Literal alacran-definition content with no accompanying source tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineDefinition {
    pub alacran_definition_content: String,
    #[serde(default)]
    pub git_hash: String,
}

/// An image source as submitted by a caller, before it is narrowed to a
/// single [`ImageSource`] variant.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSourceSpec {
    #[serde(default)]
    pub uploaded_tar_path_source: Option<UploadedTar>,
    #[serde(default)]
    pub repo_info_source: Option<RepoSource>,
    #[serde(default)]
    pub alacran_definition_content_source: Option<InlineDefinition>,
}

impl TryFrom<ImageSourceSpec> for ImageSource {
    type Error = crate::Error;

    fn try_from(spec: ImageSourceSpec) -> crate::Result<Self> {
        match (
            spec.uploaded_tar_path_source,
            spec.repo_info_source,
            spec.alacran_definition_content_source,
        ) {
            (Some(tar), None, None) => Ok(Self::UploadedTar(tar)),
            (None, Some(repo), None) => Ok(Self::Repo(repo)),
            (None, None, Some(inline)) => Ok(Self::InlineDefinition(inline)),
            (tar, repo, inline) => Err(crate::Error::SourceUnknown {
                populated: usize::from(tar.is_some())
                    + usize::from(repo.is_some())
                    + usize::from(inline.is_some()),
            }),
        }
    }
}

impl ImageSource {
    /// The uploaded tarball backing this source, which the pipeline deletes once done.
    pub fn uploaded_tar_path(&self) -> Option<&std::path::Path> {
        match self {
            Self::UploadedTar(tar) => Some(&tar.uploaded_tar_path),
            Self::Repo(_) | Self::InlineDefinition(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::UploadedTar(_) => "uploaded-tar",
            Self::Repo(_) => "repo",
            Self::InlineDefinition(_) => "inline-definition",
        }
    }
}

impl fmt::Debug for RepoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoSource")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssh_key", &self.ssh_key.as_ref().map(|_| "[REDACTED]"))
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .finish()
    }
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

/// An environment variable passed to the build and the running container.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parse `KEY=VALUE`; the value may itself contain `=`.
    pub fn parse(pair: &str) -> Option<Self> {
        let (key, value) = pair.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some(Self::new(key, value))
    }
}

/// The image a new application version runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltImage {
    pub image_name: String,
    pub git_hash: String,
}
