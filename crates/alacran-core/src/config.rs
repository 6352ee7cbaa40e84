use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;

/// Environment variable that overrides `[paths].base_directory`.
pub const BASE_DIRECTORY_ENV: &str = "ALACRAN_BASE_DIRECTORY";

/// alacran.toml configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlacranConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Root of everything alacran writes to disk (defaults to /alacran)
    #[serde(default = "default_base_directory")]
    pub base_directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Namespace embedded in built image names (`img-<namespace>-<app>`)
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Number of lines each application's build log retains
    #[serde(default = "default_log_size")]
    pub log_size: usize,
    /// Location of the alacran-definition relative to the source root
    #[serde(default = "default_definition_path")]
    pub definition_path: String,
    /// Env var carrying the commit hash into the build and the container
    #[serde(default = "default_git_sha_env_key")]
    pub git_sha_env_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
    /// Domain of the registry every freshly built image is pushed to.
    /// When None, images stay local to the build host.
    #[serde(default)]
    pub default_push: Option<String>,
    #[serde(default)]
    pub registries: Vec<RegistryEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryEntry {
    /// Registry host, optionally with port (e.g. `registry.example.com:996`)
    pub domain: String,
    pub username: String,
    pub password: SecretString,
    /// Path segment inserted between the domain and the image name
    #[serde(default)]
    pub image_prefix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_directory: default_base_directory(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            log_size: default_log_size(),
            definition_path: default_definition_path(),
            git_sha_env_key: default_git_sha_env_key(),
        }
    }
}

impl PathsConfig {
    /// Base directory of per-build raw source workspaces.
    pub fn raw_source_base(&self) -> PathBuf {
        self.base_directory.join("temp").join("image_raw")
    }

    /// Directory where uploaded source tarballs are stored.
    pub fn downloads_directory(&self) -> PathBuf {
        self.base_directory.join("temp").join("downloads")
    }
}

impl RegistryConfig {
    /// The entry matching `default_push`, if one is configured.
    pub fn default_push_entry(&self) -> crate::Result<Option<&RegistryEntry>> {
        let Some(domain) = self.default_push.as_deref() else {
            return Ok(None);
        };
        self.registries
            .iter()
            .find(|r| r.domain == domain)
            .map(Some)
            .ok_or_else(|| crate::Error::UnknownDefaultPush(domain.to_owned()))
    }
}

impl AlacranConfig {
    /// Load from alacran.toml in the given directory, or return defaults if not found.
    ///
    /// `ALACRAN_BASE_DIRECTORY` takes precedence over `[paths].base_directory`.
    pub fn load(config_dir: &Path) -> crate::Result<Self> {
        let config_path = config_dir.join("alacran.toml");
        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })?
        } else {
            Self::default()
        };

        // arch-lint: allow(no-silent-result-drop) reason="an unset variable means no override"
        config.override_base_directory(std::env::var(BASE_DIRECTORY_ENV).ok());
        config.registry.default_push_entry()?;

        tracing::debug!(
            base_directory = %config.paths.base_directory.display(),
            namespace = %config.build.namespace,
            default_push = config.registry.default_push.as_deref().unwrap_or("-"),
            "alacran config loaded"
        );
        Ok(config)
    }

    /// Replace the base directory when `value` is a non-blank path.
    pub fn override_base_directory(&mut self, value: Option<String>) {
        if let Some(dir) = value.filter(|v| !v.trim().is_empty()) {
            self.paths.base_directory = PathBuf::from(dir.trim());
        }
    }
}

fn default_base_directory() -> PathBuf {
    PathBuf::from("/alacran")
}

fn default_namespace() -> String {
    "alacran".to_owned()
}

fn default_log_size() -> usize {
    50
}

fn default_definition_path() -> String {
    "./alacran-definition".to_owned()
}

fn default_git_sha_env_key() -> String {
    "ALACRITY_GIT_COMMIT_SHA".to_owned()
}
