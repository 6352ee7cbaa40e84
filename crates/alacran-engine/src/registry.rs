use std::fmt;

use alacran_core::{RegistryConfig, RegistryEntry};
use secrecy::SecretString;

/// Credentials for one docker registry.
#[derive(Clone)]
pub struct RegistryAuth {
    pub server: String,
    pub username: String,
    pub password: SecretString,
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Credentials for every configured registry, handed to image builds so
/// that private base images can be pulled.
#[derive(Debug, Clone, Default)]
pub struct RegistryCredentials {
    pub auths: Vec<RegistryAuth>,
}

/// Configured registries and the default push target.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    entries: Vec<RegistryEntry>,
    default_push: Option<String>,
}

impl Registries {
    pub fn new(entries: Vec<RegistryEntry>, default_push: Option<String>) -> Self {
        Self {
            entries,
            default_push,
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(config.registries.clone(), config.default_push.clone())
    }

    /// Credentials of the registry hosting `image_name`, if it is one of ours.
    ///
    /// Images without a configured registry domain prefix (e.g. `nginx:1.27`)
    /// are pulled anonymously.
    pub fn auth_for_image(&self, image_name: &str) -> Option<RegistryAuth> {
        self.entries
            .iter()
            .find(|entry| {
                image_name
                    .strip_prefix(entry.domain.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
            })
            .map(to_auth)
    }

    pub fn registry_config(&self) -> RegistryCredentials {
        RegistryCredentials {
            auths: self.entries.iter().map(to_auth).collect(),
        }
    }

    /// The default push registry, when one is configured and known.
    pub fn default_push(&self) -> Option<&RegistryEntry> {
        let domain = self.default_push.as_deref()?;
        self.entries.iter().find(|entry| entry.domain == domain)
    }

    /// Name of `base_image_name:version` once pushed to `entry`.
    pub fn pushed_image_name(entry: &RegistryEntry, base_image_name: &str, version: u32) -> String {
        let prefix = entry.image_prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{}/{base_image_name}:{version}", entry.domain)
        } else {
            format!("{}/{prefix}/{base_image_name}:{version}", entry.domain)
        }
    }

    pub fn auth_for_entry(entry: &RegistryEntry) -> RegistryAuth {
        to_auth(entry)
    }
}

fn to_auth(entry: &RegistryEntry) -> RegistryAuth {
    RegistryAuth {
        server: entry.domain.clone(),
        username: entry.username.clone(),
        password: entry.password.clone(),
    }
}
