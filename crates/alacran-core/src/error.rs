use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("default push registry '{0}' is not listed in [[registry.registries]]")]
    UnknownDefaultPush(String),

    // ── Image sources ──
    #[error(
        "image source is unknown: exactly one of uploaded tar, repository, or definition content \
         must be provided (got {populated})"
    )]
    SourceUnknown { populated: usize },
}
