//! Core types and configuration for alacran.
//!
//! This crate defines the `alacran.toml` schema ([`AlacranConfig`]), the
//! image-source model consumed by the build pipeline ([`ImageSource`]),
//! and the per-application build-log store ([`BuildLogStore`]).

pub mod build_log;
pub mod config;
pub mod error;
pub mod source;

pub use build_log::{BuildLog, BuildLogStore};
pub use config::{AlacranConfig, BuildConfig, PathsConfig, RegistryConfig, RegistryEntry};
pub use error::{Error, Result};
pub use source::{
    BuiltImage, EnvVar, ImageSource, ImageSourceSpec, InlineDefinition, RepoSource, UploadedTar,
};

/// The only `schemaVersion` an alacran-definition may declare.
pub const SCHEMA_VERSION: u32 = 2;
