//! External collaborators of the alacran image build pipeline.
//!
//! - [`DockerClient`] drives the `docker` CLI through a [`DockerExecutor`]
//!   and implements [`ImageEngine`] (pull, build, retag and push).
//! - [`Registries`] resolves registry credentials from configuration.
//! - [`GitCli`] implements [`GitClient`] (clone, last commit hash).

pub mod client;
pub mod docker;
pub mod executor;
pub mod git;
pub mod registry;

pub use client::{DockerClient, ImageEngine};
pub use docker::DockerError;
pub use executor::{DockerExecutor, RealExecutor};
pub use git::{GitCli, GitClient, GitError};
pub use registry::{Registries, RegistryAuth, RegistryCredentials};
