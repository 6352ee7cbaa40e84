use std::path::Path;

use alacran_core::{BuildLog, EnvVar};
use secrecy::ExposeSecret;

use crate::docker::DockerError;
use crate::executor::{DockerExecutor, RealExecutor};
use crate::registry::{RegistryAuth, RegistryCredentials};

/// Image operations the build pipeline needs from the container engine.
#[allow(async_fn_in_trait)]
pub trait ImageEngine: Send + Sync {
    /// Pull `image_name`, authenticating first when credentials are given.
    async fn pull_image(
        &self,
        image_name: &str,
        auth: Option<RegistryAuth>,
    ) -> Result<(), DockerError>;

    /// Build `<base_image_name>:<version>` from a tarred build context,
    /// streaming engine output into `log`.
    async fn build_image(
        &self,
        base_image_name: &str,
        version: u32,
        tar_path: &Path,
        log: &BuildLog,
        env_vars: &[EnvVar],
        registry_config: &RegistryCredentials,
    ) -> Result<(), DockerError>;

    /// Tag `local_image` as `target_image` and push it.
    async fn retag_and_push(
        &self,
        local_image: &str,
        target_image: &str,
        auth: &RegistryAuth,
        log: &BuildLog,
    ) -> Result<(), DockerError>;
}

/// Docker operations client, parameterized over the executor for testability.
pub struct DockerClient<E: DockerExecutor = RealExecutor> {
    executor: E,
}

impl DockerClient<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor,
        }
    }
}

impl Default for DockerClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: DockerExecutor> DockerClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    // ── Registry ──

    pub async fn login(&self, auth: &RegistryAuth) -> Result<(), DockerError> {
        tracing::debug!(server = %auth.server, username = %auth.username, "docker login");
        self.executor
            .exec_with_stdin(
                &args([
                    "login",
                    "--username",
                    &auth.username,
                    "--password-stdin",
                    &auth.server,
                ]),
                auth.password.expose_secret().as_bytes(),
            )
            .await?;
        Ok(())
    }

    // ── Inspection ──

    pub async fn version(&self) -> Result<String, DockerError> {
        let out = self
            .executor
            .exec(&args(["version", "--format", "{{.Server.Version}}"]))
            .await?;
        Ok(out.trim().to_owned())
    }
}

impl<E: DockerExecutor> ImageEngine for DockerClient<E> {
    async fn pull_image(
        &self,
        image_name: &str,
        auth: Option<RegistryAuth>,
    ) -> Result<(), DockerError> {
        if let Some(auth) = &auth {
            self.login(auth).await?;
        }

        self.executor
            .exec(&args(["pull", "--quiet", image_name]))
            .await?;
        Ok(())
    }

    async fn build_image(
        &self,
        base_image_name: &str,
        version: u32,
        tar_path: &Path,
        log: &BuildLog,
        env_vars: &[EnvVar],
        registry_config: &RegistryCredentials,
    ) -> Result<(), DockerError> {
        for auth in &registry_config.auths {
            self.login(auth).await?;
        }

        let tag = format!("{base_image_name}:{version}");
        let mut cmd = args(["build", "--tag", &tag]);
        for env in env_vars {
            cmd.push("--build-arg".to_owned());
            cmd.push(format!("{}={}", env.key, env.value));
        }
        // Build context is read from stdin as a tar archive
        cmd.push("-".to_owned());

        self.executor
            .exec_streaming_from_file(&cmd, tar_path, log)
            .await
    }

    async fn retag_and_push(
        &self,
        local_image: &str,
        target_image: &str,
        auth: &RegistryAuth,
        log: &BuildLog,
    ) -> Result<(), DockerError> {
        log.append(format!("Retagging {local_image} as {target_image}"));
        self.executor
            .exec(&args(["tag", local_image, target_image]))
            .await?;

        self.login(auth).await?;

        log.append(format!("Pushing {target_image}"));
        self.executor
            .exec_streaming(&args(["push", target_image]), log)
            .await
    }
}

// ── Helper ──

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}
