use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use alacran_core::{
    AlacranConfig, BuildLog, BuildLogStore, BuiltImage, EnvVar, ImageSource, ImageSourceSpec,
};
use alacran_engine::{DockerClient, DockerError, GitCli, GitClient, ImageEngine, Registries};

use crate::bundle::{self, PackageError};
use crate::definition::{self, DefinitionError};
use crate::dockerfile::{DockerfileGenerator, SynthesisError};
use crate::ingest::{self, IngestError};
use crate::template::TemplateCatalog;
use crate::workspace::{self, BuildWorkspace, WorkspaceError};

const LOG_SEPARATOR: &str = "-------------------------";

/// Turns image sources into runnable images.
///
/// Builds of the same application are serialized; different applications
/// build concurrently. Every build writes its progress to the application's
/// [`BuildLog`] and removes its workspace before returning.
pub struct ImageMaker<E: ImageEngine = DockerClient, G: GitClient = GitCli> {
    engine: E,
    git: G,
    registries: Registries,
    templates: TemplateCatalog,
    logs: Arc<BuildLogStore>,
    app_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    namespace: String,
    raw_source_base: PathBuf,
    git_sha_env_key: String,
}

impl ImageMaker<DockerClient, GitCli> {
    pub fn new(config: &AlacranConfig, logs: Arc<BuildLogStore>) -> Self {
        Self::with_collaborators(config, logs, DockerClient::new(), GitCli)
    }
}

impl<E: ImageEngine, G: GitClient> ImageMaker<E, G> {
    pub fn with_collaborators(
        config: &AlacranConfig,
        logs: Arc<BuildLogStore>,
        engine: E,
        git: G,
    ) -> Self {
        Self {
            engine,
            git,
            registries: Registries::from_config(&config.registry),
            templates: TemplateCatalog::builtin(),
            logs,
            app_locks: Mutex::new(HashMap::new()),
            namespace: config.build.namespace.clone(),
            raw_source_base: config.paths.raw_source_base(),
            git_sha_env_key: config.build.git_sha_env_key.clone(),
        }
    }

    /// Build log of `app_name`, for status and log-streaming consumers.
    pub fn build_logs(&self, app_name: &str) -> Arc<BuildLog> {
        self.logs.get(app_name)
    }

    /// Local image name of an application, without tag.
    pub fn base_image_name(&self, app_name: &str) -> String {
        format!("img-{}-{app_name}", self.namespace)
    }

    /// [`ensure_image`](Self::ensure_image) for a source as received from a caller.
    pub async fn ensure_image_from_spec(
        &self,
        spec: ImageSourceSpec,
        definition_path: &str,
        app_name: &str,
        version: u32,
        env_vars: &mut Vec<EnvVar>,
    ) -> Result<BuiltImage, PipelineError> {
        match ImageSource::try_from(spec) {
            Ok(source) => {
                self.ensure_image(&source, definition_path, app_name, version, env_vars)
                    .await
            }
            Err(e) => {
                let log = self.logs.get(app_name);
                start_log(&log, app_name);
                log.append(e.to_string());
                log.append("Build has failed!");
                Err(PipelineError::Source(e))
            }
        }
    }

    /// Produces the image `version` of `app_name` runs.
    ///
    /// When the source carries a commit hash and `env_vars` has no entry for
    /// the commit-hash key yet, one is appended, so the hash reaches both the
    /// build and the caller.
    pub async fn ensure_image(
        &self,
        source: &ImageSource,
        definition_path: &str,
        app_name: &str,
        version: u32,
        env_vars: &mut Vec<EnvVar>,
    ) -> Result<BuiltImage, PipelineError> {
        if !workspace::is_valid_app_name(app_name) {
            let e = PipelineError::InvalidAppName {
                app: app_name.to_owned(),
            };
            let log = self.logs.get(app_name);
            start_log(&log, app_name);
            log.append(e.to_string());
            log.append("Build has failed!");
            tracing::warn!(app = app_name, "build refused: invalid application name");
            return Err(e);
        }

        let app_lock = self.app_lock(app_name);
        let _guard = app_lock.lock().await;

        let log = self.logs.get(app_name);
        start_log(&log, app_name);
        tracing::info!(app = app_name, version, source = source.kind(), "build started");

        let mut workspace = BuildWorkspace::new(
            &self.raw_source_base,
            app_name,
            version,
            source.uploaded_tar_path(),
        );

        let outcome = self
            .run_stages(
                source,
                definition_path,
                app_name,
                version,
                env_vars,
                &workspace,
                &log,
            )
            .await;
        let cleanup = workspace.release().await;

        let result = match (outcome, cleanup) {
            (Ok(image), Ok(())) => Ok(image),
            (Ok(_), Err(e)) => Err(PipelineError::Cleanup(e)),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup_err)) => {
                tracing::warn!(
                    app = app_name,
                    version,
                    error = %cleanup_err,
                    "cleanup failed after an earlier build error"
                );
                Err(e)
            }
        };

        match &result {
            Ok(image) => {
                log.append("Build has finished successfully!");
                tracing::info!(app = app_name, version, image = %image.image_name, "build finished");
            }
            Err(e) => {
                log.append(e.to_string());
                log.append("Build has failed!");
                tracing::info!(app = app_name, version, error = %e, "build failed");
            }
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_stages(
        &self,
        source: &ImageSource,
        definition_path: &str,
        app_name: &str,
        version: u32,
        env_vars: &mut Vec<EnvVar>,
        workspace: &BuildWorkspace,
        log: &BuildLog,
    ) -> Result<BuiltImage, PipelineError> {
        let raw_dir = workspace.raw_dir();
        let git_hash = ingest::ingest(&self.git, source, &raw_dir, definition_path).await?;
        tracing::debug!(app = app_name, dir = %raw_dir.display(), "source ingested");

        if !git_hash.is_empty() && !env_vars.iter().any(|v| v.key == self.git_sha_env_key) {
            env_vars.push(EnvVar::new(self.git_sha_env_key.clone(), git_hash.clone()));
        }

        let definition_file = definition::locate(&raw_dir, definition_path)?;
        let descriptor = definition::load(&definition_file)?;
        let definition_dir = definition_file
            .parent()
            .map_or_else(|| raw_dir.clone(), Path::to_path_buf);
        tracing::debug!(
            app = app_name,
            directive = descriptor.directive().name(),
            "alacran-definition validated"
        );

        if let Some(image_name) = descriptor.image_name() {
            log.append(format!(
                "An explicit image name was provided ({image_name}). Therefore, no build process is needed."
            ));
            log.append(format!("Pulling this image: {image_name} ..."));

            let auth = self.registries.auth_for_image(image_name);
            self.engine
                .pull_image(image_name, auth)
                .await
                .map_err(|e| PipelineError::Pull {
                    image: image_name.to_owned(),
                    source: e,
                })?;
            log.append(format!("Image pulled: {image_name}"));

            return Ok(BuiltImage {
                image_name: image_name.to_owned(),
                git_hash,
            });
        }

        DockerfileGenerator::new(&descriptor, &self.templates).write(&definition_dir)?;
        let tar_path =
            bundle::package_directory_blocking(definition_dir, workspace.tar_path()).await?;

        let base_image_name = self.base_image_name(app_name);
        self.engine
            .build_image(
                &base_image_name,
                version,
                &tar_path,
                log,
                env_vars,
                &self.registries.registry_config(),
            )
            .await
            .map_err(|e| PipelineError::Build {
                message: e.to_string().trim().to_owned(),
            })?;

        let local_image = format!("{base_image_name}:{version}");
        let image_name = match self.registries.default_push() {
            Some(entry) => {
                let target = Registries::pushed_image_name(entry, &base_image_name, version);
                self.engine
                    .retag_and_push(&local_image, &target, &Registries::auth_for_entry(entry), log)
                    .await
                    .map_err(|e| PipelineError::Publish {
                        image: target.clone(),
                        source: e,
                    })?;
                target
            }
            None => local_image,
        };

        Ok(BuiltImage {
            image_name,
            git_hash,
        })
    }

    fn app_lock(&self, app_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.app_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(app_name.to_owned()).or_default())
    }
}

fn start_log(log: &BuildLog, app_name: &str) {
    log.clear();
    log.append(format!("{LOG_SEPARATOR} {}", chrono::Utc::now().to_rfc3339()));
    log.append(format!("Build started for {app_name}"));
}

/// Stable classification of [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidAppName,
    SourceUnknown,
    DefinitionNotFound,
    DefinitionEmpty,
    DefinitionMalformed,
    DefinitionVersionMissing,
    DefinitionVersionUnsupported,
    DefinitionAmbiguous,
    PathTraversal,
    ImageNotRebuildable,
    Template,
    Pull,
    Build,
    Publish,
    Cleanup,
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid application name: {app:?}")]
    InvalidAppName { app: String },

    #[error(transparent)]
    Source(#[from] alacran_core::Error),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error("failed to pull image {image}")]
    Pull { image: String, source: DockerError },

    #[error("image build failed: {message}")]
    Build { message: String },

    #[error("failed to publish image {image}")]
    Publish { image: String, source: DockerError },

    #[error("failed to clean up build workspace")]
    Cleanup(#[source] WorkspaceError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAppName { .. } => ErrorKind::InvalidAppName,
            Self::Source(alacran_core::Error::SourceUnknown { .. }) => ErrorKind::SourceUnknown,
            Self::Source(_) | Self::Ingest(_) | Self::Package(_) => ErrorKind::Io,
            Self::Definition(e) => match e {
                DefinitionError::NotFound { .. } => ErrorKind::DefinitionNotFound,
                DefinitionError::Empty { .. } => ErrorKind::DefinitionEmpty,
                DefinitionError::Parse { .. } => ErrorKind::DefinitionMalformed,
                DefinitionError::VersionMissing => ErrorKind::DefinitionVersionMissing,
                DefinitionError::VersionUnsupported { .. } => {
                    ErrorKind::DefinitionVersionUnsupported
                }
                DefinitionError::Ambiguous { .. } => ErrorKind::DefinitionAmbiguous,
                DefinitionError::Symlink { .. } => ErrorKind::PathTraversal,
                DefinitionError::ReadDir { .. }
                | DefinitionError::WriteDefault { .. }
                | DefinitionError::Serialize { .. }
                | DefinitionError::Read { .. } => ErrorKind::Io,
            },
            Self::Synthesis(e) => match e {
                SynthesisError::PathTraversal { .. } => ErrorKind::PathTraversal,
                SynthesisError::ImageNotRebuildable { .. } => ErrorKind::ImageNotRebuildable,
                SynthesisError::Template(_) => ErrorKind::Template,
                SynthesisError::ReadDockerfile { .. } | SynthesisError::WriteDockerfile { .. } => {
                    ErrorKind::Io
                }
            },
            Self::Pull { .. } => ErrorKind::Pull,
            Self::Build { .. } => ErrorKind::Build,
            Self::Publish { .. } => ErrorKind::Publish,
            Self::Cleanup(_) => ErrorKind::Cleanup,
        }
    }
}
