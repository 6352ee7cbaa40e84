use std::path::{Component, Path, PathBuf};

const SOURCE_FILES: &str = "source_files";
const IMAGE_TAR: &str = "image.tar";

/// Scratch space owned by one build of `(app, version)`.
///
/// ```text
/// <raw_source_base>/<app>/<version>/
///   source_files/
///   image.tar
/// ```
///
/// [`release`](Self::release) removes the directory and, for uploaded
/// sources, the uploaded archive. A workspace dropped without being released
/// is removed synchronously.
#[derive(Debug)]
pub struct BuildWorkspace {
    base_dir: PathBuf,
    uploaded_tar: Option<PathBuf>,
    released: bool,
}

impl BuildWorkspace {
    pub fn new(
        raw_source_base: &Path,
        app_name: &str,
        version: u32,
        uploaded_tar: Option<&Path>,
    ) -> Self {
        Self {
            base_dir: raw_source_base.join(app_name).join(version.to_string()),
            uploaded_tar: uploaded_tar.map(Path::to_path_buf),
            released: false,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Where the source is extracted or cloned.
    pub fn raw_dir(&self) -> PathBuf {
        self.base_dir.join(SOURCE_FILES)
    }

    /// Build context handed to the engine.
    pub fn tar_path(&self) -> PathBuf {
        self.base_dir.join(IMAGE_TAR)
    }

    /// Removes everything this build left on disk.
    ///
    /// Both removals are attempted; the first failure is returned. Calling
    /// it again is a no-op.
    pub async fn release(&mut self) -> Result<(), WorkspaceError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let dir_result = remove_dir(&self.base_dir).await;
        let tar_result = match &self.uploaded_tar {
            Some(tar) => remove_file(tar).await,
            None => Ok(()),
        };

        tracing::debug!(dir = %self.base_dir.display(), "build workspace released");
        dir_result.and(tar_result)
    }
}

impl Drop for BuildWorkspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        if self.base_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.base_dir) {
                tracing::warn!(path = %self.base_dir.display(), error = %e, "failed to remove build workspace");
            }
        }
        if let Some(tar) = self.uploaded_tar.as_deref().filter(|t| t.exists()) {
            if let Err(e) = std::fs::remove_file(tar) {
                tracing::warn!(path = %tar.display(), error = %e, "failed to remove uploaded archive");
            }
        }
    }
}

async fn remove_dir(path: &Path) -> Result<(), WorkspaceError> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(WorkspaceError::Remove {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

async fn remove_file(path: &Path) -> Result<(), WorkspaceError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(WorkspaceError::Remove {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// True when `name` is a single plain path component, so that joining it to
/// a base directory stays directly below that directory.
pub fn is_valid_app_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    )
}

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("failed to remove {path}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}
