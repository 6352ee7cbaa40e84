use std::fs::File;
use std::path::{Path, PathBuf};

/// Packs the contents of `source_dir` into a tar archive at `tar_path`.
///
/// Entries are stored relative to `./`, which is the layout docker expects
/// of a build context. Symlinks are archived as links, not followed.
pub fn package_directory(source_dir: &Path, tar_path: &Path) -> Result<PathBuf, PackageError> {
    if let Some(parent) = tar_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PackageError::Create {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let file = File::create(tar_path).map_err(|e| PackageError::Create {
        path: tar_path.to_path_buf(),
        source: e,
    })?;

    let mut builder = tar::Builder::new(file);
    builder.follow_symlinks(false);
    builder
        .append_dir_all(".", source_dir)
        .map_err(|e| PackageError::Append {
            path: source_dir.to_path_buf(),
            source: e,
        })?;
    builder.into_inner().map_err(|e| PackageError::Finish {
        path: tar_path.to_path_buf(),
        source: e,
    })?;

    tracing::debug!(
        source = %source_dir.display(),
        tar = %tar_path.display(),
        "build context bundled"
    );
    Ok(tar_path.to_path_buf())
}

/// [`package_directory`] on the blocking thread pool.
pub async fn package_directory_blocking(
    source_dir: PathBuf,
    tar_path: PathBuf,
) -> Result<PathBuf, PackageError> {
    tokio::task::spawn_blocking(move || package_directory(&source_dir, &tar_path))
        .await
        .map_err(|e| PackageError::Interrupted {
            detail: e.to_string(),
        })?
}

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("failed to create {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to add {path} to build context")]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to finish build context {path}")]
    Finish {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("bundling was interrupted: {detail}")]
    Interrupted { detail: String },
}
