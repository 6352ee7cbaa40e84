use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use alacran_core::ImageSource;
use alacran_engine::{GitClient, GitError};
use flate2::read::GzDecoder;

use crate::definition::relative_definition_path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Materializes `source` into `dest_dir` and returns the commit hash it carries.
///
/// - uploaded tar: extracted into `dest_dir`; the hash sent with the upload
/// - repository: cloned into `dest_dir`; the hash of the cloned HEAD
/// - inline definition: written to `dest_dir/<definition_path>`; the supplied hash
///
/// The hash may be empty.
pub async fn ingest<G: GitClient>(
    git: &G,
    source: &ImageSource,
    dest_dir: &Path,
    definition_path: &str,
) -> Result<String, IngestError> {
    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| IngestError::CreateDir {
            path: dest_dir.to_path_buf(),
            source: e,
        })?;

    match source {
        ImageSource::UploadedTar(upload) => {
            extract_archive_blocking(upload.uploaded_tar_path.clone(), dest_dir.to_path_buf())
                .await?;
            Ok(upload.git_hash.clone())
        }
        ImageSource::Repo(repo) => {
            git.clone_repo(repo, dest_dir).await?;
            Ok(git.last_hash(dest_dir).await?)
        }
        ImageSource::InlineDefinition(inline) => {
            let path = dest_dir.join(relative_definition_path(definition_path));
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| IngestError::CreateDir {
                        path: parent.to_path_buf(),
                        source: e,
                    })?;
            }
            tokio::fs::write(&path, &inline.alacran_definition_content)
                .await
                .map_err(|e| IngestError::WriteDefinition { path, source: e })?;
            Ok(inline.git_hash.clone())
        }
    }
}

/// Extracts a plain or gzip-compressed tar archive into `dest_dir`.
///
/// Entries whose paths would land outside `dest_dir` are skipped by the
/// unpacker.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<(), IngestError> {
    let open_err = |e| IngestError::OpenArchive {
        path: archive_path.to_path_buf(),
        source: e,
    };

    let mut file = File::open(archive_path).map_err(open_err)?;
    let mut magic = [0u8; 2];
    let gzipped = match file.read_exact(&mut magic) {
        Ok(()) => magic == GZIP_MAGIC,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(open_err(e)),
    };
    file.seek(SeekFrom::Start(0)).map_err(open_err)?;

    let reader: Box<dyn Read> = if gzipped {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut archive = tar::Archive::new(reader);
    archive.set_overwrite(true);
    archive.set_preserve_mtime(false);
    archive.set_unpack_xattrs(false);
    archive.unpack(dest_dir).map_err(|e| IngestError::Extract {
        path: archive_path.to_path_buf(),
        source: e,
    })?;

    tracing::debug!(
        archive = %archive_path.display(),
        dest = %dest_dir.display(),
        gzipped,
        "source archive extracted"
    );
    Ok(())
}

async fn extract_archive_blocking(archive_path: PathBuf, dest_dir: PathBuf) -> Result<(), IngestError> {
    tokio::task::spawn_blocking(move || extract_archive(&archive_path, &dest_dir))
        .await
        .map_err(|e| IngestError::Interrupted {
            detail: e.to_string(),
        })?
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to open uploaded archive {path}")]
    OpenArchive {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to extract uploaded archive {path}")]
    Extract {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write alacran-definition at {path}")]
    WriteDefinition {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("source extraction was interrupted: {detail}")]
    Interrupted { detail: String },
}
