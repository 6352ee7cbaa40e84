use std::io::Write;
use std::path::Path;

use alacran_build::ingest::{self, IngestError};
use alacran_core::{ImageSource, InlineDefinition, RepoSource, UploadedTar};
use alacran_engine::{GitClient, GitError};
use flate2::Compression;
use flate2::write::GzEncoder;
use mockall::mock;
use secrecy::SecretString;
use tempfile::TempDir;

mock! {
    Git {}

    impl GitClient for Git {
        async fn clone_repo(&self, source: &RepoSource, dest: &Path) -> Result<(), GitError>;
        async fn last_hash(&self, dir: &Path) -> Result<String, GitError>;
    }
}

const DEFINITION: &str = "./alacran-definition";

fn tar_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap()
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn uploaded(path: &Path, git_hash: &str) -> ImageSource {
    ImageSource::UploadedTar(UploadedTar {
        uploaded_tar_path: path.to_path_buf(),
        git_hash: git_hash.to_owned(),
    })
}

#[tokio::test]
async fn extracts_plain_tar() {
    let tmp = TempDir::new().unwrap();
    let archive = tmp.path().join("upload.tar");
    std::fs::write(
        &archive,
        tar_bytes(&[("app/alacran-definition", "{}"), ("app/index.js", "// js")]),
    )
    .unwrap();
    let dest = tmp.path().join("source_files");

    let hash = ingest::ingest(&MockGit::new(), &uploaded(&archive, "c0ffee"), &dest, DEFINITION)
        .await
        .unwrap();

    assert_eq!(hash, "c0ffee");
    assert_eq!(
        std::fs::read_to_string(dest.join("app/index.js")).unwrap(),
        "// js"
    );
}

#[tokio::test]
async fn extracts_gzipped_tar() {
    let tmp = TempDir::new().unwrap();
    let archive = tmp.path().join("upload.tar.gz");
    std::fs::write(&archive, gzip(&tar_bytes(&[("Dockerfile", "FROM scratch")]))).unwrap();
    let dest = tmp.path().join("source_files");

    let hash = ingest::ingest(&MockGit::new(), &uploaded(&archive, ""), &dest, DEFINITION)
        .await
        .unwrap();

    assert!(hash.is_empty());
    assert_eq!(
        std::fs::read_to_string(dest.join("Dockerfile")).unwrap(),
        "FROM scratch"
    );
}

#[tokio::test]
async fn missing_upload_is_an_open_error() {
    let tmp = TempDir::new().unwrap();
    let result = ingest::ingest(
        &MockGit::new(),
        &uploaded(&tmp.path().join("missing.tar"), ""),
        &tmp.path().join("dest"),
        DEFINITION,
    )
    .await;

    assert!(matches!(result, Err(IngestError::OpenArchive { .. })));
}

#[tokio::test]
async fn inline_definition_is_written_at_definition_path() {
    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("source_files");
    let source = ImageSource::InlineDefinition(InlineDefinition {
        alacran_definition_content: r#"{"schemaVersion":2,"imageName":"nginx"}"#.to_owned(),
        git_hash: "abc123".to_owned(),
    });

    let hash = ingest::ingest(&MockGit::new(), &source, &dest, "./deploy/alacran-definition")
        .await
        .unwrap();

    assert_eq!(hash, "abc123");
    assert_eq!(
        std::fs::read_to_string(dest.join("deploy/alacran-definition")).unwrap(),
        r#"{"schemaVersion":2,"imageName":"nginx"}"#
    );
}

#[tokio::test]
async fn repo_is_cloned_and_hash_read_from_head() {
    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("source_files");

    let mut git = MockGit::new();
    git.expect_clone_repo()
        .withf(|source, dest| {
            source.repo == "https://github.com/example/app" && source.branch == "main" && dest.is_dir()
        })
        .times(1)
        .returning(|_, dest| {
            std::fs::write(dest.join("Dockerfile"), "FROM scratch").unwrap();
            Ok(())
        });
    git.expect_last_hash()
        .times(1)
        .returning(|_| Ok("deadbeef".to_owned()));

    let source = ImageSource::Repo(RepoSource {
        user: String::new(),
        password: SecretString::from(String::new()),
        ssh_key: None,
        repo: "https://github.com/example/app".to_owned(),
        branch: "main".to_owned(),
    });

    let hash = ingest::ingest(&git, &source, &dest, DEFINITION).await.unwrap();

    assert_eq!(hash, "deadbeef");
    assert!(dest.join("Dockerfile").is_file());
}

#[tokio::test]
async fn clone_failure_is_propagated() {
    let tmp = TempDir::new().unwrap();

    let mut git = MockGit::new();
    git.expect_clone_repo().returning(|source, _| {
        Err(GitError::CloneFailed {
            repo: source.repo.clone(),
            stderr: "Repository not found".to_owned(),
        })
    });
    git.expect_last_hash().never();

    let source = ImageSource::Repo(RepoSource {
        user: String::new(),
        password: SecretString::from(String::new()),
        ssh_key: None,
        repo: "https://github.com/example/missing".to_owned(),
        branch: "main".to_owned(),
    });

    let result = ingest::ingest(&git, &source, &tmp.path().join("dest"), DEFINITION).await;
    assert!(matches!(
        result,
        Err(IngestError::Git(GitError::CloneFailed { .. }))
    ));
}
