use std::path::Path;
use std::sync::Arc;

use alacran_build::ImageMaker;
use alacran_build::workspace::is_valid_app_name;
use alacran_core::{
    AlacranConfig, BuildLogStore, EnvVar, ImageSourceSpec, InlineDefinition, RepoSource,
    UploadedTar,
};
use secrecy::SecretString;

use crate::BuildArgs;

/// Run the image build pipeline for one application version.
pub async fn build(config_dir: &Path, args: BuildArgs) -> anyhow::Result<()> {
    if !is_valid_app_name(&args.app) {
        anyhow::bail!("invalid --app '{}': expected a single path component", args.app);
    }

    let mut env_vars = args
        .env
        .iter()
        .map(|pair| {
            EnvVar::parse(pair)
                .ok_or_else(|| anyhow::anyhow!("invalid --env '{pair}': expected KEY=VALUE"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let config = AlacranConfig::load(config_dir)?;
    let git_hash = args.git_hash.clone().unwrap_or_default();
    let spec = source_spec(&config, &args, git_hash).await?;

    let logs = Arc::new(BuildLogStore::new(config.build.log_size));
    let maker = ImageMaker::new(&config, Arc::clone(&logs));

    let result = maker
        .ensure_image_from_spec(
            spec,
            &config.build.definition_path,
            &args.app,
            args.app_version,
            &mut env_vars,
        )
        .await;

    for line in maker.build_logs(&args.app).snapshot() {
        println!("{line}");
    }
    let image = result?;

    println!();
    println!("Image: {}", image.image_name);
    if !image.git_hash.is_empty() {
        println!("Commit: {}", image.git_hash);
    }
    Ok(())
}

/// The pipeline deletes uploaded tarballs once done, so a `--tar` source is
/// copied into the downloads directory first and the caller's file is left alone.
async fn source_spec(
    config: &AlacranConfig,
    args: &BuildArgs,
    git_hash: String,
) -> anyhow::Result<ImageSourceSpec> {
    let mut spec = ImageSourceSpec::default();

    if let Some(tar) = &args.tar {
        let downloads = config.paths.downloads_directory();
        tokio::fs::create_dir_all(&downloads).await?;
        let staged = downloads.join(format!("{}-{}.tar", args.app, args.app_version));
        tokio::fs::copy(tar, &staged)
            .await
            .map_err(|e| anyhow::anyhow!("failed to stage {}: {e}", tar.display()))?;
        spec.uploaded_tar_path_source = Some(UploadedTar {
            uploaded_tar_path: staged,
            git_hash: git_hash.clone(),
        });
    }

    if let Some(repo) = &args.repo {
        let ssh_key = match &args.ssh_key_file {
            Some(path) => Some(SecretString::from(tokio::fs::read_to_string(path).await?)),
            None => None,
        };
        spec.repo_info_source = Some(RepoSource {
            user: args.user.clone().unwrap_or_default(),
            password: SecretString::from(args.password.clone().unwrap_or_default()),
            ssh_key,
            repo: repo.clone(),
            branch: args.branch.clone(),
        });
    }

    if let Some(path) = &args.definition_file {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        spec.alacran_definition_content_source = Some(InlineDefinition {
            alacran_definition_content: content,
            git_hash,
        });
    }

    Ok(spec)
}
