mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "alacran",
    about = "Build application images from tarballs, git repositories, or alacran-definitions"
)]
#[command(version)]
struct Cli {
    /// Directory containing alacran.toml
    #[arg(long, global = true, default_value = ".")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or pull) the image of an application version
    Build(BuildArgs),
    /// Locate and validate the alacran-definition of a source directory
    Validate {
        /// Source directory
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Print the Dockerfile an alacran-definition synthesizes
    Render {
        /// Source directory
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// List built-in templates usable as templateId
    Templates,
    /// Check docker, git, and configuration
    Doctor,
}

#[derive(Args)]
#[command(group(
    clap::ArgGroup::new("source")
        .required(true)
        .args(["tar", "repo", "definition_file"])
))]
pub(crate) struct BuildArgs {
    /// Application name
    #[arg(long)]
    pub app: String,
    /// Application version the image is built for
    #[arg(long = "app-version")]
    pub app_version: u32,

    /// Source tarball (plain or gzip-compressed)
    #[arg(long)]
    pub tar: Option<PathBuf>,
    /// Git repository URL
    #[arg(long)]
    pub repo: Option<String>,
    /// File holding alacran-definition content
    #[arg(long)]
    pub definition_file: Option<PathBuf>,

    /// Branch to clone
    #[arg(long, default_value = "main")]
    pub branch: String,
    /// Username for HTTPS clones
    #[arg(long, requires = "repo")]
    pub user: Option<String>,
    /// Password or token for HTTPS clones
    #[arg(long, env = "ALACRAN_GIT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Private key for SSH clones
    #[arg(long, requires = "repo")]
    pub ssh_key_file: Option<PathBuf>,

    /// Commit hash of a tarball or definition source
    #[arg(long, conflicts_with = "repo")]
    pub git_hash: Option<String>,

    /// Build-time environment variable (KEY=VALUE), repeatable
    #[arg(long = "env", short = 'e')]
    pub env: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e.into());
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => commands::build(&cli.config, args).await?,
        Commands::Validate { dir } => commands::validate(&cli.config, &dir)?,
        Commands::Render { dir } => commands::render(&cli.config, &dir)?,
        Commands::Templates => commands::templates(),
        Commands::Doctor => commands::doctor(&cli.config).await?,
    }

    Ok(())
}
