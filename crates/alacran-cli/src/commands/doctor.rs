use std::fmt;
use std::path::Path;

use alacran_core::AlacranConfig;
use alacran_engine::{DockerClient, GitCli};

pub async fn doctor(config_dir: &Path) -> anyhow::Result<()> {
    let mut report = DoctorReport::default();

    match DockerClient::new().version().await {
        Ok(version) => report.docker = CheckResult::ok(&version),
        Err(e) => report.docker = CheckResult::fail(&e.to_string()),
    }

    match GitCli.version().await {
        Ok(version) => report.git = CheckResult::ok(&version),
        Err(e) => report.git = CheckResult::fail(&e.to_string()),
    }

    match AlacranConfig::load(config_dir) {
        Ok(config) => {
            report.config_file = if config_dir.join("alacran.toml").exists() {
                CheckResult::ok("Found")
            } else {
                CheckResult::ok("Not found, using defaults")
            };
            report.base_directory = CheckResult::ok(&config.paths.base_directory.display().to_string());
            report.default_push = match config.registry.default_push.as_deref() {
                Some(domain) => CheckResult::ok(domain),
                None => CheckResult::ok("None, images stay local"),
            };
        }
        Err(e) => {
            report.config_file = CheckResult::fail(&e.to_string());
        }
    }

    println!();
    println!("{report}");

    if !report.all_passed() {
        anyhow::bail!("some checks failed, see above for details");
    }

    Ok(())
}

#[derive(Debug, Default)]
struct DoctorReport {
    docker: CheckResult,
    git: CheckResult,
    config_file: CheckResult,
    base_directory: CheckResult,
    default_push: CheckResult,
}

impl DoctorReport {
    fn all_passed(&self) -> bool {
        self.docker.passed && self.git.passed && self.config_file.passed
    }
}

impl fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = [
            ("docker", &self.docker),
            ("git", &self.git),
            ("alacran.toml", &self.config_file),
            ("Base directory", &self.base_directory),
            ("Default push", &self.default_push),
        ];
        for (name, check) in rows {
            if check.detail.is_empty() {
                continue;
            }
            writeln!(f, "  [{}] {name:<16} {}", check.icon(), check.detail)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
struct CheckResult {
    passed: bool,
    detail: String,
}

impl CheckResult {
    fn ok(detail: &str) -> Self {
        Self {
            passed: true,
            detail: detail.to_owned(),
        }
    }

    fn fail(detail: &str) -> Self {
        Self {
            passed: false,
            detail: detail.to_owned(),
        }
    }

    fn icon(&self) -> &'static str {
        if self.passed { "OK" } else { "NG" }
    }
}
