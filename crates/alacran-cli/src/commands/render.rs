use std::path::Path;

use alacran_build::TemplateCatalog;
use alacran_build::definition;
use alacran_build::dockerfile::DockerfileGenerator;
use alacran_core::AlacranConfig;

/// Print the synthesized Dockerfile. Nothing under `dir` is written.
pub fn render(config_dir: &Path, dir: &Path) -> anyhow::Result<()> {
    let config = AlacranConfig::load(config_dir)?;
    let (found, descriptor) = definition::resolve(dir, &config.build.definition_path)?;

    let definition_dir = found.path.parent().unwrap_or(dir);
    let catalog = TemplateCatalog::builtin();
    let dockerfile = DockerfileGenerator::new(&descriptor, &catalog).render(definition_dir)?;

    println!("{dockerfile}");
    Ok(())
}
