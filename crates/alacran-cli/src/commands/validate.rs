use std::path::Path;

use alacran_build::{BuildDirective, definition};
use alacran_core::AlacranConfig;

pub fn validate(config_dir: &Path, dir: &Path) -> anyhow::Result<()> {
    let config = AlacranConfig::load(config_dir)?;
    let (found, descriptor) = definition::resolve(dir, &config.build.definition_path)?;

    if found.bare_dockerfile {
        println!("No alacran-definition, using the Dockerfile next to {}", found.path.display());
    } else {
        println!("Valid alacran-definition: {}", found.path.display());
    }
    println!("  schemaVersion: {}", descriptor.schema_version());
    match descriptor.directive() {
        BuildDirective::TemplateId(id) => println!("  templateId: {id}"),
        BuildDirective::ImageName(image) => println!("  imageName: {image}"),
        BuildDirective::DockerfilePath(file) => println!("  dockerfilePath: {file}"),
        BuildDirective::DockerfileLines(lines) => {
            println!("  dockerfileLines: {} line(s)", lines.len())
        }
    }
    Ok(())
}
