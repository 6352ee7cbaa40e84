use std::path::{Component, Path, PathBuf};

use crate::definition::{BuildDescriptor, BuildDirective};
use crate::template::{TemplateCatalog, TemplateError};

const DOCKERFILE: &str = "Dockerfile";

/// Turns a validated alacran-definition into the Dockerfile it builds with.
pub struct DockerfileGenerator<'a> {
    descriptor: &'a BuildDescriptor,
    templates: &'a TemplateCatalog,
}

impl<'a> DockerfileGenerator<'a> {
    pub fn new(descriptor: &'a BuildDescriptor, templates: &'a TemplateCatalog) -> Self {
        Self {
            descriptor,
            templates,
        }
    }

    /// Dockerfile body; `dockerfilePath` is resolved against `definition_dir`.
    pub fn render(&self, definition_dir: &Path) -> Result<String, SynthesisError> {
        match self.descriptor.directive() {
            BuildDirective::TemplateId(id) => Ok(self.templates.dockerfile_for(id)?),
            BuildDirective::DockerfileLines(lines) => Ok(lines.join("\n")),
            BuildDirective::DockerfilePath(relative) => {
                if escapes_directory(relative) {
                    return Err(SynthesisError::PathTraversal {
                        path: relative.clone(),
                    });
                }
                let path = contained_path(definition_dir, relative)?;
                std::fs::read_to_string(&path)
                    .map_err(|e| SynthesisError::ReadDockerfile { path, source: e })
            }
            BuildDirective::ImageName(image) => Err(SynthesisError::ImageNotRebuildable {
                image: image.clone(),
            }),
        }
    }

    /// Renders and writes `<definition_dir>/Dockerfile`, replacing any existing one.
    pub fn write(&self, definition_dir: &Path) -> Result<PathBuf, SynthesisError> {
        let content = self.render(definition_dir)?;
        let path = definition_dir.join(DOCKERFILE);
        if path.is_symlink() {
            std::fs::remove_file(&path).map_err(|e| SynthesisError::WriteDockerfile {
                path: path.clone(),
                source: e,
            })?;
        }
        std::fs::write(&path, content).map_err(|e| SynthesisError::WriteDockerfile {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

/// Resolves `relative` with symlinks followed, rejecting targets that land
/// outside `dir`.
fn contained_path(dir: &Path, relative: &str) -> Result<PathBuf, SynthesisError> {
    let canonical = |path: PathBuf| {
        path.canonicalize()
            .map_err(|e| SynthesisError::ReadDockerfile { path, source: e })
    };
    let root = canonical(dir.to_path_buf())?;
    let target = canonical(dir.join(relative))?;
    if !target.starts_with(&root) {
        return Err(SynthesisError::PathTraversal {
            path: relative.to_owned(),
        });
    }
    Ok(target)
}

/// True when `relative` could resolve outside the directory it is joined to.
fn escapes_directory(relative: &str) -> bool {
    if relative.starts_with("..") {
        return true;
    }

    let mut depth: usize = 0;
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return true,
            },
            Component::RootDir | Component::Prefix(_) => return true,
        }
    }
    false
}

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("dockerfilePath should not refer to parent directory: {path}")]
    PathTraversal { path: String },

    #[error("imageName {image} cannot be rebuilt")]
    ImageNotRebuildable { image: String },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("failed to read Dockerfile at {path}")]
    ReadDockerfile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write Dockerfile at {path}")]
    WriteDockerfile {
        path: PathBuf,
        source: std::io::Error,
    },
}
