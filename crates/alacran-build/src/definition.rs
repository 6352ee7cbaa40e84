use std::path::{Component, Path, PathBuf};

use alacran_core::SCHEMA_VERSION;
use serde::{Deserialize, Serialize};

const DOCKERFILE: &str = "Dockerfile";

/// A validated alacran-definition.
///
/// Only [`load`] and [`default_descriptor`] construct one, so holding a
/// `BuildDescriptor` means the schema version is supported and exactly one
/// directive is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDescriptor {
    schema_version: u32,
    directive: BuildDirective,
}

/// How the image of a descriptor is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildDirective {
    /// Built-in template, `<language>/<version>`.
    TemplateId(String),
    /// Pre-built image; pulled, never rebuilt.
    ImageName(String),
    /// Dockerfile inside the source tree, relative to the definition.
    DockerfilePath(String),
    /// Literal Dockerfile lines.
    DockerfileLines(Vec<String>),
}

impl BuildDescriptor {
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn directive(&self) -> &BuildDirective {
        &self.directive
    }

    /// The pre-built image to pull, when the descriptor names one.
    pub fn image_name(&self) -> Option<&str> {
        match &self.directive {
            BuildDirective::ImageName(name) => Some(name),
            _ => None,
        }
    }
}

impl BuildDirective {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TemplateId(_) => "templateId",
            Self::ImageName(_) => "imageName",
            Self::DockerfilePath(_) => "dockerfilePath",
            Self::DockerfileLines(_) => "dockerfileLines",
        }
    }
}

/// On-disk shape of an alacran-definition, before validation.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema_version: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dockerfile_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dockerfile_lines: Option<Vec<String>>,
}

/// Normalizes a configured definition path (e.g. `./alacran-definition`)
/// into a path relative to the source root.
pub fn relative_definition_path(definition_path: &str) -> PathBuf {
    Path::new(definition_path)
        .components()
        .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
        .collect()
}

/// Where an alacran-definition was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    /// Path of the definition, which does not exist yet when only a bare
    /// `Dockerfile` was found.
    pub path: PathBuf,
    pub bare_dockerfile: bool,
}

/// Finds the alacran-definition inside an ingested source tree.
///
/// Checks `root_dir` first, falling back to a bare `Dockerfile` for which a
/// minimal definition is written. Archives that wrap the project in a single
/// top-level directory are handled by descending into that one child; the
/// search never goes deeper.
pub fn locate(root_dir: &Path, definition_path: &str) -> Result<PathBuf, DefinitionError> {
    let found = find(root_dir, definition_path)?;
    if found.bare_dockerfile {
        write_default(&found.path)?;
    }
    Ok(found.path)
}

/// [`locate`] without writing anything.
///
/// Symlinks are never followed: a symlinked child directory is not descended
/// into, and a definition path running through a symlink is rejected.
pub fn find(root_dir: &Path, definition_path: &str) -> Result<Located, DefinitionError> {
    let relative = relative_definition_path(definition_path);

    if let Some(found) = inspect_dir(root_dir, &relative)? {
        return Ok(found);
    }

    let children = list_children(root_dir)?;
    if let [only_child] = children.as_slice() {
        if is_real_dir(only_child) {
            if let Some(found) = inspect_dir(only_child, &relative)? {
                tracing::debug!(dir = %only_child.display(), "alacran-definition found one level down");
                return Ok(found);
            }
        }
    }

    Err(DefinitionError::NotFound {
        root: root_dir.to_path_buf(),
    })
}

/// The descriptor written for a bare `Dockerfile`.
pub fn default_descriptor() -> BuildDescriptor {
    BuildDescriptor {
        schema_version: SCHEMA_VERSION,
        directive: BuildDirective::DockerfilePath(format!("./{DOCKERFILE}")),
    }
}

/// Finds and loads the descriptor without writing anything, using
/// [`default_descriptor`] for a bare `Dockerfile`.
pub fn resolve(
    root_dir: &Path,
    definition_path: &str,
) -> Result<(Located, BuildDescriptor), DefinitionError> {
    let found = find(root_dir, definition_path)?;
    let descriptor = if found.bare_dockerfile {
        default_descriptor()
    } else {
        load(&found.path)?
    };
    Ok((found, descriptor))
}

fn inspect_dir(dir: &Path, relative: &Path) -> Result<Option<Located>, DefinitionError> {
    reject_symlinks(dir, relative)?;

    let definition = dir.join(relative);
    if definition.is_file() {
        return Ok(Some(Located {
            path: definition,
            bare_dockerfile: false,
        }));
    }
    if dir.join(DOCKERFILE).is_file() {
        return Ok(Some(Located {
            path: definition,
            bare_dockerfile: true,
        }));
    }
    Ok(None)
}

fn is_real_dir(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|m| m.is_dir())
}

fn reject_symlinks(dir: &Path, relative: &Path) -> Result<(), DefinitionError> {
    let mut current = dir.to_path_buf();
    for component in relative.components() {
        current.push(component);
        if current.is_symlink() {
            return Err(DefinitionError::Symlink { path: current });
        }
    }
    Ok(())
}

fn write_default(definition: &Path) -> Result<(), DefinitionError> {
    let default = RawDefinition {
        schema_version: Some(serde_json::Value::from(SCHEMA_VERSION)),
        dockerfile_path: Some(format!("./{DOCKERFILE}")),
        ..RawDefinition::default()
    };
    let content = serde_json::to_string(&default).map_err(|e| DefinitionError::Serialize {
        path: definition.to_path_buf(),
        source: e,
    })?;
    if let Some(parent) = definition.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DefinitionError::WriteDefault {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(definition, content).map_err(|e| DefinitionError::WriteDefault {
        path: definition.to_path_buf(),
        source: e,
    })?;

    tracing::debug!(path = %definition.display(), "bare Dockerfile found; wrote default alacran-definition");
    Ok(())
}

fn list_children(dir: &Path) -> Result<Vec<PathBuf>, DefinitionError> {
    let entries = std::fs::read_dir(dir).map_err(|e| DefinitionError::ReadDir {
        path: dir.to_path_buf(),
        source: e,
    })?;

    entries
        .map(|entry| {
            entry.map(|e| e.path()).map_err(|e| DefinitionError::ReadDir {
                path: dir.to_path_buf(),
                source: e,
            })
        })
        .collect()
}

/// Reads and validates the alacran-definition at `path`.
pub fn load(path: &Path) -> Result<BuildDescriptor, DefinitionError> {
    let content = std::fs::read_to_string(path).map_err(|e| DefinitionError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse(&content, path)
}

/// Validates alacran-definition `content`; `path` is only used in errors.
pub fn parse(content: &str, path: &Path) -> Result<BuildDescriptor, DefinitionError> {
    let empty = || DefinitionError::Empty {
        path: path.to_path_buf(),
    };

    if content.trim().is_empty() {
        return Err(empty());
    }
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| DefinitionError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
    if value.is_null() {
        return Err(empty());
    }
    let raw: RawDefinition = serde_json::from_value(value).map_err(|e| DefinitionError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    let schema_version = check_schema_version(raw.schema_version.as_ref())?;

    let mut directives = Vec::with_capacity(1);
    if let Some(id) = raw.template_id.filter(|s| !s.is_empty()) {
        directives.push(BuildDirective::TemplateId(id));
    }
    if let Some(name) = raw.image_name.filter(|s| !s.is_empty()) {
        directives.push(BuildDirective::ImageName(name));
    }
    if let Some(dockerfile) = raw.dockerfile_path.filter(|s| !s.is_empty()) {
        directives.push(BuildDirective::DockerfilePath(dockerfile));
    }
    if let Some(lines) = raw.dockerfile_lines.filter(|l| !l.is_empty()) {
        directives.push(BuildDirective::DockerfileLines(lines));
    }

    if directives.len() != 1 {
        return Err(DefinitionError::Ambiguous {
            populated: directives.len(),
        });
    }
    let directive = directives.remove(0);

    Ok(BuildDescriptor {
        schema_version,
        directive,
    })
}

fn check_schema_version(value: Option<&serde_json::Value>) -> Result<u32, DefinitionError> {
    use serde_json::Value;

    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Err(DefinitionError::VersionMissing),
        Some(Value::String(s)) if s.is_empty() => Err(DefinitionError::VersionMissing),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Err(DefinitionError::VersionMissing),
        Some(Value::Number(n)) if n.as_f64() == Some(f64::from(SCHEMA_VERSION)) => Ok(SCHEMA_VERSION),
        Some(other) => Err(DefinitionError::VersionUnsupported {
            found: other.to_string(),
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("alacran-definition file does not exist in {root}")]
    NotFound { root: PathBuf },

    #[error("alacran-definition path runs through a symlink: {path}")]
    Symlink { path: PathBuf },

    #[error("failed to read directory {path}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write default alacran-definition at {path}")]
    WriteDefault {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize alacran-definition for {path}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to read alacran-definition at {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("alacran-definition at {path} is not valid JSON")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("alacran-definition file is empty: {path}")]
    Empty { path: PathBuf },

    #[error("alacran-definition schemaVersion is empty")]
    VersionMissing,

    #[error(
        "alacran-definition schemaVersion {found} is not supported; migrate to schemaVersion {}",
        SCHEMA_VERSION
    )]
    VersionUnsupported { found: String },

    #[error(
        "one, and only one, of these properties should be present in alacran-definition: \
         templateId, imageName, dockerfilePath, or dockerfileLines (found {populated})"
    )]
    Ambiguous { populated: usize },
}
