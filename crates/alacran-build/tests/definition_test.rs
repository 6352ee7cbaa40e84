use std::path::Path;

use alacran_build::definition::{self, DefinitionError};
use alacran_build::BuildDirective;
use tempfile::TempDir;

const DEFINITION: &str = "./alacran-definition";

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn parse(content: &str) -> Result<alacran_build::BuildDescriptor, DefinitionError> {
    definition::parse(content, Path::new("alacran-definition"))
}

// ── Locate ──

#[test]
fn locate_prefers_root() {
    let tmp = TempDir::new().unwrap();
    write(&tmp.path().join("alacran-definition"), "{}");

    let found = definition::locate(tmp.path(), DEFINITION).unwrap();
    assert_eq!(found, tmp.path().join("alacran-definition"));
}

#[test]
fn locate_descends_into_single_child() {
    let tmp = TempDir::new().unwrap();
    let child = tmp.path().join("my-app-main");
    write(
        &child.join("alacran-definition"),
        r#"{"schemaVersion":2,"imageName":"nginx:1.27"}"#,
    );

    let found = definition::locate(tmp.path(), DEFINITION).unwrap();
    assert_eq!(found, child.join("alacran-definition"));
}

#[test]
fn locate_fails_with_two_children() {
    let tmp = TempDir::new().unwrap();
    write(&tmp.path().join("a/alacran-definition"), "{}");
    write(&tmp.path().join("b/alacran-definition"), "{}");

    let result = definition::locate(tmp.path(), DEFINITION);
    assert!(matches!(result, Err(DefinitionError::NotFound { .. })));
}

#[test]
fn locate_does_not_descend_into_single_file() {
    let tmp = TempDir::new().unwrap();
    write(&tmp.path().join("README.md"), "# hello");

    let result = definition::locate(tmp.path(), DEFINITION);
    assert!(matches!(result, Err(DefinitionError::NotFound { .. })));
}

#[test]
fn locate_never_goes_two_levels_deep() {
    let tmp = TempDir::new().unwrap();
    write(&tmp.path().join("outer/inner/alacran-definition"), "{}");

    let result = definition::locate(tmp.path(), DEFINITION);
    assert!(matches!(result, Err(DefinitionError::NotFound { .. })));
}

#[test]
fn bare_dockerfile_gets_default_definition() {
    let tmp = TempDir::new().unwrap();
    write(&tmp.path().join("Dockerfile"), "FROM scratch");

    let found = definition::locate(tmp.path(), DEFINITION).unwrap();
    assert_eq!(found, tmp.path().join("alacran-definition"));

    let descriptor = definition::load(&found).unwrap();
    assert_eq!(descriptor.schema_version(), 2);
    assert_eq!(
        descriptor.directive(),
        &BuildDirective::DockerfilePath("./Dockerfile".to_owned())
    );
}

#[test]
fn bare_dockerfile_in_single_child() {
    let tmp = TempDir::new().unwrap();
    write(&tmp.path().join("repo-main/Dockerfile"), "FROM scratch");

    let found = definition::locate(tmp.path(), DEFINITION).unwrap();
    assert_eq!(found, tmp.path().join("repo-main/alacran-definition"));
    assert!(found.is_file());
}

#[test]
fn find_reports_bare_dockerfile_without_writing() {
    let tmp = TempDir::new().unwrap();
    write(&tmp.path().join("Dockerfile"), "FROM scratch");

    let found = definition::find(tmp.path(), DEFINITION).unwrap();
    assert!(found.bare_dockerfile);
    assert_eq!(found.path, tmp.path().join("alacran-definition"));
    assert!(!found.path.exists());

    let (_, descriptor) = definition::resolve(tmp.path(), DEFINITION).unwrap();
    assert_eq!(descriptor, definition::default_descriptor());
    assert!(!found.path.exists());
}

#[cfg(unix)]
#[test]
fn dangling_definition_symlink_is_not_followed() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("src");
    let outside = tmp.path().join("outside.json");
    write(&root.join("Dockerfile"), "FROM scratch");
    std::os::unix::fs::symlink(&outside, root.join("alacran-definition")).unwrap();

    let result = definition::locate(&root, DEFINITION);
    assert!(matches!(result, Err(DefinitionError::Symlink { .. })));
    assert!(!outside.exists());
}

#[cfg(unix)]
#[test]
fn symlinked_single_child_is_not_descended_into() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("src");
    let outside = tmp.path().join("outside");
    write(&outside.join("Dockerfile"), "FROM scratch");
    std::fs::create_dir_all(&root).unwrap();
    std::os::unix::fs::symlink(&outside, root.join("app")).unwrap();

    let result = definition::locate(&root, DEFINITION);
    assert!(matches!(result, Err(DefinitionError::NotFound { .. })));
    assert!(!outside.join("alacran-definition").exists());
}

// ── Validate ──

#[test]
fn accepts_each_directive_alone() {
    let cases = [
        (r#"{"schemaVersion":2,"templateId":"node/20"}"#, "templateId"),
        (r#"{"schemaVersion":2,"imageName":"nginx:1.27"}"#, "imageName"),
        (
            r#"{"schemaVersion":2,"dockerfilePath":"./Dockerfile"}"#,
            "dockerfilePath",
        ),
        (
            r#"{"schemaVersion":2,"dockerfileLines":["FROM scratch"]}"#,
            "dockerfileLines",
        ),
    ];

    for (content, name) in cases {
        let descriptor = parse(content).unwrap();
        assert_eq!(descriptor.directive().name(), name);
    }
}

#[test]
fn rejects_no_directive() {
    let result = parse(r#"{"schemaVersion":2}"#);
    assert!(matches!(
        result,
        Err(DefinitionError::Ambiguous { populated: 0 })
    ));
}

#[test]
fn rejects_two_directives() {
    let result = parse(r#"{"schemaVersion":2,"imageName":"nginx","dockerfileLines":["FROM x"]}"#);
    assert!(matches!(
        result,
        Err(DefinitionError::Ambiguous { populated: 2 })
    ));
}

#[test]
fn empty_values_do_not_count_as_directives() {
    let descriptor =
        parse(r#"{"schemaVersion":2,"imageName":"","dockerfileLines":[],"templateId":"go/1.22"}"#)
            .unwrap();
    assert_eq!(
        descriptor.directive(),
        &BuildDirective::TemplateId("go/1.22".to_owned())
    );
}

#[test]
fn rejects_empty_content() {
    assert!(matches!(parse(""), Err(DefinitionError::Empty { .. })));
    assert!(matches!(parse("  \n"), Err(DefinitionError::Empty { .. })));
    assert!(matches!(parse("null"), Err(DefinitionError::Empty { .. })));
}

#[test]
fn rejects_missing_and_unsupported_versions() {
    assert!(matches!(
        parse(r#"{"imageName":"nginx"}"#),
        Err(DefinitionError::VersionMissing)
    ));
    assert!(matches!(
        parse(r#"{"schemaVersion":0,"imageName":"nginx"}"#),
        Err(DefinitionError::VersionMissing)
    ));

    let err = parse(r#"{"schemaVersion":1,"imageName":"nginx"}"#).unwrap_err();
    assert!(matches!(err, DefinitionError::VersionUnsupported { .. }));
    assert!(err.to_string().contains("schemaVersion 2"));
}

#[test]
fn accepts_float_version_two() {
    let descriptor = parse(r#"{"schemaVersion":2.0,"imageName":"nginx"}"#).unwrap();
    assert_eq!(descriptor.schema_version(), 2);
    assert!(matches!(
        parse(r#"{"schemaVersion":2.5,"imageName":"nginx"}"#),
        Err(DefinitionError::VersionUnsupported { .. })
    ));
}

#[test]
fn version_is_checked_before_directives() {
    let result = parse(r#"{"schemaVersion":1}"#);
    assert!(matches!(
        result,
        Err(DefinitionError::VersionUnsupported { .. })
    ));
}

#[test]
fn rejects_invalid_json() {
    assert!(matches!(
        parse("{schemaVersion: 2"),
        Err(DefinitionError::Parse { .. })
    ));
}
