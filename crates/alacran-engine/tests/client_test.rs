use std::path::{Path, PathBuf};

use alacran_core::{BuildLog, EnvVar};
use alacran_engine::client::{DockerClient, ImageEngine};
use alacran_engine::docker::DockerError;
use alacran_engine::executor::DockerExecutor;
use alacran_engine::registry::{RegistryAuth, RegistryCredentials};
use mockall::mock;
use secrecy::SecretString;

mock! {
    Executor {}

    impl DockerExecutor for Executor {
        async fn exec(&self, args: &[String]) -> Result<String, DockerError>;
        async fn exec_streaming(&self, args: &[String], log: &BuildLog) -> Result<(), DockerError>;
        async fn exec_streaming_from_file(
            &self,
            args: &[String],
            input: &Path,
            log: &BuildLog,
        ) -> Result<(), DockerError>;
        async fn exec_with_stdin(
            &self,
            args: &[String],
            stdin_data: &[u8],
        ) -> Result<String, DockerError>;
    }
}

fn auth(server: &str) -> RegistryAuth {
    RegistryAuth {
        server: server.to_owned(),
        username: "alacran".to_owned(),
        password: SecretString::from("s3cret".to_owned()),
    }
}

fn is(args: &[String], expected: &[&str]) -> bool {
    args.iter().map(String::as_str).eq(expected.iter().copied())
}

// ── Pull ──

#[tokio::test]
async fn pull_without_auth_skips_login() {
    let mut mock = MockExecutor::new();

    mock.expect_exec_with_stdin().never();
    mock.expect_exec()
        .withf(|args| is(args, &["pull", "--quiet", "nginx:1.27"]))
        .times(1)
        .returning(|_| Ok("docker.io/library/nginx:1.27\n".to_owned()));

    let client = DockerClient::with_executor(mock);
    client.pull_image("nginx:1.27", None).await.unwrap();
}

#[tokio::test]
async fn pull_with_auth_logs_in_via_stdin() {
    let mut mock = MockExecutor::new();

    mock.expect_exec_with_stdin()
        .withf(|args, stdin| {
            is(
                args,
                &[
                    "login",
                    "--username",
                    "alacran",
                    "--password-stdin",
                    "registry.example.com",
                ],
            ) && stdin.iter().eq(b"s3cret".iter())
        })
        .times(1)
        .returning(|_, _| Ok("Login Succeeded\n".to_owned()));
    mock.expect_exec()
        .withf(|args| args.contains(&"pull".to_owned()))
        .times(1)
        .returning(|_| Ok(String::new()));

    let client = DockerClient::with_executor(mock);
    client
        .pull_image(
            "registry.example.com/team/app:3",
            Some(auth("registry.example.com")),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn pull_failure_is_reported() {
    let mut mock = MockExecutor::new();

    mock.expect_exec().returning(|_| {
        Err(DockerError::CommandFailed {
            command: "pull".to_owned(),
            stderr: "manifest unknown".to_owned(),
        })
    });

    let client = DockerClient::with_executor(mock);
    let result = client.pull_image("nope:latest", None).await;

    assert!(matches!(
        result,
        Err(DockerError::CommandFailed { ref stderr, .. }) if stderr == "manifest unknown"
    ));
}

// ── Build ──

#[tokio::test]
async fn build_streams_tar_context_with_build_args() {
    let mut mock = MockExecutor::new();

    mock.expect_exec_streaming_from_file()
        .withf(|args, input, _log| {
            is(
                args,
                &[
                    "build",
                    "--tag",
                    "img-alacran-web:7",
                    "--build-arg",
                    "ALACRITY_GIT_COMMIT_SHA=abc123",
                    "--build-arg",
                    "MODE=prod",
                    "-",
                ],
            ) && input.ends_with("work/image.tar")
        })
        .times(1)
        .returning(|_, _, log| {
            log.append("Step 1/1 : FROM scratch");
            Ok(())
        });

    let client = DockerClient::with_executor(mock);
    let log = BuildLog::new(10);
    let env = vec![
        EnvVar::new("ALACRITY_GIT_COMMIT_SHA", "abc123"),
        EnvVar::new("MODE", "prod"),
    ];

    client
        .build_image(
            "img-alacran-web",
            7,
            &PathBuf::from("/tmp/work/image.tar"),
            &log,
            &env,
            &RegistryCredentials::default(),
        )
        .await
        .unwrap();

    assert_eq!(log.snapshot(), vec!["Step 1/1 : FROM scratch"]);
}

#[tokio::test]
async fn build_logs_into_every_configured_registry_first() {
    let mut mock = MockExecutor::new();
    let mut seq = mockall::Sequence::new();

    mock.expect_exec_with_stdin()
        .withf(|args, _| args.last().map(String::as_str) == Some("a.example.com"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(String::new()));
    mock.expect_exec_with_stdin()
        .withf(|args, _| args.last().map(String::as_str) == Some("b.example.com"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(String::new()));
    mock.expect_exec_streaming_from_file()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(()));

    let client = DockerClient::with_executor(mock);
    let creds = RegistryCredentials {
        auths: vec![auth("a.example.com"), auth("b.example.com")],
    };

    client
        .build_image(
            "img-alacran-web",
            1,
            Path::new("/tmp/image.tar"),
            &BuildLog::new(10),
            &[],
            &creds,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn build_failure_propagates() {
    let mut mock = MockExecutor::new();

    mock.expect_exec_streaming_from_file().returning(|_, _, _| {
        Err(DockerError::CommandFailed {
            command: "build".to_owned(),
            stderr: "unknown instruction: RUNN".to_owned(),
        })
    });

    let client = DockerClient::with_executor(mock);
    let result = client
        .build_image(
            "img-alacran-web",
            1,
            Path::new("/tmp/image.tar"),
            &BuildLog::new(10),
            &[],
            &RegistryCredentials::default(),
        )
        .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("unknown instruction: RUNN"));
}

// ── Retag and push ──

#[tokio::test]
async fn retag_and_push_tags_logs_in_then_pushes() {
    let mut mock = MockExecutor::new();
    let mut seq = mockall::Sequence::new();

    mock.expect_exec()
        .withf(|args| {
            is(
                args,
                &[
                    "tag",
                    "img-alacran-web:2",
                    "r.example.com/team/img-alacran-web:2",
                ],
            )
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(String::new()));
    mock.expect_exec_with_stdin()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(String::new()));
    mock.expect_exec_streaming()
        .withf(|args, _| is(args, &["push", "r.example.com/team/img-alacran-web:2"]))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let client = DockerClient::with_executor(mock);
    let log = BuildLog::new(10);

    client
        .retag_and_push(
            "img-alacran-web:2",
            "r.example.com/team/img-alacran-web:2",
            &auth("r.example.com"),
            &log,
        )
        .await
        .unwrap();

    let lines = log.snapshot();
    assert!(lines[0].starts_with("Retagging img-alacran-web:2"));
    assert!(lines[1].starts_with("Pushing r.example.com/team/img-alacran-web:2"));
}

#[tokio::test]
async fn failed_tag_stops_before_push() {
    let mut mock = MockExecutor::new();

    mock.expect_exec().returning(|_| {
        Err(DockerError::CommandFailed {
            command: "tag".to_owned(),
            stderr: "No such image".to_owned(),
        })
    });
    mock.expect_exec_streaming().never();

    let client = DockerClient::with_executor(mock);
    let result = client
        .retag_and_push("a:1", "r/a:1", &auth("r"), &BuildLog::new(10))
        .await;

    assert!(result.is_err());
}

// ── Inspection ──

#[tokio::test]
async fn version_is_trimmed() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .returning(|_| Ok("27.3.1\n".to_owned()));

    let client = DockerClient::with_executor(mock);

    assert_eq!(client.version().await.unwrap(), "27.3.1");
}
