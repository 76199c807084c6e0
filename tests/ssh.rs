// ABOUTME: Integration tests for SSH module.
// ABOUTME: Tests run against a shared SSH container and need a docker daemon.

mod support;

use pasang::ssh::{Auth, Error, Session, SessionConfig};
use std::time::Duration;
use support::ssh_container::{SshContainer, shared_container};

/// Test: Connect to SSH server and execute `echo hello`.
/// Expected: Returns "hello" with exit code 0.
#[tokio::test]
#[ignore = "requires docker"]
async fn connect_and_execute_echo() {
    let container = shared_container().await;
    let config = container.session_config();

    let session = Session::connect(config)
        .await
        .expect("connection should succeed");

    let output = session
        .exec("echo hello")
        .await
        .expect("command should succeed");

    assert!(output.success(), "exit code should be 0");
    assert_eq!(output.stdout.trim(), "hello");

    session
        .disconnect()
        .await
        .expect("disconnect should succeed");
}

/// Test: Execute command that writes to stderr.
/// Expected: stderr is captured separately and in the combined output.
#[tokio::test]
#[ignore = "requires docker"]
async fn capture_stderr() {
    let container = shared_container().await;
    let session = Session::connect(container.session_config())
        .await
        .expect("connection should succeed");

    let output = session
        .exec("echo out; echo error >&2")
        .await
        .expect("command should succeed");

    assert!(output.success());
    assert_eq!(output.stdout.trim(), "out");
    assert_eq!(output.stderr.trim(), "error");
    assert!(output.combined.contains("out"));
    assert!(output.combined.contains("error"));

    session
        .disconnect()
        .await
        .expect("disconnect should succeed");
}

/// Test: Execute command with non-zero exit code.
/// Expected: exit_code reflects the actual exit status.
#[tokio::test]
#[ignore = "requires docker"]
async fn nonzero_exit_code() {
    let container = shared_container().await;
    let session = Session::connect(container.session_config())
        .await
        .expect("connection should succeed");

    let output = session
        .exec("exit 42")
        .await
        .expect("command should complete");

    assert_eq!(output.exit_code, 42);
    assert!(!output.success());

    session
        .disconnect()
        .await
        .expect("disconnect should succeed");
}

/// Test: Connection to invalid host fails with connection error.
#[tokio::test]
async fn invalid_host_returns_connection_error() {
    let config = SessionConfig::new(
        "nonexistent.invalid.host.example",
        "testuser",
        Auth::Password("secret".to_string()),
    );

    let result = Session::connect(config).await;

    let err = result.unwrap_err();
    assert!(
        matches!(err, Error::Connection(_)),
        "expected Connection error, got: {:?}",
        err
    );
}

/// Test: A missing key file fails before any network traffic.
#[tokio::test]
async fn missing_key_returns_key_load_error() {
    let config = SessionConfig::new(
        "127.0.0.1",
        "testuser",
        Auth::KeyFile {
            path: "/nonexistent/key/path".into(),
            passphrase: None,
        },
    );

    let err = Session::connect(config).await.unwrap_err();
    assert!(
        matches!(err, Error::KeyLoadFailed { .. }),
        "expected KeyLoadFailed error, got: {:?}",
        err
    );
}

/// Test: An unknown host is refused when trust on first use is off.
#[tokio::test]
#[ignore = "requires docker"]
async fn unknown_host_is_rejected_by_default() {
    let container = shared_container().await;
    let known_hosts = tempfile::NamedTempFile::new().unwrap();

    let config = SessionConfig::new("127.0.0.1", "testuser", SshContainer::key_auth())
        .port(container.port())
        .known_hosts_path(known_hosts.path());

    let err = Session::connect(config).await.unwrap_err();
    assert!(
        matches!(err, Error::HostKeyRejected { .. }),
        "expected HostKeyRejected error, got: {:?}",
        err
    );
}

/// Test: A learned host key is accepted on the next strict connection.
#[tokio::test]
#[ignore = "requires docker"]
async fn learned_host_key_is_trusted_afterwards() {
    let container = shared_container().await;
    let known_hosts = tempfile::tempdir().unwrap();
    let path = known_hosts.path().join("known_hosts");

    let first = SessionConfig::new("127.0.0.1", "testuser", SshContainer::key_auth())
        .port(container.port())
        .known_hosts_path(&path)
        .trust_on_first_use(true);
    Session::connect(first)
        .await
        .expect("first connection should learn the key")
        .disconnect()
        .await
        .expect("disconnect should succeed");

    let strict = SessionConfig::new("127.0.0.1", "testuser", SshContainer::key_auth())
        .port(container.port())
        .known_hosts_path(&path);
    let session = Session::connect(strict)
        .await
        .expect("known host should be accepted");
    session.disconnect().await.expect("disconnect should succeed");
}

/// Test: Wrong password is an authentication failure.
#[tokio::test]
#[ignore = "requires docker"]
async fn wrong_password_returns_auth_error() {
    let container = shared_container().await;
    let mut config = container.session_config();
    config.auth = Auth::Password("not-the-password".to_string());

    let err = Session::connect(config).await.unwrap_err();
    assert!(
        matches!(err, Error::AuthenticationFailed(ref user) if user == "testuser"),
        "expected AuthenticationFailed error, got: {:?}",
        err
    );
}

/// Test: Command times out when execution exceeds timeout.
#[tokio::test]
#[ignore = "requires docker"]
async fn command_timeout_returns_error() {
    let container = shared_container().await;
    let session = Session::connect(container.session_config())
        .await
        .expect("connection should succeed");

    let result = session
        .exec_with_timeout("sleep 10", Duration::from_millis(100))
        .await;

    let err = result.unwrap_err();
    assert!(
        matches!(err, Error::CommandTimeout(_)),
        "expected CommandTimeout error, got: {:?}",
        err
    );

    session
        .disconnect()
        .await
        .expect("disconnect should succeed");
}

/// Test: The SFTP subsystem opens on an authenticated session.
#[tokio::test]
#[ignore = "requires docker"]
async fn sftp_subsystem_opens() {
    let container = shared_container().await;
    let session = Session::connect(container.session_config())
        .await
        .expect("connection should succeed");

    let sftp = session.sftp().await.expect("sftp should open");
    assert!(sftp.try_exists("/etc/passwd").await.unwrap());
    sftp.close().await.unwrap();

    session
        .disconnect()
        .await
        .expect("disconnect should succeed");
}
