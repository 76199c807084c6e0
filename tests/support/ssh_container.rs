// ABOUTME: SSH container helper for integration tests.
// ABOUTME: Starts one OpenSSH server per test process through bollard and removes it on exit.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use bollard::Docker;
use bollard::models::{ContainerCreateBody, HostConfig, PortBinding};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, RemoveContainerOptions, StartContainerOptions,
};
use futures::StreamExt;
use pasang::ssh::{Auth, SessionConfig};
use tokio::io::AsyncReadExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const IMAGE: &str = "lscr.io/linuxserver/openssh-server:latest";
/// Port sshd listens on inside the image.
const SSH_PORT: u16 = 2222;
const TEST_USER: &str = "testuser";
const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Id of the started container, removed when the test binary exits.
static CONTAINER_ID: OnceLock<String> = OnceLock::new();

#[ctor::dtor]
fn remove_container_on_exit() {
    let Some(id) = CONTAINER_ID.get() else {
        return;
    };
    let Ok(rt) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return;
    };
    rt.block_on(async {
        let Ok(docker) = Docker::connect_with_local_defaults() else {
            return;
        };
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        let _ = docker.remove_container(id, Some(options)).await;
    });
}

static SHARED: tokio::sync::OnceCell<SshContainer> = tokio::sync::OnceCell::const_new();

/// The process-wide SSH container, started on first use.
pub async fn shared_container() -> &'static SshContainer {
    SHARED
        .get_or_init(|| async {
            SshContainer::start()
                .await
                .expect("failed to start SSH container")
        })
        .await
}

/// A running sshd reachable on 127.0.0.1 with key auth for `testuser`.
pub struct SshContainer {
    port: u16,
}

impl SshContainer {
    async fn start() -> Result<Self, BoxError> {
        let docker = Docker::connect_with_local_defaults()?;
        let public_key = std::fs::read_to_string(format!("{}.pub", Self::test_key_path()))?;

        pull(&docker).await?;

        let port = free_port().await?;
        let options = CreateContainerOptions {
            name: Some(format!("pasang-ssh-test-{}", std::process::id())),
            ..Default::default()
        };
        let created = docker
            .create_container(Some(options), container_body(port, public_key.trim()))
            .await?;
        let _ = CONTAINER_ID.set(created.id.clone());

        docker
            .start_container(&created.id, None::<StartContainerOptions>)
            .await?;
        wait_for_banner(port).await?;

        Ok(Self { port })
    }

    /// Session settings that trust the container on first use.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new("127.0.0.1", TEST_USER, Self::key_auth())
            .port(self.port)
            .trust_on_first_use(true)
            .known_hosts_path(self.known_hosts_path())
    }

    /// Destination string for a directory under the test user's home.
    pub fn destination(&self, path: &str) -> String {
        format!("{}@127.0.0.1:{}:{}", TEST_USER, self.port, path)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Known hosts file private to this test process.
    pub fn known_hosts_path(&self) -> String {
        std::env::temp_dir()
            .join(format!("pasang-known-hosts-{}", std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    pub fn key_auth() -> Auth {
        Auth::KeyFile {
            path: Self::test_key_path().into(),
            passphrase: None,
        }
    }

    pub fn test_key_path() -> String {
        format!("{}/tests/fixtures/test_key", env!("CARGO_MANIFEST_DIR"))
    }
}

async fn pull(docker: &Docker) -> Result<(), BoxError> {
    let options = CreateImageOptions {
        from_image: Some(IMAGE.to_string()),
        ..Default::default()
    };
    let mut progress = docker.create_image(Some(options), None, None);
    while let Some(step) = progress.next().await {
        step?;
    }
    Ok(())
}

fn container_body(host_port: u16, public_key: &str) -> ContainerCreateBody {
    let binding = PortBinding {
        host_ip: Some("127.0.0.1".to_string()),
        host_port: Some(host_port.to_string()),
    };
    let port_bindings = HashMap::from([(format!("{SSH_PORT}/tcp"), Some(vec![binding]))]);

    ContainerCreateBody {
        image: Some(IMAGE.to_string()),
        env: Some(vec![
            "PUID=1000".to_string(),
            "PGID=1000".to_string(),
            format!("USER_NAME={TEST_USER}"),
            format!("PUBLIC_KEY={public_key}"),
        ]),
        host_config: Some(HostConfig {
            port_bindings: Some(port_bindings),
            ..Default::default()
        }),
        ..Default::default()
    }
}

async fn free_port() -> Result<u16, BoxError> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?.port())
}

/// Poll until sshd answers with its version banner.
async fn wait_for_banner(port: u16) -> Result<(), BoxError> {
    let deadline = Instant::now() + READY_TIMEOUT;
    while Instant::now() < deadline {
        if let Ok(mut stream) = tokio::net::TcpStream::connect(("127.0.0.1", port)).await {
            let mut buf = [0u8; 8];
            let read = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf)).await;
            if let Ok(Ok(n)) = read
                && buf[..n].starts_with(b"SSH-")
            {
                // sshd accepts before user setup finishes
                tokio::time::sleep(Duration::from_millis(500)).await;
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Err("SSH container did not become ready in time".into())
}
