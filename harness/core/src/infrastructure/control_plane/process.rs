// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local Control Plane
//!
//! Runs etcd and kube-apiserver as child processes on ephemeral loopback
//! ports, the same way envtest does. Each start gets a fresh temporary data
//! directory holding etcd's data, the API server's generated certificates,
//! a static token file, a freshly generated service account signing key and
//! both processes' logs.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** `ControlPlane` backed by real binaries

use async_trait::async_trait;
use rand_core::OsRng;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::assets::{default_cache_root, BinaryAssets};
use crate::domain::config::ControlPlaneSettings;
use crate::domain::control_plane::{ConnectionInfo, ControlPlane, ControlPlaneError};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const TOKEN_FILE: &str = "token.csv";
const SA_PRIVATE_KEY_FILE: &str = "sa.key";
const SA_PUBLIC_KEY_FILE: &str = "sa.pub";
const SA_KEY_BITS: usize = 2048;

pub struct LocalControlPlane {
    settings: ControlPlaneSettings,
    cache_root: PathBuf,
    running: Option<RunningPlane>,
}

struct RunningPlane {
    etcd: Option<Child>,
    api_server: Option<Child>,
    connection: ConnectionInfo,
    // Removed on drop, after both processes are gone
    data_dir: TempDir,
}

impl LocalControlPlane {
    /// Binaries are located on `start`, so a missing install surfaces as a
    /// start failure. Construction only fails when there is no home
    /// directory to hold the binary cache.
    pub fn new(settings: ControlPlaneSettings) -> Result<Self, ControlPlaneError> {
        let cache_root = default_cache_root().ok_or_else(|| {
            ControlPlaneError::AssetsUnavailable(
                "cannot determine home directory for the control plane binary cache".to_string(),
            )
        })?;
        Ok(Self::with_cache_root(settings, cache_root))
    }

    pub fn with_cache_root(settings: ControlPlaneSettings, cache_root: PathBuf) -> Self {
        Self {
            settings,
            cache_root,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn connection(&self) -> Option<&ConnectionInfo> {
        self.running.as_ref().map(|r| &r.connection)
    }

    async fn boot(&self, assets: &BinaryAssets, plane: &mut RunningPlane) -> Result<(), ControlPlaneError> {
        let dir = plane.data_dir.path().to_path_buf();
        let etcd_port = free_port()?;
        let etcd_peer_port = free_port()?;
        let api_port = free_port()?;
        let token = plane
            .connection
            .bearer_token
            .clone()
            .unwrap_or_default();

        std::fs::write(
            dir.join(TOKEN_FILE),
            format!("{token},admin,admin,system:masters\n"),
        )
        .map_err(|e| start_failed("kube-apiserver", format!("cannot write token file: {e}")))?;

        let etcd_url = format!("http://127.0.0.1:{etcd_port}");
        let mut etcd = Command::new(assets.etcd());
        etcd.arg(format!("--data-dir={}", dir.join("etcd").display()))
            .arg(format!("--listen-client-urls={etcd_url}"))
            .arg(format!("--advertise-client-urls={etcd_url}"))
            .arg(format!("--listen-peer-urls=http://127.0.0.1:{etcd_peer_port}"))
            .arg("--unsafe-no-fsync=true");
        plane.etcd = Some(spawn("etcd", etcd, &dir)?);
        debug!(port = etcd_port, "Spawned etcd");

        let health = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| start_failed("etcd", e.to_string()))?;
        self.wait_ready("etcd", &format!("{etcd_url}/health"), &health, None, &mut plane.etcd)
            .await?;

        let keys_dir = dir.clone();
        tokio::task::spawn_blocking(move || write_service_account_keys(&keys_dir, SA_KEY_BITS))
            .await
            .map_err(|e| start_failed("kube-apiserver", format!("key generation task failed: {e}")))??;

        let mut api_server = Command::new(assets.api_server());
        api_server.args(api_server_args(&self.settings, &etcd_url, &dir, api_port));
        plane.api_server = Some(spawn("kube-apiserver", api_server, &dir)?);
        debug!(port = api_port, "Spawned kube-apiserver");

        let readiness = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| start_failed("kube-apiserver", e.to_string()))?;
        let host = format!("https://127.0.0.1:{api_port}");
        self.wait_ready(
            "kube-apiserver",
            &format!("{host}/readyz"),
            &readiness,
            Some(&token),
            &mut plane.api_server,
        )
        .await?;

        plane.connection.host = host;
        Ok(())
    }

    /// Poll `url` until it answers 2xx, the process exits, or the start
    /// timeout passes.
    async fn wait_ready(
        &self,
        component: &str,
        url: &str,
        client: &reqwest::Client,
        token: Option<&str>,
        child: &mut Option<Child>,
    ) -> Result<(), ControlPlaneError> {
        let deadline = Instant::now() + self.settings.start_timeout;
        loop {
            if let Some(process) = child.as_mut() {
                if let Ok(Some(status)) = process.try_wait() {
                    return Err(start_failed(
                        component,
                        format!("process exited with {status}, see {component}.log in the data directory"),
                    ));
                }
            }

            let mut request = client.get(url);
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
            match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => debug!(component, status = %response.status(), "Not ready yet"),
                Err(e) => debug!(component, error = %e, "Not reachable yet"),
            }

            if Instant::now() >= deadline {
                return Err(ControlPlaneError::StartTimeout {
                    component: component.to_string(),
                    timeout: self.settings.start_timeout,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl ControlPlane for LocalControlPlane {
    async fn start(&mut self) -> Result<ConnectionInfo, ControlPlaneError> {
        if let Some(running) = &self.running {
            return Ok(running.connection.clone());
        }

        let assets = BinaryAssets::locate(
            self.settings.assets_dir.as_deref(),
            &self.cache_root,
            &self.settings.kubernetes_version,
        )?;
        let data_dir = tempfile::Builder::new()
            .prefix("tandem-envtest-")
            .tempdir()
            .map_err(|e| start_failed("control plane", format!("cannot create data directory: {e}")))?;

        let mut plane = RunningPlane {
            etcd: None,
            api_server: None,
            connection: ConnectionInfo {
                host: String::new(),
                bearer_token: Some(Uuid::new_v4().to_string()),
                insecure_skip_tls_verify: true,
            },
            data_dir,
        };

        if let Err(e) = self.boot(&assets, &mut plane).await {
            warn!(error = %e, "Control plane failed to start, cleaning up");
            if let Err(stop_err) = plane.stop(self.settings.stop_timeout).await {
                warn!(error = %stop_err, "Cleanup after failed start was incomplete");
            }
            return Err(e);
        }

        info!(host = %plane.connection.host, "Control plane started");
        let connection = plane.connection.clone();
        self.running = Some(plane);
        Ok(connection)
    }

    async fn stop(&mut self) -> Result<(), ControlPlaneError> {
        let Some(mut plane) = self.running.take() else {
            return Ok(());
        };
        plane.stop(self.settings.stop_timeout).await?;
        info!("Control plane stopped");
        Ok(())
    }
}

impl RunningPlane {
    /// Stop the API server, then etcd. Both are always attempted and the
    /// first failure is returned.
    async fn stop(&mut self, stop_timeout: Duration) -> Result<(), ControlPlaneError> {
        let api_server = stop_child("kube-apiserver", self.api_server.take(), stop_timeout).await;
        let etcd = stop_child("etcd", self.etcd.take(), stop_timeout).await;
        api_server.and(etcd)
    }
}

async fn stop_child(
    component: &str,
    child: Option<Child>,
    stop_timeout: Duration,
) -> Result<(), ControlPlaneError> {
    let Some(mut child) = child else {
        return Ok(());
    };
    let stop_failed = |reason: String| ControlPlaneError::StopFailed {
        component: component.to_string(),
        reason,
    };

    if let Err(e) = child.start_kill() {
        // Already exited
        if child.try_wait().ok().flatten().is_some() {
            return Ok(());
        }
        return Err(stop_failed(e.to_string()));
    }
    match timeout(stop_timeout, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(component, %status, "Process exited");
            Ok(())
        }
        Ok(Err(e)) => Err(stop_failed(e.to_string())),
        Err(_) => Err(stop_failed(format!("did not exit within {stop_timeout:?}"))),
    }
}

/// Command line for kube-apiserver. Extra args from the settings come last
/// so they override the defaults.
fn api_server_args(
    settings: &ControlPlaneSettings,
    etcd_url: &str,
    dir: &Path,
    api_port: u16,
) -> Vec<String> {
    let mut args = vec![
        format!("--etcd-servers={etcd_url}"),
        format!("--cert-dir={}", dir.join("certs").display()),
        format!("--secure-port={api_port}"),
        "--bind-address=127.0.0.1".to_string(),
        "--service-cluster-ip-range=10.0.0.0/24".to_string(),
        "--allow-privileged=true".to_string(),
        "--authorization-mode=RBAC".to_string(),
        format!("--token-auth-file={}", dir.join(TOKEN_FILE).display()),
        "--service-account-issuer=https://kubernetes.default.svc".to_string(),
        format!("--service-account-key-file={}", dir.join(SA_PUBLIC_KEY_FILE).display()),
        format!(
            "--service-account-signing-key-file={}",
            dir.join(SA_PRIVATE_KEY_FILE).display()
        ),
    ];
    args.extend(settings.extra_api_server_args.iter().cloned());
    args
}

/// Generate the RSA key pair kube-apiserver signs service account tokens with.
fn write_service_account_keys(dir: &Path, bits: usize) -> Result<(), ControlPlaneError> {
    let key_error = |e: String| start_failed("kube-apiserver", format!("cannot create service account key: {e}"));

    let private_key = RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| key_error(e.to_string()))?;
    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| key_error(e.to_string()))?;
    let public_pem = RsaPublicKey::from(&private_key)
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| key_error(e.to_string()))?;

    std::fs::write(dir.join(SA_PRIVATE_KEY_FILE), private_pem.as_bytes())
        .map_err(|e| key_error(e.to_string()))?;
    std::fs::write(dir.join(SA_PUBLIC_KEY_FILE), public_pem.as_bytes())
        .map_err(|e| key_error(e.to_string()))?;
    Ok(())
}

fn spawn(component: &str, mut command: Command, log_dir: &Path) -> Result<Child, ControlPlaneError> {
    let log = std::fs::File::create(log_dir.join(format!("{component}.log")))
        .map_err(|e| start_failed(component, format!("cannot create log file: {e}")))?;
    let log_err = log
        .try_clone()
        .map_err(|e| start_failed(component, format!("cannot create log file: {e}")))?;
    command
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| start_failed(component, e.to_string()))
}

/// Ask the OS for an unused loopback port. The listener is dropped before
/// the port is handed to a child, so another process could take it first.
fn free_port() -> Result<u16, ControlPlaneError> {
    std::net::TcpListener::bind(("127.0.0.1", 0))
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .map_err(|e| start_failed("control plane", format!("cannot allocate port: {e}")))
}

fn start_failed(component: &str, reason: impl Into<String>) -> ControlPlaneError {
    ControlPlaneError::StartFailed {
        component: component.to_string(),
        reason: reason.into(),
    }
}
