//! TestServer - end-to-end test harness
//!
//! Runs the imaged `Server` in-process on a random port, writing images to
//! a temporary directory and talking to a provider base URL chosen by the
//! test.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use imaged::session::SessionStore;
use imaged::{Config, ProviderConfig, Server};
use reqwest::Client;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use super::client::TestClient;
use super::provider::{FakeProvider, TEST_API_KEY};

/// Test harness that runs a real imaged server on a random port
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
    /// Temp directory for generated images (cleaned up on drop)
    _temp_dir: TempDir,
    output_dir: PathBuf,
}

impl TestServer {
    /// Start a server backed by the fake provider
    pub async fn start(provider: &FakeProvider) -> Result<Self> {
        Self::start_with_provider_url(&provider.base_url()).await
    }

    /// Start a server pointed at an arbitrary provider base URL
    pub async fn start_with_provider_url(base_url: &str) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let output_dir = temp_dir.path().join("generated_images");

        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let config = Config {
            bind_addr: addr,
            output_dir: output_dir.clone(),
            api_key: Some(TEST_API_KEY.to_string()),
            provider: ProviderConfig {
                base_url: base_url.to_string(),
                timeout_secs: Some(10),
                ..ProviderConfig::default()
            },
            ..Config::default()
        };

        let server = Arc::new(Server::new(config).await?);
        let server_clone = server.clone();

        // Spawn the server in a background task
        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        // Poll until server is ready (max 5 seconds)
        let mut ready = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 5 seconds");
        }

        Ok(Self {
            addr,
            client,
            server,
            _handle: handle,
            _temp_dir: temp_dir,
            output_dir,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request without a session
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// A fresh browser with no session yet
    pub fn browser(&self) -> TestClient {
        TestClient::new(self.client.clone(), self.base_url())
    }

    /// Live sessions on the server
    pub fn sessions(&self) -> Arc<SessionStore> {
        self.server.sessions()
    }

    /// Directory generated images are written to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Names of the files currently in the output directory, sorted
    pub fn output_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.output_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Shutdown the server gracefully
    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}
