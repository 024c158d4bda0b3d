//! imaged - prompt-to-image web form daemon
//!
//! Serves a single-page form that sends a prompt to a hosted image
//! generation API, stores the returned image on disk, and keeps a
//! per-session history of generations.

pub mod api;
pub mod config;
pub mod images;
pub mod provider;
pub mod session;
pub mod ui;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub use config::{Config, ProviderConfig};

use api::AppState;
use images::ImageStore;
use provider::ImageClient;
use session::SessionStore;
use ui::Pages;

/// How often idle sessions are swept
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// The imaged server instance
pub struct Server {
    config: Config,
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance.
    ///
    /// Fails without an API key. Creates the output directory if absent.
    pub async fn new(config: Config) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();

        let images = ImageStore::open(&config.output_dir)
            .await
            .with_context(|| {
                format!(
                    "failed to create output directory {}",
                    config.output_dir.display()
                )
            })?;
        let client = ImageClient::new(config.provider.clone(), Some(api_key))?;
        let pages = Pages::new()?;

        let state = AppState {
            sessions: Arc::new(SessionStore::new()),
            images: Arc::new(images),
            client: Arc::new(client),
            pages: Arc::new(pages),
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            state,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Live sessions
    pub fn sessions(&self) -> Arc<SessionStore> {
        self.state.sessions.clone()
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("imaged listening on {}", local_addr);
        info!("Saving images to {}", self.state.images.dir().display());

        let sweeper = tokio::spawn(sweep_idle_sessions(
            self.state.sessions.clone(),
            self.config.session_idle(),
            self.shutdown_rx.clone(),
        ));

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        sweeper.abort();
        info!("imaged shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

/// Discard sessions nobody has touched for `max_idle`
async fn sweep_idle_sessions(
    sessions: Arc<SessionStore>,
    max_idle: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                sessions.purge_idle(max_idle);
            }
            _ = shutdown_rx.changed() => break,
        }
    }
}
