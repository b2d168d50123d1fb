//! Preview server: serves one website's current build over HTTP.
//!
//! At most one preview runs at a time. Starting a preview for another (or the
//! same) website shuts the previous one down first.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use schoolsite_core::error::CoreError;
use schoolsite_core::types::DbId;
use serde::Serialize;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;

use crate::error::PipelineResult;

/// Description of the running preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewInfo {
    pub website_id: DbId,
    pub addr: SocketAddr,
    pub root: PathBuf,
}

struct RunningPreview {
    info: PreviewInfo,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl RunningPreview {
    async fn stop(self) -> PreviewInfo {
        // The server may already have exited; nothing to signal then.
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            tracing::warn!(website_id = self.info.website_id, error = %e, "Preview task ended abnormally");
        }
        tracing::info!(website_id = self.info.website_id, addr = %self.info.addr, "Preview stopped");
        self.info
    }
}

/// Owner of the single preview slot.
pub struct PreviewServer {
    bind_addr: SocketAddr,
    current: Mutex<Option<RunningPreview>>,
}

impl PreviewServer {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            current: Mutex::new(None),
        }
    }

    /// Serve `root` as the preview of `website_id`, replacing any running
    /// preview.
    pub async fn start(&self, website_id: DbId, root: PathBuf) -> PipelineResult<PreviewInfo> {
        if !tokio::fs::try_exists(&root).await.unwrap_or(false) {
            return Err(CoreError::Storage(format!(
                "Build output '{}' does not exist",
                root.display()
            ))
            .into());
        }

        let mut slot = self.current.lock().await;
        if let Some(previous) = slot.take() {
            previous.stop().await;
        }

        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;
        let addr = listener.local_addr()?;
        let app = Router::new()
            .fallback_service(ServeDir::new(&root).append_index_html_on_directories(true));

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(website_id, error = %e, "Preview server failed");
            }
        });

        let info = PreviewInfo {
            website_id,
            addr,
            root,
        };
        tracing::info!(website_id, addr = %addr, root = %info.root.display(), "Preview started");
        *slot = Some(RunningPreview {
            info: info.clone(),
            shutdown,
            handle,
        });
        Ok(info)
    }

    /// Stop the running preview, if any. Returns what was running.
    pub async fn stop(&self) -> Option<PreviewInfo> {
        let running = self.current.lock().await.take()?;
        Some(running.stop().await)
    }

    pub async fn current(&self) -> Option<PreviewInfo> {
        self.current.lock().await.as_ref().map(|r| r.info.clone())
    }
}
