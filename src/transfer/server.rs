use std::collections::HashSet;
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::core::config::Credentials;
use crate::core::error::{AppError, AppResult};
use crate::transfer::routes::create_routes;

/// Shared by every request: where uploads go, who may log in, and live sessions.
pub struct ServerState {
    name: String,
    directory: PathBuf,
    credentials: Credentials,
    upload_limit: Option<u64>,
    sessions: Mutex<HashSet<Uuid>>,
}

impl ServerState {
    pub fn new(name: String, directory: PathBuf, credentials: Credentials) -> Self {
        Self {
            name,
            directory,
            credentials,
            upload_limit: None,
            sessions: Mutex::new(HashSet::new()),
        }
    }

    /// Cap stored files at `limit` bytes. `None` accepts any size.
    pub fn with_upload_limit(mut self, limit: Option<u64>) -> Self {
        self.upload_limit = limit;
        self
    }

    pub fn upload_limit(&self) -> Option<u64> {
        self.upload_limit
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn credentials_match(&self, user: &str, password: &str) -> bool {
        self.credentials.user == user && self.credentials.password == password
    }

    pub fn open_session(&self) -> Uuid {
        let token = Uuid::new_v4();
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(token);
        token
    }

    pub fn has_session(&self, token: &Uuid) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(token)
    }

    pub fn close_session(&self, token: &Uuid) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(token)
    }
}

pub struct ServerOptions {
    pub name: String,
    pub directory: PathBuf,
    pub credentials: Credentials,
    pub max_file_size: Option<u64>,
}

/// Transfer server bound to its listening socket, not yet accepting.
pub struct TransferServer {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl TransferServer {
    pub async fn bind(addr: SocketAddr, options: ServerOptions) -> AppResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Server(format!("Error starting server on {}: {}", addr, e)))?;

        let state = ServerState::new(options.name, options.directory, options.credentials)
            .with_upload_limit(options.max_file_size);

        Ok(Self {
            listener,
            state: Arc::new(state),
        })
    }

    pub fn local_addr(&self) -> AppResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_routes(self.state.clone()).layer(TraceLayer::new_for_http());

        info!("Starting transfer server on {}", self.local_addr()?);
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| AppError::Server(e.to_string()))?;

        info!("Transfer server stopped");
        Ok(())
    }
}
