use async_trait::async_trait;
use humansize::{format_size, BINARY};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::info;
use uuid::Uuid;

use crate::core::config::Credentials;
use crate::core::error::{AppError, AppResult, TransferStage};
use crate::core::models::SelectedTarget;
use crate::transfer::handlers::{LoginRequest, LoginResponse, StoreReceipt, Welcome};
use crate::utils::file::remote_name;

/// An open session with a peer's transfer server.
#[async_trait]
pub trait TransferSession: Send {
    async fn login(&mut self, user: &str, password: &str) -> AppResult<()>;

    /// Store `file` remotely as `remote_name`. The file handle is consumed and closed.
    async fn store(&mut self, remote_name: &str, file: File) -> AppResult<u64>;

    async fn quit(&mut self) -> AppResult<()>;
}

/// Opens sessions, bounding the dial by `timeout`.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: TransferSession;

    async fn connect(&self, target: &SelectedTarget, timeout: Duration) -> AppResult<Self::Session>;
}

/// Talks to a peer's HTTP transfer server.
pub struct HttpConnector;

pub struct HttpSession {
    client: Client,
    base_url: String,
    timeout: Duration,
    token: Option<Uuid>,
}

impl HttpSession {
    fn token(&self, stage: TransferStage) -> AppResult<Uuid> {
        self.token
            .ok_or_else(|| AppError::transfer(stage, "not logged in"))
    }
}

fn status_error(stage: TransferStage, status: StatusCode) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED => AppError::transfer(stage, "login incorrect or session expired"),
        StatusCode::PAYLOAD_TOO_LARGE => {
            AppError::transfer(stage, "file exceeds the server's size limit")
        }
        other => AppError::transfer(stage, format!("server answered {}", other)),
    }
}

#[async_trait]
impl Connector for HttpConnector {
    type Session = HttpSession;

    async fn connect(&self, target: &SelectedTarget, timeout: Duration) -> AppResult<HttpSession> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| AppError::transfer(TransferStage::Connect, e.to_string()))?;
        let base_url = format!("http://{}/api", target.authority());

        let response = client
            .get(format!("{}/health", base_url))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AppError::transfer(TransferStage::Connect, e.to_string()))?;
        if !response.status().is_success() {
            return Err(status_error(TransferStage::Connect, response.status()));
        }
        let welcome: Welcome = response
            .json()
            .await
            .map_err(|e| AppError::transfer(TransferStage::Connect, e.to_string()))?;
        info!("Connected to {} ({} {})", welcome.name, welcome.service, welcome.version);

        Ok(HttpSession {
            client,
            base_url,
            timeout,
            token: None,
        })
    }
}

#[async_trait]
impl TransferSession for HttpSession {
    async fn login(&mut self, user: &str, password: &str) -> AppResult<()> {
        let request = LoginRequest {
            user: user.to_string(),
            password: password.to_string(),
        };
        let response = self
            .client
            .post(format!("{}/session", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::transfer(TransferStage::Login, e.to_string()))?;
        if !response.status().is_success() {
            return Err(status_error(TransferStage::Login, response.status()));
        }

        let LoginResponse { token } = response
            .json()
            .await
            .map_err(|e| AppError::transfer(TransferStage::Login, e.to_string()))?;
        self.token = Some(token);
        Ok(())
    }

    async fn store(&mut self, remote_name: &str, file: File) -> AppResult<u64> {
        let token = self.token(TransferStage::Store)?;
        let length = file.metadata().await?.len();

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, length)
            .file_name(remote_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| AppError::transfer(TransferStage::Store, e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/files", self.base_url))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::transfer(TransferStage::Store, e.to_string()))?;
        if !response.status().is_success() {
            return Err(status_error(TransferStage::Store, response.status()));
        }

        let receipt: StoreReceipt = response
            .json()
            .await
            .map_err(|e| AppError::transfer(TransferStage::Store, e.to_string()))?;
        if receipt.size != length {
            return Err(AppError::transfer(
                TransferStage::Store,
                format!("peer stored {} of {} bytes", receipt.size, length),
            ));
        }
        Ok(receipt.size)
    }

    async fn quit(&mut self) -> AppResult<()> {
        let token = self.token(TransferStage::Quit)?;
        let response = self
            .client
            .delete(format!("{}/session", self.base_url))
            .timeout(self.timeout)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::transfer(TransferStage::Quit, e.to_string()))?;
        if !response.status().is_success() {
            return Err(status_error(TransferStage::Quit, response.status()));
        }

        self.token = None;
        Ok(())
    }
}

/// Connect, log in, store `path` under its base name, and quit. Any failed step ends the upload.
pub async fn upload_file<C: Connector + ?Sized>(
    connector: &C,
    target: &SelectedTarget,
    credentials: &Credentials,
    path: &Path,
    dial_timeout: Duration,
) -> AppResult<u64> {
    let name = remote_name(path).ok_or_else(|| {
        AppError::Config(format!("{} has no usable file name", path.display()))
    })?;

    let mut session = connector.connect(target, dial_timeout).await?;
    session.login(&credentials.user, &credentials.password).await?;

    let file = File::open(path).await?;
    let sent = session.store(&name, file).await?;
    session.quit().await?;

    info!("Uploaded {} to {} ({})", name, target.authority(), format_size(sent, BINARY));
    Ok(sent)
}
