use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::core::config::Settings;
use crate::core::error::{AppError, AppResult};
use crate::discovery::{instance_name, Advertisement, Advertiser, TimeSeeded, SERVICE_PORT};
use crate::transfer::{ServerOptions, TransferServer};
use crate::utils::network::{filter_interfaces, system_interfaces};

/// SIGINT and SIGTERM listeners, installed up front so a failure to install is reported
/// before anything is started.
pub struct TerminationSignal {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl TerminationSignal {
    pub fn install() -> AppResult<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                terminate: signal(SignalKind::terminate())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Resolves on the first interrupt or termination request.
    pub async fn recv(self) {
        let interrupt = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        {
            let mut terminate = self.terminate;
            tokio::select! {
                _ = interrupt => info!("Received SIGINT"),
                _ = terminate.recv() => info!("Received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            interrupt.await;
            info!("Received Ctrl+C");
        }
    }
}

/// Run `server` in the background, advertise, and wait for `shutdown`.
///
/// Teardown happens here rather than in destructors: the advertisement is stopped
/// first, then the server is told to stop and awaited. If the server dies on its
/// own, the advertisement is stopped and the server's error is returned.
pub async fn run_serve_loop<A, F, S>(
    server: TransferServer,
    advertise: F,
    shutdown: S,
) -> AppResult<()>
where
    A: Advertisement + Send + 'static,
    F: FnOnce() -> AppResult<A>,
    S: Future<Output = ()>,
{
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server_task = tokio::spawn(server.run(async move {
        let _ = stop_rx.await;
    }));

    let advertisement = match advertise() {
        Ok(advertisement) => advertisement,
        Err(e) => {
            let _ = stop_tx.send(());
            let _ = server_task.await;
            return Err(e);
        }
    };

    tokio::select! {
        _ = shutdown => {
            info!("shutting down...");
            let advertised = stop_advertisement(advertisement).await;
            let _ = stop_tx.send(());
            let served = server_task
                .await
                .map_err(|e| AppError::Server(format!("server task failed: {}", e)))?;
            advertised?;
            served
        }
        finished = &mut server_task => {
            if let Err(e) = stop_advertisement(advertisement).await {
                warn!("Failed to stop advertisement: {}", e);
            }
            match finished {
                Ok(Ok(())) => Err(AppError::Server("server stopped unexpectedly".to_string())),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(AppError::Server(format!("server task failed: {}", e))),
            }
        }
    }
}

/// `Advertisement::stop` waits on the mDNS daemon, so it runs off the async workers.
async fn stop_advertisement<A>(advertisement: A) -> AppResult<()>
where
    A: Advertisement + Send + 'static,
{
    tokio::task::spawn_blocking(move || advertisement.stop())
        .await
        .map_err(|e| AppError::Discovery(format!("advertisement stop task failed: {}", e)))?
}

/// Server role: serve `directory` on the fixed port and advertise it until signalled.
pub async fn serve(settings: &Settings, directory: &Path) -> AppResult<()> {
    if !directory.is_dir() {
        return Err(AppError::Config(format!(
            "{} is not a directory",
            directory.display()
        )));
    }

    let host: IpAddr = settings.bind_host.parse().map_err(|e| {
        AppError::Config(format!("invalid bind host {}: {}", settings.bind_host, e))
    })?;
    let addr = SocketAddr::new(host, SERVICE_PORT);

    let identity = instance_name(&mut TimeSeeded::new());
    info!("using the name: {}", identity);
    info!("the serve dir is {}", directory.display());
    info!("username {}", settings.credentials.user);

    let signals = TerminationSignal::install()?;
    let server = TransferServer::bind(
        addr,
        ServerOptions {
            name: identity.to_string(),
            directory: directory.to_path_buf(),
            credentials: settings.credentials.clone(),
            max_file_size: settings.max_file_size,
        },
    )
    .await?;

    let advertise = || {
        let interfaces = filter_interfaces(&system_interfaces()?);
        Advertiser::register(&identity, &interfaces)
    };

    run_serve_loop(server, advertise, signals.recv()).await
}
