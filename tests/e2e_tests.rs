use async_trait::async_trait;
use droplocal::core::app::{deliver, run_serve_loop};
use droplocal::core::config::{AppConfig, Credentials, Role, Settings};
use droplocal::discovery::Advertisement;
use droplocal::transfer::{HttpConnector, ServerOptions, TransferServer};
use droplocal::utils::network::HostResolver;
use droplocal::{AppError, AppResult, InstanceRecord};
use std::io::Cursor;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::oneshot;

/// Resolves `peerbox.local.` to loopback and nothing else.
struct StaticResolver;

#[async_trait]
impl HostResolver for StaticResolver {
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        if host.trim_end_matches('.') == "peerbox.local" {
            Ok(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)])
        } else {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "unknown host"))
        }
    }
}

struct RecordingAdvertisement {
    stopped: Arc<AtomicBool>,
}

impl Advertisement for RecordingAdvertisement {
    fn stop(self) -> AppResult<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn credentials() -> Credentials {
    Credentials {
        user: "admin".to_string(),
        password: "password".to_string(),
    }
}

fn client_settings(file: &Path, password: &str) -> Settings {
    let mut settings = Settings::new(
        Role::Client {
            file: file.to_path_buf(),
        },
        &AppConfig::default(),
    );
    settings.credentials.password = password.to_string();
    settings
}

async fn start_server(
    served: &TempDir,
) -> (
    u16,
    Arc<AtomicBool>,
    oneshot::Sender<()>,
    tokio::task::JoinHandle<AppResult<()>>,
) {
    start_limited_server(served, None).await
}

async fn start_limited_server(
    served: &TempDir,
    max_file_size: Option<u64>,
) -> (
    u16,
    Arc<AtomicBool>,
    oneshot::Sender<()>,
    tokio::task::JoinHandle<AppResult<()>>,
) {
    let server = TransferServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        ServerOptions {
            name: "Drop Local 12345".to_string(),
            directory: served.path().to_path_buf(),
            credentials: credentials(),
            max_file_size,
        },
    )
    .await
    .unwrap();
    let port = server.local_addr().unwrap().port();

    let stopped = Arc::new(AtomicBool::new(false));
    let flag = stopped.clone();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serve_loop = tokio::spawn(run_serve_loop(
        server,
        move || Ok(RecordingAdvertisement { stopped: flag }),
        async move {
            let _ = stop_rx.await;
        },
    ));

    (port, stopped, stop_tx, serve_loop)
}

#[tokio::test]
async fn test_send_file_to_discovered_peer() {
    let served = TempDir::new().unwrap();
    let outbox = TempDir::new().unwrap();
    std::fs::create_dir(outbox.path().join("nested")).unwrap();
    let file = outbox.path().join("nested").join("report.pdf");
    std::fs::write(&file, b"%PDF-1.4 quarterly numbers").unwrap();

    let (port, stopped, stop_tx, serve_loop) = start_server(&served).await;

    let records = vec![
        InstanceRecord::new("Drop Local 777", "elsewhere.local.", port).unwrap(),
        InstanceRecord::new("Drop Local 12345", "peerbox.local.", port).unwrap(),
    ];
    let settings = client_settings(&file, "password");
    let mut input = Cursor::new(b"9\n1\n".to_vec());
    let mut output = Vec::new();

    let sent = deliver(
        &records,
        &file,
        &settings,
        &StaticResolver,
        &HttpConnector,
        &mut input,
        &mut output,
    )
    .await
    .unwrap();

    assert_eq!(sent, 26);
    let stored = std::fs::read(served.path().join("report.pdf")).unwrap();
    assert_eq!(stored, b"%PDF-1.4 quarterly numbers");
    assert!(!served.path().join("nested").exists());

    let prompt = String::from_utf8(output).unwrap();
    assert!(prompt.contains("[1] Drop Local 12345@peerbox.local."));
    assert!(prompt.contains("wrong index range, [0-1] is valid"));

    stop_tx.send(()).unwrap();
    serve_loop.await.unwrap().unwrap();
    assert!(stopped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_wrong_password_stops_at_login() {
    let served = TempDir::new().unwrap();
    let outbox = TempDir::new().unwrap();
    let file = outbox.path().join("notes.txt");
    std::fs::write(&file, "notes").unwrap();

    let (port, _stopped, stop_tx, serve_loop) = start_server(&served).await;

    let records = vec![InstanceRecord::new("Drop Local 12345", "peerbox.local.", port).unwrap()];
    let settings = client_settings(&file, "wrong");
    let mut input = Cursor::new(b"0\n".to_vec());
    let mut output = Vec::new();

    let err = deliver(
        &records,
        &file,
        &settings,
        &StaticResolver,
        &HttpConnector,
        &mut input,
        &mut output,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        AppError::Transfer {
            stage: droplocal::TransferStage::Login,
            ..
        }
    ));
    assert!(!served.path().join("notes.txt").exists());

    stop_tx.send(()).unwrap();
    serve_loop.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_upload_over_limit_reports_size_limit() {
    let served = TempDir::new().unwrap();
    let outbox = TempDir::new().unwrap();
    let file = outbox.path().join("archive.bin");
    std::fs::write(&file, vec![7u8; 8 * 1024]).unwrap();

    let (port, _stopped, stop_tx, serve_loop) = start_limited_server(&served, Some(4096)).await;

    let records = vec![InstanceRecord::new("Drop Local 12345", "peerbox.local.", port).unwrap()];
    let settings = client_settings(&file, "password");
    let mut input = Cursor::new(b"0\n".to_vec());
    let mut output = Vec::new();

    let err = deliver(
        &records,
        &file,
        &settings,
        &StaticResolver,
        &HttpConnector,
        &mut input,
        &mut output,
    )
    .await
    .unwrap_err();

    match err {
        AppError::Transfer { stage, message } => {
            assert_eq!(stage, droplocal::TransferStage::Store);
            assert!(message.contains("size limit"), "unexpected message: {}", message);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!served.path().join("archive.bin").exists());

    stop_tx.send(()).unwrap();
    serve_loop.await.unwrap().unwrap();
}
