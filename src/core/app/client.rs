use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::cli::select::choose_instance;
use crate::core::config::Settings;
use crate::core::error::{AppError, AppResult};
use crate::core::models::InstanceRecord;
use crate::discovery::{browse, SERVICE_DOMAIN, SERVICE_TYPE};
use crate::transfer::{upload_file, Connector, HttpConnector};
use crate::utils::file::{check_file, Admissibility};
use crate::utils::network::{select_target, HostResolver, SystemResolver};

/// Refuse anything that is not a regular file before touching the network.
pub fn ensure_admissible(file: &Path) -> AppResult<()> {
    match check_file(file)? {
        Admissibility::Regular => Ok(()),
        Admissibility::Rejected(reason) => Err(AppError::Config(format!(
            "{}: {}",
            file.display(),
            reason
        ))),
    }
}

/// Let the user pick one of `records`, resolve it, and upload `file` there.
pub async fn deliver<R, C, I, O>(
    records: &[InstanceRecord],
    file: &Path,
    settings: &Settings,
    resolver: &R,
    connector: &C,
    input: &mut I,
    output: &mut O,
) -> AppResult<u64>
where
    R: HostResolver + ?Sized,
    C: Connector + ?Sized,
    I: BufRead,
    O: Write,
{
    let idx = choose_instance(records, input, output)?;
    let chosen = &records[idx];
    info!("Sending to {}", chosen);

    let target = select_target(resolver, chosen).await;
    upload_file(connector, &target, &settings.credentials, file, settings.dial_timeout).await
}

/// Client role from start to finish: check, browse, choose, upload.
pub async fn send(settings: &Settings, file: &Path) -> AppResult<u64> {
    ensure_admissible(file)?;

    let timeout_secs = settings.discovery_timeout.as_secs();
    let browsed =
        tokio::task::spawn_blocking(move || browse(SERVICE_TYPE, SERVICE_DOMAIN, timeout_secs))
            .await
            .map_err(|e| AppError::Discovery(format!("browse task failed: {}", e)))?;

    let records = match browsed {
        Ok(records) if records.is_empty() => {
            println!("there is no droplocal service available.");
            return Err(AppError::NoPeers);
        }
        Ok(records) => records,
        Err(e) => {
            warn!("when pick up instance, there is an error: {}", e);
            println!("there is no droplocal service available.");
            return Err(e);
        }
    };

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();
    deliver(
        &records,
        file,
        settings,
        &SystemResolver,
        &HttpConnector,
        &mut input,
        &mut output,
    )
    .await
}
