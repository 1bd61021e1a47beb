use mdns_sd::{Receiver, ServiceDaemon, ServiceEvent};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::core::error::{AppError, AppResult};
use crate::core::models::{DiscoverySession, InstanceRecord};
use crate::discovery::service_domain;

/// Outcome of one bounded wait on a discovery event stream.
#[derive(Debug)]
pub enum Received {
    Entry(InstanceRecord),
    /// An event that carries no instance, e.g. a search-started notice.
    Ignored,
    TimedOut,
    Closed,
}

/// A stream of discovery events that can be waited on with a timeout.
pub trait EventSource {
    fn recv_timeout(&self, timeout: Duration) -> Received;
}

/// Collect entries until `budget` elapses or the source closes.
///
/// The deadline is checked before every wait, so an entry that only becomes
/// available at or after expiry is dropped even when it is already queued.
pub fn collect<S: EventSource + ?Sized>(source: &S, budget: Duration) -> DiscoverySession {
    let mut session = DiscoverySession::new(budget);
    let start = Instant::now();
    let deadline = start
        .checked_add(budget)
        .unwrap_or_else(|| start + Duration::from_secs(u32::MAX as u64));

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }

        match source.recv_timeout(deadline - now) {
            Received::Entry(record) => {
                debug!("receive the entry {} {}:{}", record.name, record.host, record.port);
                session.records.push(record);
            }
            // a spurious early timeout just re-checks the deadline
            Received::Ignored | Received::TimedOut => {}
            Received::Closed => {
                debug!("discovery event stream closed before the deadline");
                break;
            }
        }
    }

    session
}

/// Adapts an mdns-sd browse receiver into [`EventSource`].
struct MdnsEvents {
    receiver: Receiver<ServiceEvent>,
    suffix: String,
}

/// Instance part of a full service name, with DNS-escaped spaces unescaped.
fn instance_of(fullname: &str, suffix: &str) -> String {
    fullname
        .strip_suffix(suffix)
        .unwrap_or(fullname)
        .replace("\\ ", " ")
}

impl EventSource for MdnsEvents {
    fn recv_timeout(&self, timeout: Duration) -> Received {
        match self.receiver.recv_timeout(timeout) {
            Ok(ServiceEvent::ServiceResolved(info)) => {
                let name = instance_of(info.get_fullname(), &self.suffix);
                match InstanceRecord::new(name, info.get_hostname(), info.get_port()) {
                    Ok(record) => Received::Entry(record),
                    Err(e) => {
                        debug!("skipping malformed entry {}: {}", info.get_fullname(), e);
                        Received::Ignored
                    }
                }
            }
            Ok(_) => Received::Ignored,
            Err(_) if self.receiver.is_disconnected() => Received::Closed,
            Err(_) => Received::TimedOut,
        }
    }
}

/// Browse for `service_type` in `domain` for `timeout_secs` seconds.
///
/// Finding nothing is `Ok(vec![])`; only resolver or browse start-up failures are errors.
pub fn browse(
    service_type: &str,
    domain: &str,
    timeout_secs: u64,
) -> AppResult<Vec<InstanceRecord>> {
    let daemon = ServiceDaemon::new().map_err(|e| {
        error!("Failed to initialize resolver: {}", e);
        AppError::Discovery(format!("failed to initialize resolver: {}", e))
    })?;

    let ty_domain = service_domain(service_type, domain);
    let receiver = match daemon.browse(&ty_domain) {
        Ok(receiver) => receiver,
        Err(e) => {
            error!("Failed to browse: {}", e);
            let _ = daemon.shutdown();
            return Err(AppError::Discovery(format!("failed to browse {}: {}", ty_domain, e)));
        }
    };

    let events = MdnsEvents {
        receiver,
        suffix: format!(".{}", ty_domain),
    };
    let session = collect(&events, Duration::from_secs(timeout_secs));

    if let Err(e) = daemon.stop_browse(&ty_domain) {
        debug!("mDNS stop_browse error (harmless after the window closes): {}", e);
    }
    if let Err(e) = daemon.shutdown() {
        debug!("mDNS daemon shutdown error: {}", e);
    }

    info!(
        "Browsed {} for {:?}, found {} instance(s)",
        ty_domain,
        session.budget,
        session.records.len()
    );
    Ok(session.into_records())
}
