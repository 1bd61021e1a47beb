use mdns_sd::{IfKind, ServiceDaemon, ServiceInfo};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::error::{AppError, AppResult};
use crate::core::models::ServiceIdentity;
use crate::discovery::{service_domain, SERVICE_DOMAIN, SERVICE_PORT, SERVICE_TYPE};
use crate::utils::network::NetInterface;

/// A live advertisement that has to be stopped explicitly.
pub trait Advertisement {
    fn stop(self) -> AppResult<()>;
}

/// Registered mDNS service for this instance.
pub struct Advertiser {
    daemon: ServiceDaemon,
    fullname: String,
}

impl Advertiser {
    /// Publish `identity` on `interfaces` only. Fails when there is nothing to publish on.
    pub fn register(identity: &ServiceIdentity, interfaces: &[NetInterface]) -> AppResult<Self> {
        if interfaces.is_empty() {
            return Err(AppError::Config(
                "no usable network interface to advertise on".to_string(),
            ));
        }

        let addrs: Vec<String> = interfaces
            .iter()
            .flat_map(|iface| iface.addrs.iter())
            .map(|addr| addr.to_string())
            .collect();
        if addrs.is_empty() {
            return Err(AppError::Config(
                "usable network interfaces carry no addresses".to_string(),
            ));
        }

        let daemon = ServiceDaemon::new()?;
        daemon.disable_interface(IfKind::All)?;
        for iface in interfaces {
            daemon.enable_interface(IfKind::Name(iface.name.clone()))?;
            debug!("advertising on interface {}", iface.name);
        }

        let raw_host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "droplocal".to_string());
        let host_name = format!("{}.local.", raw_host.trim_end_matches(".local"));

        // extra information about our service
        let properties = [
            ("version", crate::VERSION),
            ("hello", "droplocal"),
        ];

        let service_info = ServiceInfo::new(
            &service_domain(SERVICE_TYPE, SERVICE_DOMAIN),
            identity.as_str(),
            &host_name,
            addrs.join(",").as_str(),
            SERVICE_PORT,
            &properties[..],
        )?;

        let fullname = service_info.get_fullname().to_string();
        daemon.register(service_info)?;

        info!("advertise the {} on local link ({} as {})", identity, fullname, host_name);
        Ok(Self { daemon, fullname })
    }

    pub fn fullname(&self) -> &str {
        &self.fullname
    }
}

impl Advertisement for Advertiser {
    fn stop(self) -> AppResult<()> {
        match self.daemon.unregister(&self.fullname) {
            Ok(status) => {
                // Wait for the goodbye packet before the daemon goes away.
                match status.recv_timeout(Duration::from_secs(1)) {
                    Ok(s) => info!("Unregistered mDNS service {}: {:?}", self.fullname, s),
                    Err(_) => warn!("No unregister confirmation for {}", self.fullname),
                }
            }
            Err(e) => {
                // Log as debug since these are usually harmless during shutdown
                debug!("mDNS unregister error (likely harmless during shutdown): {}", e);
            }
        }

        if let Err(e) = self.daemon.shutdown() {
            debug!("mDNS daemon shutdown error: {}", e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{instance_name, FixedId};

    #[test]
    fn test_register_without_interfaces_is_config_error() {
        let identity = instance_name(&mut FixedId(1));
        let result = Advertiser::register(&identity, &[]);

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_register_without_addresses_is_config_error() {
        let identity = instance_name(&mut FixedId(1));
        let iface = NetInterface {
            name: "eth0".to_string(),
            loopback: false,
            point_to_point: false,
            up: true,
            addrs: Vec::new(),
        };

        let result = Advertiser::register(&identity, &[iface]);
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
