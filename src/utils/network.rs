use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use tracing::{debug, warn};

use crate::core::error::{AppError, AppResult};
use crate::core::models::{InstanceRecord, SelectedTarget};

/// A local network interface and the properties advertisement cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetInterface {
    pub name: String,
    pub loopback: bool,
    pub point_to_point: bool,
    pub up: bool,
    pub addrs: Vec<IpAddr>,
}

/// Keep only interfaces worth advertising on: up, not loopback, not point-to-point.
pub fn filter_interfaces(interfaces: &[NetInterface]) -> Vec<NetInterface> {
    interfaces
        .iter()
        .filter(|iface| !iface.loopback && !iface.point_to_point && iface.up)
        .cloned()
        .collect()
}

/// Enumerate the host's interfaces, one entry per interface name.
#[cfg(unix)]
pub fn system_interfaces() -> AppResult<Vec<NetInterface>> {
    use nix::ifaddrs::getifaddrs;
    use nix::net::if_::InterfaceFlags;
    use std::net::{SocketAddrV4, SocketAddrV6};

    let entries = getifaddrs().map_err(|e| AppError::Interface(e.to_string()))?;

    let mut interfaces: Vec<NetInterface> = Vec::new();
    for entry in entries {
        let addr = entry.address.as_ref().and_then(|storage| {
            if let Some(v4) = storage.as_sockaddr_in() {
                Some(IpAddr::V4(*SocketAddrV4::from(*v4).ip()))
            } else {
                storage
                    .as_sockaddr_in6()
                    .map(|v6| IpAddr::V6(*SocketAddrV6::from(*v6).ip()))
            }
        });

        let position = interfaces.iter().position(|i| i.name == entry.interface_name);
        let iface = match position {
            Some(idx) => &mut interfaces[idx],
            None => {
                interfaces.push(NetInterface {
                    name: entry.interface_name.clone(),
                    loopback: entry.flags.contains(InterfaceFlags::IFF_LOOPBACK),
                    point_to_point: entry.flags.contains(InterfaceFlags::IFF_POINTOPOINT),
                    up: entry.flags.contains(InterfaceFlags::IFF_UP),
                    addrs: Vec::new(),
                });
                let last = interfaces.len() - 1;
                &mut interfaces[last]
            }
        };

        if let Some(addr) = addr {
            iface.addrs.push(addr);
        }
    }

    debug!("Enumerated {} network interfaces", interfaces.len());
    Ok(interfaces)
}

/// Without interface flags, loopback is judged by address and everything else counts as up.
#[cfg(not(unix))]
pub fn system_interfaces() -> AppResult<Vec<NetInterface>> {
    let pairs = local_ip_address::list_afinet_netifas()
        .map_err(|e| AppError::Interface(e.to_string()))?;

    let mut interfaces: Vec<NetInterface> = Vec::new();
    for (name, addr) in pairs {
        match interfaces.iter_mut().find(|i| i.name == name) {
            Some(iface) => iface.addrs.push(addr),
            None => interfaces.push(NetInterface {
                name,
                loopback: addr.is_loopback(),
                point_to_point: false,
                up: true,
                addrs: vec![addr],
            }),
        }
    }

    Ok(interfaces)
}

/// Host name lookup, abstracted so callers can be tested without DNS.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolves through the operating system's resolver.
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|sa| sa.ip()).collect())
    }
}

/// First IPv4 address `host` resolves to. IPv4-mapped IPv6 addresses count as IPv4.
pub async fn resolve_ipv4<R>(resolver: &R, host: &str) -> AppResult<Ipv4Addr>
where
    R: HostResolver + ?Sized,
{
    let addrs = resolver
        .lookup(host)
        .await
        .map_err(|e| AppError::Resolve(format!("lookup of {} failed: {}", host, e)))?;

    addrs
        .into_iter()
        .find_map(|addr| match addr {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(v6) => v6.to_ipv4_mapped(),
        })
        .ok_or_else(|| AppError::Resolve(format!("can't find ipv4 address for {}", host)))
}

/// Resolve the chosen record to a dialable target, keeping the hostname if no IPv4 turns up.
pub async fn select_target<R>(resolver: &R, record: &InstanceRecord) -> SelectedTarget
where
    R: HostResolver + ?Sized,
{
    let address = match resolve_ipv4(resolver, &record.host).await {
        Ok(ip) => ip.to_string(),
        Err(e) => {
            warn!("{}, falling back to hostname {}", e, record.host);
            record.host.clone()
        }
    };

    SelectedTarget {
        address,
        port: record.port,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::net::Ipv6Addr;

    fn iface(name: &str, loopback: bool, point_to_point: bool, up: bool) -> NetInterface {
        NetInterface {
            name: name.to_string(),
            loopback,
            point_to_point,
            up,
            addrs: Vec::new(),
        }
    }

    fn sample_interfaces() -> Vec<NetInterface> {
        vec![
            iface("lo", true, false, true),
            iface("eth0", false, false, true),
            iface("tun0", false, true, true),
            iface("wlan0", false, false, false),
        ]
    }

    fn record(host: &str) -> InstanceRecord {
        InstanceRecord::new("Drop Local 12345", host, 2121).unwrap()
    }

    #[test]
    fn test_filter_keeps_only_usable_interfaces() {
        let filtered = filter_interfaces(&sample_interfaces());

        let names: Vec<&str> = filtered.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["eth0"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let interfaces = sample_interfaces();
        let first = filter_interfaces(&interfaces);
        let second = filter_interfaces(&interfaces);

        assert_eq!(first, second);
        assert_eq!(filter_interfaces(&first), first);
    }

    #[test]
    fn test_filter_empty_input() {
        assert!(filter_interfaces(&[]).is_empty());
    }

    #[test]
    fn test_system_interfaces_enumerates() {
        // Every host has at least a loopback interface.
        let interfaces = system_interfaces().unwrap();
        assert!(!interfaces.is_empty());
        assert!(filter_interfaces(&interfaces).iter().all(|i| !i.loopback));
    }

    proptest! {
        #[test]
        fn test_filtered_interfaces_satisfy_policy(
            flags in proptest::collection::vec((any::<bool>(), any::<bool>(), any::<bool>()), 0..16)
        ) {
            let interfaces: Vec<NetInterface> = flags
                .iter()
                .enumerate()
                .map(|(i, (lo, p2p, up))| iface(&format!("if{}", i), *lo, *p2p, *up))
                .collect();

            let filtered = filter_interfaces(&interfaces);

            let expected = flags.iter().filter(|(lo, p2p, up)| !lo && !p2p && *up).count();
            prop_assert_eq!(filtered.len(), expected);
            prop_assert!(filtered.iter().all(|i| !i.loopback && !i.point_to_point && i.up));
        }
    }

    #[tokio::test]
    async fn test_resolve_prefers_ipv4() {
        let mut resolver = MockHostResolver::new();
        resolver
            .expect_lookup()
            .times(1)
            .returning(|_| {
                Ok(vec![
                    IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)),
                    IpAddr::V4(Ipv4Addr::new(192, 168, 1, 42)),
                ])
            });

        let ip = resolve_ipv4(&resolver, "peerbox.local").await.unwrap();
        assert_eq!(ip, Ipv4Addr::new(192, 168, 1, 42));
    }

    #[tokio::test]
    async fn test_resolve_takes_first_ipv4() {
        let mut resolver = MockHostResolver::new();
        resolver.expect_lookup().returning(|_| {
            Ok(vec![
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)),
                IpAddr::V4(Ipv4Addr::new(192, 168, 1, 42)),
            ])
        });

        let ip = resolve_ipv4(&resolver, "peerbox.local").await.unwrap();
        assert_eq!(ip, Ipv4Addr::new(10, 0, 0, 7));
    }

    #[tokio::test]
    async fn test_resolve_accepts_ipv4_mapped() {
        let mut resolver = MockHostResolver::new();
        resolver
            .expect_lookup()
            .returning(|_| Ok(vec![IpAddr::V6(Ipv4Addr::new(192, 168, 1, 42).to_ipv6_mapped())]));

        let ip = resolve_ipv4(&resolver, "peerbox.local").await.unwrap();
        assert_eq!(ip, Ipv4Addr::new(192, 168, 1, 42));
    }

    #[tokio::test]
    async fn test_resolve_ipv6_only_is_not_found() {
        let mut resolver = MockHostResolver::new();
        resolver
            .expect_lookup()
            .returning(|_| Ok(vec![IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 2))]));

        let err = resolve_ipv4(&resolver, "peerbox.local").await.unwrap_err();
        assert!(matches!(err, AppError::Resolve(_)));
    }

    #[tokio::test]
    async fn test_select_target_resolved() {
        let mut resolver = MockHostResolver::new();
        resolver
            .expect_lookup()
            .returning(|_| Ok(vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 42))]));

        let target = select_target(&resolver, &record("peerbox.local")).await;
        assert_eq!(target.address, "192.168.1.42");
        assert_eq!(target.port, 2121);
    }

    #[tokio::test]
    async fn test_select_target_falls_back_for_ipv6_only() {
        let mut resolver = MockHostResolver::new();
        resolver
            .expect_lookup()
            .returning(|_| Ok(vec![IpAddr::V6(Ipv6Addr::LOCALHOST)]));

        let target = select_target(&resolver, &record("peerbox.local")).await;
        assert_eq!(target.address, "peerbox.local");
        assert_eq!(target.port, 2121);
    }

    #[tokio::test]
    async fn test_select_target_falls_back_on_lookup_error() {
        let mut resolver = MockHostResolver::new();
        resolver
            .expect_lookup()
            .returning(|_| Err(io::Error::new(io::ErrorKind::NotFound, "no such host")));

        let target = select_target(&resolver, &record("ghost.local")).await;
        assert_eq!(target.address, "ghost.local");
        assert!(!target.address.is_empty());
    }

    #[tokio::test]
    async fn test_system_resolver_literal() {
        let ip = resolve_ipv4(&SystemResolver, "192.168.1.42").await.unwrap();
        assert_eq!(ip, Ipv4Addr::new(192, 168, 1, 42));
    }
}
