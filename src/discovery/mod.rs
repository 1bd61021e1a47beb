//! mDNS advertisement and browsing for droplocal instances.

pub mod advertiser;
pub mod browser;
pub mod identity;

pub use advertiser::{Advertisement, Advertiser};
pub use browser::browse;
pub use identity::{instance_name, FixedId, IdentitySource, TimeSeeded};

pub const SERVICE_TYPE: &str = "_droplocal._tcp";
pub const SERVICE_DOMAIN: &str = "local.";
pub const SERVICE_PORT: u16 = 2121;
pub const INSTANCE_NAME_PREFIX: &str = "Drop Local";

/// Fully qualified type the mDNS daemon expects, e.g. `_droplocal._tcp.local.`.
pub fn service_domain(service_type: &str, domain: &str) -> String {
    let service_type = service_type.trim_end_matches('.');
    let domain = domain.trim_matches('.');
    format!("{}.{}.", service_type, domain)
}
