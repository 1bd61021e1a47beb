//! droplocal - find file-drop peers on the local network over mDNS and send them a file
//!
//! A server advertises itself as `_droplocal._tcp` and accepts uploads into a directory.
//! A client browses for a few seconds, lets the user pick a peer and uploads one file.

pub mod cli;
pub mod core;
pub mod discovery;
pub mod transfer;
pub mod utils;

// Re-export commonly used types for convenience
pub use core::{
    config::{AppConfig, Credentials, Role, Settings},
    error::{AppError, AppResult, TransferStage},
    models::{InstanceRecord, SelectedTarget, ServiceIdentity},
};

pub use discovery::{browse, Advertiser, SERVICE_DOMAIN, SERVICE_PORT, SERVICE_TYPE};

pub use transfer::{upload_file, TransferServer};

pub use utils::{
    file::check_file,
    network::{filter_interfaces, select_target},
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "droplocal");
        assert!(!DESCRIPTION.is_empty());
    }

    #[test]
    fn test_module_availability() {
        let config = AppConfig::default();
        assert_eq!(config.discovery.timeout_secs, 3);
        assert_eq!(SERVICE_PORT, 2121);
    }
}
