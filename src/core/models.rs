use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::core::error::{AppError, AppResult};

/// One peer seen while browsing. Never mutated after discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl InstanceRecord {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> AppResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(AppError::Discovery("instance name is empty".to_string()));
        }
        if port == 0 {
            return Err(AppError::Discovery(format!("instance {} advertised port 0", name)));
        }

        Ok(Self {
            name,
            host: host.into(),
            port,
        })
    }
}

impl fmt::Display for InstanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.host)
    }
}

/// Records gathered during one bounded discovery window, in arrival order.
#[derive(Debug, Clone)]
pub struct DiscoverySession {
    pub budget: Duration,
    pub records: Vec<InstanceRecord>,
}

impl DiscoverySession {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            records: Vec::new(),
        }
    }

    pub fn into_records(self) -> Vec<InstanceRecord> {
        self.records
    }
}

/// Endpoint the transfer client dials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedTarget {
    pub address: String,
    pub port: u16,
}

impl SelectedTarget {
    pub fn authority(&self) -> String {
        // IPv6 literals never reach here from the resolver, but a raw hostname could be one.
        if self.address.contains(':') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

/// The name this process advertises, fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity(String);

impl ServiceIdentity {
    pub(crate) fn new(name: String) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
