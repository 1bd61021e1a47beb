use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::models::ServiceIdentity;
use crate::discovery::INSTANCE_NAME_PREFIX;

/// Supplies the numeric part of an instance name.
pub trait IdentitySource {
    fn next_id(&mut self) -> u32;
}

/// Random ids from a generator seeded with the current wall-clock time.
///
/// Two hosts can still draw the same id. Nothing detects that on the network.
pub struct TimeSeeded {
    rng: StdRng,
}

impl TimeSeeded {
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self {
            rng: StdRng::seed_from_u64(nanos),
        }
    }
}

impl Default for TimeSeeded {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentitySource for TimeSeeded {
    fn next_id(&mut self) -> u32 {
        self.rng.gen()
    }
}

/// Always yields the same id.
pub struct FixedId(pub u32);

impl IdentitySource for FixedId {
    fn next_id(&mut self) -> u32 {
        self.0
    }
}

/// Builds this process's instance name, e.g. `Drop Local 12345`.
pub fn instance_name(source: &mut impl IdentitySource) -> ServiceIdentity {
    ServiceIdentity::new(format!("{} {}", INSTANCE_NAME_PREFIX, source.next_id()))
}
