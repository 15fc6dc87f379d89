use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Default bound on each concurrent phase.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A fixed point in time after which a phase gives up.
///
/// Workers call [`Deadline::check`] before each unit of work, so an expired
/// deadline stops the phase at the next task boundary and the phase returns
/// `Timeout` instead of a partial result.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    phase: &'static str,
    limit: Duration,
    expires: Instant,
}

impl Deadline {
    pub fn after(phase: &'static str, limit: Duration) -> Self {
        Deadline {
            phase,
            limit,
            // saturate rather than overflow for absurd limits
            expires: Instant::now()
                .checked_add(limit)
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(u32::MAX as u64)),
        }
    }

    pub fn phase(&self) -> &'static str {
        self.phase
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires
    }

    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            Err(Error::Timeout {
                phase: self.phase,
                limit: self.limit,
            })
        } else {
            Ok(())
        }
    }
}
