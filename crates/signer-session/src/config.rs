//! Engine configuration: the relay subscription timeout, an injected
//! clock (so tests can fix `created_at` instead of reading the wall
//! clock), and an injected RNG source (so tests can fix handshake
//! secrets and signature aux-rand instead of reading the OS CSPRNG).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use signer_crypto::SecureRng;

pub trait Clock: Send + Sync {
    /// Unix timestamp, seconds.
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

pub struct EngineConfig {
    pub subscription_timeout: Duration,
    pub clock: Arc<dyn Clock>,
    pub rng: Arc<Mutex<dyn SecureRng>>,
}

impl EngineConfig {
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    pub fn with_rng(rng: Arc<Mutex<dyn SecureRng>>) -> Self {
        Self {
            rng,
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            subscription_timeout: Duration::from_secs(60),
            clock: Arc::new(SystemClock),
            rng: Arc::new(Mutex::new(rand::rngs::OsRng)),
        }
    }
}
