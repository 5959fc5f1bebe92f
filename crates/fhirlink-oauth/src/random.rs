//! Injected randomness for PKCE verifiers, state tokens and assertion ids.

use std::sync::Mutex;

use rand::RngCore;
use rand::rngs::OsRng;

/// Source of cryptographically random bytes.
pub trait RandomSource: Send + Sync {
    /// Fills `buf` with random bytes.
    fn fill(&self, buf: &mut [u8]);

    /// Returns a random (version 4) UUID built from this source.
    fn uuid(&self) -> uuid::Uuid {
        let mut bytes = [0u8; 16];
        self.fill(&mut bytes);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}

/// Operating system randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }
}

/// Deterministic randomness for tests: each call to [`RandomSource::fill`]
/// writes an incrementing counter byte, starting from `seed`.
#[derive(Debug, Default)]
pub struct SequenceRandom(Mutex<u8>);

impl SequenceRandom {
    /// Creates a source whose first fill uses `seed`.
    #[must_use]
    pub fn new(seed: u8) -> Self {
        Self(Mutex::new(seed))
    }
}

impl RandomSource for SequenceRandom {
    fn fill(&self, buf: &mut [u8]) {
        let mut next = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        buf.fill(*next);
        *next = next.wrapping_add(1);
    }
}
