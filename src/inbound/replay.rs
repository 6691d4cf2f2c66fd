//! Anti-replay validation for handshakes.
//!
//! A handshake passes only when its timestamp is inside the clock-skew
//! window and its nonce has not been seen within the TTL. The timestamp is
//! checked before the cache is touched, so out-of-window records never
//! leave a trace. Sweep, membership check, and insert happen under one
//! lock; the sweep amortises O(cache size) against each handshake.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Permitted clock skew between client and server, in seconds.
pub const TIMESTAMP_WINDOW_SECS: i64 = 120;

/// How long a seen nonce stays in the cache, in seconds.
pub const NONCE_TTL_SECS: i64 = 300;

/// Nonce cache with a timestamp window.
#[derive(Default, Debug)]
pub struct ReplayGuard {
    seen: Mutex<HashMap<[u8; 16], i64>>,
}

impl ReplayGuard {
    /// Create an empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a handshake's timestamp and nonce against the current
    /// clock, recording the nonce on success.
    pub fn validate(&self, timestamp: i64, nonce: [u8; 16]) -> Result<()> {
        self.validate_at(unix_now(), timestamp, nonce)
    }

    pub(crate) fn validate_at(&self, now: i64, timestamp: i64, nonce: [u8; 16]) -> Result<()> {
        if timestamp < now - TIMESTAMP_WINDOW_SECS || timestamp > now + TIMESTAMP_WINDOW_SECS {
            return Err(Error::Auth("timestamp out of window"));
        }

        let mut seen = self.seen.lock();
        seen.retain(|_, first_seen| *first_seen >= now - NONCE_TTL_SECS);

        if seen.contains_key(&nonce) {
            return Err(Error::Auth("nonce replayed"));
        }
        seen.insert(nonce, now);
        Ok(())
    }

    /// Number of nonces currently tracked.
    pub fn tracked(&self) -> usize {
        self.seen.lock().len()
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_fresh_handshake_accepted() {
        let guard = ReplayGuard::new();
        assert!(guard.validate_at(NOW, NOW, [1; 16]).is_ok());
        assert_eq!(guard.tracked(), 1);
    }

    #[test]
    fn test_replayed_nonce_rejected() {
        let guard = ReplayGuard::new();
        let nonce = [9; 16];

        guard.validate_at(NOW, NOW, nonce).unwrap();
        let err = guard.validate_at(NOW + 1, NOW + 1, nonce).unwrap_err();
        assert!(err.is_auth_failure());
    }

    #[test]
    fn test_out_of_window_rejected_without_cache_entry() {
        let guard = ReplayGuard::new();

        let err = guard
            .validate_at(NOW, NOW - 9999, [7; 16])
            .unwrap_err();
        assert!(err.is_auth_failure());
        // The nonce cache was never consulted
        assert_eq!(guard.tracked(), 0);

        let err = guard
            .validate_at(NOW, NOW + TIMESTAMP_WINDOW_SECS + 1, [7; 16])
            .unwrap_err();
        assert!(err.is_auth_failure());
        assert_eq!(guard.tracked(), 0);
    }

    #[test]
    fn test_window_boundaries_accepted() {
        let guard = ReplayGuard::new();
        assert!(guard
            .validate_at(NOW, NOW - TIMESTAMP_WINDOW_SECS, [1; 16])
            .is_ok());
        assert!(guard
            .validate_at(NOW, NOW + TIMESTAMP_WINDOW_SECS, [2; 16])
            .is_ok());
    }

    #[test]
    fn test_expired_nonces_swept() {
        let guard = ReplayGuard::new();
        let nonce = [5; 16];

        guard.validate_at(NOW, NOW, nonce).unwrap();
        assert_eq!(guard.tracked(), 1);

        // Past the TTL the entry is swept, so the nonce is usable again
        let later = NOW + NONCE_TTL_SECS + 1;
        assert!(guard.validate_at(later, later, nonce).is_ok());
        assert_eq!(guard.tracked(), 1);
    }

    #[test]
    fn test_sweep_only_removes_expired() {
        let guard = ReplayGuard::new();
        guard.validate_at(NOW, NOW, [1; 16]).unwrap();

        let mid = NOW + 100;
        guard.validate_at(mid, mid, [2; 16]).unwrap();
        assert_eq!(guard.tracked(), 2);

        // First entry ages out, second survives
        let later = NOW + NONCE_TTL_SECS + 1;
        guard.validate_at(later, later, [3; 16]).unwrap();
        assert_eq!(guard.tracked(), 2);

        // And the survivor still blocks a replay
        assert!(guard.validate_at(later, later, [2; 16]).is_err());
    }
}
