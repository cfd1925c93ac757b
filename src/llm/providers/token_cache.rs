//! Access-token cache for the GigaChat OAuth step.
//!
//! Holds at most one token. A token is handed out only while it has more
//! than [`EXPIRY_MARGIN`] left; tokens issued without an expiry are never
//! cached.

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

#[derive(Default)]
pub struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A still-valid token, if one is cached.
    pub fn get(&self) -> Option<String> {
        self.get_at(SystemTime::now())
    }

    fn get_at(&self, now: SystemTime) -> Option<String> {
        // A poisoned slot only ever holds a complete token or nothing.
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref()
            .filter(|c| now + EXPIRY_MARGIN < c.expires_at)
            .map(|c| c.token.clone())
    }

    /// Remember `token`. `expires_at_ms` is milliseconds since the Unix
    /// epoch, as returned by the OAuth endpoint.
    pub fn store(&self, token: &str, expires_at_ms: Option<u64>) {
        let Some(ms) = expires_at_ms else {
            return;
        };
        let expires_at = UNIX_EPOCH + Duration::from_millis(ms);
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(CachedToken { token: token.to_string(), expires_at });
    }

    pub fn clear(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }
}
