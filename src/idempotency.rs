use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Issues keys that let the gift card service deduplicate retried requests
/// for the same logical operation.
///
/// Every attempted debit or credit gets a fresh key, including the
/// compensating void for a debit it reverses: the remote service treats
/// identical keys as the same operation, and reusing one across distinct
/// actions would silently drop the second.
///
/// A millisecond timestamp plus a random suffix alone can collide under
/// concurrency; the process-wide sequence number makes the key unique for the
/// lifetime of the issuer.
#[derive(Debug, Default)]
pub struct IdempotencyKeyIssuer {
    sequence: AtomicU64,
}

impl IdempotencyKeyIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a key unique within this process.
    pub fn issue(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let millis = Utc::now().timestamp_millis();
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(10)
            .map(char::from)
            .collect();
        format!("{}-{}-{}", millis, seq, suffix)
    }
}
