//! Content keys currently being applied by a pull pass.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::ContentKey;

/// Set of content keys a pass is applying right now.
///
/// Overlapping passes (a full sync racing an incremental one) consult it
/// before applying a document, so the same logical record is never inserted
/// twice. Keys stay claimed for a grace delay after release, which covers the
/// window where the other pass still holds a stale local snapshot.
#[derive(Clone)]
pub(crate) struct InFlightGuard {
    keys: Arc<Mutex<HashMap<ContentKey, u64>>>,
    tokens: Arc<AtomicU64>,
    grace: Duration,
}

/// A claimed key. Dropping the ticket releases the claim after the grace
/// delay, including when the pass is cancelled mid-document.
pub(crate) struct InFlightTicket {
    guard: InFlightGuard,
    key: Option<ContentKey>,
    token: u64,
}

impl InFlightGuard {
    pub(crate) fn new(grace: Duration) -> Self {
        Self {
            keys: Arc::new(Mutex::new(HashMap::new())),
            tokens: Arc::new(AtomicU64::new(1)),
            grace,
        }
    }

    /// Claim `key`, or `None` when another pass holds it
    pub(crate) fn try_acquire(&self, key: ContentKey) -> Option<InFlightTicket> {
        let mut keys = self.keys.lock();
        if keys.contains_key(&key) {
            return None;
        }
        let token = self.tokens.fetch_add(1, Ordering::Relaxed);
        keys.insert(key.clone(), token);
        Some(InFlightTicket {
            guard: self.clone(),
            key: Some(key),
            token,
        })
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, key: &ContentKey) -> bool {
        self.keys.lock().contains_key(key)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.keys.lock().len()
    }

    /// Remove `key` only while it still carries `token`, so a late release
    /// never drops a newer claim.
    fn remove(&self, key: &ContentKey, token: u64) {
        let mut keys = self.keys.lock();
        if keys.get(key) == Some(&token) {
            keys.remove(key);
        }
    }

    fn release(&self, key: ContentKey, token: u64) {
        if self.grace.is_zero() {
            self.remove(&key, token);
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let guard = self.clone();
                runtime.spawn(async move {
                    tokio::time::sleep(guard.grace).await;
                    guard.remove(&key, token);
                });
            }
            Err(_) => self.remove(&key, token),
        }
    }
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.guard.release(key, self.token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use rust_decimal::Decimal;

    fn key(description: &str) -> ContentKey {
        Record::new(1, Decimal::TEN, description)
            .occurred_at(1_000)
            .content_key()
    }

    #[test]
    fn second_claim_on_same_key_is_refused() {
        let guard = InFlightGuard::new(Duration::ZERO);
        let ticket = guard.try_acquire(key("Lunch")).unwrap();
        assert!(guard.try_acquire(key("Lunch")).is_none());
        let taxi = guard.try_acquire(key("Taxi"));
        assert!(taxi.is_some());

        drop(ticket);
        assert!(!guard.contains(&key("Lunch")));
        assert_eq!(guard.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn release_waits_for_grace_delay() {
        let guard = InFlightGuard::new(Duration::from_millis(50));
        drop(guard.try_acquire(key("Lunch")).unwrap());

        assert!(guard.contains(&key("Lunch")));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!guard.contains(&key("Lunch")));
    }

    #[test]
    fn stale_release_does_not_remove_newer_claim() {
        let guard = InFlightGuard::new(Duration::ZERO);
        let first = guard.try_acquire(key("Lunch")).unwrap();
        let stale_token = first.token;
        drop(first);

        let _second = guard.try_acquire(key("Lunch")).unwrap();
        guard.remove(&key("Lunch"), stale_token);
        assert!(guard.contains(&key("Lunch")));
    }
}
