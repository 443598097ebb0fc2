//! Token → delivery slot map shared by the dispatcher, the result sink and the sweeper.
use std::{
    collections::HashMap,
    sync::{
        Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use relay_model::{Outcome, RequestToken};
use tokio::sync::mpsc;
use tracing::trace;

/// In-memory correlation registry.
///
/// Each registered token owns a single-assignment slot: the first [`deliver`](Self::deliver)
/// wins, later ones are dropped. Removing a token closes its slot, which wakes a waiter
/// blocked on [`DeliverySlot::recv`].
#[derive(Clone)]
pub struct CorrelationRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    slots: RwLock<HashMap<RequestToken, SlotEntry>>,
    seq: AtomicU64,
}

struct SlotEntry {
    tx: mpsc::Sender<Outcome>,
    /// Receive side, moved out once by `take`.
    rx: Option<mpsc::Receiver<Outcome>>,
    filled: AtomicBool,
}

/// Receive side of a registered slot.
#[derive(Debug)]
pub struct DeliverySlot {
    token: RequestToken,
    rx: mpsc::Receiver<Outcome>,
}

impl DeliverySlot {
    #[inline]
    pub fn token(&self) -> &RequestToken {
        &self.token
    }

    /// Wait for the outcome.
    ///
    /// Returns `None` once the slot was removed from the registry without a delivery.
    pub async fn recv(&mut self) -> Option<Outcome> {
        self.rx.recv().await
    }

    /// Non-blocking check for an already delivered outcome.
    pub fn try_recv(&mut self) -> Option<Outcome> {
        self.rx.try_recv().ok()
    }
}

impl CorrelationRegistry {
    /// Create empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                slots: RwLock::new(HashMap::new()),
                seq: AtomicU64::new(1),
            }),
        }
    }

    /// Mint a fresh token and register an empty slot for it.
    pub fn register(&self) -> RequestToken {
        self.register_at(unix_now())
    }

    /// Same as [`register`](Self::register) with an explicit creation second.
    pub fn register_at(&self, issued_at: u64) -> RequestToken {
        let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed);
        let token = RequestToken::new(issued_at, seq);

        let (tx, rx) = mpsc::channel(1);
        let entry = SlotEntry {
            tx,
            rx: Some(rx),
            filled: AtomicBool::new(false),
        };
        self.write().insert(token.clone(), entry);

        trace!(%token, "slot registered");
        token
    }

    /// Place `outcome` into the slot of `token` without blocking.
    ///
    /// Returns `false` when the token is unknown (never registered, consumed or expired)
    /// or its slot already holds a value.
    pub fn deliver(&self, token: &RequestToken, outcome: Outcome) -> bool {
        let slots = self.read();
        let Some(entry) = slots.get(token) else {
            return false;
        };
        if entry.filled.swap(true, Ordering::AcqRel) {
            return false;
        }
        entry.tx.try_send(outcome).is_ok()
    }

    /// Hand out the receive side of the slot. Succeeds once per token.
    pub fn take(&self, token: &RequestToken) -> Option<DeliverySlot> {
        let mut slots = self.write();
        let rx = slots.get_mut(token)?.rx.take()?;
        Some(DeliverySlot {
            token: token.clone(),
            rx,
        })
    }

    /// Discard the token's slot. Idempotent; returns whether an entry was removed.
    pub fn remove(&self, token: &RequestToken) -> bool {
        let removed = self.write().remove(token).is_some();
        if removed {
            trace!(%token, "slot removed");
        }
        removed
    }

    /// Remove every slot older than `max_age_secs`, returning how many were removed.
    pub fn sweep_expired(&self, max_age_secs: u64) -> usize {
        self.sweep_expired_at(max_age_secs, unix_now())
    }

    /// Same as [`sweep_expired`](Self::sweep_expired) against an explicit clock reading.
    pub fn sweep_expired_at(&self, max_age_secs: u64, now_secs: u64) -> usize {
        let mut slots = self.write();
        let before = slots.len();
        slots.retain(|token, _| !token.is_older_than(max_age_secs, now_secs));
        before - slots.len()
    }

    /// Remove and close every slot, returning how many were outstanding.
    pub fn close_all(&self) -> usize {
        let mut slots = self.write();
        let count = slots.len();
        slots.clear();
        count
    }

    pub fn contains(&self, token: &RequestToken) -> bool {
        self.read().contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<RequestToken, SlotEntry>> {
        self.inner
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<RequestToken, SlotEntry>> {
        self.inner
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CorrelationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, thread};

    use super::*;

    #[test]
    fn register_creates_distinct_tokens_within_one_second() {
        let registry = CorrelationRegistry::new();
        let a = registry.register_at(1_000);
        let b = registry.register_at(1_000);

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn concurrent_registration_never_collides() {
        let registry = CorrelationRegistry::new();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    (0..250)
                        .map(|_| registry.register_at(1_000))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for token in handle.join().unwrap() {
                assert!(seen.insert(token), "duplicate token");
            }
        }
        assert_eq!(seen.len(), 2_000);
        assert_eq!(registry.len(), 2_000);
    }

    #[test]
    fn first_delivery_wins() {
        let registry = CorrelationRegistry::new();
        let token = registry.register();
        let mut slot = registry.take(&token).unwrap();

        assert!(registry.deliver(&token, Outcome::success("first")));
        assert!(!registry.deliver(&token, Outcome::success("second")));

        assert_eq!(slot.try_recv(), Some(Outcome::success("first")));
        assert_eq!(slot.try_recv(), None);
    }

    #[test]
    fn delivery_after_consumption_is_still_rejected() {
        let registry = CorrelationRegistry::new();
        let token = registry.register();
        let mut slot = registry.take(&token).unwrap();

        assert!(registry.deliver(&token, Outcome::empty()));
        assert_eq!(slot.try_recv(), Some(Outcome::empty()));
        assert!(!registry.deliver(&token, Outcome::error("late")));
        assert_eq!(slot.try_recv(), None);
    }

    #[test]
    fn deliver_to_unknown_token_is_noop() {
        let registry = CorrelationRegistry::new();
        assert!(!registry.deliver(&RequestToken::new(1, 1), Outcome::empty()));
        assert!(registry.is_empty());
    }

    #[test]
    fn deliver_after_remove_returns_false() {
        let registry = CorrelationRegistry::new();
        let token = registry.register();

        assert!(registry.remove(&token));
        assert!(!registry.deliver(&token, Outcome::empty()));
        assert!(!registry.contains(&token));
    }

    #[test]
    fn take_hands_out_slot_once() {
        let registry = CorrelationRegistry::new();
        let token = registry.register();

        let slot = registry.take(&token).unwrap();
        assert_eq!(slot.token(), &token);
        assert!(registry.take(&token).is_none());
        assert!(registry.take(&RequestToken::from("unknown")).is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = CorrelationRegistry::new();
        let token = registry.register();

        assert!(registry.remove(&token));
        assert!(!registry.remove(&token));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn remove_wakes_waiter_with_none() {
        let registry = CorrelationRegistry::new();
        let token = registry.register();
        let mut slot = registry.take(&token).unwrap();

        let waiter = tokio::spawn(async move { slot.recv().await });
        registry.remove(&token);

        assert_eq!(waiter.await.unwrap(), None);
    }

    #[test]
    fn sweep_removes_all_and_only_expired() {
        let registry = CorrelationRegistry::new();
        let old_a = registry.register_at(1_000);
        let old_b = registry.register_at(1_030);
        let edge = registry.register_at(1_040);
        let fresh = registry.register_at(1_090);

        // now = 1_100: ages are 100, 70, 60, 10
        let removed = registry.sweep_expired_at(60, 1_100);

        assert_eq!(removed, 2);
        assert!(!registry.contains(&old_a));
        assert!(!registry.contains(&old_b));
        assert!(registry.contains(&edge));
        assert!(registry.contains(&fresh));
    }

    #[test]
    fn sweep_removes_slots_with_active_waiter() {
        let registry = CorrelationRegistry::new();
        let token = registry.register_at(1_000);
        let _slot = registry.take(&token).unwrap();

        assert_eq!(registry.sweep_expired_at(60, 2_000), 1);
        assert!(!registry.deliver(&token, Outcome::empty()));
    }

    #[test]
    fn sweep_with_current_clock_keeps_fresh_tokens() {
        let registry = CorrelationRegistry::new();
        registry.register();
        assert_eq!(registry.sweep_expired(60), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn close_all_drains_registry() {
        let registry = CorrelationRegistry::new();
        let token = registry.register();
        registry.register();

        assert_eq!(registry.close_all(), 2);
        assert!(registry.is_empty());
        assert!(!registry.deliver(&token, Outcome::empty()));
    }
}
