//! Tracks pending subscribe/unsubscribe operations and turns them into
//! [`SubscriptionSyncMessage`]s tagged with a monotonically increasing
//! edition number, so that a price-sync message referencing edition N can
//! always be resolved against the exact subject list that was active then.

use std::collections::BTreeMap;
use std::sync::Mutex;

use bidfx_core::error::{BidFxError, Result};
use bidfx_core::subject::{self, Subject};

use crate::message::SubscriptionSyncMessage;

enum PendingOp {
    Subscribe(Subject),
    Unsubscribe(Subject),
}

struct Inner {
    edition: u64,
    subject_editions: BTreeMap<u64, Vec<Subject>>,
    pending_ops: Vec<PendingOp>,
}

/// Ordering used when turning the active subject set into a list: by
/// currency pair, then quantity, then the full canonical subject string.
/// This is purely cosmetic for logs, but it is what the reference
/// implementation sends, so subscription ids stay stable across a
/// reconnect when the subject set is unchanged.
fn subject_sort_key(subject: &Subject) -> String {
    format!(
        "{}{}{}",
        subject.get(subject::CURRENCY_PAIR, ""),
        subject.get(subject::QUANTITY, ""),
        subject
    )
}

pub struct SubscriptionRegister {
    inner: Mutex<Inner>,
}

impl Default for SubscriptionRegister {
    fn default() -> Self {
        let mut subject_editions = BTreeMap::new();
        subject_editions.insert(1, Vec::new());
        SubscriptionRegister {
            inner: Mutex::new(Inner { edition: 1, subject_editions, pending_ops: Vec::new() }),
        }
    }
}

impl SubscriptionRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subject: Subject) {
        self.inner.lock().unwrap().pending_ops.push(PendingOp::Subscribe(subject));
    }

    pub fn unsubscribe(&self, subject: Subject) {
        self.inner.lock().unwrap().pending_ops.push(PendingOp::Unsubscribe(subject));
    }

    /// If there are pending operations and applying them actually changes
    /// the active subject set, bump the edition, record the new subject
    /// list, and return a sync message for it. Returns `None` when there is
    /// nothing to send, in which case the caller should fall back to its
    /// heartbeat check.
    pub fn subscription_sync(&self) -> Option<SubscriptionSyncMessage> {
        let mut inner = self.inner.lock().unwrap();
        if inner.pending_ops.is_empty() {
            return None;
        }
        let (subjects, unchanged) = Self::apply_pending(&mut inner);
        if unchanged {
            return None;
        }
        inner.edition += 1;
        let edition = inner.edition;
        inner.subject_editions.insert(edition, subjects.clone());
        Some(SubscriptionSyncMessage::new(edition, subjects, true))
    }

    /// Drain pending ops against the last recorded subject set, returning
    /// the resulting sorted set and whether it differs from before.
    fn apply_pending(inner: &mut Inner) -> (Vec<Subject>, bool) {
        let previous: Vec<Subject> =
            inner.subject_editions.get(&inner.edition).cloned().unwrap_or_default();
        let mut set: Vec<Subject> = previous.clone();
        for op in inner.pending_ops.drain(..) {
            match op {
                PendingOp::Subscribe(s) => {
                    if !set.contains(&s) {
                        set.push(s);
                    }
                }
                PendingOp::Unsubscribe(s) => set.retain(|existing| existing != &s),
            }
        }
        let unchanged = {
            let mut a = previous.clone();
            let mut b = set.clone();
            a.sort();
            b.sort();
            a == b
        };
        set.sort_by_key(subject_sort_key);
        (set, unchanged)
    }

    /// Discard subject lists for editions strictly older than `edition`.
    /// Retains `edition` itself — intentionally, since the server may still
    /// reference it in an in-flight price sync.
    pub fn purge_editions_before(&self, edition: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.subject_editions.retain(|&ed, _| ed >= edition);
    }

    pub fn subjects_for_edition(&self, edition: u64) -> Result<Vec<Subject>> {
        let inner = self.inner.lock().unwrap();
        inner
            .subject_editions
            .get(&edition)
            .cloned()
            .ok_or_else(|| BidFxError::pricing(format!("no subject set registered for edition {edition}")))
    }

    /// Reset to a fresh edition 1 after a disconnect, re-queueing every
    /// currently active subject as a pending subscribe so the next
    /// connection attempt re-establishes them from scratch. Returns the
    /// subjects that were active, for marking as stale.
    pub fn reset_and_get_subjects(&self) -> Vec<Subject> {
        let mut inner = self.inner.lock().unwrap();
        let (subjects, _) = Self::apply_pending(&mut inner);
        for subject in &subjects {
            inner.pending_ops.push(PendingOp::Subscribe(subject.clone()));
        }
        inner.edition = 1;
        inner.subject_editions = BTreeMap::from([(1, Vec::new())]);
        subjects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(pair: &str) -> Subject {
        Subject::from_pairs(vec![
            ("AssetClass".to_string(), "Fx".to_string()),
            ("Symbol".to_string(), pair.to_string()),
            ("Level".to_string(), "1".to_string()),
        ])
    }

    #[test]
    fn no_pending_ops_yields_no_sync() {
        let register = SubscriptionRegister::new();
        assert!(register.subscription_sync().is_none());
    }

    #[test]
    fn subscribe_bumps_edition_and_is_idempotent() {
        let register = SubscriptionRegister::new();
        register.subscribe(subject("EURUSD"));
        let sync = register.subscription_sync().unwrap();
        assert_eq!(sync.edition, 2);
        assert_eq!(sync.subjects.len(), 1);

        // Subscribing to the same subject again, with no other change,
        // produces no sync message.
        register.subscribe(subject("EURUSD"));
        assert!(register.subscription_sync().is_none());
    }

    #[test]
    fn unsubscribe_returns_to_empty_set_with_new_edition() {
        let register = SubscriptionRegister::new();
        register.subscribe(subject("EURUSD"));
        register.subscription_sync().unwrap();

        register.unsubscribe(subject("EURUSD"));
        let sync = register.subscription_sync().unwrap();
        assert_eq!(sync.edition, 3);
        assert!(sync.subjects.is_empty());
    }

    #[test]
    fn purge_keeps_editions_at_or_after_the_given_one() {
        let register = SubscriptionRegister::new();
        register.subscribe(subject("EURUSD"));
        register.subscription_sync().unwrap();
        register.subscribe(subject("USDJPY"));
        register.subscription_sync().unwrap();

        register.purge_editions_before(3);
        assert!(register.subjects_for_edition(3).is_ok());
        assert!(register.subjects_for_edition(1).is_err());
    }

    #[test]
    fn reset_requeues_active_subjects_as_stale_candidates() {
        let register = SubscriptionRegister::new();
        register.subscribe(subject("EURUSD"));
        register.subscription_sync().unwrap();

        let stale = register.reset_and_get_subjects();
        assert_eq!(stale.len(), 1);

        let sync = register.subscription_sync().unwrap();
        assert_eq!(sync.edition, 2);
        assert_eq!(sync.subjects.len(), 1);
    }
}
