//! The caller-side table of in-flight submissions.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use tokio::sync::oneshot;

use super::BridgeStats;
use crate::consts::RECLAIMED_CAPACITY;
use crate::error::BridgeError;
use crate::task::{CorrelationToken, Outcome};

/// One in-flight submission. Sending on `settle` resolves or rejects the
/// caller's handle.
pub(crate) struct PendingRequest {
    pub settle: oneshot::Sender<Outcome>,
    pub label: String,
    pub submitted_at: Instant,
}

/// What a completion's token refers to.
pub(crate) enum Lookup {
    Pending(PendingRequest),
    /// Given up on by its caller; the completion arrived late.
    Reclaimed,
    /// At or below a reclaimed token that was evicted to bound memory.
    /// Can no longer be told apart from a duplicate.
    Expired,
    Unknown,
}

pub(crate) struct PendingTable {
    /// `None` once the token range is used up.
    next: Option<u64>,
    entries: HashMap<CorrelationToken, PendingRequest>,
    /// Oldest first; capped at `RECLAIMED_CAPACITY`.
    reclaimed: BTreeSet<CorrelationToken>,
    /// Highest reclaimed token evicted so far.
    evicted_up_to: Option<CorrelationToken>,
    pub stats: BridgeStats,
}

impl PendingTable {
    pub fn new(token_base: u64) -> Self {
        Self {
            next: Some(token_base),
            entries: HashMap::new(),
            reclaimed: BTreeSet::new(),
            evicted_up_to: None,
            stats: BridgeStats::default(),
        }
    }

    /// Allocate the next token and register a pending request under it.
    pub fn insert(
        &mut self,
        label: String,
    ) -> Result<(CorrelationToken, oneshot::Receiver<Outcome>), BridgeError> {
        let raw = self.next.ok_or(BridgeError::TokensExhausted)?;
        self.next = raw.checked_add(1);
        let token = CorrelationToken(raw);

        let (settle, receiver) = oneshot::channel();
        self.entries.insert(
            token,
            PendingRequest {
                settle,
                label,
                submitted_at: Instant::now(),
            },
        );
        self.stats.submitted += 1;
        Ok((token, receiver))
    }

    /// Undo an `insert` whose dispatch never reached the worker.
    pub fn discard(&mut self, token: CorrelationToken) {
        if self.entries.remove(&token).is_some() {
            self.stats.submitted -= 1;
        }
    }

    /// Remove the entry a completion refers to.
    pub fn resolve(&mut self, token: CorrelationToken) -> Lookup {
        if let Some(request) = self.entries.remove(&token) {
            self.stats.settled += 1;
            Lookup::Pending(request)
        } else if self.reclaimed.remove(&token) {
            Lookup::Reclaimed
        } else if self.evicted_up_to.is_some_and(|evicted| token <= evicted) {
            self.stats.expired += 1;
            Lookup::Expired
        } else {
            self.stats.unmatched += 1;
            Lookup::Unknown
        }
    }

    /// Drop an entry without settling it, remembering the token so a late
    /// completion is not mistaken for a protocol error. Only the newest
    /// `RECLAIMED_CAPACITY` tokens are remembered; tasks that never complete
    /// must not pin memory.
    pub fn reclaim(&mut self, token: CorrelationToken) -> bool {
        if self.entries.remove(&token).is_some() {
            self.reclaimed.insert(token);
            if self.reclaimed.len() > RECLAIMED_CAPACITY {
                // Tokens are monotonic, so the oldest is also the highest evicted.
                self.evicted_up_to = self.reclaimed.pop_first();
            }
            self.stats.reclaimed += 1;
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn reclaimed_len(&self) -> usize {
        self.reclaimed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_start_at_base_and_increase() {
        let mut table = PendingTable::new(10);
        let (a, _ra) = table.insert("a".to_string()).unwrap();
        let (b, _rb) = table.insert("b".to_string()).unwrap();
        assert_eq!(a, CorrelationToken(10));
        assert_eq!(b, CorrelationToken(11));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn exhaustion_is_permanent() {
        let mut table = PendingTable::new(u64::MAX);
        let (last, _rx) = table.insert("last".to_string()).unwrap();
        assert_eq!(last, CorrelationToken(u64::MAX));
        assert!(matches!(
            table.insert("more".to_string()),
            Err(BridgeError::TokensExhausted)
        ));
        // Resolving doesn't free the range: tokens never wrap.
        assert!(matches!(table.resolve(last), Lookup::Pending(_)));
        assert!(table.insert("again".to_string()).is_err());
    }

    #[test]
    fn resolve_removes_exactly_once() {
        let mut table = PendingTable::new(0);
        let (token, _rx) = table.insert("t".to_string()).unwrap();
        assert!(matches!(table.resolve(token), Lookup::Pending(_)));
        assert!(matches!(table.resolve(token), Lookup::Unknown));
        assert_eq!(table.stats.settled, 1);
        assert_eq!(table.stats.unmatched, 1);
    }

    #[test]
    fn reclaimed_tokens_resolve_as_reclaimed_once() {
        let mut table = PendingTable::new(0);
        let (token, _rx) = table.insert("t".to_string()).unwrap();
        assert!(table.reclaim(token));
        assert!(!table.reclaim(token));
        assert_eq!(table.len(), 0);
        assert!(matches!(table.resolve(token), Lookup::Reclaimed));
        assert!(matches!(table.resolve(token), Lookup::Unknown));
    }

    #[test]
    fn reclaimed_set_stays_bounded() {
        let mut table = PendingTable::new(0);
        let total = RECLAIMED_CAPACITY * 10;
        for _ in 0..total {
            let (token, _rx) = table.insert("hung".to_string()).unwrap();
            assert!(table.reclaim(token));
        }
        assert_eq!(table.len(), 0);
        assert_eq!(table.reclaimed_len(), RECLAIMED_CAPACITY);
        assert_eq!(table.stats.reclaimed, total as u64);

        // Evicted tokens expire quietly; the newest are still remembered.
        assert!(matches!(table.resolve(CorrelationToken(0)), Lookup::Expired));
        let newest = CorrelationToken(total as u64 - 1);
        assert!(matches!(table.resolve(newest), Lookup::Reclaimed));
        assert_eq!(table.stats.unmatched, 0);
        assert_eq!(table.stats.expired, 1);
    }

    #[test]
    fn tokens_above_the_eviction_mark_are_still_unknown() {
        let mut table = PendingTable::new(0);
        for _ in 0..=RECLAIMED_CAPACITY {
            let (token, _rx) = table.insert("hung".to_string()).unwrap();
            table.reclaim(token);
        }
        let never_issued = CorrelationToken(u64::MAX);
        assert!(matches!(table.resolve(never_issued), Lookup::Unknown));
    }

    #[test]
    fn discard_rolls_back_submission_count() {
        let mut table = PendingTable::new(0);
        let (token, _rx) = table.insert("t".to_string()).unwrap();
        table.discard(token);
        assert_eq!(table.len(), 0);
        assert_eq!(table.stats.submitted, 0);
    }
}
