use betchain_types::execution::Transaction;
use commonware_cryptography::{ed25519::PublicKey, sha256::Digest, Digestible};
use commonware_runtime::Metrics;
use prometheus_client::metrics::gauge::Gauge;
use std::collections::{BTreeMap, HashMap, VecDeque};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue is full ({0} placements)")]
    Full(usize),
    #[error("account already has {0} queued placements")]
    Backlog(usize),
    #[error("placement {0} is already queued")]
    Duplicate(Digest),
    #[error("nonce {0} is already queued for this account")]
    NonceTaken(u64),
}

/// Signed placements waiting for a block, in arrival order.
///
/// Unlike a fee market, nothing is ever reordered: [BetQueue::snapshot]
/// hands the block producer the placements exactly as they arrived.
pub struct BetQueue {
    max_backlog: usize,
    max_transactions: usize,
    transactions: HashMap<Digest, Transaction>,
    tracked: HashMap<PublicKey, BTreeMap<u64, Digest>>,
    order: VecDeque<Digest>,

    unique: Gauge,
    accounts: Gauge,
}

impl BetQueue {
    pub fn new(context: impl Metrics, max_backlog: usize, max_transactions: usize) -> Self {
        // Initialize metrics
        let unique = Gauge::default();
        let accounts = Gauge::default();
        context.register(
            "transactions",
            "Number of placements in the queue",
            unique.clone(),
        );
        context.register(
            "accounts",
            "Number of accounts with queued placements",
            accounts.clone(),
        );

        Self {
            max_backlog,
            max_transactions,
            transactions: HashMap::new(),
            tracked: HashMap::new(),
            order: VecDeque::new(),

            unique,
            accounts,
        }
    }

    fn update_metrics(&self) {
        self.unique.set(self.transactions.len() as i64);
        self.accounts.set(self.tracked.len() as i64);
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn get(&self, digest: &Digest) -> Option<&Transaction> {
        self.transactions.get(digest)
    }

    fn track(&mut self, tx: &Transaction) -> Result<Digest, QueueError> {
        if self.transactions.len() >= self.max_transactions {
            return Err(QueueError::Full(self.transactions.len()));
        }
        let digest = tx.digest();
        if self.transactions.contains_key(&digest) {
            return Err(QueueError::Duplicate(digest));
        }
        let entry = self.tracked.entry(tx.public.clone()).or_default();
        if entry.contains_key(&tx.nonce) {
            return Err(QueueError::NonceTaken(tx.nonce));
        }
        if entry.len() >= self.max_backlog {
            return Err(QueueError::Backlog(entry.len()));
        }
        entry.insert(tx.nonce, digest);
        self.transactions.insert(digest, tx.clone());
        Ok(digest)
    }

    /// Append a placement to the back of the queue.
    pub fn add(&mut self, tx: Transaction) -> Result<Digest, QueueError> {
        let digest = self.track(&tx)?;
        self.order.push_back(digest);
        self.update_metrics();
        Ok(digest)
    }

    /// Put placements back at the front of the queue, keeping their order
    /// (used when the blocks that included them are abandoned).
    pub fn requeue(&mut self, txs: Vec<Transaction>) -> Vec<QueueError> {
        let mut errors = Vec::new();
        for tx in txs.into_iter().rev() {
            match self.track(&tx) {
                Ok(digest) => self.order.push_front(digest),
                Err(err) => errors.push(err),
            }
        }
        self.update_metrics();
        errors
    }

    fn untrack(&mut self, digest: &Digest) -> Option<Transaction> {
        let tx = self.transactions.remove(digest)?;
        if let Some(tracked) = self.tracked.get_mut(&tx.public) {
            tracked.remove(&tx.nonce);
            if tracked.is_empty() {
                self.tracked.remove(&tx.public);
            }
        }
        Some(tx)
    }

    /// Withdraw a placement.
    pub fn remove(&mut self, digest: &Digest) -> Option<Transaction> {
        let tx = self.untrack(digest)?;
        self.order.retain(|queued| queued != digest);
        self.update_metrics();
        Some(tx)
    }

    /// Swap a queued placement for a re-signed one, keeping its position.
    pub fn replace(&mut self, digest: &Digest, tx: Transaction) -> Result<Digest, QueueError> {
        let Some(position) = self.order.iter().position(|queued| queued == digest) else {
            return self.add(tx);
        };
        self.untrack(digest);
        self.order.remove(position);
        let replacement = self.track(&tx)?;
        self.order.insert(position, replacement);
        self.update_metrics();
        Ok(replacement)
    }

    /// Drop every placement of `public` below nonce `min` (already included
    /// or no longer includable).
    pub fn retain(&mut self, public: &PublicKey, min: u64) {
        let Some(tracked) = self.tracked.get_mut(public) else {
            return;
        };
        let mut removed = Vec::new();
        while let Some((nonce, digest)) = tracked.first_key_value() {
            if *nonce >= min {
                break;
            }
            removed.push(*digest);
            tracked.pop_first();
        }
        if tracked.is_empty() {
            self.tracked.remove(public);
        }
        for digest in &removed {
            self.transactions.remove(digest);
        }
        if !removed.is_empty() {
            self.order.retain(|queued| !removed.contains(queued));
        }
        self.update_metrics();
    }

    /// Accounts with at least one queued placement.
    pub fn accounts(&self) -> Vec<PublicKey> {
        self.tracked.keys().cloned().collect()
    }

    /// Queued placements of `public`, by nonce.
    pub fn account(&self, public: &PublicKey) -> Vec<&Transaction> {
        self.tracked
            .get(public)
            .map(|tracked| {
                tracked
                    .values()
                    .filter_map(|digest| self.transactions.get(digest))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every queued placement in arrival order.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.order
            .iter()
            .filter_map(|digest| self.transactions.get(digest))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use betchain_execution::mocks::place_bet;
    use commonware_cryptography::{ed25519::PrivateKey, PrivateKeyExt};
    use commonware_runtime::{deterministic, Runner};

    #[test]
    fn test_arrival_order() {
        let runner = deterministic::Runner::default();
        runner.start(|ctx| async move {
            let mut queue = BetQueue::new(ctx, 64, 100);
            let alice = PrivateKey::from_seed(1);
            let bob = PrivateKey::from_seed(2);
            let txs = vec![
                place_bet(&alice, 0, "red@1", None),
                place_bet(&bob, 0, "black@1", None),
                place_bet(&alice, 1, "even@1", None),
            ];
            for tx in &txs {
                queue.add(tx.clone()).unwrap();
            }
            assert_eq!(queue.snapshot(), txs);
            assert_eq!(queue.accounts().len(), 2);
            assert_eq!(
                queue.account(&txs[0].public),
                vec![&txs[0], &txs[2]]
            );
        });
    }

    #[test]
    fn test_add_rejections() {
        let runner = deterministic::Runner::default();
        runner.start(|ctx| async move {
            let mut queue = BetQueue::new(ctx, 2, 3);
            let alice = PrivateKey::from_seed(1);
            let tx = place_bet(&alice, 0, "red@1", None);
            let digest = queue.add(tx.clone()).unwrap();
            assert_eq!(queue.add(tx), Err(QueueError::Duplicate(digest)));
            assert_eq!(
                queue.add(place_bet(&alice, 0, "odd@1", None)),
                Err(QueueError::NonceTaken(0))
            );
            queue.add(place_bet(&alice, 1, "odd@1", None)).unwrap();
            assert_eq!(
                queue.add(place_bet(&alice, 2, "odd@1", None)),
                Err(QueueError::Backlog(2))
            );

            let bob = PrivateKey::from_seed(2);
            queue.add(place_bet(&bob, 0, "low@1", None)).unwrap();
            assert_eq!(
                queue.add(place_bet(&bob, 1, "low@1", None)),
                Err(QueueError::Full(3))
            );
        });
    }

    #[test]
    fn test_remove_replace_retain() {
        let runner = deterministic::Runner::default();
        runner.start(|ctx| async move {
            let mut queue = BetQueue::new(ctx, 64, 100);
            let alice = PrivateKey::from_seed(1);
            let bob = PrivateKey::from_seed(2);
            let a0 = place_bet(&alice, 0, "red@1", None);
            let b0 = place_bet(&bob, 0, "black@1", None);
            let a1 = place_bet(&alice, 1, "even@1", None);
            for tx in [&a0, &b0, &a1] {
                queue.add(tx.clone()).unwrap();
            }

            // Withdraw the first and shift the second down one nonce
            assert_eq!(queue.remove(&a0.digest()), Some(a0.clone()));
            let shifted = place_bet(&alice, 0, "even@1", None);
            queue.replace(&a1.digest(), shifted.clone()).unwrap();
            assert_eq!(queue.snapshot(), vec![b0.clone(), shifted.clone()]);
            assert!(queue.get(&a1.digest()).is_none());

            // Confirmation of bob's nonce 0 prunes it
            queue.retain(&b0.public, 1);
            assert_eq!(queue.snapshot(), vec![shifted.clone()]);
            assert_eq!(queue.accounts(), vec![shifted.public.clone()]);

            // Abandoned placements go back to the front
            let errors = queue.requeue(vec![a0.clone(), b0.clone()]);
            assert_eq!(errors, vec![QueueError::NonceTaken(0)]);
            assert_eq!(queue.snapshot(), vec![b0, shifted]);
            assert_eq!(queue.len(), 2);
        });
    }

    #[test]
    fn test_metrics() {
        let runner = deterministic::Runner::default();
        runner.start(|ctx| async move {
            let mut queue = BetQueue::new(ctx.with_label("queue"), 64, 100);
            let alice = PrivateKey::from_seed(1);
            queue.add(place_bet(&alice, 0, "red@1", None)).unwrap();
            queue.add(place_bet(&alice, 1, "red@1", None)).unwrap();
            let encoded = ctx.encode();
            assert!(encoded.contains("queue_transactions 2"));
            assert!(encoded.contains("queue_accounts 1"));
        });
    }
}
