//! One-shot latch shared by the lifecycle code.
//!
//! Three things in an instance's life are "happens at most once, observed by
//! many": internal cancellation, terminal-cleanup completion, and the
//! process-wide shutdown request. All three are modeled as a [`Latch`]:
//! exactly one effective producer, any number of waiters, and every waiter
//! (past or future) unblocks once it trips.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Latch {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

impl Latch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trips the latch. Idempotent; only the first call changes anything.
    pub fn trip(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_tripped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Waits until the latch trips. Returns immediately if it already has.
    pub async fn tripped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so wait_for can only fail if every
        // Latch clone is dropped, which cannot happen while we hold &self.
        let _ = rx.wait_for(|tripped| *tripped).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn trip_unblocks_existing_waiter() {
        let latch = Latch::new();
        let waiter = {
            let latch = latch.clone();
            tokio::spawn(async move { latch.tripped().await })
        };
        latch.trip();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should unblock")
            .unwrap();
    }

    #[tokio::test]
    async fn late_waiter_returns_immediately() {
        let latch = Latch::new();
        latch.trip();
        tokio::time::timeout(Duration::from_millis(100), latch.tripped())
            .await
            .expect("already-tripped latch should not block");
    }

    #[tokio::test]
    async fn trip_is_idempotent() {
        let latch = Latch::new();
        latch.trip();
        latch.trip();
        assert!(latch.is_tripped());
    }

    #[tokio::test]
    async fn untripped_latch_blocks() {
        let latch = Latch::new();
        assert!(!latch.is_tripped());
        let res = tokio::time::timeout(Duration::from_millis(50), latch.tripped()).await;
        assert!(res.is_err());
    }
}
