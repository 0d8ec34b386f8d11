use super::cart::Cart;
use super::catalog::{ProductId, VendorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Session identity. Equals the chat identity of the cashier driving it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where in the purchase flow a session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    VendorList,
    ProductList,
    ProductDetail,
    Cart,
    PaymentSelect,
    Confirming,
}

/// Shared cancellation flag for an in-flight commit. Setting it never
/// aborts a dispatched append; the writer only consults it between
/// attempts, so cancellation suppresses future retries and nothing else.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The session's most recent dispatched checkout. Kept until its completion
/// event arrives (even across a cancel), so a late result can be matched by
/// nonce and anything older discarded as stale.
#[derive(Debug, Clone)]
pub struct PendingCommit {
    pub nonce: Uuid,
    pub cancel: CancelFlag,
}

/// One cashier's in-progress interaction. Owned exclusively by that
/// session's worker task; never shared across sessions.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    pub cart: Cart,
    pub selected_vendor: Option<VendorId>,
    pub selected_product: Option<ProductId>,
    pub pending_commit: Option<PendingCommit>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: SessionState::Idle,
            cart: Cart::new(),
            selected_vendor: None,
            selected_product: None,
            pending_commit: None,
            last_activity: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Back to `Idle` with the cart discarded. The pending commit record is
    /// retained so a late completion can still be matched.
    pub fn reset_to_idle(&mut self) {
        self.state = SessionState::Idle;
        self.cart.clear();
        self.selected_vendor = None;
        self.selected_product = None;
    }

    /// Whether a dispatched checkout is still running uncancelled.
    pub fn has_active_commit(&self) -> bool {
        self.pending_commit
            .as_ref()
            .is_some_and(|p| !p.cancel.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle_and_empty() {
        let session = Session::new(SessionId(1));
        assert_eq!(session.state, SessionState::Idle);
        assert!(session.cart.is_empty());
        assert!(session.selected_vendor.is_none());
        assert!(session.pending_commit.is_none());
    }

    #[test]
    fn test_reset_keeps_pending_commit() {
        let mut session = Session::new(SessionId(1));
        session.state = SessionState::Confirming;
        session.cart.add(crate::domain::catalog::ProductId(101), 20);
        session.pending_commit = Some(PendingCommit {
            nonce: Uuid::new_v4(),
            cancel: CancelFlag::new(),
        });

        session.reset_to_idle();
        assert_eq!(session.state, SessionState::Idle);
        assert!(session.cart.is_empty());
        assert!(session.pending_commit.is_some());
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_active_commit_accounting() {
        let mut session = Session::new(SessionId(1));
        assert!(!session.has_active_commit());

        let cancel = CancelFlag::new();
        session.pending_commit = Some(PendingCommit {
            nonce: Uuid::new_v4(),
            cancel: cancel.clone(),
        });
        assert!(session.has_active_commit());

        cancel.cancel();
        assert!(!session.has_active_commit());
    }
}
