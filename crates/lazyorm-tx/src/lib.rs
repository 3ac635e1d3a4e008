//! Per-thread transaction management for LazyORM.
//!
//! A [`TransactionManager`] binds at most one open [`Transaction`] to each
//! calling thread. Nested call chains share that transaction through
//! [`TransactionManager::new_or_existing_transaction`]; only the outermost
//! caller owns it and decides whether it is committed.
//!
//! # Example
//!
//! ```ignore
//! let manager = TransactionManager::new(data_source);
//!
//! manager.run_in_transaction(|tx| {
//!     tx.with_connection(|conn| save_department(conn, &department))?;
//!     // Nested helpers join the same transaction
//!     assign_employees(&manager)?;
//!     Ok(())
//! })?;
//! ```

pub mod transaction;

pub use transaction::{Transaction, TransactionStatus};

use lazyorm_core::{ConnectionSource, Error, Result, TransactionErrorKind};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use transaction::TxState;

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // manager id -> transaction open on this thread
    static BOUND: RefCell<HashMap<u64, Rc<TxState>>> = RefCell::new(HashMap::new());
}

fn bound(manager: u64) -> Option<Rc<TxState>> {
    BOUND.with(|map| map.borrow().get(&manager).cloned())
}

fn bind(manager: u64, state: Rc<TxState>) {
    BOUND.with(|map| {
        map.borrow_mut().insert(manager, state);
    });
}

/// Remove the binding if it still points at `state`.
pub(crate) fn unbind(state: &Rc<TxState>) {
    // try_with: the thread-local may already be gone during thread teardown
    let _ = BOUND.try_with(|map| {
        let mut map = map.borrow_mut();
        let key = map
            .iter()
            .find(|(_, bound)| Rc::ptr_eq(bound, state))
            .map(|(key, _)| *key);
        if let Some(key) = key {
            map.remove(&key);
        }
    });
}

/// Opens transactions and tracks the one bound to each thread.
///
/// The manager itself is `Send + Sync` and may be shared; the transactions it
/// hands out are not.
pub struct TransactionManager {
    id: u64,
    source: Arc<dyn ConnectionSource>,
}

impl TransactionManager {
    /// Create a manager drawing connections from `source`.
    pub fn new(source: Arc<dyn ConnectionSource>) -> Self {
        Self {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            source,
        }
    }

    /// Open a new transaction owned by the caller.
    ///
    /// Fails if the calling thread already has an open transaction; nested
    /// transactions are not supported.
    #[tracing::instrument(level = "debug", skip(self), fields(manager = self.id))]
    pub fn new_transaction(&self) -> Result<Transaction> {
        if bound(self.id).is_some() {
            return Err(Error::transaction(
                TransactionErrorKind::AlreadyActive,
                "a transaction is already open on this thread",
            ));
        }

        let mut connection = self
            .source
            .acquire()
            .map_err(|e| Error::transaction_failed("failed to open connection", e))?;

        if let Err(e) = connection.set_auto_commit(false) {
            if let Err(close_err) = connection.close() {
                tracing::warn!(error = %close_err, "Failed to release connection");
            }
            return Err(Error::transaction_failed("failed to disable auto-commit", e));
        }

        let state = Rc::new(TxState::new(self.id, connection));
        bind(self.id, Rc::clone(&state));
        tracing::debug!("Transaction opened");
        Ok(Transaction::new(state, true))
    }

    /// The transaction open on the calling thread, as a non-owned handle.
    pub fn current_transaction(&self) -> Result<Transaction> {
        bound(self.id)
            .map(|state| Transaction::new(state, false))
            .ok_or_else(|| {
                Error::transaction(
                    TransactionErrorKind::NoActiveTransaction,
                    "no transaction is open on this thread",
                )
            })
    }

    /// Join the open transaction (non-owned) or open a new one (owned).
    pub fn new_or_existing_transaction(&self) -> Result<Transaction> {
        match bound(self.id) {
            Some(state) => {
                tracing::trace!(manager = self.id, "Joining open transaction");
                Ok(Transaction::new(state, false))
            }
            None => self.new_transaction(),
        }
    }

    /// Is a transaction open on the calling thread?
    pub fn is_transaction_active(&self) -> bool {
        bound(self.id).is_some()
    }

    /// Run `f` inside the thread's transaction, opening one if needed.
    ///
    /// On `Ok`, an owned transaction is committed (a joined one is left to
    /// its owner). On `Err`, the transaction is rolled back and the original
    /// error returned.
    pub fn run_in_transaction<R>(
        &self,
        f: impl FnOnce(&mut Transaction) -> Result<R>,
    ) -> Result<R> {
        let mut tx = self.new_or_existing_transaction()?;

        match f(&mut tx) {
            Ok(value) => {
                if !tx.is_closed() {
                    if tx.is_owned() {
                        tx.commit()?;
                    } else {
                        tx.close()?;
                    }
                }
                Ok(value)
            }
            Err(e) => {
                if !tx.is_closed() {
                    if let Err(rollback_err) = tx.rollback() {
                        tracing::warn!(error = %rollback_err, "Rollback after failed unit of work failed");
                    }
                }
                Err(e)
            }
        }
    }
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("id", &self.id)
            .field("active_on_this_thread", &self.is_transaction_active())
            .finish_non_exhaustive()
    }
}
