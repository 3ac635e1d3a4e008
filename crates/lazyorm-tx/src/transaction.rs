//! A transaction bound to the thread that opened it.

use lazyorm_core::{Connection, Error, Result, TransactionErrorKind};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Lifecycle of the shared transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Open,
    Committed,
    RolledBack,
    /// Closed without commit or rollback completing.
    Closed,
}

/// State shared by the owning transaction and every non-owned wrapper.
pub(crate) struct TxState {
    manager: u64,
    connection: RefCell<Option<Box<dyn Connection>>>,
    status: Cell<TransactionStatus>,
    /// The connection is out of its slot for a `with_connection` call.
    lent: Cell<bool>,
    /// Commit (`true`) or rollback requested while the connection was lent.
    pending: Cell<Option<bool>>,
}

impl TxState {
    pub(crate) fn new(manager: u64, connection: Box<dyn Connection>) -> Self {
        Self {
            manager,
            connection: RefCell::new(Some(connection)),
            status: Cell::new(TransactionStatus::Open),
            lent: Cell::new(false),
            pending: Cell::new(None),
        }
    }

    fn is_open(&self) -> bool {
        self.status.get() == TransactionStatus::Open
    }

    /// Take the connection out of its slot until [`restore`](Self::restore).
    fn lend(&self) -> Result<Box<dyn Connection>> {
        let taken = self.connection.borrow_mut().take();
        let Some(connection) = taken else {
            return Err(if self.lent.get() {
                Error::transaction(
                    TransactionErrorKind::AlreadyActive,
                    "connection is already in use by an enclosing call",
                )
            } else {
                closed()
            });
        };
        self.lent.set(true);
        Ok(connection)
    }

    /// Put a lent connection back, or finish the transaction if that was
    /// requested in the meantime.
    fn restore(self: &Rc<Self>, connection: Box<dyn Connection>) -> Result<()> {
        self.lent.set(false);
        match self.pending.take() {
            Some(commit) => self.complete(connection, commit),
            None => {
                *self.connection.borrow_mut() = Some(connection);
                Ok(())
            }
        }
    }

    /// Commit or roll back, then release the connection and unbind, whatever
    /// the outcome of the first step.
    ///
    /// While the connection is lent the work is deferred until it comes back;
    /// the transaction is unbound and reports its final status immediately.
    fn finish(self: &Rc<Self>, commit: bool) -> Result<()> {
        let taken = self.connection.borrow_mut().take();
        let Some(connection) = taken else {
            if !(self.lent.get() && self.is_open()) {
                return Err(closed());
            }
            self.pending.set(Some(commit));
            self.status.set(final_status(commit));
            crate::unbind(self);
            tracing::debug!(
                manager = self.manager,
                action = action_name(commit),
                "Transaction finish deferred until the connection is returned"
            );
            return Ok(());
        };
        self.complete(connection, commit)
    }

    fn complete(self: &Rc<Self>, mut connection: Box<dyn Connection>, commit: bool) -> Result<()> {
        let outcome = if commit {
            connection.commit()
        } else {
            connection.rollback()
        };
        let released = connection.close();
        crate::unbind(self);

        let action = action_name(commit);
        if let Err(e) = released {
            tracing::warn!(manager = self.manager, action, error = %e, "Failed to release connection");
        }

        match outcome {
            Ok(()) => {
                self.status.set(final_status(commit));
                tracing::debug!(manager = self.manager, action, "Transaction finished");
                Ok(())
            }
            Err(e) => {
                self.status.set(TransactionStatus::Closed);
                tracing::debug!(manager = self.manager, action, error = %e, "Transaction failed");
                Err(Error::transaction_failed(
                    format!("transaction {action} failed"),
                    e,
                ))
            }
        }
    }
}

fn final_status(commit: bool) -> TransactionStatus {
    if commit {
        TransactionStatus::Committed
    } else {
        TransactionStatus::RolledBack
    }
}

fn action_name(commit: bool) -> &'static str {
    if commit { "commit" } else { "rollback" }
}

fn closed() -> Error {
    Error::transaction(TransactionErrorKind::Closed, "transaction is already closed")
}

/// A unit of work over one connection.
///
/// Obtained from [`TransactionManager`](crate::TransactionManager). The
/// *owned* transaction returned by `new_transaction` controls the
/// connection; wrappers handed out for an already-open transaction are
/// *non-owned*:
///
/// | Call | Owned | Non-owned |
/// |---|---|---|
/// | `commit` | commit, release, unbind | defer to the owner |
/// | `rollback` | roll back, release, unbind | roll back the shared transaction |
/// | `close` | roll back if still open, release, unbind | no-op |
///
/// Dropping an owned transaction that is still open rolls it back. The type
/// is neither `Send` nor `Sync`: a transaction never leaves its thread.
pub struct Transaction {
    state: Rc<TxState>,
    owned: bool,
    released: bool,
}

impl Transaction {
    pub(crate) fn new(state: Rc<TxState>, owned: bool) -> Self {
        Self {
            state,
            owned,
            released: false,
        }
    }

    /// Does this handle own the connection?
    #[must_use]
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Has this handle been committed, rolled back or closed?
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.released || !self.state.is_open()
    }

    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.state.status.get()
    }

    /// Run `f` against the open connection.
    ///
    /// Nested callers inside `f` may join and roll back this transaction; the
    /// rollback runs once `f` returns. Calling `with_connection` again from
    /// inside `f` fails with [`TransactionErrorKind::AlreadyActive`].
    pub fn with_connection<R>(
        &mut self,
        f: impl FnOnce(&mut dyn Connection) -> Result<R>,
    ) -> Result<R> {
        self.ensure_open()?;
        let mut connection = self.state.lend()?;
        let result = f(connection.as_mut());
        let restored = self.state.restore(connection);

        match (result, restored) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(finish_err)) => {
                tracing::warn!(
                    manager = self.state.manager,
                    error = %finish_err,
                    "Deferred transaction finish failed"
                );
                Err(e)
            }
        }
    }

    /// Commit the transaction.
    ///
    /// The connection is released and the thread binding removed even when
    /// the commit itself fails.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.released = true;
        if !self.owned {
            tracing::trace!(manager = self.state.manager, "Commit deferred to owning transaction");
            return Ok(());
        }
        self.state.finish(true)
    }

    /// Roll back the transaction.
    ///
    /// A non-owned handle rolls back the shared transaction; its owner then
    /// reports closed.
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.released = true;
        self.state.finish(false)
    }

    /// Close the handle.
    ///
    /// An owned transaction that was neither committed nor rolled back is
    /// rolled back. Closing again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if !self.owned || self.released {
            self.released = true;
            return Ok(());
        }
        self.released = true;
        if !self.state.is_open() {
            return Ok(());
        }

        tracing::warn!(
            manager = self.state.manager,
            "Closing transaction that was neither committed nor rolled back; rolling back"
        );
        self.state.finish(false)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(closed());
        }
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "Rollback of dropped transaction failed");
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("manager", &self.state.manager)
            .field("owned", &self.owned)
            .field("status", &self.state.status.get())
            .field("released", &self.released)
            .finish()
    }
}
