//! Blocking database connection contract used by the transaction manager.
//!
//! Only the transaction-control surface lives here. Statement execution and
//! row mapping belong to the driver and never pass through this crate.

use crate::error::Result;

/// A physical database connection.
///
/// Implementations wrap a driver connection. Every call blocks the calling
/// thread until the driver returns.
pub trait Connection: Send {
    /// Enable or disable implicit auto-commit.
    fn set_auto_commit(&mut self, enabled: bool) -> Result<()>;

    /// Commit the current unit of work.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the current unit of work.
    fn rollback(&mut self) -> Result<()>;

    /// Release the connection back to its source.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Something that hands out fresh connections (a pool, a data source, ...).
pub trait ConnectionSource: Send + Sync {
    /// Acquire a connection for exclusive use by the caller.
    fn acquire(&self) -> Result<Box<dyn Connection>>;
}
