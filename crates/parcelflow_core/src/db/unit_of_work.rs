//! Explicit transaction scope for lifecycle mutations.
//!
//! # Responsibility
//! - Acquire the database write lock up front (`BEGIN IMMEDIATE`).
//! - Hand repositories a connection bound to the open transaction.
//! - Offer savepoints for best-effort sub-steps.
//!
//! # Invariants
//! - Dropping a `UnitOfWork` without `commit` rolls back every write.
//! - Writers on one database are serialized for the lifetime of the unit.

use super::DbResult;
use crate::repo::actor_repo::SqliteActorRepository;
use crate::repo::history_repo::SqliteHistoryRepository;
use crate::repo::parcel_repo::SqliteParcelRepository;
use log::debug;
use rusqlite::{Connection, Savepoint, Transaction, TransactionBehavior};
use std::time::Instant;

/// One logical transaction against the authoritative store.
#[derive(Debug)]
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
    started_at: Instant,
}

impl<'conn> UnitOfWork<'conn> {
    /// Begins an immediate transaction on `conn`.
    ///
    /// Fails with `DbError::Busy` when another connection keeps the write
    /// lock past the configured busy timeout.
    pub fn begin(conn: &'conn mut Connection) -> DbResult<Self> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(Self {
            tx,
            started_at: Instant::now(),
        })
    }

    pub fn parcels(&self) -> SqliteParcelRepository<'_> {
        SqliteParcelRepository::new(&self.tx)
    }

    pub fn history(&self) -> SqliteHistoryRepository<'_> {
        SqliteHistoryRepository::new(&self.tx)
    }

    pub fn actors(&self) -> SqliteActorRepository<'_> {
        SqliteActorRepository::new(&self.tx)
    }

    /// Opens a nested savepoint. Dropping it without `commit` undoes only
    /// the writes made through it.
    pub fn savepoint(&mut self) -> DbResult<Savepoint<'_>> {
        Ok(self.tx.savepoint()?)
    }

    /// Commits every write made in this unit.
    pub fn commit(self) -> DbResult<()> {
        let held_ms = self.started_at.elapsed().as_millis();
        self.tx.commit()?;
        debug!("event=uow_commit module=db status=ok held_ms={held_ms}");
        Ok(())
    }
}

/// Opens a deferred, read-only snapshot over `conn`.
///
/// Multi-statement reads (parcel plus its history) go through a snapshot so
/// they never observe a half-applied write from another connection. The
/// returned transaction rolls back on drop.
pub fn read_snapshot(conn: &Connection) -> DbResult<Transaction<'_>> {
    Ok(Transaction::new_unchecked(
        conn,
        TransactionBehavior::Deferred,
    )?)
}
