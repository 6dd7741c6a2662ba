use anyhow::{Context, Result};
use futures::future::BoxFuture;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::domain::{
    Account, AccountId, Entry, EntryId, LedgerStats, NewAccount, Transfer, TransferId,
};

use super::{MIGRATION_001_INITIAL, Queries};

/// The ledger store: a SQLite connection pool plus the unit-of-work primitive.
///
/// Pool-level methods run a single statement on a pooled connection. Anything
/// that has to be atomic goes through [`Store::exec_tx`].
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Create a new store with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a connection pool according to `config`.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.connect_options()?)
            .await
            .context("Failed to connect to database")?;
        debug!(url = %config.database_url, "connected to database");
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(config: &Config) -> Result<Self> {
        let store = Self::connect(config).await?;
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run `f` as one atomic unit of work.
    ///
    /// `f` receives [`Queries`] bound to an open transaction. The transaction
    /// commits when `f` returns `Ok` and rolls back when it returns `Err`; the
    /// error from `f` is returned as is. If the returned future is dropped
    /// before completion (cancellation, timeout) the transaction is rolled
    /// back as well, so no partial write is ever visible.
    ///
    /// Issue writes before reads inside `f`: a transaction that starts with a
    /// read and later writes cannot wait for the write lock and fails with
    /// `SQLITE_BUSY` under contention.
    #[instrument(skip_all, err)]
    pub async fn exec_tx<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(Queries<'c>) -> BoxFuture<'c, Result<T>> + Send,
        T: Send,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin unit of work")?;

        let result = f(Queries::new(&mut *tx)).await;
        match result {
            Ok(value) => {
                tx.commit().await.context("Failed to commit unit of work")?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                    return Err(err.context(format!("rollback error: {rollback_err}")));
                }
                Err(err)
            }
        }
    }

    // ========================
    // Account operations
    // ========================

    pub async fn create_account(&self, account: &NewAccount) -> Result<Account> {
        let mut conn = self.acquire().await?;
        Queries::new(&mut conn).create_account(account).await
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let mut conn = self.acquire().await?;
        Queries::new(&mut conn).get_account(id).await
    }

    pub async fn list_accounts(&self, limit: i64, offset: i64) -> Result<Vec<Account>> {
        let mut conn = self.acquire().await?;
        Queries::new(&mut conn).list_accounts(limit, offset).await
    }

    pub async fn list_accounts_by_owner(
        &self,
        owner: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Account>> {
        let mut conn = self.acquire().await?;
        Queries::new(&mut conn)
            .list_accounts_by_owner(owner, limit, offset)
            .await
    }

    // ========================
    // Entry operations
    // ========================

    pub async fn get_entry(&self, id: EntryId) -> Result<Option<Entry>> {
        let mut conn = self.acquire().await?;
        Queries::new(&mut conn).get_entry(id).await
    }

    pub async fn list_entries(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Entry>> {
        let mut conn = self.acquire().await?;
        Queries::new(&mut conn)
            .list_entries(account_id, limit, offset)
            .await
    }

    // ========================
    // Transfer operations
    // ========================

    pub async fn get_transfer(&self, id: TransferId) -> Result<Option<Transfer>> {
        let mut conn = self.acquire().await?;
        Queries::new(&mut conn).get_transfer(id).await
    }

    pub async fn list_transfers(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transfer>> {
        let mut conn = self.acquire().await?;
        Queries::new(&mut conn)
            .list_transfers(from_account_id, to_account_id, limit, offset)
            .await
    }

    // ========================
    // Integrity
    // ========================

    pub async fn ledger_stats(&self) -> Result<LedgerStats> {
        let mut conn = self.acquire().await?;
        Queries::new(&mut conn).ledger_stats().await
    }

    async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Sqlite>> {
        self.pool
            .acquire()
            .await
            .context("Failed to acquire database connection")
    }
}
