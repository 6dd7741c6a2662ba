use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::instrument;

use crate::domain::{
    Account, AccountId, Amount, Currency, Entry, EntryId, LedgerStats, NewAccount, Transfer,
    TransferId, TransferParams,
};

const ACCOUNT_COLUMNS: &str = "id, owner, currency, balance, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, amount, created_at";
const TRANSFER_COLUMNS: &str = "id, from_account_id, to_account_id, amount, created_at";

/// Typed CRUD calls bound to a single connection.
///
/// The connection is either a plain pool connection or the connection of an
/// open unit of work (see [`Store::exec_tx`](super::Store::exec_tx)); the
/// queries behave the same either way. No business rules live here.
pub struct Queries<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> Queries<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    // ========================
    // Account operations
    // ========================

    /// Insert a new account. The id and creation time are assigned here.
    #[instrument(skip(self, account), fields(owner = %account.owner, currency = %account.currency), err)]
    pub async fn create_account(&mut self, account: &NewAccount) -> Result<Account> {
        let row = sqlx::query(&format!(
            "INSERT INTO accounts (owner, currency, balance, created_at) VALUES (?, ?, ?, ?) RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(&account.owner)
        .bind(account.currency.as_str())
        .bind(account.balance)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *self.conn)
        .await
        .context("Failed to create account")?;

        row_to_account(&row)
    }

    /// Get an account by ID.
    pub async fn get_account(&mut self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(row_to_account).transpose()
    }

    /// Read an account inside a unit of work that already holds the write lock.
    ///
    /// SQLite has no row-level `FOR UPDATE`; a unit of work acquires the
    /// database write lock on its first write, after which no other writer can
    /// touch the row until commit or rollback. Reading through this call
    /// outside a unit of work gives no such guarantee.
    pub async fn get_account_for_update(&mut self, id: AccountId) -> Result<Option<Account>> {
        self.get_account(id).await
    }

    /// List accounts ordered by id.
    pub async fn list_accounts(&mut self, limit: i64, offset: i64) -> Result<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.conn)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(row_to_account).collect()
    }

    /// List the accounts of one owner ordered by id.
    pub async fn list_accounts_by_owner(
        &mut self,
        owner: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner = ? ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.conn)
        .await
        .context("Failed to list accounts by owner")?;

        rows.iter().map(row_to_account).collect()
    }

    /// Overwrite an account balance. Administrative primitive; transfers go
    /// through [`Queries::add_account_balance`].
    #[instrument(skip(self), err)]
    pub async fn update_account_balance(
        &mut self,
        id: AccountId,
        balance: Amount,
    ) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "UPDATE accounts SET balance = ? WHERE id = ? RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(balance)
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await
        .context("Failed to update account balance")?;

        row.as_ref().map(row_to_account).transpose()
    }

    /// Add a signed delta to an account balance and return the updated row.
    /// Read and write happen in one statement, so concurrent deltas never
    /// overwrite each other.
    #[instrument(skip(self), err)]
    pub async fn add_account_balance(
        &mut self,
        id: AccountId,
        delta: Amount,
    ) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "UPDATE accounts SET balance = balance + ? WHERE id = ? RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(delta)
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await
        .context("Failed to add to account balance")?;

        row.as_ref().map(row_to_account).transpose()
    }

    // ========================
    // Entry operations
    // ========================

    #[instrument(skip(self), err)]
    pub async fn create_entry(&mut self, account_id: AccountId, amount: Amount) -> Result<Entry> {
        let row = sqlx::query(&format!(
            "INSERT INTO entries (account_id, amount, created_at) VALUES (?, ?, ?) RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(account_id)
        .bind(amount)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *self.conn)
        .await
        .context("Failed to create entry")?;

        row_to_entry(&row)
    }

    pub async fn get_entry(&mut self, id: EntryId) -> Result<Option<Entry>> {
        let row = sqlx::query(&format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await
            .context("Failed to fetch entry")?;

        row.as_ref().map(row_to_entry).transpose()
    }

    /// List the entries of one account ordered by id.
    pub async fn list_entries(
        &mut self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Entry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE account_id = ? ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.conn)
        .await
        .context("Failed to list entries")?;

        rows.iter().map(row_to_entry).collect()
    }

    // ========================
    // Transfer operations
    // ========================

    #[instrument(skip(self), err)]
    pub async fn create_transfer(&mut self, params: &TransferParams) -> Result<Transfer> {
        let row = sqlx::query(&format!(
            "INSERT INTO transfers (from_account_id, to_account_id, amount, created_at) VALUES (?, ?, ?, ?) RETURNING {TRANSFER_COLUMNS}"
        ))
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *self.conn)
        .await
        .context("Failed to create transfer")?;

        row_to_transfer(&row)
    }

    pub async fn get_transfer(&mut self, id: TransferId) -> Result<Option<Transfer>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await
        .context("Failed to fetch transfer")?;

        row.as_ref().map(row_to_transfer).transpose()
    }

    /// List transfers leaving `from_account_id` or arriving at `to_account_id`,
    /// ordered by id.
    pub async fn list_transfers(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transfer>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TRANSFER_COLUMNS}
            FROM transfers
            WHERE from_account_id = ? OR to_account_id = ?
            ORDER BY id
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(from_account_id)
        .bind(to_account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.conn)
        .await
        .context("Failed to list transfers")?;

        rows.iter().map(row_to_transfer).collect()
    }

    // ========================
    // Integrity
    // ========================

    pub async fn ledger_stats(&mut self) -> Result<LedgerStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM accounts) AS account_count,
                (SELECT COUNT(*) FROM entries) AS entry_count,
                (SELECT COUNT(*) FROM transfers) AS transfer_count,
                (SELECT COALESCE(SUM(amount), 0) FROM entries) AS entry_total,
                (SELECT COUNT(*) FROM transfers WHERE amount <= 0) AS invalid_amounts
            "#,
        )
        .fetch_one(&mut *self.conn)
        .await
        .context("Failed to compute ledger statistics")?;

        Ok(LedgerStats {
            account_count: row.get("account_count"),
            entry_count: row.get("entry_count"),
            transfer_count: row.get("transfer_count"),
            entry_total: row.get("entry_total"),
            invalid_amounts: row.get("invalid_amounts"),
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .context("Invalid created_at timestamp")?
        .with_timezone(&Utc))
}

fn row_to_account(row: &SqliteRow) -> Result<Account> {
    let currency_str: String = row.get("currency");
    let created_at_str: String = row.get("created_at");

    Ok(Account {
        id: row.get("id"),
        owner: row.get("owner"),
        currency: Currency::from_str(&currency_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid currency: {}", currency_str))?,
        balance: row.get("balance"),
        created_at: parse_timestamp(&created_at_str)?,
    })
}

fn row_to_entry(row: &SqliteRow) -> Result<Entry> {
    let created_at_str: String = row.get("created_at");

    Ok(Entry {
        id: row.get("id"),
        account_id: row.get("account_id"),
        amount: row.get("amount"),
        created_at: parse_timestamp(&created_at_str)?,
    })
}

fn row_to_transfer(row: &SqliteRow) -> Result<Transfer> {
    let created_at_str: String = row.get("created_at");

    Ok(Transfer {
        id: row.get("id"),
        from_account_id: row.get("from_account_id"),
        to_account_id: row.get("to_account_id"),
        amount: row.get("amount"),
        created_at: parse_timestamp(&created_at_str)?,
    })
}
