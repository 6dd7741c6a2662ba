use thiserror::Error;

use crate::domain::{AccountId, Currency, EntryId, TransferId};

// SQLite primary result codes for lock contention.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("Transfer not found: {0}")]
    TransferNotFound(TransferId),

    #[error("No {0} found for the requested page")]
    NoRecords(&'static str),

    #[error("Account {account_id} has currency {actual}, expected {expected}")]
    CurrencyMismatch {
        account_id: AccountId,
        expected: Currency,
        actual: Currency,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid owner: {0}")]
    InvalidOwner(String),

    #[error("Invalid page: {0}")]
    InvalidPage(String),

    /// A referenced row disappeared between validation and execution.
    #[error("Missing resource: {0}")]
    MissingResource(String),

    #[error("Database error: {0:#}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// Translate a storage or engine failure into the application taxonomy.
    ///
    /// Foreign-key violations and vanished rows become [`AppError::MissingResource`];
    /// every other failure is kept as [`AppError::Database`] with its full cause.
    pub fn from_storage(err: anyhow::Error) -> Self {
        let missing = match err.downcast_ref::<sqlx::Error>() {
            Some(sqlx::Error::RowNotFound) => true,
            Some(sqlx::Error::Database(db_err)) => db_err.is_foreign_key_violation(),
            _ => false,
        };

        if missing {
            AppError::MissingResource(format!("{err:#}"))
        } else {
            AppError::Database(err)
        }
    }

    /// Whether the failure was transient lock contention.
    ///
    /// The transfer engine never retries on its own; callers use this to
    /// decide whether running the same request again makes sense.
    pub fn is_retryable(&self) -> bool {
        let AppError::Database(err) = self else {
            return false;
        };

        match err.downcast_ref::<sqlx::Error>() {
            Some(sqlx::Error::PoolTimedOut) => true,
            Some(sqlx::Error::Database(db_err)) => db_err
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
            _ => false,
        }
    }

    /// Whether the error means the caller referenced something that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::AccountNotFound(_)
                | AppError::EntryNotFound(_)
                | AppError::TransferNotFound(_)
                | AppError::NoRecords(_)
                | AppError::MissingResource(_)
        )
    }
}
