use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::Config;
use crate::domain::{
    Account, AccountId, Amount, Currency, Entry, EntryId, IntegrityReport, NewAccount, Transfer,
    TransferId, TransferParams, build_integrity_report,
};
use crate::engine::{TransferEngine, TransferResult};
use crate::storage::Store;

use super::AppError;

pub const MIN_PAGE_LIMIT: i64 = 5;
pub const MAX_PAGE_LIMIT: i64 = 50;

/// Application service in front of the ledger store and the transfer engine.
/// It validates requests the way a front end would before touching storage;
/// this is the primary interface for any client (CLI, API, etc.).
#[derive(Clone)]
pub struct LedgerService {
    store: Store,
    engine: TransferEngine,
}

/// One page of a paginated listing. Pages start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Validate a page request: `page >= 1`, and `limit` a multiple of 5
    /// between 5 and 50.
    pub fn new(page: i64, limit: i64) -> Result<Self, AppError> {
        if page < 1 {
            return Err(AppError::InvalidPage(format!(
                "page must be at least 1, got {}",
                page
            )));
        }
        if !(MIN_PAGE_LIMIT..=MAX_PAGE_LIMIT).contains(&limit) || limit % 5 != 0 {
            return Err(AppError::InvalidPage(format!(
                "limit must be a multiple of 5 between {} and {}, got {}",
                MIN_PAGE_LIMIT, MAX_PAGE_LIMIT, limit
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// A transfer as requested by a client, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub currency: Currency,
    pub amount: Amount,
}

impl LedgerService {
    /// Create a new ledger service on top of the given store.
    pub fn new(store: Store) -> Self {
        let engine = TransferEngine::new(store.clone());
        Self { store, engine }
    }

    /// Connect and run migrations.
    pub async fn init(config: &Config) -> Result<Self, AppError> {
        let store = Store::init(config).await?;
        Ok(Self::new(store))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        let store = Store::connect(config).await?;
        Ok(Self::new(store))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    // ========================
    // Account operations
    // ========================

    /// Open a new account.
    #[instrument(skip(self), err)]
    pub async fn create_account(
        &self,
        owner: &str,
        currency: Currency,
        balance: Amount,
    ) -> Result<Account, AppError> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(AppError::InvalidOwner("owner must not be empty".to_string()));
        }

        let account = self
            .store
            .create_account(&NewAccount::new(owner, currency).with_balance(balance))
            .await?;
        info!(account_id = account.id, "account created");
        Ok(account)
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Account, AppError> {
        self.store
            .get_account(id)
            .await?
            .ok_or(AppError::AccountNotFound(id))
    }

    /// List accounts. An empty page is reported as [`AppError::NoRecords`].
    pub async fn list_accounts(&self, page: PageRequest) -> Result<Vec<Account>, AppError> {
        let accounts = self
            .store
            .list_accounts(page.limit, page.offset())
            .await?;
        if accounts.is_empty() {
            return Err(AppError::NoRecords("accounts"));
        }
        Ok(accounts)
    }

    /// List the accounts of one owner.
    pub async fn list_accounts_by_owner(
        &self,
        owner: &str,
        page: PageRequest,
    ) -> Result<Vec<Account>, AppError> {
        Ok(self
            .store
            .list_accounts_by_owner(owner, page.limit, page.offset())
            .await?)
    }

    // ========================
    // Entry operations
    // ========================

    pub async fn get_entry(&self, id: EntryId) -> Result<Entry, AppError> {
        self.store
            .get_entry(id)
            .await?
            .ok_or(AppError::EntryNotFound(id))
    }

    /// List the entries of an account.
    pub async fn list_entries(
        &self,
        account_id: AccountId,
        page: PageRequest,
    ) -> Result<Vec<Entry>, AppError> {
        self.get_account(account_id).await?;
        Ok(self
            .store
            .list_entries(account_id, page.limit, page.offset())
            .await?)
    }

    // ========================
    // Transfer operations
    // ========================

    pub async fn get_transfer(&self, id: TransferId) -> Result<Transfer, AppError> {
        self.store
            .get_transfer(id)
            .await?
            .ok_or(AppError::TransferNotFound(id))
    }

    /// List transfers leaving `from_account_id` or arriving at `to_account_id`.
    pub async fn list_transfers(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        page: PageRequest,
    ) -> Result<Vec<Transfer>, AppError> {
        Ok(self
            .store
            .list_transfers(from_account_id, to_account_id, page.limit, page.offset())
            .await?)
    }

    /// Validate a transfer request and hand it to the transfer engine.
    ///
    /// Both accounts must exist and hold the requested currency, and the
    /// amount must be positive. Balances are allowed to go negative.
    #[instrument(skip(self), err)]
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferResult, AppError> {
        if request.amount <= 0 {
            return Err(AppError::InvalidAmount(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }

        self.valid_account(request.from_account_id, request.currency)
            .await?;
        self.valid_account(request.to_account_id, request.currency)
            .await?;

        let params = TransferParams::new(
            request.from_account_id,
            request.to_account_id,
            request.amount,
        );
        let result = self
            .engine
            .execute(params)
            .await
            .map_err(AppError::from_storage)?;

        info!(
            transfer_id = result.transfer.id,
            from_balance = result.from_account.balance,
            to_balance = result.to_account.balance,
            "transfer committed"
        );
        Ok(result)
    }

    async fn valid_account(
        &self,
        account_id: AccountId,
        currency: Currency,
    ) -> Result<Account, AppError> {
        let account = self.get_account(account_id).await?;
        if account.currency != currency {
            return Err(AppError::CurrencyMismatch {
                account_id,
                expected: currency,
                actual: account.currency,
            });
        }
        Ok(account)
    }

    // ========================
    // Integrity operations
    // ========================

    /// Check ledger integrity and return a report.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let stats = self.store.ledger_stats().await?;
        Ok(build_integrity_report(stats))
    }
}
