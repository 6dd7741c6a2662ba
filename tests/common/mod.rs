// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use simplebank::application::{LedgerService, PageRequest};
use simplebank::config::Config;
use simplebank::domain::{Account, Amount, Currency};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let config = Config::for_path(&temp_dir.path().join("test.db"));
    let service = LedgerService::init(&config).await?;
    Ok((service, temp_dir))
}

/// First page with the largest allowed page size
pub fn first_page() -> PageRequest {
    PageRequest::new(1, 50).unwrap()
}

/// Test fixture: a pair of accounts in the same currency
pub struct AccountPair {
    pub x: Account,
    pub y: Account,
}

impl AccountPair {
    pub async fn create(
        service: &LedgerService,
        currency: Currency,
        x_balance: Amount,
        y_balance: Amount,
    ) -> Result<Self> {
        let x = service.create_account("xavier", currency, x_balance).await?;
        let y = service.create_account("yolanda", currency, y_balance).await?;
        Ok(Self { x, y })
    }

    /// The scenario accounts: X with 1000 IDR and Y with 500 IDR
    pub async fn scenario(service: &LedgerService) -> Result<Self> {
        Self::create(service, Currency::Idr, 1000, 500).await
    }
}

/// Current balance of an account, read straight from the store
pub async fn balance_of(service: &LedgerService, account: &Account) -> Result<Amount> {
    Ok(service.get_account(account.id).await?.balance)
}
