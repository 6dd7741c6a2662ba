use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, Currency};

pub type AccountId = i64;

/// A monetary account. Transfers move the balance; the only other writer is
/// the administrative `update_account_balance` overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Reference to the owning user
    pub owner: String,
    pub currency: Currency,
    /// Signed balance in minor units. May go negative: no overdraft guard exists.
    pub balance: Amount,
    pub created_at: DateTime<Utc>,
}

/// Values needed to open an account. The id and timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub owner: String,
    pub currency: Currency,
    pub balance: Amount,
}

impl NewAccount {
    pub fn new(owner: impl Into<String>, currency: Currency) -> Self {
        Self {
            owner: owner.into(),
            currency,
            balance: 0,
        }
    }

    pub fn with_balance(mut self, balance: Amount) -> Self {
        self.balance = balance;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_starts_empty() {
        let account = NewAccount::new("alice", Currency::Idr);
        assert_eq!(account.balance, 0);
        assert_eq!(account.owner, "alice");
    }

    #[test]
    fn test_new_account_with_opening_balance() {
        let account = NewAccount::new("bob", Currency::Usd).with_balance(1000);
        assert_eq!(account.balance, 1000);
        assert_eq!(account.currency, Currency::Usd);
    }
}
