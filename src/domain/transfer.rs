use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Amount};

pub type TransferId = i64;

/// A transfer records one movement of money from one account to another.
/// Transfers are immutable and always own exactly two entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    /// Source account (balance decreases)
    pub from_account_id: AccountId,
    /// Destination account (balance increases)
    pub to_account_id: AccountId,
    /// Always positive
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

/// Arguments of a single money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Amount,
}

impl TransferParams {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: Amount) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    /// A self-transfer moves money out of and back into the same account.
    pub fn is_self_transfer(&self) -> bool {
        self.from_account_id == self.to_account_id
    }

    /// Signed amount of the debit entry on the source account.
    pub fn debit_amount(&self) -> Amount {
        -self.amount
    }

    /// Signed amount of the credit entry on the destination account.
    pub fn credit_amount(&self) -> Amount {
        self.amount
    }
}
