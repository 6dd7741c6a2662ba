use serde::{Deserialize, Serialize};

use super::{AccountId, Amount, Entry, TransferParams};

/// A signed change to one account's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDelta {
    pub account_id: AccountId,
    pub delta: Amount,
}

/// Decide the order in which the two balance rows of a transfer are written.
///
/// Every caller must lock rows in the same global order, otherwise A->B and
/// B->A running at the same time can each hold one row while waiting on the
/// other. The lower account id is always written first. When the ids are
/// equal (self-transfer) the destination delta comes first and the two
/// updates are applied to the same row one after the other.
pub fn balance_update_order(params: &TransferParams) -> [BalanceDelta; 2] {
    let debit = BalanceDelta {
        account_id: params.from_account_id,
        delta: params.debit_amount(),
    };
    let credit = BalanceDelta {
        account_id: params.to_account_id,
        delta: params.credit_amount(),
    };

    if params.from_account_id < params.to_account_id {
        [debit, credit]
    } else {
        [credit, debit]
    }
}

/// Money leaving the source equals money arriving at the destination.
pub fn is_conserving(
    from_before: Amount,
    from_after: Amount,
    to_before: Amount,
    to_after: Amount,
) -> bool {
    from_before - from_after == to_after - to_before
}

/// Entries written by transfers always cancel out.
pub fn entries_net_to_zero(entries: &[Entry]) -> bool {
    entries.iter().map(|e| e.amount).sum::<Amount>() == 0
}

/// Raw counters read from the store for integrity checking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub account_count: i64,
    pub entry_count: i64,
    pub transfer_count: i64,
    /// Sum of every entry amount in the ledger
    pub entry_total: Amount,
    /// Transfers with a non-positive amount
    pub invalid_amounts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrityIssue {
    EntriesDoNotNetToZero { total: Amount },
    EntryCountMismatch { entries: i64, transfers: i64 },
    InvalidAmounts { count: i64 },
}

impl std::fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityIssue::EntriesDoNotNetToZero { total } => {
                write!(f, "entries sum to {} instead of zero", total)
            }
            IntegrityIssue::EntryCountMismatch { entries, transfers } => write!(
                f,
                "{} entries recorded for {} transfers (expected {})",
                entries,
                transfers,
                transfers * 2
            ),
            IntegrityIssue::InvalidAmounts { count } => {
                write!(f, "{} transfers have a non-positive amount", count)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub stats: LedgerStats,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn build_integrity_report(stats: LedgerStats) -> IntegrityReport {
    let mut issues = Vec::new();

    if stats.entry_total != 0 {
        issues.push(IntegrityIssue::EntriesDoNotNetToZero {
            total: stats.entry_total,
        });
    }
    if stats.entry_count != stats.transfer_count * 2 {
        issues.push(IntegrityIssue::EntryCountMismatch {
            entries: stats.entry_count,
            transfers: stats.transfer_count,
        });
    }
    if stats.invalid_amounts > 0 {
        issues.push(IntegrityIssue::InvalidAmounts {
            count: stats.invalid_amounts,
        });
    }

    IntegrityReport { stats, issues }
}
