use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::{Account, Entry, Transfer, TransferParams, balance_update_order};
use crate::storage::{Queries, Store};

/// Everything a successful transfer produced, with post-update balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// Moves money between two accounts as one atomic unit of work.
///
/// The caller is expected to have checked that both accounts exist, share
/// the transfer currency and that the amount is positive. The engine does
/// not retry and does not guard against negative balances; any storage
/// failure rolls the whole unit of work back and is returned unchanged.
#[derive(Clone)]
pub struct TransferEngine {
    store: Store,
}

impl TransferEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    #[instrument(
        skip(self, params),
        fields(
            from = params.from_account_id,
            to = params.to_account_id,
            amount = params.amount
        ),
        err
    )]
    pub async fn execute(&self, params: TransferParams) -> Result<TransferResult> {
        self.store
            .exec_tx(move |q| Box::pin(transfer_tx(q, params)))
            .await
    }
}

async fn transfer_tx(mut q: Queries<'_>, params: TransferParams) -> Result<TransferResult> {
    let transfer = q.create_transfer(&params).await?;
    let from_entry = q
        .create_entry(params.from_account_id, params.debit_amount())
        .await?;
    let to_entry = q
        .create_entry(params.to_account_id, params.credit_amount())
        .await?;

    let [first, second] = balance_update_order(&params);
    debug!(
        first = first.account_id,
        second = second.account_id,
        "updating balances"
    );

    let first_account = q
        .add_account_balance(first.account_id, first.delta)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
        .with_context(|| format!("Account {} vanished during transfer", first.account_id))?;
    let second_account = q
        .add_account_balance(second.account_id, second.delta)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
        .with_context(|| format!("Account {} vanished during transfer", second.account_id))?;

    // For a self-transfer both snapshots describe the same row; the later
    // one carries the final balance.
    let (from_account, to_account) = if params.is_self_transfer() {
        (second_account.clone(), second_account)
    } else if first.account_id == params.from_account_id {
        (first_account, second_account)
    } else {
        (second_account, first_account)
    };

    Ok(TransferResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}
