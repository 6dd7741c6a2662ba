use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::application::{LedgerService, PageRequest, TransferRequest};
use crate::config::Config;
use crate::domain::{
    Account, AccountId, Currency, Entry, Transfer, TransferId, format_amount, parse_amount,
};
use crate::engine::TransferResult;

/// Simplebank - account ledger with atomic transfers
#[derive(Parser)]
#[command(name = "simplebank")]
#[command(about = "Accounts, append-only entries and atomic transfers between accounts")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Move money from one account to another
    Transfer {
        /// Amount to transfer (e.g., "13.52" or "50")
        amount: String,

        /// Source account ID
        #[arg(long)]
        from: AccountId,

        /// Destination account ID
        #[arg(long)]
        to: AccountId,

        /// Currency both accounts must hold (USD, EUR, IDR)
        #[arg(short, long)]
        currency: String,
    },

    /// List the entries of an account
    Entries {
        /// Account ID
        account: AccountId,

        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: i64,

        /// Page size (multiple of 5, at most 50)
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
    },

    /// List transfers leaving or arriving at the given accounts
    Transfers {
        /// Transfers sent by this account
        #[arg(long, required_unless_present = "to")]
        from: Option<AccountId>,

        /// Transfers received by this account
        #[arg(long)]
        to: Option<AccountId>,

        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: i64,

        /// Page size (multiple of 5, at most 50)
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
    },

    /// Show a single transfer
    #[command(name = "show")]
    ShowTransfer {
        /// Transfer ID
        id: TransferId,
    },

    /// Verify ledger integrity
    Check,
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Create {
        /// Owner of the account
        #[arg(long)]
        owner: String,

        /// Currency code (USD, EUR, IDR)
        #[arg(short, long, default_value = "IDR")]
        currency: String,

        /// Opening balance (e.g., "10.00")
        #[arg(short, long, default_value = "0")]
        balance: String,
    },

    /// Show an account
    Show {
        /// Account ID
        id: AccountId,
    },

    /// List accounts
    List {
        /// Only accounts of this owner
        #[arg(long)]
        owner: Option<String>,

        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: i64,

        /// Page size (multiple of 5, at most 50)
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let json = self.json;

        match self.command {
            Commands::Init => {
                LedgerService::init(&self.config).await?;
                println!("Database initialized: {}", self.config.database_url);
            }

            Commands::Account(account_cmd) => {
                let service = LedgerService::connect(&self.config).await?;
                run_account_command(&service, account_cmd, json).await?;
            }

            Commands::Transfer {
                amount,
                from,
                to,
                currency,
            } => {
                let service = LedgerService::connect(&self.config).await?;
                let amount =
                    parse_amount(&amount).context("Invalid amount format. Use '13.52' or '50'")?;
                let request = TransferRequest {
                    from_account_id: from,
                    to_account_id: to,
                    currency: parse_currency(&currency)?,
                    amount,
                };

                let result = service.transfer(request).await?;
                if json {
                    print_json(&result)?;
                } else {
                    print_transfer_result(&result);
                }
            }

            Commands::Entries {
                account,
                page,
                limit,
            } => {
                let service = LedgerService::connect(&self.config).await?;
                let entries = service
                    .list_entries(account, PageRequest::new(page, limit)?)
                    .await?;
                if json {
                    print_json(&entries)?;
                } else {
                    print_entries(&entries);
                }
            }

            Commands::Transfers {
                from,
                to,
                page,
                limit,
            } => {
                let service = LedgerService::connect(&self.config).await?;
                // Ids start at 1, so 0 never matches a missing side
                let transfers = service
                    .list_transfers(
                        from.unwrap_or(0),
                        to.unwrap_or(0),
                        PageRequest::new(page, limit)?,
                    )
                    .await?;
                if json {
                    print_json(&transfers)?;
                } else {
                    print_transfers(&transfers);
                }
            }

            Commands::ShowTransfer { id } => {
                let service = LedgerService::connect(&self.config).await?;
                let transfer = service.get_transfer(id).await?;
                if json {
                    print_json(&transfer)?;
                } else {
                    print_transfers(std::slice::from_ref(&transfer));
                }
            }

            Commands::Check => {
                let service = LedgerService::connect(&self.config).await?;
                run_check_command(&service, json).await?;
            }
        }

        Ok(())
    }
}

async fn run_account_command(
    service: &LedgerService,
    cmd: AccountCommands,
    json: bool,
) -> Result<()> {
    match cmd {
        AccountCommands::Create {
            owner,
            currency,
            balance,
        } => {
            let balance = parse_amount(&balance)
                .context("Invalid balance format. Use '10.00' or '10'")?;
            let account = service
                .create_account(&owner, parse_currency(&currency)?, balance)
                .await?;
            if json {
                print_json(&account)?;
            } else {
                println!(
                    "Created account {} for {} ({} {})",
                    account.id,
                    account.owner,
                    format_amount(account.balance),
                    account.currency
                );
            }
        }

        AccountCommands::Show { id } => {
            let account = service.get_account(id).await?;
            if json {
                print_json(&account)?;
            } else {
                println!("Account: {}", account.id);
                println!("  Owner:    {}", account.owner);
                println!("  Currency: {}", account.currency);
                println!("  Balance:  {}", format_amount(account.balance));
                println!(
                    "  Created:  {}",
                    account.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }

        AccountCommands::List { owner, page, limit } => {
            let page = PageRequest::new(page, limit)?;
            let accounts = match owner {
                Some(owner) => service.list_accounts_by_owner(&owner, page).await?,
                None => service.list_accounts(page).await?,
            };
            if json {
                print_json(&accounts)?;
            } else {
                print_accounts(&accounts);
            }
        }
    }

    Ok(())
}

async fn run_check_command(service: &LedgerService, json: bool) -> Result<()> {
    let report = service.check_integrity().await?;

    if json {
        print_json(&report)?;
    } else {
        println!("Checking ledger integrity...\n");
        println!("Accounts:  {}", report.stats.account_count);
        println!("Transfers: {}", report.stats.transfer_count);
        println!("Entries:   {}", report.stats.entry_count);
        println!("Net total: {}", format_amount(report.stats.entry_total));
        println!();
    }

    if report.is_healthy() {
        if !json {
            println!("Ledger is consistent.");
        }
    } else {
        if !json {
            println!("Issues found:");
            for issue in &report.issues {
                println!("  - {}", issue);
            }
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

fn parse_currency(code: &str) -> Result<Currency> {
    Currency::from_str(code)
        .ok_or_else(|| anyhow::anyhow!("Invalid currency '{}'. Valid: USD, EUR, IDR", code))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_transfer_result(result: &TransferResult) {
    println!(
        "Transfer {}: {} from account {} to account {}",
        result.transfer.id,
        format_amount(result.transfer.amount),
        result.transfer.from_account_id,
        result.transfer.to_account_id
    );
    println!(
        "  Account {} balance: {} {}",
        result.from_account.id,
        format_amount(result.from_account.balance),
        result.from_account.currency
    );
    println!(
        "  Account {} balance: {} {}",
        result.to_account.id,
        format_amount(result.to_account.balance),
        result.to_account.currency
    );
}

fn print_accounts(accounts: &[Account]) {
    if accounts.is_empty() {
        println!("No accounts found.");
        return;
    }
    println!("{:<8} {:<20} {:<8} {:>16}", "ID", "OWNER", "CURRENCY", "BALANCE");
    println!("{}", "-".repeat(55));
    for account in accounts {
        println!(
            "{:<8} {:<20} {:<8} {:>16}",
            account.id,
            truncate(&account.owner, 20),
            account.currency,
            format_amount(account.balance)
        );
    }
}

fn print_entries(entries: &[Entry]) {
    if entries.is_empty() {
        println!("No entries found.");
        return;
    }
    println!("{:<8} {:<20} {:>16}", "ID", "DATE", "AMOUNT");
    println!("{}", "-".repeat(46));
    for entry in entries {
        println!(
            "{:<8} {:<20} {:>16}",
            entry.id,
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            format_amount(entry.amount)
        );
    }
}

fn print_transfers(transfers: &[Transfer]) {
    if transfers.is_empty() {
        println!("No transfers found.");
        return;
    }
    println!(
        "{:<8} {:<20} {:>8} {:>8} {:>16}",
        "ID", "DATE", "FROM", "TO", "AMOUNT"
    );
    println!("{}", "-".repeat(64));
    for transfer in transfers {
        println!(
            "{:<8} {:<20} {:>8} {:>8} {:>16}",
            transfer.id,
            transfer.created_at.format("%Y-%m-%d %H:%M:%S"),
            transfer.from_account_id,
            transfer.to_account_id,
            format_amount(transfer.amount)
        );
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
