//! The structured actions the assistant can perform and their dispatch onto
//! the ledger operations.

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    Error,
    account::{AccountKind, get_account, list_accounts_for_user},
    database_id::{AccountId, TransactionId},
    ledger::{
        NewAccount, NewTransaction, create_account, create_transaction, delete_account,
        delete_transaction, transfer,
    },
    transaction::{CashflowKind, get_transaction},
    user::UserId,
};

/// One action the assistant wants to perform on the caller's behalf.
///
/// The variants mirror the mutation surface of the direct API. There is no
/// action the assistant can take that a client could not take itself.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AssistantAction {
    /// Record an income or expense transaction.
    #[serde(rename_all = "camelCase")]
    AddTransaction {
        /// The account to record against. May be omitted when the caller has
        /// exactly one account.
        account_id: Option<AccountId>,
        /// The magnitude of money that moved.
        #[serde(with = "rust_decimal::serde::float")]
        amount: Decimal,
        /// What the transaction was for.
        description: String,
        /// Whether the money came in or went out.
        #[serde(rename = "type")]
        kind: CashflowKind,
        /// When the transaction happened. Defaults to now.
        #[serde(default, with = "time::serde::rfc3339::option")]
        date: Option<OffsetDateTime>,
    },
    /// Create a new account.
    #[serde(rename_all = "camelCase")]
    CreateAccount {
        /// The display name for the account.
        name: String,
        /// What kind of money the account holds.
        #[serde(rename = "type")]
        kind: AccountKind,
        /// The balance the account starts with. Defaults to zero.
        #[serde(default, with = "rust_decimal::serde::float_option")]
        starting_balance: Option<Decimal>,
    },
    /// Move money between two of the caller's accounts.
    #[serde(rename_all = "camelCase")]
    TransferMoney {
        /// The account the money leaves.
        from_account_id: AccountId,
        /// The account the money arrives in.
        to_account_id: AccountId,
        /// How much to move.
        #[serde(with = "rust_decimal::serde::float")]
        amount: Decimal,
        /// An optional note for the transfer.
        description: Option<String>,
    },
    /// Delete a transaction by its ID.
    #[serde(rename_all = "camelCase")]
    DeleteTransaction {
        /// The transaction to delete.
        transaction_id: TransactionId,
    },
    /// Delete an account and the transactions that only reference it.
    #[serde(rename_all = "camelCase")]
    DeleteAccount {
        /// The account to delete.
        account_id: AccountId,
    },
}

/// Pick the account an omitted reference means.
///
/// Only when the caller has exactly one account is there nothing to guess.
///
/// # Errors
/// Returns a:
/// - [Error::AmbiguousAccount] if the caller has more than one account,
/// - [Error::NotFound] if the caller has no accounts at all.
fn default_account(actor: UserId, connection: &Connection) -> Result<AccountId, Error> {
    let accounts = list_accounts_for_user(actor, connection)?;

    match accounts.as_slice() {
        [only] => Ok(only.id),
        [] => Err(Error::NotFound),
        _ => Err(Error::AmbiguousAccount),
    }
}

/// Perform `action` as `actor` and describe what happened.
///
/// Every branch goes through the same ledger operation the direct API uses,
/// so ownership and validation are re-checked inside the operation no matter
/// what the assistant asked for.
///
/// # Errors
/// Propagates whatever the underlying ledger operation returns, plus
/// [Error::AmbiguousAccount] when an omitted account cannot be defaulted.
pub fn perform_action(
    actor: UserId,
    action: AssistantAction,
    connection: &mut Connection,
) -> Result<String, Error> {
    match action {
        AssistantAction::AddTransaction {
            account_id,
            amount,
            description,
            kind,
            date,
        } => {
            let account_id = match account_id {
                Some(account_id) => account_id,
                None => default_account(actor, connection)?,
            };

            let transaction = create_transaction(
                actor,
                NewTransaction {
                    account_id,
                    amount,
                    description,
                    kind,
                    date,
                },
                connection,
            )?;

            let direction = match kind {
                CashflowKind::Income => "income",
                CashflowKind::Expense => "expense",
            };
            Ok(format!(
                "Added {direction} of ${:.2} for \"{}\"",
                transaction.amount, transaction.description
            ))
        }
        AssistantAction::CreateAccount {
            name,
            kind,
            starting_balance,
        } => {
            let account = create_account(
                actor,
                NewAccount {
                    name,
                    kind,
                    starting_balance: starting_balance.unwrap_or(Decimal::ZERO),
                    fund_from_account_id: None,
                    fund_amount: None,
                },
                connection,
            )?;

            if account.balance > Decimal::ZERO {
                Ok(format!(
                    "Created new {} account \"{}\" with ${:.2}",
                    account.kind.as_str().to_lowercase(),
                    account.name,
                    account.balance
                ))
            } else {
                Ok(format!(
                    "Created new {} account \"{}\"",
                    account.kind.as_str().to_lowercase(),
                    account.name
                ))
            }
        }
        AssistantAction::TransferMoney {
            from_account_id,
            to_account_id,
            amount,
            description,
        } => {
            let transaction = transfer(
                actor,
                from_account_id,
                to_account_id,
                amount,
                description,
                connection,
            )?;

            let from_name = get_account(from_account_id, connection)?.name;
            let to_name = get_account(to_account_id, connection)?.name;
            Ok(format!(
                "Transferred ${:.2} from {from_name} to {to_name}",
                transaction.amount
            ))
        }
        AssistantAction::DeleteTransaction { transaction_id } => {
            let description = get_transaction(transaction_id, connection)?.description;
            delete_transaction(actor, transaction_id, connection)?;

            Ok(format!("Deleted transaction \"{description}\""))
        }
        AssistantAction::DeleteAccount { account_id } => {
            let name = get_account(account_id, connection)?.name;
            delete_account(actor, account_id, connection)?;

            Ok(format!("Deleted account \"{name}\" and its transactions"))
        }
    }
}
