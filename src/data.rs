//! Bulk export and import of a user's accounts and transactions.
//!
//! Export produces a self-contained JSON snapshot of the caller's own data.
//! Import rebuilds that snapshot under fresh IDs: account references in the
//! imported transactions are carried by account name and resolved against the
//! accounts created in the same import, all inside one database transaction.

use std::collections::HashMap;

use axum::{Extension, Json, extract::State};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    account::{AccountKind, insert_account, list_accounts_for_user},
    app_state::DatabaseState,
    database_id::{AccountId, TransactionId},
    transaction::{EntryKind, insert_transaction_row, list_transactions_for_user},
    user::UserId,
};

/// An account as it appears in the export format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedAccount {
    /// The ID of the account.
    pub id: AccountId,
    /// The display name of the account.
    pub name: String,
    /// What kind of money the account holds.
    #[serde(rename = "type")]
    pub kind: AccountKind,
    /// The balance at the time of the export.
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

/// A transaction as it appears in the export format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedTransaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The magnitude of money that moved, always non-negative.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// A text description of what the transaction was for.
    pub description: String,
    /// When the transaction happened.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// INCOME, EXPENSE or TRANSFER.
    #[serde(rename = "type")]
    pub kind: String,
    /// The primary account the transaction applies to.
    pub account_id: Option<AccountId>,
    /// The account a transfer moved money to, if any.
    pub transfer_to_account_id: Option<AccountId>,
}

/// The full export: the caller's accounts and transactions at one moment.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedData {
    /// When the export was taken.
    #[serde(with = "time::serde::rfc3339")]
    pub exported_at: OffsetDateTime,
    /// The caller's accounts, oldest first.
    pub accounts: Vec<ExportedAccount>,
    /// Every transaction touching one of the caller's accounts, newest first.
    pub transactions: Vec<ExportedTransaction>,
}

/// Take a snapshot of `actor`'s own accounts and transactions.
///
/// Data shared with the caller by other users is never part of the export,
/// only data the caller owns.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub fn export_data(actor: UserId, connection: &Connection) -> Result<ExportedData, Error> {
    let accounts = list_accounts_for_user(actor, connection)?
        .into_iter()
        .map(|account| ExportedAccount {
            id: account.id,
            name: account.name,
            kind: account.kind,
            balance: account.balance,
        })
        .collect();

    let transactions = list_transactions_for_user(actor, None, connection)?
        .into_iter()
        .map(|transaction| ExportedTransaction {
            id: transaction.id,
            amount: transaction.amount,
            description: transaction.description.clone(),
            date: transaction.date,
            kind: transaction.kind.as_str().to_owned(),
            account_id: transaction.account_id,
            transfer_to_account_id: transaction.kind.transfer_to(),
        })
        .collect();

    Ok(ExportedData {
        exported_at: OffsetDateTime::now_utc(),
        accounts,
        transactions,
    })
}

/// An account in the import format: the export shape minus the ID.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedAccount {
    /// The display name of the account, also the key transactions reference
    /// it by.
    pub name: String,
    /// What kind of money the account holds.
    #[serde(rename = "type")]
    pub kind: AccountKind,
    /// The balance to give the account. Taken as-is, not recomputed from the
    /// imported transactions.
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

/// The kind of an imported transaction.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportedKind {
    /// Money earned.
    Income,
    /// Money spent.
    Expense,
    /// Money moved between two accounts.
    Transfer,
}

/// A transaction in the import format.
///
/// Account references carry the account name from the source data, not a
/// database ID, since the IDs are reassigned on import.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedTransaction {
    /// How much money moved. Foreign export formats may carry signed
    /// amounts, so the magnitude is taken on ingestion.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// What the transaction was for.
    pub description: Option<String>,
    /// When the transaction happened.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// INCOME, EXPENSE or TRANSFER.
    #[serde(rename = "type")]
    pub kind: ImportedKind,
    /// The name of the primary account.
    pub account_id: Option<String>,
    /// The name of the account a transfer moved money to.
    pub transfer_to_account_id: Option<String>,
}

/// The request body for an import.
#[derive(Debug, Deserialize)]
pub struct ImportData {
    /// The accounts to create.
    pub accounts: Vec<ImportedAccount>,
    /// The transactions to create against them.
    #[serde(default)]
    pub transactions: Vec<ImportedTransaction>,
}

/// Import a data snapshot for `actor`, assigning fresh IDs throughout.
///
/// All accounts are created first and a name-to-ID mapping built, then each
/// transaction is inserted with its amount stored as the absolute value and
/// its account references resolved through the mapping. References that do
/// not match any imported account become NULL rather than failing the whole
/// import. Everything commits together or not at all.
///
/// Balances are taken from the imported account records; the imported
/// transactions are history, not instructions to replay.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub fn import_data(
    actor: UserId,
    data: ImportData,
    connection: &mut Connection,
) -> Result<(), Error> {
    let sql_transaction = connection.transaction()?;

    let mut account_ids_by_name: HashMap<String, AccountId> = HashMap::new();
    for imported_account in data.accounts {
        let account = insert_account(
            actor,
            &imported_account.name,
            imported_account.kind,
            imported_account.balance,
            &sql_transaction,
        )?;
        account_ids_by_name.insert(imported_account.name, account.id);
    }

    for imported_transaction in data.transactions {
        let resolve = |name: &Option<String>| {
            name.as_ref()
                .and_then(|name| account_ids_by_name.get(name))
                .copied()
        };
        let account_id = resolve(&imported_transaction.account_id);
        let kind = match imported_transaction.kind {
            ImportedKind::Income => EntryKind::Income,
            ImportedKind::Expense => EntryKind::Expense,
            ImportedKind::Transfer => EntryKind::Transfer {
                to: resolve(&imported_transaction.transfer_to_account_id),
            },
        };

        insert_transaction_row(
            imported_transaction.amount.abs(),
            imported_transaction.description.as_deref().unwrap_or(""),
            imported_transaction.date,
            kind,
            account_id,
            &sql_transaction,
        )?;
    }

    sql_transaction.commit()?;

    Ok(())
}

/// A route handler that returns the caller's full data snapshot as JSON.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub async fn download_data_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<ExportedData>, Error> {
    let connection = state.lock_connection()?;

    Ok(Json(export_data(user_id, &connection)?))
}

/// A route handler that imports a previously exported data snapshot.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub async fn upload_data_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
    Json(data): Json<ImportData>,
) -> Result<Json<serde_json::Value>, Error> {
    let mut connection = state.lock_connection()?;

    import_data(user_id, data, &mut connection)?;

    Ok(Json(serde_json::json!({ "success": true })))
}
