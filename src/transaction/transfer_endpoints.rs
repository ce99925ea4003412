//! Defines the endpoints for moving money between accounts and undoing it.

use axum::{Extension, Json, extract::{Path, State}};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    Error,
    app_state::DatabaseState,
    database_id::{AccountId, TransactionId},
    ledger::{delete_transfer, transfer},
    transaction::TransactionResponse,
    user::UserId,
};

/// The request body for creating a transfer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferData {
    /// The account the money leaves.
    pub from_account_id: AccountId,
    /// The account the money arrives in.
    pub to_account_id: AccountId,
    /// How much to move. Must be greater than zero.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// An optional note for the transfer.
    pub description: Option<String>,
}

/// A route handler for moving money between two of the caller's accounts.
///
/// # Errors
/// Returns a:
/// - [Error::SameAccountTransfer] or [Error::NonPositiveAmount] if the input is invalid,
/// - [Error::NotFound] if either account is missing or not owned by the caller,
/// - [Error::InsufficientFunds] if the source balance is less than the amount,
/// - or [Error::SqlError] if there is some other SQL error.
pub async fn create_transfer_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
    Json(transfer_data): Json<CreateTransferData>,
) -> Result<Json<TransactionResponse>, Error> {
    let mut connection = state.lock_connection()?;

    let transaction = transfer(
        user_id,
        transfer_data.from_account_id,
        transfer_data.to_account_id,
        transfer_data.amount,
        transfer_data.description,
        &mut connection,
    )?;

    Ok(Json(transaction.into()))
}

/// A route handler for deleting a transfer, restoring the balances on both
/// ends.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if the transaction does not exist, is not a transfer,
///   or its source account is not owned by the caller,
/// - or [Error::SqlError] if there is some other SQL error.
pub async fn delete_transfer_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<Value>, Error> {
    let mut connection = state.lock_connection()?;

    delete_transfer(user_id, transaction_id, &mut connection)?;

    Ok(Json(json!({ "success": true })))
}
