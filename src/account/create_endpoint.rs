//! Defines the endpoint for creating a new account, optionally funded from an
//! existing one.

use axum::{Extension, Json, extract::State};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    Error,
    account::{AccountKind, AccountResponse},
    app_state::DatabaseState,
    database_id::AccountId,
    ledger::{NewAccount, create_account},
    user::UserId,
};

/// The request body for creating an account.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountData {
    /// The display name for the account.
    pub name: String,
    /// What kind of money the account holds.
    #[serde(rename = "type")]
    pub kind: AccountKind,
    /// The balance the account starts with. Defaults to zero.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub starting_balance: Option<Decimal>,
    /// An account of the caller's to move the initial funds out of.
    pub fund_from_account_id: Option<AccountId>,
    /// How much to move out of the funding account.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub fund_amount: Option<Decimal>,
}

/// A route handler for creating a new account.
///
/// When a funding account is given, the new account's opening funds are moved
/// out of it in the same database transaction that creates the account.
///
/// # Errors
/// Returns a:
/// - [Error::EmptyAccountName] or [Error::NonPositiveAmount] if the input is invalid,
/// - [Error::NotFound] if the funding account is missing or not owned by the caller,
/// - [Error::InsufficientFunds] if the funding account balance is too low,
/// - or [Error::SqlError] if there is some other SQL error.
pub async fn create_account_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
    Json(account_data): Json<CreateAccountData>,
) -> Result<Json<AccountResponse>, Error> {
    let mut connection = state.lock_connection()?;

    let account = create_account(
        user_id,
        NewAccount {
            name: account_data.name,
            kind: account_data.kind,
            starting_balance: account_data.starting_balance.unwrap_or(Decimal::ZERO),
            fund_from_account_id: account_data.fund_from_account_id,
            fund_amount: account_data.fund_amount,
        },
        &mut connection,
    )?;

    Ok(Json(account.into()))
}
