//! Defines the endpoint for deleting an account.

use axum::{Extension, Json, extract::{Path, State}};
use serde_json::{Value, json};

use crate::{
    Error, app_state::DatabaseState, database_id::AccountId, ledger::delete_account, user::UserId,
};

/// A route handler for deleting an account together with the transactions
/// that only reference it.
///
/// Deletion is refused while a transfer still links the account to another
/// live account, so that the other account's history stays intact.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if the account does not exist or is not owned by the caller,
/// - [Error::AccountHasLinkedTransfers] if a transfer still links it to another account,
/// - or [Error::SqlError] if there is some other SQL error.
pub async fn delete_account_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Value>, Error> {
    let mut connection = state.lock_connection()?;

    delete_account(user_id, account_id, &mut connection)?;

    Ok(Json(json!({ "success": true })))
}
