//! Defines the endpoint for listing the caller's accounts.

use axum::{Extension, Json, extract::State};

use crate::{
    Error,
    account::{AccountResponse, list_accounts_for_user},
    app_state::DatabaseState,
    user::UserId,
};

/// A route handler that returns all accounts owned by the caller, oldest
/// first.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub async fn list_accounts_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<Vec<AccountResponse>>, Error> {
    let connection = state.lock_connection()?;
    let accounts = list_accounts_for_user(user_id, &connection)?;

    Ok(Json(
        accounts.into_iter().map(AccountResponse::from).collect(),
    ))
}
