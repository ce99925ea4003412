//! Defines the endpoints the assistant integration calls.

use axum::{Extension, Json, extract::State};
use serde::Serialize;

use crate::{
    Error,
    account::{AccountResponse, list_accounts_for_user},
    app_state::DatabaseState,
    assistant::{AssistantAction, perform_action},
    transaction::{TransactionResponse, list_transactions_for_user},
    user::UserId,
};

/// How many recent transactions the assistant context includes.
const RECENT_TRANSACTION_COUNT: u32 = 15;

/// The snapshot of the caller's finances the assistant grounds its replies
/// in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantContextResponse {
    /// The caller's accounts, oldest first.
    pub accounts: Vec<AccountResponse>,
    /// The most recent transactions, newest first.
    pub recent_transactions: Vec<TransactionResponse>,
}

/// A route handler that returns the caller's accounts and recent
/// transactions for the assistant's context window.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub async fn assistant_context_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<AssistantContextResponse>, Error> {
    let connection = state.lock_connection()?;

    let accounts = list_accounts_for_user(user_id, &connection)?;
    let recent_transactions =
        list_transactions_for_user(user_id, Some(RECENT_TRANSACTION_COUNT), &connection)?;

    Ok(Json(AssistantContextResponse {
        accounts: accounts.into_iter().map(AccountResponse::from).collect(),
        recent_transactions: recent_transactions
            .into_iter()
            .map(TransactionResponse::from)
            .collect(),
    }))
}

/// What came of the assistant's action.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantActionResponse {
    /// A human-readable confirmation or clarification question.
    pub reply: String,
    /// Whether anything was actually changed.
    pub action_performed: bool,
}

/// A route handler that performs one structured assistant action.
///
/// An action that omits the account when the caller has several does not
/// guess: it comes back with a clarification question and changes nothing.
/// All other failures surface as the same errors the direct API returns.
///
/// # Errors
/// Propagates whatever the underlying ledger operation returns.
pub async fn assistant_action_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
    Json(action): Json<AssistantAction>,
) -> Result<Json<AssistantActionResponse>, Error> {
    let mut connection = state.lock_connection()?;

    match perform_action(user_id, action, &mut connection) {
        Ok(reply) => Ok(Json(AssistantActionResponse {
            reply,
            action_performed: true,
        })),
        Err(Error::AmbiguousAccount) => Ok(Json(AssistantActionResponse {
            reply: "You have more than one account, which one should I use?".to_owned(),
            action_performed: false,
        })),
        Err(error) => Err(error),
    }
}
