//! Defines the endpoint for recording an income or expense transaction.

use axum::{Extension, Json, extract::State};
use rust_decimal::Decimal;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    Error,
    app_state::DatabaseState,
    database_id::AccountId,
    ledger::{NewTransaction, create_transaction},
    transaction::{CashflowKind, TransactionResponse},
    user::UserId,
};

/// The request body for creating a transaction.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionData {
    /// The account the transaction applies to.
    pub account_id: AccountId,
    /// The magnitude of money that moved. Must be greater than zero.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// What the transaction was for.
    pub description: String,
    /// Whether the money came in or went out.
    #[serde(rename = "type")]
    pub kind: CashflowKind,
    /// When the transaction happened. Defaults to now.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

/// A route handler for recording an income or expense against an account.
///
/// The caller must own the account or hold an EDIT share from its owner. The
/// log row and the balance change commit together.
///
/// # Errors
/// Returns a:
/// - [Error::NonPositiveAmount] or [Error::EmptyDescription] if the input is invalid,
/// - [Error::NotFound] if the account does not exist or the caller may not edit it,
/// - or [Error::SqlError] if there is some other SQL error.
pub async fn create_transaction_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
    Json(transaction_data): Json<CreateTransactionData>,
) -> Result<Json<TransactionResponse>, Error> {
    let mut connection = state.lock_connection()?;

    let transaction = create_transaction(
        user_id,
        NewTransaction {
            account_id: transaction_data.account_id,
            amount: transaction_data.amount,
            description: transaction_data.description,
            kind: transaction_data.kind,
            date: transaction_data.date,
        },
        &mut connection,
    )?;

    Ok(Json(transaction.into()))
}

#[cfg(test)]
mod create_transaction_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Json, extract::State};
    use rusqlite::Connection;
    use rust_decimal::Decimal;

    use crate::{
        Error,
        account::{AccountKind, get_account, insert_account},
        app_state::DatabaseState,
        db::initialize,
        password::PasswordHash,
        transaction::CashflowKind,
        user::{User, create_user},
    };

    use super::{CreateTransactionData, create_transaction_endpoint};

    fn get_test_state() -> (DatabaseState, User) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user = create_user(
            "foo@bar.baz",
            None,
            PasswordHash::new_unchecked("hunter2"),
            &conn,
        )
        .unwrap();

        (
            DatabaseState {
                db_connection: Arc::new(Mutex::new(conn)),
            },
            user,
        )
    }

    #[tokio::test]
    async fn records_expense_and_updates_balance() {
        let (state, user) = get_test_state();
        let account = {
            let connection = state.lock_connection().unwrap();
            insert_account(
                user.id,
                "Budget",
                AccountKind::Budget,
                Decimal::from(100),
                &connection,
            )
            .unwrap()
        };

        let response = create_transaction_endpoint(
            State(state.clone()),
            Extension(user.id),
            Json(CreateTransactionData {
                account_id: account.id,
                amount: Decimal::from(30),
                description: "groceries".to_owned(),
                kind: CashflowKind::Expense,
                date: None,
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.0.kind, "EXPENSE");
        assert_eq!(response.0.amount, Decimal::from(30));

        let connection = state.lock_connection().unwrap();
        assert_eq!(
            get_account(account.id, &connection).unwrap().balance,
            Decimal::from(70)
        );
    }

    #[tokio::test]
    async fn rejects_zero_amounts() {
        let (state, user) = get_test_state();
        let account = {
            let connection = state.lock_connection().unwrap();
            insert_account(
                user.id,
                "Budget",
                AccountKind::Budget,
                Decimal::from(100),
                &connection,
            )
            .unwrap()
        };

        let result = create_transaction_endpoint(
            State(state),
            Extension(user.id),
            Json(CreateTransactionData {
                account_id: account.id,
                amount: Decimal::ZERO,
                description: "nothing".to_owned(),
                kind: CashflowKind::Income,
                date: None,
            }),
        )
        .await;

        assert!(matches!(result, Err(Error::NonPositiveAmount(_))));
    }
}
