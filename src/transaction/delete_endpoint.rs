//! Defines the endpoint for deleting a transaction.

use axum::{Extension, Json, extract::{Path, State}};
use serde_json::{Value, json};

use crate::{
    Error, app_state::DatabaseState, database_id::TransactionId, ledger::delete_transaction,
    user::UserId,
};

/// A route handler for deleting a transaction.
///
/// The transaction's balance effect is reversed in the same database
/// transaction that removes the row, so the account ends up exactly where it
/// was before the transaction was created.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if the transaction does not exist or its account is not
///   owned by the caller,
/// - or [Error::SqlError] if there is some other SQL error.
pub async fn delete_transaction_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<Value>, Error> {
    let mut connection = state.lock_connection()?;

    delete_transaction(user_id, transaction_id, &mut connection)?;

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod delete_transaction_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, extract::{Path, State}};
    use rusqlite::Connection;
    use rust_decimal::Decimal;

    use crate::{
        Error,
        account::{AccountKind, get_account, insert_account},
        app_state::DatabaseState,
        db::initialize,
        ledger::{NewTransaction, create_transaction},
        password::PasswordHash,
        transaction::CashflowKind,
        user::{User, create_user},
    };

    use super::delete_transaction_endpoint;

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
    async fn deleting_restores_the_balance() {
        let (state, user) = get_test_state();
        let (account, transaction) = {
            let mut connection = state.lock_connection().unwrap();
            let account = insert_account(
                user.id,
                "Budget",
                AccountKind::Budget,
                Decimal::from(100),
                &connection,
            )
            .unwrap();
            let transaction = create_transaction(
                user.id,
                NewTransaction {
                    account_id: account.id,
                    amount: Decimal::from(30),
                    description: "groceries".to_owned(),
                    kind: CashflowKind::Expense,
                    date: None,
                },
                &mut connection,
            )
            .unwrap();

            (account, transaction)
        };

        delete_transaction_endpoint(State(state.clone()), Extension(user.id), Path(transaction.id))
            .await
            .unwrap();

        let connection = state.lock_connection().unwrap();
        assert_eq!(
            get_account(account.id, &connection).unwrap().balance,
            Decimal::from(100)
        );
    }

    #[tokio::test]
    async fn missing_transaction_reports_not_found() {
        let (state, user) = get_test_state();

        let result =
            delete_transaction_endpoint(State(state), Extension(user.id), Path(42)).await;

        assert!(matches!(result, Err(Error::NotFound)));
    }
}
