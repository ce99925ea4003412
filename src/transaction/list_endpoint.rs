//! Defines the endpoint for listing the caller's transactions.

use axum::{Extension, Json, extract::{Query, State}};
use serde::Deserialize;

use crate::{
    Error,
    app_state::DatabaseState,
    transaction::{TransactionResponse, list_transactions_for_user},
    user::UserId,
};

/// The query parameters for the transaction listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsQuery {
    /// Return at most this many transactions, newest first.
    pub limit: Option<u32>,
}

/// A route handler that returns every transaction touching one of the
/// caller's accounts, newest first.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub async fn list_transactions_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Vec<TransactionResponse>>, Error> {
    let connection = state.lock_connection()?;
    let transactions = list_transactions_for_user(user_id, query.limit, &connection)?;

    Ok(Json(
        transactions
            .into_iter()
            .map(TransactionResponse::from)
            .collect(),
    ))
}

#[cfg(test)]
mod list_transactions_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, extract::{Query, State}};
    use rusqlite::Connection;
    use rust_decimal::Decimal;

    use crate::{
        account::{AccountKind, insert_account},
        app_state::DatabaseState,
        db::initialize,
        ledger::{NewTransaction, create_transaction},
        password::PasswordHash,
        transaction::CashflowKind,
        user::{User, create_user},
    };

    use super::{ListTransactionsQuery, list_transactions_endpoint};

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
    async fn lists_newest_first_with_limit() {
        let (state, user) = get_test_state();
        {
            let mut connection = state.lock_connection().unwrap();
            let account = insert_account(
                user.id,
                "Budget",
                AccountKind::Budget,
                Decimal::ZERO,
                &connection,
            )
            .unwrap();

            for i in 1..=3 {
                create_transaction(
                    user.id,
                    NewTransaction {
                        account_id: account.id,
                        amount: Decimal::from(i),
                        description: "payday".to_owned(),
                        kind: CashflowKind::Income,
                        date: None,
                    },
                    &mut connection,
                )
                .unwrap();
            }
        }

        let response = list_transactions_endpoint(
            State(state),
            Extension(user.id),
            Query(ListTransactionsQuery { limit: Some(2) }),
        )
        .await
        .unwrap();

        assert_eq!(response.0.len(), 2);
        assert_eq!(response.0[0].amount, Decimal::from(3));
    }
}
