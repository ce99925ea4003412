//! Application router configuration with protected and unprotected route
//! definitions.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde_json::json;

use crate::{
    AppState,
    account::{create_account_endpoint, delete_account_endpoint, list_accounts_endpoint},
    assistant::{assistant_action_endpoint, assistant_context_endpoint},
    auth::{auth_guard, log_in_endpoint, log_out_endpoint},
    dashboard::get_dashboard_endpoint,
    data::{download_data_endpoint, upload_data_endpoint},
    endpoints,
    register_user::register_user_endpoint,
    share::{
        accept_invitation_endpoint, cancel_invitation_endpoint, decline_invitation_endpoint,
        delete_share_endpoint, list_invitations_endpoint, send_invitation_endpoint,
    },
    transaction::{
        create_transaction_endpoint, create_transfer_endpoint, delete_transaction_endpoint,
        delete_transfer_endpoint, list_transactions_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::USERS, post(register_user_endpoint))
        .route(endpoints::LOG_IN, post(log_in_endpoint))
        .route(endpoints::LOG_OUT, get(log_out_endpoint));

    let protected_routes = Router::new()
        .route(
            endpoints::ACCOUNTS,
            get(list_accounts_endpoint).post(create_account_endpoint),
        )
        .route(endpoints::ACCOUNT, delete(delete_account_endpoint))
        .route(
            endpoints::TRANSACTIONS,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(endpoints::TRANSACTION, delete(delete_transaction_endpoint))
        .route(endpoints::TRANSFERS, post(create_transfer_endpoint))
        .route(endpoints::TRANSFER, delete(delete_transfer_endpoint))
        .route(endpoints::DASHBOARD, get(get_dashboard_endpoint))
        .route(
            endpoints::INVITATIONS,
            get(list_invitations_endpoint).post(send_invitation_endpoint),
        )
        .route(endpoints::INVITATION, delete(cancel_invitation_endpoint))
        .route(endpoints::INVITATION_ACCEPT, post(accept_invitation_endpoint))
        .route(
            endpoints::INVITATION_DECLINE,
            post(decline_invitation_endpoint),
        )
        .route(endpoints::SHARE, delete(delete_share_endpoint))
        .route(endpoints::DATA_DOWNLOAD, get(download_data_endpoint))
        .route(endpoints::DATA_UPLOAD, post(upload_data_endpoint))
        .route(
            endpoints::ASSISTANT_CONTEXT,
            get(assistant_context_endpoint),
        )
        .route(endpoints::ASSISTANT, post(assistant_action_endpoint))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The fallback for requests that match no route.
async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "the requested resource could not be found" })),
    )
        .into_response()
}

#[cfg(test)]
mod router_tests {
    use axum::Router;
    use axum_test::{TestServer, TestServerConfig};
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::{AppState, endpoints, endpoints::format_endpoint};

    use super::build_router;

    fn get_test_router() -> Router {
        let connection =
            Connection::open_in_memory().expect("Could not open database in memory.");
        let state = AppState::new(connection, "foobar").expect("Could not create app state.");

        build_router(state)
    }

    /// A server that keeps its session cookies between requests, acting as
    /// one logged-in client. Several clients can share the same router.
    fn get_client(app: &Router) -> TestServer {
        TestServer::try_new_with_config(
            app.clone(),
            TestServerConfig {
                save_cookies: true,
                ..TestServerConfig::default()
            },
        )
        .expect("Could not create test server.")
    }

    async fn register(client: &TestServer, email: &str) {
        client
            .post(endpoints::USERS)
            .json(&json!({
                "email": email,
                "password": "correcthorsebatterystaple",
            }))
            .await
            .assert_status_ok();
    }

    async fn create_account(client: &TestServer, name: &str, balance: f64) -> i64 {
        let response = client
            .post(endpoints::ACCOUNTS)
            .json(&json!({
                "name": name,
                "type": "BUDGET",
                "startingBalance": balance,
            }))
            .await;
        response.assert_status_ok();

        response.json::<Value>()["id"].as_i64().unwrap()
    }

    async fn get_balance(client: &TestServer, account_id: i64) -> f64 {
        let accounts = client.get(endpoints::ACCOUNTS).await.json::<Value>();

        accounts
            .as_array()
            .unwrap()
            .iter()
            .find(|account| account["id"].as_i64() == Some(account_id))
            .expect("account should be listed")["balance"]
            .as_f64()
            .unwrap()
    }

    #[tokio::test]
    async fn requests_without_a_session_are_rejected() {
        let app = get_test_router();
        let client = get_client(&app);

        client.get(endpoints::ACCOUNTS).await.assert_status_unauthorized();
        client.get(endpoints::DASHBOARD).await.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn expense_then_delete_restores_the_balance() {
        let app = get_test_router();
        let client = get_client(&app);
        register(&client, "foo@bar.baz").await;
        let account_id = create_account(&client, "Budget", 100.0).await;

        let response = client
            .post(endpoints::TRANSACTIONS)
            .json(&json!({
                "accountId": account_id,
                "amount": 30.0,
                "description": "groceries",
                "type": "EXPENSE",
            }))
            .await;
        response.assert_status_ok();
        let transaction_id = response.json::<Value>()["id"].as_i64().unwrap();

        assert_eq!(get_balance(&client, account_id).await, 70.0);

        client
            .delete(&format_endpoint(endpoints::TRANSACTION, transaction_id))
            .await
            .assert_status_ok();

        assert_eq!(get_balance(&client, account_id).await, 100.0);
    }

    #[tokio::test]
    async fn transfer_then_delete_restores_both_balances() {
        let app = get_test_router();
        let client = get_client(&app);
        register(&client, "foo@bar.baz").await;
        let from = create_account(&client, "Budget", 100.0).await;
        let to = create_account(&client, "Savings", 0.0).await;

        let response = client
            .post(endpoints::TRANSFERS)
            .json(&json!({
                "fromAccountId": from,
                "toAccountId": to,
                "amount": 40.0,
            }))
            .await;
        response.assert_status_ok();
        let transaction_id = response.json::<Value>()["id"].as_i64().unwrap();

        assert_eq!(get_balance(&client, from).await, 60.0);
        assert_eq!(get_balance(&client, to).await, 40.0);

        client
            .delete(&format_endpoint(endpoints::TRANSFER, transaction_id))
            .await
            .assert_status_ok();

        assert_eq!(get_balance(&client, from).await, 100.0);
        assert_eq!(get_balance(&client, to).await, 0.0);
    }

    #[tokio::test]
    async fn view_share_grants_reads_but_not_writes() {
        let app = get_test_router();
        let owner = get_client(&app);
        let viewer = get_client(&app);
        register(&owner, "owner@x.com").await;
        register(&viewer, "viewer@x.com").await;
        let account_id = create_account(&owner, "Budget", 100.0).await;

        let response = owner
            .post(endpoints::INVITATIONS)
            .json(&json!({ "email": "viewer@x.com", "permission": "VIEW" }))
            .await;
        response.assert_status_ok();
        let invitation_id = response.json::<Value>()["id"].as_i64().unwrap();

        viewer
            .post(&format_endpoint(endpoints::INVITATION_ACCEPT, invitation_id))
            .await
            .assert_status_ok();

        // The shared dashboard shows the owner's account.
        let overview = viewer.get(endpoints::INVITATIONS).await.json::<Value>();
        let owner_id = overview["sharedWithMe"][0]["owner"]["id"].as_i64().unwrap();

        let dashboard = viewer
            .get(&format!("{}?owner_id={owner_id}", endpoints::DASHBOARD))
            .await
            .json::<Value>();
        assert_eq!(dashboard["permission"], "VIEW");
        assert_eq!(dashboard["accounts"][0]["id"].as_i64(), Some(account_id));

        // A VIEW share does not allow recording transactions.
        viewer
            .post(endpoints::TRANSACTIONS)
            .json(&json!({
                "accountId": account_id,
                "amount": 5.0,
                "description": "sneaky",
                "type": "EXPENSE",
            }))
            .await
            .assert_status_not_found();

        assert_eq!(get_balance(&owner, account_id).await, 100.0);
    }

    #[tokio::test]
    async fn import_resolves_account_references_by_name() {
        let app = get_test_router();
        let client = get_client(&app);
        register(&client, "foo@bar.baz").await;

        client
            .post(endpoints::DATA_UPLOAD)
            .json(&json!({
                "accounts": [
                    { "name": "Cash", "type": "BUDGET", "balance": 50.0 },
                    { "name": "Save", "type": "SAVINGS", "balance": 0.0 },
                ],
                "transactions": [
                    {
                        "amount": -10.0,
                        "description": "imported",
                        "date": "2024-03-01T00:00:00Z",
                        "type": "EXPENSE",
                        "accountId": "Cash",
                    },
                ],
            }))
            .await
            .assert_status_ok();

        let exported = client.get(endpoints::DATA_DOWNLOAD).await.json::<Value>();

        let cash_id = exported["accounts"]
            .as_array()
            .unwrap()
            .iter()
            .find(|account| account["name"] == "Cash")
            .unwrap()["id"]
            .as_i64()
            .unwrap();
        assert_eq!(
            exported["transactions"][0]["accountId"].as_i64(),
            Some(cash_id)
        );
        // The signed import amount was stored as its magnitude.
        assert_eq!(exported["transactions"][0]["amount"].as_f64(), Some(10.0));
        assert!(exported["exportedAt"].is_string());
    }

    #[tokio::test]
    async fn assistant_actions_go_through_the_same_checks() {
        let app = get_test_router();
        let client = get_client(&app);
        register(&client, "foo@bar.baz").await;
        let account_id = create_account(&client, "Budget", 100.0).await;

        let response = client
            .post(endpoints::ASSISTANT)
            .json(&json!({
                "action": "add_transaction",
                "amount": 30.0,
                "description": "groceries",
                "type": "EXPENSE",
            }))
            .await;
        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["actionPerformed"], true);

        assert_eq!(get_balance(&client, account_id).await, 70.0);

        let context = client
            .get(endpoints::ASSISTANT_CONTEXT)
            .await
            .json::<Value>();
        assert_eq!(context["recentTransactions"][0]["description"], "groceries");
    }
}
