//! The dashboard read-model: a user's accounts and transactions, viewed by
//! the owner or by a user the dashboard was shared with.

use axum::{Extension, Json, extract::{Query, State}};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    account::{AccountResponse, list_accounts_for_user},
    app_state::DatabaseState,
    share::{SharePermission, get_share_between},
    transaction::{TransactionResponse, list_transactions_for_user},
    user::{UserId, get_user_by_id},
};

/// The query parameters for the dashboard.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    /// Look at this user's dashboard instead of the caller's own. The owner
    /// must have shared their dashboard with the caller.
    pub owner_id: Option<i64>,
}

/// The owner a dashboard belongs to.
#[derive(Debug, Serialize)]
pub struct DashboardOwner {
    /// The owner's user ID.
    pub id: UserId,
    /// The owner's display name, if they set one.
    pub name: Option<String>,
    /// The owner's email.
    pub email: String,
}

/// Everything the dashboard screen needs in one response.
///
/// A shared dashboard contains exactly what the owner's own dashboard view
/// would contain. It never includes data from a third user who also shares
/// with the owner.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    /// The user whose data this is.
    pub owner: DashboardOwner,
    /// The caller's permission on the dashboard. `None` when the caller is
    /// the owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<SharePermission>,
    /// The owner's accounts, oldest first.
    pub accounts: Vec<AccountResponse>,
    /// Every transaction touching one of the owner's accounts, newest first.
    pub transactions: Vec<TransactionResponse>,
}

/// Assemble the dashboard for `owner_id` as seen by `actor`.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if the owner has not shared their dashboard with the caller,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_dashboard(
    actor: UserId,
    owner_id: Option<UserId>,
    connection: &Connection,
) -> Result<DashboardResponse, Error> {
    let owner_id = owner_id.unwrap_or(actor);

    let permission = if owner_id == actor {
        None
    } else {
        // A missing share reads the same as a missing user, so the caller
        // learns nothing about accounts that were never shared with them.
        let share = get_share_between(owner_id, actor, connection)?.ok_or(Error::NotFound)?;
        Some(share.permission)
    };

    let owner = get_user_by_id(owner_id, connection)?;
    let accounts = list_accounts_for_user(owner_id, connection)?;
    let transactions = list_transactions_for_user(owner_id, None, connection)?;

    Ok(DashboardResponse {
        owner: DashboardOwner {
            id: owner.id,
            name: owner.name,
            email: owner.email,
        },
        permission,
        accounts: accounts.into_iter().map(AccountResponse::from).collect(),
        transactions: transactions
            .into_iter()
            .map(TransactionResponse::from)
            .collect(),
    })
}

/// A route handler that returns the caller's dashboard, or another user's if
/// they shared it with the caller.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if the requested owner has not shared with the caller,
/// - or [Error::SqlError] if there is some other SQL error.
pub async fn get_dashboard_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardResponse>, Error> {
    let connection = state.lock_connection()?;

    let dashboard = get_dashboard(user_id, query.owner_id.map(UserId::new), &connection)?;

    Ok(Json(dashboard))
}

#[cfg(test)]
mod dashboard_tests {
    use rusqlite::Connection;
    use rust_decimal::Decimal;

    use crate::{
        Error,
        account::{AccountKind, insert_account},
        db::initialize,
        password::PasswordHash,
        share::{SharePermission, create_share},
        user::{User, create_user},
    };

    use super::get_dashboard;

    fn get_test_connection() -> (Connection, User, User) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let owner = create_user(
            "owner@bar.baz",
            Some("Owner"),
            PasswordHash::new_unchecked("hunter2"),
            &conn,
        )
        .unwrap();
        let viewer = create_user(
            "viewer@bar.baz",
            None,
            PasswordHash::new_unchecked("hunter3"),
            &conn,
        )
        .unwrap();

        (conn, owner, viewer)
    }

    #[test]
    fn own_dashboard_lists_own_accounts() {
        let (conn, owner, _viewer) = get_test_connection();
        insert_account(
            owner.id,
            "Budget",
            AccountKind::Budget,
            Decimal::from(10),
            &conn,
        )
        .unwrap();

        let dashboard = get_dashboard(owner.id, None, &conn).unwrap();

        assert_eq!(dashboard.owner.id, owner.id);
        assert_eq!(dashboard.permission, None);
        assert_eq!(dashboard.accounts.len(), 1);
    }

    #[test]
    fn shared_dashboard_requires_a_share() {
        let (conn, owner, viewer) = get_test_connection();
        insert_account(
            owner.id,
            "Budget",
            AccountKind::Budget,
            Decimal::from(10),
            &conn,
        )
        .unwrap();

        let result = get_dashboard(viewer.id, Some(owner.id), &conn);
        assert!(matches!(result, Err(Error::NotFound)));

        create_share(owner.id, viewer.id, SharePermission::View, &conn).unwrap();

        let dashboard = get_dashboard(viewer.id, Some(owner.id), &conn).unwrap();
        assert_eq!(dashboard.permission, Some(SharePermission::View));
        assert_eq!(dashboard.accounts.len(), 1);
    }

    #[test]
    fn shared_dashboard_never_includes_third_party_data() {
        let (conn, owner, viewer) = get_test_connection();
        let third = create_user(
            "third@bar.baz",
            None,
            PasswordHash::new_unchecked("hunter4"),
            &conn,
        )
        .unwrap();
        insert_account(
            owner.id,
            "Owners",
            AccountKind::Budget,
            Decimal::from(10),
            &conn,
        )
        .unwrap();
        insert_account(
            third.id,
            "Thirds",
            AccountKind::Budget,
            Decimal::from(99),
            &conn,
        )
        .unwrap();
        // Both the viewer and the third user share with the owner's viewer
        // pool, but the viewer must only ever see the owner's data.
        create_share(owner.id, viewer.id, SharePermission::View, &conn).unwrap();
        create_share(third.id, owner.id, SharePermission::View, &conn).unwrap();

        let dashboard = get_dashboard(viewer.id, Some(owner.id), &conn).unwrap();

        assert_eq!(dashboard.accounts.len(), 1);
        assert_eq!(dashboard.accounts[0].name, "Owners");

        // No transitive access to the third user's dashboard either.
        let result = get_dashboard(viewer.id, Some(third.id), &conn);
        assert!(matches!(result, Err(Error::NotFound)));
    }
}
