//! Defines the endpoint for ending a dashboard share.

use axum::{Extension, Json, extract::{Path, State}};
use serde_json::{Value, json};

use crate::{
    Error, app_state::DatabaseState, database_id::ShareId, share::core::delete_share,
    user::UserId,
};

/// A route handler for ending a dashboard share from either side.
///
/// The owner revoking access and the viewer leaving the shared dashboard are
/// the same operation.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if the share does not exist or does not involve the caller,
/// - or [Error::SqlError] if there is some other SQL error.
pub async fn delete_share_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
    Path(share_id): Path<ShareId>,
) -> Result<Json<Value>, Error> {
    let connection = state.lock_connection()?;

    delete_share(user_id, share_id, &connection)?;

    Ok(Json(json!({ "success": true })))
}
