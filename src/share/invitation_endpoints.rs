//! Defines the endpoints for the invitation lifecycle.

use axum::{Extension, Json, extract::{Path, State}};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::{
    Error,
    app_state::DatabaseState,
    database_id::{InvitationId, ShareId},
    share::core::{
        Invitation, InvitationStatus, SharePermission, accept_invitation, cancel_invitation,
        decline_invitation, list_received_invitations, list_sent_invitations,
        list_shares_by_owner, list_shares_by_viewer, send_invitation,
    },
    user::{UserId, get_user_by_id},
};

/// The JSON shape of a user mentioned in an invitation or share listing.
#[derive(Debug, Serialize)]
pub struct PartyResponse {
    /// The user's ID.
    pub id: UserId,
    /// The user's display name, if they set one.
    pub name: Option<String>,
    /// The user's email.
    pub email: String,
}

fn get_party(user_id: UserId, connection: &Connection) -> Result<PartyResponse, Error> {
    let user = get_user_by_id(user_id, connection)?;

    Ok(PartyResponse {
        id: user.id,
        name: user.name,
        email: user.email,
    })
}

/// The JSON shape an invitation is serialized to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationResponse {
    /// The ID of the invitation.
    pub id: InvitationId,
    /// The email address the invitation was sent to.
    pub email: String,
    /// The permission the resulting share will carry.
    pub permission: SharePermission,
    /// Where the invitation is in its lifecycle.
    pub status: InvitationStatus,
    /// When the invitation was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the invitation stops being acceptable.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    /// The sender, included for received invitations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<PartyResponse>,
}

impl InvitationResponse {
    fn from_invitation(invitation: Invitation, sender: Option<PartyResponse>) -> Self {
        Self {
            id: invitation.id,
            email: invitation.email,
            permission: invitation.permission,
            status: invitation.status,
            created_at: invitation.created_at,
            expires_at: invitation.expires_at,
            sender,
        }
    }
}

/// The JSON shape a dashboard share is serialized to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResponse {
    /// The ID of the share.
    pub id: ShareId,
    /// What the viewer may do with the dashboard.
    pub permission: SharePermission,
    /// When the share was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// The dashboard owner, included for shares granted to the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<PartyResponse>,
    /// The viewer, included for shares the caller granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer: Option<PartyResponse>,
}

/// Everything the sharing settings screen needs in one response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationOverviewResponse {
    /// The invitations the caller has sent, in every status.
    pub sent_invitations: Vec<InvitationResponse>,
    /// The open invitations waiting for the caller's response.
    pub received_invitations: Vec<InvitationResponse>,
    /// Dashboards other users have shared with the caller.
    pub shared_with_me: Vec<ShareResponse>,
    /// The users the caller has shared their dashboard with.
    pub shared_by_me: Vec<ShareResponse>,
}

/// A route handler that returns the caller's sent and received invitations
/// and the shares in both directions.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub async fn list_invitations_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<InvitationOverviewResponse>, Error> {
    let connection = state.lock_connection()?;

    let sent_invitations = list_sent_invitations(user_id, &connection)?
        .into_iter()
        .map(|invitation| InvitationResponse::from_invitation(invitation, None))
        .collect();

    let received_invitations = list_received_invitations(user_id, &connection)?
        .into_iter()
        .map(|invitation| {
            let sender = get_party(invitation.sender_id, &connection)?;
            Ok(InvitationResponse::from_invitation(invitation, Some(sender)))
        })
        .collect::<Result<_, Error>>()?;

    let shared_with_me = list_shares_by_viewer(user_id, &connection)?
        .into_iter()
        .map(|share| {
            Ok(ShareResponse {
                id: share.id,
                permission: share.permission,
                created_at: share.created_at,
                owner: Some(get_party(share.owner_id, &connection)?),
                viewer: None,
            })
        })
        .collect::<Result<_, Error>>()?;

    let shared_by_me = list_shares_by_owner(user_id, &connection)?
        .into_iter()
        .map(|share| {
            Ok(ShareResponse {
                id: share.id,
                permission: share.permission,
                created_at: share.created_at,
                owner: None,
                viewer: Some(get_party(share.viewer_id, &connection)?),
            })
        })
        .collect::<Result<_, Error>>()?;

    Ok(Json(InvitationOverviewResponse {
        sent_invitations,
        received_invitations,
        shared_with_me,
        shared_by_me,
    }))
}

/// The request body for sending an invitation.
#[derive(Debug, Deserialize)]
pub struct SendInvitationData {
    /// The email address to invite.
    pub email: String,
    /// The permission the resulting share will carry. Defaults to VIEW.
    #[serde(default = "default_permission")]
    pub permission: SharePermission,
}

fn default_permission() -> SharePermission {
    SharePermission::View
}

/// A route handler for inviting another user to the caller's dashboard.
///
/// # Errors
/// Returns a:
/// - [Error::SelfInvite] if the email belongs to the caller,
/// - [Error::AlreadySharing] if a share with the invited user already exists,
/// - [Error::DuplicateInvitation] if a pending invitation to the email exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub async fn send_invitation_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
    Json(invitation_data): Json<SendInvitationData>,
) -> Result<Json<InvitationResponse>, Error> {
    let connection = state.lock_connection()?;

    let invitation = send_invitation(
        user_id,
        &invitation_data.email,
        invitation_data.permission,
        &connection,
    )?;

    Ok(Json(InvitationResponse::from_invitation(invitation, None)))
}

/// A route handler for accepting an invitation addressed to the caller.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if no pending invitation with this ID is addressed to the caller,
/// - [Error::InvitationExpired] if the invitation is past its expiry date,
/// - or [Error::SqlError] if there is some other SQL error.
pub async fn accept_invitation_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
    Path(invitation_id): Path<InvitationId>,
) -> Result<Json<Value>, Error> {
    let mut connection = state.lock_connection()?;

    accept_invitation(user_id, invitation_id, &mut connection)?;

    Ok(Json(json!({ "success": true })))
}

/// A route handler for declining an invitation addressed to the caller.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if no pending invitation with this ID is addressed to the caller,
/// - [Error::InvitationExpired] if the invitation is past its expiry date,
/// - or [Error::SqlError] if there is some other SQL error.
pub async fn decline_invitation_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
    Path(invitation_id): Path<InvitationId>,
) -> Result<Json<Value>, Error> {
    let mut connection = state.lock_connection()?;

    decline_invitation(user_id, invitation_id, &mut connection)?;

    Ok(Json(json!({ "success": true })))
}

/// A route handler for a sender cancelling an invitation they sent.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if the invitation does not exist or was sent by someone else,
/// - or [Error::SqlError] if there is some other SQL error.
pub async fn cancel_invitation_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserId>,
    Path(invitation_id): Path<InvitationId>,
) -> Result<Json<Value>, Error> {
    let connection = state.lock_connection()?;

    cancel_invitation(user_id, invitation_id, &connection)?;

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod invitation_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Json, extract::{Path, State}};
    use rusqlite::Connection;

    use crate::{
        app_state::DatabaseState,
        db::initialize,
        password::PasswordHash,
        share::core::SharePermission,
        user::{User, create_user},
    };

    use super::{
        SendInvitationData, accept_invitation_endpoint, list_invitations_endpoint,
        send_invitation_endpoint,
    };

    fn get_test_state() -> (DatabaseState, User, User) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let sender = create_user(
            "sender@bar.baz",
            Some("Sender"),
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

        (
            DatabaseState {
                db_connection: Arc::new(Mutex::new(conn)),
            },
            sender,
            viewer,
        )
    }

    #[tokio::test]
    async fn send_accept_and_list_round_trip() {
        let (state, sender, viewer) = get_test_state();

        let invitation = send_invitation_endpoint(
            State(state.clone()),
            Extension(sender.id),
            Json(SendInvitationData {
                email: "viewer@bar.baz".to_owned(),
                permission: SharePermission::Edit,
            }),
        )
        .await
        .unwrap();

        let overview = list_invitations_endpoint(State(state.clone()), Extension(viewer.id))
            .await
            .unwrap();
        assert_eq!(overview.0.received_invitations.len(), 1);
        assert_eq!(
            overview.0.received_invitations[0]
                .sender
                .as_ref()
                .unwrap()
                .email,
            "sender@bar.baz"
        );

        accept_invitation_endpoint(
            State(state.clone()),
            Extension(viewer.id),
            Path(invitation.0.id),
        )
        .await
        .unwrap();

        let overview = list_invitations_endpoint(State(state.clone()), Extension(viewer.id))
            .await
            .unwrap();
        assert!(overview.0.received_invitations.is_empty());
        assert_eq!(overview.0.shared_with_me.len(), 1);
        assert_eq!(
            overview.0.shared_with_me[0].owner.as_ref().unwrap().email,
            "sender@bar.baz"
        );

        let overview = list_invitations_endpoint(State(state), Extension(sender.id))
            .await
            .unwrap();
        assert_eq!(overview.0.shared_by_me.len(), 1);
        assert_eq!(
            overview.0.shared_by_me[0].viewer.as_ref().unwrap().email,
            "viewer@bar.baz"
        );
    }
}
