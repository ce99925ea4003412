//! Defines the core data model and database functions for dashboard sharing.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    database_id::{InvitationId, ShareId},
    user::{UserId, get_user_by_email, get_user_by_id},
};

/// How long an invitation stays open before it expires.
const INVITATION_EXPIRY: Duration = Duration::days(7);

/// What a dashboard share lets the other user do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SharePermission {
    /// The other user can look at the dashboard but not change anything.
    View,
    /// The other user can also record transactions against the owner's
    /// accounts.
    Edit,
}

impl SharePermission {
    /// The string stored in the database for this permission.
    pub fn as_str(&self) -> &'static str {
        match self {
            SharePermission::View => "VIEW",
            SharePermission::Edit => "EDIT",
        }
    }

    fn from_str(text: &str) -> Option<Self> {
        match text {
            "VIEW" => Some(SharePermission::View),
            "EDIT" => Some(SharePermission::Edit),
            _ => None,
        }
    }
}

/// Where an invitation is in its lifecycle.
///
/// PENDING is the only state an invitation can leave. ACCEPTED, DECLINED and
/// EXPIRED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    /// Waiting for the recipient to respond.
    Pending,
    /// The recipient accepted and a share was created.
    Accepted,
    /// The recipient turned the invitation down.
    Declined,
    /// The invitation was observed past its expiry date.
    Expired,
}

impl InvitationStatus {
    /// The string stored in the database for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "PENDING",
            InvitationStatus::Accepted => "ACCEPTED",
            InvitationStatus::Declined => "DECLINED",
            InvitationStatus::Expired => "EXPIRED",
        }
    }

    fn from_str(text: &str) -> Option<Self> {
        match text {
            "PENDING" => Some(InvitationStatus::Pending),
            "ACCEPTED" => Some(InvitationStatus::Accepted),
            "DECLINED" => Some(InvitationStatus::Declined),
            "EXPIRED" => Some(InvitationStatus::Expired),
            _ => None,
        }
    }
}

/// A standing grant of access from one user's dashboard to another user.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardShare {
    /// The ID of the share.
    pub id: ShareId,
    /// The user whose dashboard is shared.
    pub owner_id: UserId,
    /// The user the dashboard is shared with.
    pub viewer_id: UserId,
    /// What the viewer may do with the dashboard.
    pub permission: SharePermission,
    /// When the share was created.
    pub created_at: OffsetDateTime,
}

/// A pending, time-boxed offer to create a [DashboardShare].
#[derive(Debug, Clone, PartialEq)]
pub struct Invitation {
    /// The ID of the invitation.
    pub id: InvitationId,
    /// The user who sent the invitation.
    pub sender_id: UserId,
    /// The user the invitation is addressed to. `None` until a registered
    /// user with the invited email is known.
    pub recipient_id: Option<UserId>,
    /// The email address the invitation was sent to, stored lowercase.
    pub email: String,
    /// The permission the resulting share will carry.
    pub permission: SharePermission,
    /// Where the invitation is in its lifecycle.
    pub status: InvitationStatus,
    /// When the invitation was created.
    pub created_at: OffsetDateTime,
    /// When the invitation stops being acceptable.
    pub expires_at: OffsetDateTime,
}

/// Create the dashboard share table.
///
/// The unique index on (owner, viewer) is what guarantees at most one share
/// per pair of users.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_share_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS dashboard_share (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                viewer_id INTEGER NOT NULL,
                permission TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(owner_id, viewer_id),
                FOREIGN KEY(owner_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(viewer_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

/// Create the invitation table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_invitation_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS invitation (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id INTEGER NOT NULL,
                recipient_id INTEGER,
                email TEXT NOT NULL,
                permission TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY(sender_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(recipient_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    Ok(())
}

const SHARE_COLUMNS: &str = "id, owner_id, viewer_id, permission, created_at";

fn map_share_row(row: &Row) -> Result<DashboardShare, rusqlite::Error> {
    let raw_permission: String = row.get(3)?;
    let permission = SharePermission::from_str(&raw_permission).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown share permission {raw_permission:?}").into(),
        )
    })?;

    Ok(DashboardShare {
        id: row.get(0)?,
        owner_id: UserId::new(row.get(1)?),
        viewer_id: UserId::new(row.get(2)?),
        permission,
        created_at: row.get(4)?,
    })
}

const INVITATION_COLUMNS: &str =
    "id, sender_id, recipient_id, email, permission, status, created_at, expires_at";

fn map_invitation_row(row: &Row) -> Result<Invitation, rusqlite::Error> {
    let raw_permission: String = row.get(4)?;
    let permission = SharePermission::from_str(&raw_permission).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown share permission {raw_permission:?}").into(),
        )
    })?;
    let raw_status: String = row.get(5)?;
    let status = InvitationStatus::from_str(&raw_status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown invitation status {raw_status:?}").into(),
        )
    })?;
    let recipient_id: Option<i64> = row.get(2)?;

    Ok(Invitation {
        id: row.get(0)?,
        sender_id: UserId::new(row.get(1)?),
        recipient_id: recipient_id.map(UserId::new),
        email: row.get(3)?,
        permission,
        status,
        created_at: row.get(6)?,
        expires_at: row.get(7)?,
    })
}

/// Insert a dashboard share from `owner` to `viewer`.
///
/// # Errors
/// Returns a:
/// - [Error::AlreadySharing] if a share between the two users already exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_share(
    owner: UserId,
    viewer: UserId,
    permission: SharePermission,
    connection: &Connection,
) -> Result<DashboardShare, Error> {
    let share = connection
        .prepare(&format!(
            "INSERT INTO dashboard_share (owner_id, viewer_id, permission, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING {SHARE_COLUMNS}"
        ))?
        .query_row(
            (
                owner.as_i64(),
                viewer.as_i64(),
                permission.as_str(),
                OffsetDateTime::now_utc(),
            ),
            map_share_row,
        )?;

    Ok(share)
}

/// Look up the share from `owner` to `viewer`, if one exists.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub fn get_share_between(
    owner: UserId,
    viewer: UserId,
    connection: &Connection,
) -> Result<Option<DashboardShare>, Error> {
    let mut statement = connection.prepare(&format!(
        "SELECT {SHARE_COLUMNS} FROM dashboard_share
         WHERE owner_id = :owner_id AND viewer_id = :viewer_id"
    ))?;
    let mut rows = statement.query_map(
        &[
            (":owner_id", &owner.as_i64()),
            (":viewer_id", &viewer.as_i64()),
        ],
        map_share_row,
    )?;

    rows.next().transpose().map_err(Error::SqlError)
}

/// Delete a share, initiated by either side.
///
/// The owner revoking access and the viewer leaving the dashboard are the
/// same operation. The share must reference the caller on one of its ends.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if the share does not exist or does not involve the caller,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_share(actor: UserId, share_id: ShareId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM dashboard_share
         WHERE id = :id AND (owner_id = :user_id OR viewer_id = :user_id)",
        &[(":id", &share_id), (":user_id", &actor.as_i64())],
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Send a dashboard invitation to `email`.
///
/// When a registered user already has that email, the invitation is bound to
/// them immediately, otherwise the binding happens when someone with the
/// email accepts.
///
/// # Errors
/// Returns a:
/// - [Error::SelfInvite] if the email belongs to the sender,
/// - [Error::AlreadySharing] if a share with the invited user already exists,
/// - [Error::DuplicateInvitation] if the sender already has a pending
///   invitation to the email,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn send_invitation(
    actor: UserId,
    email: &str,
    permission: SharePermission,
    connection: &Connection,
) -> Result<Invitation, Error> {
    let email = email.trim().to_lowercase();
    let sender = get_user_by_id(actor, connection)?;

    if email == sender.email {
        return Err(Error::SelfInvite);
    }

    let recipient = match get_user_by_email(&email, connection) {
        Ok(user) => Some(user),
        Err(Error::NotFound) => None,
        Err(error) => return Err(error),
    };

    if let Some(ref recipient) = recipient
        && get_share_between(actor, recipient.id, connection)?.is_some()
    {
        return Err(Error::AlreadySharing);
    }

    let pending_count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM invitation
         WHERE sender_id = :sender_id AND email = :email AND status = 'PENDING'",
        &[
            (":sender_id", &actor.as_i64() as &dyn rusqlite::ToSql),
            (":email", &email),
        ],
        |row| row.get(0),
    )?;
    if pending_count > 0 {
        return Err(Error::DuplicateInvitation);
    }

    let now = OffsetDateTime::now_utc();
    let invitation = connection
        .prepare(&format!(
            "INSERT INTO invitation
                 (sender_id, recipient_id, email, permission, status, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING {INVITATION_COLUMNS}"
        ))?
        .query_row(
            (
                actor.as_i64(),
                recipient.map(|user| user.id.as_i64()),
                &email,
                permission.as_str(),
                InvitationStatus::Pending.as_str(),
                now,
                now + INVITATION_EXPIRY,
            ),
            map_invitation_row,
        )?;

    Ok(invitation)
}

/// Fetch a PENDING invitation addressed to `actor`, by recipient binding or
/// by email match.
fn get_pending_invitation_for(
    actor: UserId,
    actor_email: &str,
    invitation_id: InvitationId,
    connection: &Connection,
) -> Result<Invitation, Error> {
    let invitation = connection
        .prepare(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitation
             WHERE id = :id AND status = 'PENDING'
               AND (recipient_id = :user_id OR email = :email)"
        ))?
        .query_row(
            &[
                (":id", &invitation_id as &dyn rusqlite::ToSql),
                (":user_id", &actor.as_i64()),
                (":email", &actor_email),
            ],
            map_invitation_row,
        )?;

    Ok(invitation)
}

/// Flip a PENDING invitation that was observed past its expiry to EXPIRED.
fn mark_expired(invitation_id: InvitationId, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "UPDATE invitation SET status = 'EXPIRED' WHERE id = :id",
        &[(":id", &invitation_id)],
    )?;

    Ok(())
}

/// Accept an invitation, creating the dashboard share it offered.
///
/// The share creation, the status change and the recipient binding commit
/// together. An expired invitation is flipped to EXPIRED as a side effect of
/// being observed, and the accept fails.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if no pending invitation with this ID is addressed to the caller,
/// - [Error::InvitationExpired] if the invitation is past its expiry date,
/// - [Error::AlreadySharing] if a share from the sender already exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn accept_invitation(
    actor: UserId,
    invitation_id: InvitationId,
    connection: &mut Connection,
) -> Result<DashboardShare, Error> {
    let sql_transaction = connection.transaction()?;

    let actor_user = get_user_by_id(actor, &sql_transaction)?;
    let invitation =
        get_pending_invitation_for(actor, &actor_user.email, invitation_id, &sql_transaction)?;

    if invitation.expires_at < OffsetDateTime::now_utc() {
        mark_expired(invitation.id, &sql_transaction)?;
        sql_transaction.commit()?;

        return Err(Error::InvitationExpired);
    }

    let share = create_share(invitation.sender_id, actor, invitation.permission, &sql_transaction)?;
    sql_transaction.execute(
        "UPDATE invitation SET status = 'ACCEPTED', recipient_id = :user_id WHERE id = :id",
        &[(":user_id", &actor.as_i64()), (":id", &invitation.id)],
    )?;

    sql_transaction.commit()?;

    Ok(share)
}

/// Decline an invitation addressed to the caller.
///
/// Like accepting, declining observes the invitation: one that is past its
/// expiry flips to EXPIRED instead of DECLINED.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if no pending invitation with this ID is addressed to the caller,
/// - [Error::InvitationExpired] if the invitation is past its expiry date,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn decline_invitation(
    actor: UserId,
    invitation_id: InvitationId,
    connection: &mut Connection,
) -> Result<(), Error> {
    let sql_transaction = connection.transaction()?;

    let actor_user = get_user_by_id(actor, &sql_transaction)?;
    let invitation =
        get_pending_invitation_for(actor, &actor_user.email, invitation_id, &sql_transaction)?;

    if invitation.expires_at < OffsetDateTime::now_utc() {
        mark_expired(invitation.id, &sql_transaction)?;
        sql_transaction.commit()?;

        return Err(Error::InvitationExpired);
    }

    sql_transaction.execute(
        "UPDATE invitation SET status = 'DECLINED', recipient_id = :user_id WHERE id = :id",
        &[(":user_id", &actor.as_i64()), (":id", &invitation.id)],
    )?;

    sql_transaction.commit()?;

    Ok(())
}

/// Delete an invitation the caller sent.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if the invitation does not exist or was sent by someone else,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn cancel_invitation(
    actor: UserId,
    invitation_id: InvitationId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM invitation WHERE id = :id AND sender_id = :sender_id",
        &[(":id", &invitation_id), (":sender_id", &actor.as_i64())],
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Retrieve every invitation the caller has sent, newest first.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub fn list_sent_invitations(
    actor: UserId,
    connection: &Connection,
) -> Result<Vec<Invitation>, Error> {
    connection
        .prepare(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitation
             WHERE sender_id = :sender_id ORDER BY created_at DESC, id DESC"
        ))?
        .query_map(&[(":sender_id", &actor.as_i64())], map_invitation_row)?
        .map(|maybe_invitation| maybe_invitation.map_err(Error::SqlError))
        .collect()
}

/// Retrieve the pending invitations addressed to the caller, newest first.
///
/// Pending invitations that are past their expiry are flipped to EXPIRED and
/// left out of the result.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub fn list_received_invitations(
    actor: UserId,
    connection: &Connection,
) -> Result<Vec<Invitation>, Error> {
    let actor_user = get_user_by_id(actor, connection)?;

    let invitations: Vec<Invitation> = connection
        .prepare(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitation
             WHERE status = 'PENDING' AND (recipient_id = :user_id OR email = :email)
             ORDER BY created_at DESC, id DESC"
        ))?
        .query_map(
            &[
                (":user_id", &actor.as_i64() as &dyn rusqlite::ToSql),
                (":email", &actor_user.email),
            ],
            map_invitation_row,
        )?
        .collect::<Result<_, _>>()?;

    let now = OffsetDateTime::now_utc();
    let mut open_invitations = Vec::with_capacity(invitations.len());
    for invitation in invitations {
        if invitation.expires_at < now {
            mark_expired(invitation.id, connection)?;
        } else {
            open_invitations.push(invitation);
        }
    }

    Ok(open_invitations)
}

/// Retrieve every share where the caller is the owner.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub fn list_shares_by_owner(
    actor: UserId,
    connection: &Connection,
) -> Result<Vec<DashboardShare>, Error> {
    connection
        .prepare(&format!(
            "SELECT {SHARE_COLUMNS} FROM dashboard_share
             WHERE owner_id = :user_id ORDER BY created_at DESC, id DESC"
        ))?
        .query_map(&[(":user_id", &actor.as_i64())], map_share_row)?
        .map(|maybe_share| maybe_share.map_err(Error::SqlError))
        .collect()
}

/// Retrieve every share where the caller is the viewer.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub fn list_shares_by_viewer(
    actor: UserId,
    connection: &Connection,
) -> Result<Vec<DashboardShare>, Error> {
    connection
        .prepare(&format!(
            "SELECT {SHARE_COLUMNS} FROM dashboard_share
             WHERE viewer_id = :user_id ORDER BY created_at DESC, id DESC"
        ))?
        .query_map(&[(":user_id", &actor.as_i64())], map_share_row)?
        .map(|maybe_share| maybe_share.map_err(Error::SqlError))
        .collect()
}
