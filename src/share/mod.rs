//! Dashboard sharing: invitations and the standing shares they create.
//!
//! A user invites another by email. Accepting the invitation creates a
//! dashboard share that grants the invitee read (VIEW) or read and write
//! (EDIT) access to the inviter's accounts and transactions. Either side can
//! end the share at any time.

mod core;
mod invitation_endpoints;
mod share_endpoints;

pub(crate) use core::{
    SharePermission, create_invitation_table, create_share, create_share_table, get_share_between,
};
pub(crate) use invitation_endpoints::{
    accept_invitation_endpoint, cancel_invitation_endpoint, decline_invitation_endpoint,
    list_invitations_endpoint, send_invitation_endpoint,
};
pub(crate) use share_endpoints::delete_share_endpoint;
