//! The API endpoint URIs.
//!
//! For endpoints that take a parameter, e.g. '/api/accounts/{account_id}',
//! use [format_endpoint].

/// The route for registering a new user.
pub const USERS: &str = "/api/users";
/// The route for logging in a user.
pub const LOG_IN: &str = "/api/log_in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/log_out";

/// The route for listing and creating accounts.
pub const ACCOUNTS: &str = "/api/accounts";
/// The route for deleting a single account.
pub const ACCOUNT: &str = "/api/accounts/{account_id}";

/// The route for listing and creating transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route for deleting a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";

/// The route for creating transfers between accounts.
pub const TRANSFERS: &str = "/api/transfers";
/// The route for deleting a single transfer.
pub const TRANSFER: &str = "/api/transfers/{transaction_id}";

/// The route for the dashboard read-model, own or shared.
pub const DASHBOARD: &str = "/api/dashboard";

/// The route for listing and sending invitations.
pub const INVITATIONS: &str = "/api/invitations";
/// The route for a sender cancelling their invitation.
pub const INVITATION: &str = "/api/invitations/{invitation_id}";
/// The route for accepting an invitation.
pub const INVITATION_ACCEPT: &str = "/api/invitations/{invitation_id}/accept";
/// The route for declining an invitation.
pub const INVITATION_DECLINE: &str = "/api/invitations/{invitation_id}/decline";
/// The route for revoking or leaving a dashboard share.
pub const SHARE: &str = "/api/shares/{share_id}";

/// The route for downloading the caller's data as JSON.
pub const DATA_DOWNLOAD: &str = "/api/data/download";
/// The route for importing previously exported data.
pub const DATA_UPLOAD: &str = "/api/data/upload";

/// The route for the assistant's snapshot of the caller's finances.
pub const ASSISTANT_CONTEXT: &str = "/api/assistant/context";
/// The route for the assistant to perform a structured action.
pub const ASSISTANT: &str = "/api/assistant";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/api/accounts/{account_id}',
/// '{account_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
