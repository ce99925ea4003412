//! Sprout is a web app for tracking personal finances across shared dashboards.
//!
//! This library provides a JSON REST API. Users own accounts, record income,
//! expense and transfer transactions against them, and can invite other users
//! to view or edit their dashboard. Every operation that touches a balance
//! goes through the ledger module so that account balances always equal the
//! sum of the transactions behind them.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use rust_decimal::Decimal;
use serde_json::json;
use tokio::signal;

mod account;
mod app_state;
mod assistant;
mod auth;
mod dashboard;
mod data;
mod database_id;
mod db;
mod endpoints;
mod ledger;
mod logging;
mod money;
mod password;
mod register_user;
mod routing;
mod share;
mod transaction;
mod user;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use logging::logging_middleware;
pub use password::{PasswordHash, ValidatedPassword};
pub use routing::build_router;
pub use user::{User, UserId, get_user_by_id};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided an invalid email and password combination.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The auth cookie is missing from the cookie jar in the request.
    #[error("no auth cookie in the cookie jar")]
    CookieMissing,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The email used to register already belongs to another user.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// The requested resource was not found.
    ///
    /// This error also covers resources that exist but belong to another user
    /// who has not shared them with the caller. The two cases are deliberately
    /// indistinguishable so that the API does not leak which ids exist.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An empty string was used as an account name.
    #[error("account name cannot be empty")]
    EmptyAccountName,

    /// An empty string was used as a transaction description.
    #[error("transaction description cannot be empty")]
    EmptyDescription,

    /// A transaction or transfer was requested with a zero or negative amount.
    ///
    /// Amounts are stored as non-negative magnitudes and their sign is derived
    /// from the transaction type, so a non-positive amount is always a client
    /// mistake rather than a way to reverse a flow.
    #[error("{0} is not a valid amount, amounts must be greater than zero")]
    NonPositiveAmount(Decimal),

    /// A transfer was requested with the same account on both ends.
    #[error("cannot transfer to the same account")]
    SameAccountTransfer,

    /// The source account does not hold enough money for a transfer or for
    /// funding a new account.
    #[error("insufficient funds in the source account")]
    InsufficientFunds,

    /// Tried to delete an account that is still linked to another live
    /// account through a transfer.
    ///
    /// Deleting such an account would leave the counterpart transaction
    /// pointing at nothing, so the transfers must be deleted first.
    #[error("the account is referenced by transfers to or from another account")]
    AccountHasLinkedTransfers,

    /// A user tried to send a dashboard invitation to their own email address.
    #[error("you cannot invite yourself")]
    SelfInvite,

    /// A dashboard share already exists for the invited user.
    #[error("already sharing with this user")]
    AlreadySharing,

    /// A pending invitation to the same email address already exists.
    #[error("an invitation has already been sent to this email")]
    DuplicateInvitation,

    /// The invitation was observed past its expiry date.
    #[error("the invitation has expired")]
    InvitationExpired,

    /// The assistant needs the user to specify which account to use.
    ///
    /// Raised when an action omits the account and the user has more than one
    /// account, so picking one silently would be a guess.
    #[error("multiple accounts match, please specify which one to use")]
    AmbiguousAccount,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                Some(ref desc),
            ) if desc.contains("user.email") => Error::DuplicateEmail,
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                Some(ref desc),
            ) if desc.contains("dashboard_share") => Error::AlreadySharing,
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = match self {
            Error::InvalidCredentials | Error::CookieMissing => StatusCode::UNAUTHORIZED,
            Error::TooWeak(_)
            | Error::EmptyAccountName
            | Error::EmptyDescription
            | Error::NonPositiveAmount(_)
            | Error::SameAccountTransfer
            | Error::InsufficientFunds
            | Error::SelfInvite
            | Error::AmbiguousAccount
            | Error::InvitationExpired => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::DuplicateEmail
            | Error::AlreadySharing
            | Error::DuplicateInvitation
            | Error::AccountHasLinkedTransfers => StatusCode::CONFLICT,
            // Any errors that are not handled above are not intended to be shown to the client.
            Error::HashingError(_) | Error::SqlError(_) | Error::DatabaseLockError => {
                tracing::error!("An unexpected error occurred: {}", self);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "An internal error occurred. Please try again later." })),
                )
                    .into_response();
            }
        };

        (status_code, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
