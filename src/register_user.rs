//! The endpoint for registering a new user account.

use axum::{Json, extract::State, response::{IntoResponse, Response}};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;
use serde_json::json;

use crate::{
    AppState, Error,
    auth::set_auth_cookie,
    password::PasswordHash,
    user::create_user,
};

/// The data a new user signs up with.
#[derive(Deserialize)]
pub struct RegisterData {
    /// The email to register with, used for logging in and receiving
    /// dashboard invitations.
    pub email: String,
    /// An optional display name.
    pub name: Option<String>,
    /// The password to register with, checked for strength before hashing.
    pub password: String,
}

/// Handler for creating a new user.
///
/// Signing up also logs the new user in by setting the auth cookies, so the
/// client does not need a second round trip.
///
/// # Errors
/// Returns a:
/// - [Error::TooWeak] if the password is too easy to guess,
/// - [Error::DuplicateEmail] if the email is already registered,
/// - [Error::HashingError] if the password could not be hashed.
pub async fn register_user_endpoint(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(register_data): Json<RegisterData>,
) -> Result<Response, Error> {
    let password_hash =
        PasswordHash::from_raw_password(&register_data.password, PasswordHash::DEFAULT_COST)?;

    let user = {
        let connection = state.lock_connection()?;

        create_user(
            &register_data.email,
            register_data.name.as_deref(),
            password_hash,
            &connection,
        )?
    };

    let jar = set_auth_cookie(jar, user.id, state.cookie_duration);

    Ok((
        jar,
        Json(json!({ "id": user.id, "email": user.email, "name": user.name })),
    )
        .into_response())
}
