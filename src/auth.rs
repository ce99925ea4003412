//! Cookie based authentication: the log-in and log-out handlers, and the
//! middleware that turns a session cookie into the acting user's ID.
//!
//! Every protected handler receives the acting user as an
//! `Extension<UserId>` injected by [auth_guard]. Handlers never read the
//! session themselves, so there is exactly one place that decides who the
//! caller is.

use axum::{
    Json,
    extract::{FromRef, FromRequestParts, Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, Key, SameSite},
};
use serde::Deserialize;
use serde_json::json;
use time::{Duration, OffsetDateTime};

use crate::{
    AppState, Error,
    user::{UserId, get_user_by_email},
};

pub(crate) const COOKIE_USER_ID: &str = "user_id";
pub(crate) const COOKIE_EXPIRY: &str = "expiry";

/// The default duration for which auth cookies are valid.
pub(crate) const DEFAULT_COOKIE_DURATION: Duration = Duration::minutes(30);

/// The state needed for the auth middleware and the log-in handler.
#[derive(Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Add an auth cookie to the cookie jar, indicating that a user is logged in
/// and authenticated.
///
/// The expiry is stored both on the cookies and as the value of a second
/// cookie, so that the server can reject stale sessions even when a client
/// keeps sending an expired cookie.
pub(crate) fn set_auth_cookie(
    jar: PrivateCookieJar,
    user_id: UserId,
    duration: Duration,
) -> PrivateCookieJar {
    let expiry = OffsetDateTime::now_utc() + duration;

    jar.add(
        Cookie::build((COOKIE_USER_ID, user_id.as_i64().to_string()))
            .expires(expiry)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
    .add(
        Cookie::build((COOKIE_EXPIRY, expiry.unix_timestamp().to_string()))
            .expires(expiry)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Set the auth cookies to an invalid value and set their max age to zero,
/// which should delete the cookies on the client side.
pub(crate) fn invalidate_auth_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    let expired = |name: &'static str| {
        Cookie::build((name, "deleted"))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true)
    };

    jar.add(expired(COOKIE_USER_ID)).add(expired(COOKIE_EXPIRY))
}

/// Extract the logged-in user's ID from the cookie jar.
///
/// # Errors
/// Returns a:
/// - [Error::CookieMissing] if the auth cookies are not in the jar,
/// - [Error::InvalidCredentials] if the cookies do not parse or the session
///   has expired.
pub(crate) fn get_user_id_from_auth_cookie(jar: &PrivateCookieJar) -> Result<UserId, Error> {
    let user_id_cookie = jar.get(COOKIE_USER_ID).ok_or(Error::CookieMissing)?;
    let expiry_cookie = jar.get(COOKIE_EXPIRY).ok_or(Error::CookieMissing)?;

    let user_id: i64 = user_id_cookie
        .value_trimmed()
        .parse()
        .map_err(|_| Error::InvalidCredentials)?;
    let expiry_timestamp: i64 = expiry_cookie
        .value_trimmed()
        .parse()
        .map_err(|_| Error::InvalidCredentials)?;
    let expiry = OffsetDateTime::from_unix_timestamp(expiry_timestamp)
        .map_err(|_| Error::InvalidCredentials)?;

    if expiry < OffsetDateTime::now_utc() {
        return Err(Error::InvalidCredentials);
    }

    Ok(UserId::new(user_id))
}

/// Extend the session so that it expires no earlier than `duration` from now.
///
/// A session that already expires later is left alone.
fn extend_auth_cookie_duration_if_needed(
    jar: PrivateCookieJar,
    user_id: UserId,
    duration: Duration,
) -> PrivateCookieJar {
    let current_expiry = jar
        .get(COOKIE_EXPIRY)
        .and_then(|cookie| cookie.value_trimmed().parse().ok())
        .and_then(|timestamp| OffsetDateTime::from_unix_timestamp(timestamp).ok())
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);

    let new_expiry = OffsetDateTime::now_utc() + duration;

    if current_expiry >= new_expiry {
        return jar;
    }

    set_auth_cookie(jar, user_id, duration)
}

/// The credentials a user logs in with.
#[derive(Deserialize)]
pub struct Credentials {
    /// Email entered during log-in.
    pub email: String,
    /// Password entered during log-in.
    pub password: String,
}

/// Handler for log-in requests.
///
/// # Errors
/// Returns a [Error::InvalidCredentials] if the email does not belong to a
/// registered user or the password is not correct. The two cases are
/// deliberately indistinguishable.
pub async fn log_in_endpoint(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(credentials): Json<Credentials>,
) -> Result<Response, Error> {
    let user = {
        let connection = state.lock_connection()?;

        get_user_by_email(&credentials.email, &connection).map_err(|error| match error {
            Error::NotFound => Error::InvalidCredentials,
            other => other,
        })?
    };

    let password_is_correct = user
        .password_hash
        .verify(&credentials.password)
        .map_err(|error| Error::HashingError(error.to_string()))?;

    if !password_is_correct {
        return Err(Error::InvalidCredentials);
    }

    let jar = set_auth_cookie(jar, user.id, state.cookie_duration);

    Ok((
        jar,
        Json(json!({ "id": user.id, "email": user.email, "name": user.name })),
    )
        .into_response())
}

/// Invalidate the auth cookies, logging the client out.
pub async fn log_out_endpoint(jar: PrivateCookieJar) -> Response {
    let jar = invalidate_auth_cookie(jar);

    (jar, Json(json!({ "success": true }))).into_response()
}

/// Middleware function that checks for a valid authorization cookie.
///
/// The user ID is placed into the request and the request executed normally
/// if the cookie is valid, otherwise a 401 response is returned. On the way
/// out the session expiry is pushed back so that active users stay logged in.
///
/// **Note**: Route handlers can use the function argument
/// `Extension(user_id): Extension<UserId>` to receive the user ID.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(error) => {
            tracing::error!("Error getting cookie jar from request: {error:?}");
            return Error::CookieMissing.into_response();
        }
    };

    let user_id = match get_user_id_from_auth_cookie(&jar) {
        Ok(user_id) => user_id,
        Err(error) => return error.into_response(),
    };

    parts.extensions.insert(user_id);
    let request = Request::from_parts(parts, body);
    let response = next.run(request).await;

    let jar = extend_auth_cookie_duration_if_needed(jar, user_id, state.cookie_duration);

    let (mut parts, body) = response.into_parts();
    for (key, value) in jar.into_response().headers() {
        if key == SET_COOKIE {
            parts.headers.append(key, value.to_owned());
        }
    }

    Response::from_parts(parts, body)
}


#[cfg(test)]
mod auth_guard_tests {
    use axum::{Extension, Json, Router, http::StatusCode, middleware, routing::get, routing::post};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{
        AppState,
        auth::{auth_guard, log_in_endpoint, log_out_endpoint},
        endpoints,
        password::{PasswordHash, ValidatedPassword},
        user::{UserId, create_user},
    };

    fn get_test_state() -> AppState {
        let connection =
            Connection::open_in_memory().expect("Could not open database in memory.");

        AppState::new(connection, "foobar").expect("Could not create app state.")
    }

    async fn whoami(Extension(user_id): Extension<UserId>) -> Json<serde_json::Value> {
        Json(json!({ "user_id": user_id }))
    }

    fn get_test_server(state: AppState) -> TestServer {
        let app = Router::new()
            .route("/protected", get(whoami))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard))
            .route(endpoints::LOG_IN, post(log_in_endpoint))
            .route(endpoints::LOG_OUT, get(log_out_endpoint))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    fn create_test_user(state: &AppState, email: &str, password: &str) {
        // Minimum bcrypt cost keeps the tests fast.
        let password_hash =
            PasswordHash::new(ValidatedPassword::new_unchecked(password), 4).unwrap();

        create_user(
            email,
            None,
            password_hash,
            &state.lock_connection().unwrap(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn log_in_then_access_protected_route() {
        let state = get_test_state();
        create_test_user(&state, "foo@bar.baz", "averysafeandsecurepassword");
        let server = get_test_server(state);

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({
                "email": "foo@bar.baz",
                "password": "averysafeandsecurepassword",
            }))
            .await;
        response.assert_status_ok();

        server
            .get("/protected")
            .add_cookies(response.cookies())
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn log_in_fails_with_wrong_password() {
        let state = get_test_state();
        create_test_user(&state, "foo@bar.baz", "averysafeandsecurepassword");
        let server = get_test_server(state);

        server
            .post(endpoints::LOG_IN)
            .json(&json!({
                "email": "foo@bar.baz",
                "password": "not the password",
            }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn log_in_fails_with_unknown_email() {
        let server = get_test_server(get_test_state());

        server
            .post(endpoints::LOG_IN)
            .json(&json!({
                "email": "nobody@bar.baz",
                "password": "averysafeandsecurepassword",
            }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn protected_route_without_cookie_is_unauthorized() {
        let server = get_test_server(get_test_state());

        server
            .get("/protected")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn log_out_ends_the_session() {
        let state = get_test_state();
        create_test_user(&state, "foo@bar.baz", "averysafeandsecurepassword");
        let server = get_test_server(state);

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({
                "email": "foo@bar.baz",
                "password": "averysafeandsecurepassword",
            }))
            .await;
        response.assert_status_ok();

        let response = server
            .get(endpoints::LOG_OUT)
            .add_cookies(response.cookies())
            .await;
        response.assert_status_ok();

        server
            .get("/protected")
            .add_cookies(response.cookies())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
