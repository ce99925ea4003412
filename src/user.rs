//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(i64);

impl UserId {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserId,
    /// The email the user signed up with, stored in lowercase.
    pub email: String,
    /// The display name the user signed up with, if any.
    pub name: Option<String>,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                name TEXT,
                password TEXT NOT NULL,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// The email is lowercased before it is stored so that look-ups and duplicate
/// detection are case-insensitive.
///
/// # Errors
///
/// Returns a [Error::DuplicateEmail] if the email is already registered, or a
/// [Error::SqlError] if some other SQL related error occurred.
pub fn create_user(
    email: &str,
    name: Option<&str>,
    password_hash: PasswordHash,
    connection: &Connection,
) -> Result<User, Error> {
    let email = email.to_lowercase();

    connection.execute(
        "INSERT INTO user (email, name, password, created_at) VALUES (?1, ?2, ?3, ?4)",
        (
            &email,
            name,
            password_hash.to_string(),
            OffsetDateTime::now_utc(),
        ),
    )?;

    let id = UserId::new(connection.last_insert_rowid());

    Ok(User {
        id,
        email,
        name: name.map(str::to_owned),
        password_hash,
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserId, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, email, name, password FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user from the database whose email matches `email`, ignoring case.
///
/// # Errors
///
/// This function will return an error if:
/// - no registered user has the given email.
/// - there was an error trying to access the store.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, email, name, password FROM user WHERE email = :email")?
        .query_row(&[(":email", &email.to_lowercase())], map_user_row)
        .map_err(|error| error.into())
}

fn map_user_row(row: &rusqlite::Row) -> Result<User, rusqlite::Error> {
    let raw_id = row.get(0)?;
    let email = row.get(1)?;
    let name = row.get(2)?;
    let raw_password_hash: String = row.get(3)?;

    Ok(User {
        id: UserId::new(raw_id),
        email,
        name,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
    })
}

#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;

    use crate::{
        PasswordHash,
        user::{UserId, create_user, get_user_by_email, get_user_by_id},
    };

    use super::{Error, create_user_table};

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");

        conn
    }

    #[test]
    fn insert_user_succeeds() {
        let db_connection = get_db_connection();
        let password_hash = PasswordHash::new_unchecked("hunter2");

        let inserted_user = create_user(
            "foo@bar.baz",
            Some("Foo"),
            password_hash.clone(),
            &db_connection,
        )
        .unwrap();

        assert!(inserted_user.id.as_i64() > 0);
        assert_eq!(inserted_user.email, "foo@bar.baz");
        assert_eq!(inserted_user.password_hash, password_hash);
    }

    #[test]
    fn insert_user_lowercases_email() {
        let db_connection = get_db_connection();

        let inserted_user = create_user(
            "Foo@Bar.Baz",
            None,
            PasswordHash::new_unchecked("hunter2"),
            &db_connection,
        )
        .unwrap();

        assert_eq!(inserted_user.email, "foo@bar.baz");
    }

    #[test]
    fn insert_user_fails_on_duplicate_email() {
        let db_connection = get_db_connection();
        create_user(
            "foo@bar.baz",
            None,
            PasswordHash::new_unchecked("hunter2"),
            &db_connection,
        )
        .unwrap();

        let result = create_user(
            "FOO@bar.baz",
            None,
            PasswordHash::new_unchecked("hunter3"),
            &db_connection,
        );

        assert_eq!(result, Err(Error::DuplicateEmail));
    }

    #[test]
    fn get_user_fails_with_non_existent_id() {
        let db_connection = get_db_connection();

        let id = UserId::new(42);

        assert_eq!(get_user_by_id(id, &db_connection), Err(Error::NotFound));
    }

    #[test]
    fn get_user_by_email_ignores_case() {
        let db_connection = get_db_connection();
        let test_user = create_user(
            "foo@bar.baz",
            None,
            PasswordHash::new_unchecked("hunter2"),
            &db_connection,
        )
        .unwrap();

        let retrieved_user = get_user_by_email("FOO@BAR.BAZ", &db_connection).unwrap();

        assert_eq!(retrieved_user, test_user);
    }
}
