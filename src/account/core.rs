//! Defines the core data model and database queries for accounts.

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::AccountId,
    money::{decimal_from_row, decimal_to_sql},
    user::UserId,
};

/// The kind of money an account holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountKind {
    /// Long term savings.
    Savings,
    /// Day to day spending money.
    Budget,
    /// Pocket money, e.g. for children sharing the dashboard.
    Allowance,
    /// Retirement savings.
    Retirement,
    /// Money invested in stocks.
    Stock,
}

impl AccountKind {
    /// The string stored in the database for this account kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Savings => "SAVINGS",
            AccountKind::Budget => "BUDGET",
            AccountKind::Allowance => "ALLOWANCE",
            AccountKind::Retirement => "RETIREMENT",
            AccountKind::Stock => "STOCK",
        }
    }

    fn from_str(text: &str) -> Option<Self> {
        match text {
            "SAVINGS" => Some(AccountKind::Savings),
            "BUDGET" => Some(AccountKind::Budget),
            "ALLOWANCE" => Some(AccountKind::Allowance),
            "RETIREMENT" => Some(AccountKind::Retirement),
            "STOCK" => Some(AccountKind::Stock),
            _ => None,
        }
    }
}

/// An account that holds money for a user.
///
/// The balance is a cached value that equals the signed sum of all ledger
/// entries applied to the account. The functions in [crate::ledger] keep the
/// two in sync by updating the balance in the same database transaction as the
/// entry that changes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// The ID of the account.
    pub id: AccountId,
    /// The ID of the user who owns the account.
    pub user_id: UserId,
    /// The display name of the account.
    pub name: String,
    /// What kind of money the account holds.
    pub kind: AccountKind,
    /// The cached balance of the account.
    pub balance: Decimal,
    /// When the account was created.
    pub created_at: OffsetDateTime,
}

/// The JSON shape an account is serialized to for API responses.
///
/// Balances are serialized as JSON numbers rather than decimal strings, which
/// is what clients and the export format expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    /// The ID of the account.
    pub id: AccountId,
    /// The display name of the account.
    pub name: String,
    /// What kind of money the account holds.
    #[serde(rename = "type")]
    pub kind: AccountKind,
    /// The cached balance of the account.
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    /// When the account was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            kind: account.kind,
            balance: account.balance,
            created_at: account.created_at,
        }
    }
}

/// Create the account table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                balance TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

/// Map a database row to an [Account].
///
/// Expects the columns id, user_id, name, kind, balance, created_at in that
/// order.
pub fn map_account_row(row: &Row) -> Result<Account, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = UserId::new(row.get(1)?);
    let name = row.get(2)?;
    let raw_kind: String = row.get(3)?;
    let kind = AccountKind::from_str(&raw_kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown account kind {raw_kind:?}").into(),
        )
    })?;
    let balance = decimal_from_row(row, 4)?;
    let created_at = row.get(5)?;

    Ok(Account {
        id,
        user_id,
        name,
        kind,
        balance,
        created_at,
    })
}

/// Insert a new account row.
///
/// This is a plain row insert. Use [crate::ledger::create_account] instead if
/// the account may be funded from another account, so that the funding
/// transfer and both balances commit together.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub fn insert_account(
    user_id: UserId,
    name: &str,
    kind: AccountKind,
    balance: Decimal,
    connection: &Connection,
) -> Result<Account, Error> {
    let account = connection
        .prepare(
            "INSERT INTO account (user_id, name, kind, balance, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, user_id, name, kind, balance, created_at",
        )?
        .query_row(
            (
                user_id.as_i64(),
                name,
                kind.as_str(),
                decimal_to_sql(balance),
                OffsetDateTime::now_utc(),
            ),
            map_account_row,
        )?;

    Ok(account)
}

/// Retrieve an account by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_account(id: AccountId, connection: &Connection) -> Result<Account, Error> {
    let account = connection
        .prepare(
            "SELECT id, user_id, name, kind, balance, created_at FROM account WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_account_row)?;

    Ok(account)
}

/// Retrieve an account by its `id`, requiring that `owner` owns it.
///
/// An account that exists but belongs to someone else produces the same
/// [Error::NotFound] as one that does not exist.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to an account owned by `owner`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_account_owned_by(
    id: AccountId,
    owner: UserId,
    connection: &Connection,
) -> Result<Account, Error> {
    let account = connection
        .prepare(
            "SELECT id, user_id, name, kind, balance, created_at FROM account
             WHERE id = :id AND user_id = :user_id",
        )?
        .query_row(&[(":id", &id), (":user_id", &owner.as_i64())], map_account_row)?;

    Ok(account)
}

/// Retrieve all accounts owned by `user_id`, oldest first.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_accounts_for_user(
    user_id: UserId,
    connection: &Connection,
) -> Result<Vec<Account>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, kind, balance, created_at FROM account
             WHERE user_id = :user_id ORDER BY created_at ASC, id ASC",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_account_row)?
        .map(|maybe_account| maybe_account.map_err(Error::SqlError))
        .collect()
}
