//! Defines the core data model and database queries for ledger entries.

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{AccountId, TransactionId},
    money::{decimal_from_row, decimal_to_sql},
    user::UserId,
};

/// The kind of a ledger entry, carrying the transfer target when there is one.
///
/// Keeping the transfer target inside the variant means the balance rules in
/// [crate::ledger] can match on this type exhaustively. A new kind of entry
/// cannot be added without the compiler pointing at every place that must
/// decide how it moves money.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Money earned, increases the account balance.
    Income,
    /// Money spent, decreases the account balance.
    Expense,
    /// Money moved between two accounts.
    Transfer {
        /// The account the money went to. `None` if that account has since
        /// been deleted or was never resolved during an import.
        to: Option<AccountId>,
    },
}

impl EntryKind {
    /// The string stored in the database's kind column.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Income => "INCOME",
            EntryKind::Expense => "EXPENSE",
            EntryKind::Transfer { .. } => "TRANSFER",
        }
    }

    /// The transfer target, if this entry is a transfer with a live target.
    pub fn transfer_to(&self) -> Option<AccountId> {
        match self {
            EntryKind::Transfer { to } => *to,
            _ => None,
        }
    }

    fn from_columns(kind: &str, transfer_to: Option<AccountId>) -> Option<Self> {
        match kind {
            "INCOME" => Some(EntryKind::Income),
            "EXPENSE" => Some(EntryKind::Expense),
            "TRANSFER" => Some(EntryKind::Transfer { to: transfer_to }),
            _ => None,
        }
    }
}

/// The direction of money for a plain (non-transfer) transaction.
///
/// This is the kind a client may pick when creating a transaction directly.
/// Transfers are created through the transfer operation, which needs a second
/// account, so they are deliberately not representable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashflowKind {
    /// Money coming into the account.
    Income,
    /// Money leaving the account.
    Expense,
}

impl From<CashflowKind> for EntryKind {
    fn from(value: CashflowKind) -> Self {
        match value {
            CashflowKind::Income => EntryKind::Income,
            CashflowKind::Expense => EntryKind::Expense,
        }
    }
}

/// A single monetary event in the ledger.
///
/// The amount is always a non-negative magnitude. Whether it increases or
/// decreases a balance is derived from `kind` alone, never from the sign of
/// the stored amount or from the current balance.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The magnitude of money that moved.
    pub amount: Decimal,
    /// A text description of what the transaction was for.
    pub description: String,
    /// When the transaction happened. Supplied by the user and may differ
    /// from `created_at`.
    pub date: OffsetDateTime,
    /// The kind of the entry, including the transfer target if any.
    pub kind: EntryKind,
    /// The primary account. For transfers this is the account the money left.
    /// `None` only for imported rows whose account reference could not be
    /// resolved.
    pub account_id: Option<AccountId>,
    /// When the transaction row was created.
    pub created_at: OffsetDateTime,
}

/// The JSON shape a transaction is serialized to for API responses.
///
/// The tagged [EntryKind] is flattened back into the kind string plus an
/// optional transfer target, matching the export format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The magnitude of money that moved.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// A text description of what the transaction was for.
    pub description: String,
    /// When the transaction happened.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// INCOME, EXPENSE or TRANSFER.
    #[serde(rename = "type")]
    pub kind: String,
    /// The primary account the transaction applies to.
    pub account_id: Option<AccountId>,
    /// The account a transfer moved money to, if any.
    pub transfer_to_account_id: Option<AccountId>,
    /// When the transaction row was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Transaction> for TransactionResponse {
    fn from(transaction: Transaction) -> Self {
        Self {
            id: transaction.id,
            amount: transaction.amount,
            description: transaction.description,
            date: transaction.date,
            kind: transaction.kind.as_str().to_owned(),
            account_id: transaction.account_id,
            transfer_to_account_id: transaction.kind.transfer_to(),
            created_at: transaction.created_at,
        }
    }
}

/// The column list every ledger entry query selects, in [map_transaction_row]
/// order.
pub const TRANSACTION_COLUMNS: &str =
    "id, amount, description, date, kind, account_id, transfer_to_account_id, created_at";

/// Create the ledger entry table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS ledger_entry (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                amount TEXT NOT NULL,
                description TEXT NOT NULL,
                date TEXT NOT NULL,
                kind TEXT NOT NULL,
                account_id INTEGER,
                transfer_to_account_id INTEGER,
                created_at TEXT NOT NULL,
                FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(transfer_to_account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    // Composite index used by the per-user listing queries.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_entry_account ON ledger_entry(account_id, created_at);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a [Transaction].
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let amount = decimal_from_row(row, 1)?;
    let description = row.get(2)?;
    let date = row.get(3)?;
    let raw_kind: String = row.get(4)?;
    let account_id = row.get(5)?;
    let transfer_to = row.get(6)?;
    let created_at = row.get(7)?;

    let kind = EntryKind::from_columns(&raw_kind, transfer_to).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown ledger entry kind {raw_kind:?}").into(),
        )
    })?;

    Ok(Transaction {
        id,
        amount,
        description,
        date,
        kind,
        account_id,
        created_at,
    })
}

/// Insert a ledger entry row without touching any balance.
///
/// Callers outside [crate::ledger] should not use this directly. An entry
/// whose balance effect is not applied in the same database transaction
/// breaks the invariant that balances equal the sum of their entries.
pub fn insert_transaction_row(
    amount: Decimal,
    description: &str,
    date: OffsetDateTime,
    kind: EntryKind,
    account_id: Option<AccountId>,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "INSERT INTO ledger_entry (amount, description, date, kind, account_id, transfer_to_account_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                decimal_to_sql(amount),
                description,
                date,
                kind.as_str(),
                account_id,
                kind.transfer_to(),
                OffsetDateTime::now_utc(),
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM ledger_entry WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Retrieve every transaction that touches one of `user_id`'s accounts,
/// newest first.
///
/// Covers entries whose primary account belongs to the user and transfers
/// into one of their accounts from elsewhere.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_transactions_for_user(
    user_id: UserId,
    limit: Option<u32>,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut sql = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM ledger_entry
         WHERE account_id IN (SELECT id FROM account WHERE user_id = :user_id)
            OR transfer_to_account_id IN (SELECT id FROM account WHERE user_id = :user_id)
         ORDER BY created_at DESC, id DESC"
    );

    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    connection
        .prepare(&sql)?
        .query_map(&[(":user_id", &user_id.as_i64())], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::SqlError))
        .collect()
}

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use time::OffsetDateTime;

    use crate::{
        Error,
        account::{AccountKind, insert_account},
        db::initialize,
        password::PasswordHash,
        user::{User, create_user},
    };

    use super::{
        EntryKind, get_transaction, insert_transaction_row, list_transactions_for_user,
    };

    fn get_test_connection() -> (Connection, User) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user = create_user(
            "foo@bar.baz",
            None,
            PasswordHash::new_unchecked("hunter2"),
            &conn,
        )
        .unwrap();

        (conn, user)
    }

    #[test]
    fn insert_and_get_round_trips() {
        let (conn, user) = get_test_connection();
        let account = insert_account(
            user.id,
            "Budget",
            AccountKind::Budget,
            Decimal::ZERO,
            &conn,
        )
        .unwrap();

        let inserted = insert_transaction_row(
            "12.30".parse().unwrap(),
            "groceries",
            OffsetDateTime::now_utc(),
            EntryKind::Expense,
            Some(account.id),
            &conn,
        )
        .unwrap();

        let selected = get_transaction(inserted.id, &conn).unwrap();
        assert_eq!(inserted, selected);
        assert_eq!(selected.amount, "12.3".parse::<Decimal>().unwrap());
        assert_eq!(selected.kind, EntryKind::Expense);
    }

    #[test]
    fn get_fails_on_missing_id() {
        let (conn, _user) = get_test_connection();

        assert_eq!(get_transaction(42, &conn), Err(Error::NotFound));
    }

    #[test]
    fn transfer_round_trips_target_account() {
        let (conn, user) = get_test_connection();
        let from = insert_account(
            user.id,
            "Budget",
            AccountKind::Budget,
            Decimal::ZERO,
            &conn,
        )
        .unwrap();
        let to = insert_account(
            user.id,
            "Savings",
            AccountKind::Savings,
            Decimal::ZERO,
            &conn,
        )
        .unwrap();

        let inserted = insert_transaction_row(
            Decimal::from(40),
            "stashing away",
            OffsetDateTime::now_utc(),
            EntryKind::Transfer { to: Some(to.id) },
            Some(from.id),
            &conn,
        )
        .unwrap();

        assert_eq!(inserted.kind, EntryKind::Transfer { to: Some(to.id) });
        assert_eq!(inserted.account_id, Some(from.id));
    }

    #[test]
    fn listing_includes_transfers_into_own_accounts() {
        let (conn, user) = get_test_connection();
        let other = create_user(
            "other@bar.baz",
            None,
            PasswordHash::new_unchecked("hunter3"),
            &conn,
        )
        .unwrap();
        let mine = insert_account(
            user.id,
            "Savings",
            AccountKind::Savings,
            Decimal::ZERO,
            &conn,
        )
        .unwrap();
        let theirs = insert_account(
            other.id,
            "Budget",
            AccountKind::Budget,
            Decimal::ZERO,
            &conn,
        )
        .unwrap();

        let incoming = insert_transaction_row(
            Decimal::from(5),
            "paying you back",
            OffsetDateTime::now_utc(),
            EntryKind::Transfer { to: Some(mine.id) },
            Some(theirs.id),
            &conn,
        )
        .unwrap();
        let unrelated = insert_transaction_row(
            Decimal::from(9),
            "their own spending",
            OffsetDateTime::now_utc(),
            EntryKind::Expense,
            Some(theirs.id),
            &conn,
        )
        .unwrap();

        let transactions = list_transactions_for_user(user.id, None, &conn).unwrap();

        assert_eq!(transactions, vec![incoming.clone()]);
        assert!(!transactions.contains(&unrelated));
    }

    #[test]
    fn listing_respects_limit_and_order() {
        let (conn, user) = get_test_connection();
        let account = insert_account(
            user.id,
            "Budget",
            AccountKind::Budget,
            Decimal::ZERO,
            &conn,
        )
        .unwrap();

        for i in 1..=5 {
            insert_transaction_row(
                Decimal::from(i),
                "coffee",
                OffsetDateTime::now_utc(),
                EntryKind::Expense,
                Some(account.id),
                &conn,
            )
            .unwrap();
        }

        let transactions = list_transactions_for_user(user.id, Some(2), &conn).unwrap();

        assert_eq!(transactions.len(), 2);
        // Newest rows come back first.
        assert_eq!(transactions[0].amount, Decimal::from(5));
        assert_eq!(transactions[1].amount, Decimal::from(4));
    }
}
