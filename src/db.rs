//! Creates the application's database schema.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{
    Error,
    account::create_account_table,
    share::{create_invitation_table, create_share_table},
    transaction::create_transaction_table,
    user::create_user_table,
};

/// Create the application's database tables if they do not exist.
///
/// All tables are created within a single exclusive transaction, so either the
/// whole schema exists afterwards or none of it does.
///
/// # Errors
/// Returns a [Error::SqlError] if any of the tables could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // Foreign keys are off by default in SQLite and the setting is
    // per-connection, so it must be enabled before anything else.
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_account_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_share_table(&transaction)?;
    create_invitation_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod initialize_tests {
    use rusqlite::Connection;

    use super::initialize;

    #[test]
    fn creates_schema() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).expect("Could not initialize database");

        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('user', 'account', 'ledger_entry', 'dashboard_share', 'invitation')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 5);
    }

    #[test]
    fn is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).expect("Could not initialize database");
        initialize(&conn).expect("Initializing twice should not fail");
    }

    #[test]
    fn enables_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
