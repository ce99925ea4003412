//! Helpers for storing decimal amounts in SQLite.
//!
//! Amounts and balances are stored as their canonical decimal string so that
//! reading a balance back gives exactly the value that was written. Storing
//! them as REAL would round-trip through binary floating point and deleting a
//! transaction could then leave the balance off by a fraction of a cent.

use rusqlite::{Row, types::Type};
use rust_decimal::Decimal;

/// Convert a decimal amount into the string stored in the database.
pub fn decimal_to_sql(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Read a decimal amount from a TEXT column.
///
/// # Errors
/// Returns a [rusqlite::Error::FromSqlConversionFailure] if the column does
/// not hold a parseable decimal string.
pub fn decimal_from_row(row: &Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    let text: String = row.get(index)?;

    text.parse().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
    })
}
