//! Computes and applies the balance effect of a ledger entry.
//!
//! The sign of every delta is derived from the entry kind and nothing else.
//! The stored amount is a non-negative magnitude, so applying the table below
//! on creation and its negation on deletion always cancels out exactly.
//!
//! | kind     | primary account | transfer target |
//! |----------|-----------------|-----------------|
//! | INCOME   | +amount         |                 |
//! | EXPENSE  | -amount         |                 |
//! | TRANSFER | -amount         | +amount         |

use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::{
    Error,
    database_id::AccountId,
    money::{decimal_from_row, decimal_to_sql},
    transaction::{EntryKind, Transaction, map_transaction_row},
};

/// The balance changes a transaction caused when it was created.
///
/// At most two deltas: the primary account and, for transfers, the target
/// account. Accounts that are absent (an unresolved import reference or a
/// deleted transfer target) contribute nothing.
pub(crate) fn creation_deltas(transaction: &Transaction) -> Vec<(AccountId, Decimal)> {
    let mut deltas = Vec::with_capacity(2);

    match transaction.kind {
        EntryKind::Income => {
            if let Some(account_id) = transaction.account_id {
                deltas.push((account_id, transaction.amount));
            }
        }
        EntryKind::Expense => {
            if let Some(account_id) = transaction.account_id {
                deltas.push((account_id, -transaction.amount));
            }
        }
        EntryKind::Transfer { to } => {
            if let Some(account_id) = transaction.account_id {
                deltas.push((account_id, -transaction.amount));
            }
            if let Some(to) = to {
                deltas.push((to, transaction.amount));
            }
        }
    }

    deltas
}

/// The balance changes that undo `transaction`, the exact negation of
/// [creation_deltas].
pub(crate) fn reversal_deltas(transaction: &Transaction) -> Vec<(AccountId, Decimal)> {
    creation_deltas(transaction)
        .into_iter()
        .map(|(account_id, delta)| (account_id, -delta))
        .collect()
}

/// Add `delta` to the stored balance of `account_id`.
///
/// Must only be called inside the same database transaction that inserts or
/// deletes the ledger entry the delta belongs to.
///
/// # Errors
/// Returns a [Error::NotFound] if the account does not exist, or a
/// [Error::SqlError] on any other SQL error.
pub(crate) fn apply_delta(
    connection: &Connection,
    account_id: AccountId,
    delta: Decimal,
) -> Result<(), Error> {
    let balance = connection
        .prepare("SELECT balance FROM account WHERE id = :id")?
        .query_row(&[(":id", &account_id)], |row| decimal_from_row(row, 0))?;

    connection.execute(
        "UPDATE account SET balance = ?1 WHERE id = ?2",
        (decimal_to_sql(balance + delta), account_id),
    )?;

    Ok(())
}

/// Apply each delta in `deltas`, skipping accounts that no longer exist.
///
/// Deleting a transfer whose target account has since been removed should
/// still restore the remaining side, so a missing account is not an error
/// here.
pub(crate) fn apply_deltas_to_live_accounts(
    connection: &Connection,
    deltas: &[(AccountId, Decimal)],
) -> Result<(), Error> {
    for &(account_id, delta) in deltas {
        match apply_delta(connection, account_id, delta) {
            Ok(()) | Err(Error::NotFound) => {}
            Err(error) => return Err(error),
        }
    }

    Ok(())
}

/// Recompute the balance of `account_id` from its full transaction history.
///
/// Folds [creation_deltas] over every entry that touches the account, in
/// creation order, starting from zero. For an account created with a starting
/// balance, the result is the stored balance minus that starting amount.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub(crate) fn replay_balance(
    account_id: AccountId,
    connection: &Connection,
) -> Result<Decimal, Error> {
    let transactions: Vec<Transaction> = connection
        .prepare(&format!(
            "SELECT {} FROM ledger_entry
             WHERE account_id = :id OR transfer_to_account_id = :id
             ORDER BY created_at ASC, id ASC",
            crate::transaction::TRANSACTION_COLUMNS
        ))?
        .query_map(&[(":id", &account_id)], map_transaction_row)?
        .collect::<Result<_, _>>()?;

    let balance = transactions
        .iter()
        .flat_map(|transaction| creation_deltas(transaction))
        .filter(|(id, _)| *id == account_id)
        .map(|(_, delta)| delta)
        .sum();

    Ok(balance)
}

#[cfg(test)]
mod mutator_tests {
    use rust_decimal::Decimal;
    use time::OffsetDateTime;

    use crate::transaction::{EntryKind, Transaction};

    use super::{creation_deltas, reversal_deltas};

    fn entry(kind: EntryKind, account_id: Option<i64>, amount: Decimal) -> Transaction {
        Transaction {
            id: 1,
            amount,
            description: "test".to_owned(),
            date: OffsetDateTime::UNIX_EPOCH,
            kind,
            account_id,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn income_increases_primary_account() {
        let deltas = creation_deltas(&entry(EntryKind::Income, Some(1), Decimal::from(30)));

        assert_eq!(deltas, vec![(1, Decimal::from(30))]);
    }

    #[test]
    fn expense_decreases_primary_account() {
        let deltas = creation_deltas(&entry(EntryKind::Expense, Some(1), Decimal::from(30)));

        assert_eq!(deltas, vec![(1, Decimal::from(-30))]);
    }

    #[test]
    fn transfer_moves_between_accounts() {
        let deltas = creation_deltas(&entry(
            EntryKind::Transfer { to: Some(2) },
            Some(1),
            Decimal::from(40),
        ));

        assert_eq!(deltas, vec![(1, Decimal::from(-40)), (2, Decimal::from(40))]);
    }

    #[test]
    fn transfer_with_deleted_target_only_touches_source() {
        let deltas = creation_deltas(&entry(
            EntryKind::Transfer { to: None },
            Some(1),
            Decimal::from(40),
        ));

        assert_eq!(deltas, vec![(1, Decimal::from(-40))]);
    }

    #[test]
    fn unresolved_import_reference_moves_nothing() {
        let deltas = creation_deltas(&entry(EntryKind::Expense, None, Decimal::from(9)));

        assert!(deltas.is_empty());
    }

    #[test]
    fn reversal_is_exact_negation() {
        let transaction = entry(
            EntryKind::Transfer { to: Some(2) },
            Some(1),
            "12.34".parse().unwrap(),
        );

        let forward = creation_deltas(&transaction);
        let backward = reversal_deltas(&transaction);

        for ((account, delta), (reverse_account, reverse_delta)) in
            forward.iter().zip(backward.iter())
        {
            assert_eq!(account, reverse_account);
            assert_eq!(*delta + *reverse_delta, Decimal::ZERO);
        }
    }
}
