//! The ledger operations: every way money can enter, leave or move between
//! accounts.
//!
//! Each operation validates its input and the caller's access to the involved
//! accounts before any write, then performs all of its writes inside one
//! database transaction. Dropping the transaction without committing rolls
//! everything back, so a failure part way through leaves no trace.

use rusqlite::Connection;
use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::{
    Error,
    account::{Account, AccountKind, get_account, get_account_owned_by, insert_account},
    database_id::{AccountId, TransactionId},
    ledger::mutator::{apply_delta, apply_deltas_to_live_accounts, creation_deltas, reversal_deltas},
    share::{SharePermission, get_share_between},
    transaction::{CashflowKind, EntryKind, Transaction, get_transaction, insert_transaction_row},
    user::UserId,
};

/// The description used for transfers when the caller does not supply one.
const DEFAULT_TRANSFER_DESCRIPTION: &str = "Transfer";

/// The input for recording an income or expense transaction.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// The account the transaction applies to.
    pub account_id: AccountId,
    /// The magnitude of money that moved. Must be greater than zero.
    pub amount: Decimal,
    /// What the transaction was for.
    pub description: String,
    /// Whether the money came in or went out.
    pub kind: CashflowKind,
    /// When the transaction happened. Defaults to now.
    pub date: Option<OffsetDateTime>,
}

/// The input for creating an account, optionally funded from another account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// The display name for the account.
    pub name: String,
    /// What kind of money the account holds.
    pub kind: AccountKind,
    /// The balance the account starts with, independent of any funding.
    pub starting_balance: Decimal,
    /// An account of the caller's to move the initial funds out of.
    pub fund_from_account_id: Option<AccountId>,
    /// How much to move out of the funding account.
    pub fund_amount: Option<Decimal>,
}

/// Record an income or expense transaction and update the account balance.
///
/// The caller must own the account or hold an EDIT share from its owner.
///
/// # Errors
/// This function will return a:
/// - [Error::NonPositiveAmount] or [Error::EmptyDescription] if the input is invalid,
/// - [Error::NotFound] if the account does not exist or the caller may not edit it,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    actor: UserId,
    new_transaction: NewTransaction,
    connection: &mut Connection,
) -> Result<Transaction, Error> {
    if new_transaction.amount <= Decimal::ZERO {
        return Err(Error::NonPositiveAmount(new_transaction.amount));
    }
    if new_transaction.description.trim().is_empty() {
        return Err(Error::EmptyDescription);
    }

    let sql_transaction = connection.transaction()?;

    ensure_can_edit_account(actor, new_transaction.account_id, &sql_transaction)?;

    let transaction = insert_transaction_row(
        new_transaction.amount,
        &new_transaction.description,
        new_transaction.date.unwrap_or_else(OffsetDateTime::now_utc),
        new_transaction.kind.into(),
        Some(new_transaction.account_id),
        &sql_transaction,
    )?;

    for (account_id, delta) in creation_deltas(&transaction) {
        apply_delta(&sql_transaction, account_id, delta)?;
    }

    sql_transaction.commit()?;

    Ok(transaction)
}

/// Delete a transaction, reversing its balance effect first.
///
/// Ownership is resolved through the account the transaction references,
/// since the transaction row itself carries no owner.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the transaction does not exist or its account is not
///   owned by the caller,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(
    actor: UserId,
    transaction_id: TransactionId,
    connection: &mut Connection,
) -> Result<(), Error> {
    let sql_transaction = connection.transaction()?;

    let transaction = get_transaction(transaction_id, &sql_transaction)?;
    let account_id = transaction.account_id.ok_or(Error::NotFound)?;
    get_account_owned_by(account_id, actor, &sql_transaction)?;

    apply_deltas_to_live_accounts(&sql_transaction, &reversal_deltas(&transaction))?;

    sql_transaction.execute(
        "DELETE FROM ledger_entry WHERE id = :id",
        &[(":id", &transaction_id)],
    )?;

    sql_transaction.commit()?;

    Ok(())
}

/// Move money between two accounts owned by the caller.
///
/// Writes one TRANSFER entry, decrements the source and increments the target
/// atomically. The insufficient-funds check reads the source balance inside
/// the same database transaction that updates it, so two concurrent transfers
/// cannot both pass the check and overdraw the account.
///
/// # Errors
/// This function will return a:
/// - [Error::SameAccountTransfer] or [Error::NonPositiveAmount] if the input is invalid,
/// - [Error::NotFound] if either account is missing or not owned by the caller,
/// - [Error::InsufficientFunds] if the source balance is less than `amount`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn transfer(
    actor: UserId,
    from_account_id: AccountId,
    to_account_id: AccountId,
    amount: Decimal,
    description: Option<String>,
    connection: &mut Connection,
) -> Result<Transaction, Error> {
    if from_account_id == to_account_id {
        return Err(Error::SameAccountTransfer);
    }
    if amount <= Decimal::ZERO {
        return Err(Error::NonPositiveAmount(amount));
    }

    let sql_transaction = connection.transaction()?;

    let from_account = get_account_owned_by(from_account_id, actor, &sql_transaction)?;
    get_account_owned_by(to_account_id, actor, &sql_transaction)?;

    if from_account.balance < amount {
        return Err(Error::InsufficientFunds);
    }

    let transaction = insert_transaction_row(
        amount,
        description
            .as_deref()
            .unwrap_or(DEFAULT_TRANSFER_DESCRIPTION),
        OffsetDateTime::now_utc(),
        EntryKind::Transfer {
            to: Some(to_account_id),
        },
        Some(from_account_id),
        &sql_transaction,
    )?;

    for (account_id, delta) in creation_deltas(&transaction) {
        apply_delta(&sql_transaction, account_id, delta)?;
    }

    sql_transaction.commit()?;

    Ok(transaction)
}

/// Delete a transfer, restoring the balances on both ends.
///
/// The caller must own the account the money left. The target account is
/// re-debited only if it still exists.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the transaction does not exist, is not a transfer,
///   or its source account is not owned by the caller,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transfer(
    actor: UserId,
    transaction_id: TransactionId,
    connection: &mut Connection,
) -> Result<(), Error> {
    let sql_transaction = connection.transaction()?;

    let transaction = get_transaction(transaction_id, &sql_transaction)?;
    if !matches!(transaction.kind, EntryKind::Transfer { .. }) {
        return Err(Error::NotFound);
    }

    let from_account_id = transaction.account_id.ok_or(Error::NotFound)?;
    get_account_owned_by(from_account_id, actor, &sql_transaction)?;

    apply_deltas_to_live_accounts(&sql_transaction, &reversal_deltas(&transaction))?;

    sql_transaction.execute(
        "DELETE FROM ledger_entry WHERE id = :id",
        &[(":id", &transaction_id)],
    )?;

    sql_transaction.commit()?;

    Ok(())
}

/// Create an account, optionally moving its initial funds out of another
/// account.
///
/// When funded, the new account starts with `starting_balance + fund_amount`,
/// the funding account is debited, and a TRANSFER entry is recorded as an
/// audit trail. All of it commits together or not at all.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyAccountName] or [Error::NonPositiveAmount] if the input is invalid,
/// - [Error::NotFound] if the funding account is missing or not owned by the caller,
/// - [Error::InsufficientFunds] if the funding account balance is less than `fund_amount`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_account(
    actor: UserId,
    new_account: NewAccount,
    connection: &mut Connection,
) -> Result<Account, Error> {
    if new_account.name.trim().is_empty() {
        return Err(Error::EmptyAccountName);
    }

    let funding = match (new_account.fund_from_account_id, new_account.fund_amount) {
        (Some(source_id), Some(amount)) => {
            if amount <= Decimal::ZERO {
                return Err(Error::NonPositiveAmount(amount));
            }
            Some((source_id, amount))
        }
        _ => None,
    };

    let sql_transaction = connection.transaction()?;

    if let Some((source_id, amount)) = funding {
        let source = get_account_owned_by(source_id, actor, &sql_transaction)?;
        if source.balance < amount {
            return Err(Error::InsufficientFunds);
        }
    }

    let fund_amount = funding.map(|(_, amount)| amount).unwrap_or(Decimal::ZERO);
    let account = insert_account(
        actor,
        new_account.name.trim(),
        new_account.kind,
        new_account.starting_balance + fund_amount,
        &sql_transaction,
    )?;

    if let Some((source_id, amount)) = funding {
        apply_delta(&sql_transaction, source_id, -amount)?;
        insert_transaction_row(
            amount,
            &format!("Initial funding for {}", account.name),
            OffsetDateTime::now_utc(),
            EntryKind::Transfer {
                to: Some(account.id),
            },
            Some(source_id),
            &sql_transaction,
        )?;
    }

    sql_transaction.commit()?;

    Ok(account)
}

/// Delete an account together with the transactions that only reference it.
///
/// Deletion is refused while any transfer still links the account to another
/// live account. This keeps the other account's history intact: the caller
/// has to delete those transfers (restoring both balances) before the account
/// can go.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the account does not exist or is not owned by the caller,
/// - [Error::AccountHasLinkedTransfers] if a transfer still links it to
///   another live account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_account(
    actor: UserId,
    account_id: AccountId,
    connection: &mut Connection,
) -> Result<(), Error> {
    let sql_transaction = connection.transaction()?;

    get_account_owned_by(account_id, actor, &sql_transaction)?;

    let linked_transfers: i64 = sql_transaction.query_row(
        "SELECT COUNT(*) FROM ledger_entry
         WHERE kind = 'TRANSFER'
           AND ((account_id = :id AND transfer_to_account_id IS NOT NULL
                    AND transfer_to_account_id != :id)
             OR (transfer_to_account_id = :id AND account_id IS NOT NULL
                    AND account_id != :id))",
        &[(":id", &account_id)],
        |row| row.get(0),
    )?;
    if linked_transfers > 0 {
        return Err(Error::AccountHasLinkedTransfers);
    }

    // The entry table's foreign keys cascade the remaining single-account
    // transactions away with the account row.
    sql_transaction.execute("DELETE FROM account WHERE id = :id", &[(":id", &account_id)])?;

    sql_transaction.commit()?;

    Ok(())
}

/// Check that `actor` may record transactions against `account_id`.
///
/// The caller qualifies as the owner of the account or as the holder of an
/// EDIT share from the owner. Anything less reports [Error::NotFound], the
/// same as if the account did not exist.
fn ensure_can_edit_account(
    actor: UserId,
    account_id: AccountId,
    connection: &Connection,
) -> Result<Account, Error> {
    let account = get_account(account_id, connection)?;

    if account.user_id == actor {
        return Ok(account);
    }

    match get_share_between(account.user_id, actor, connection)? {
        Some(share) if share.permission == SharePermission::Edit => Ok(account),
        _ => Err(Error::NotFound),
    }
}
