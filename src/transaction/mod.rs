//! Ledger entries: the record of every income, expense and transfer.
//!
//! This module defines the transaction model and database queries, plus the
//! endpoints for listing, creating and deleting transactions and transfers.
//! Balance changes never happen here, they go through [crate::ledger].

mod core;
mod create_endpoint;
mod delete_endpoint;
mod list_endpoint;
mod transfer_endpoints;

pub(crate) use core::{
    CashflowKind, EntryKind, TRANSACTION_COLUMNS, Transaction, TransactionResponse,
    create_transaction_table, get_transaction, insert_transaction_row, list_transactions_for_user,
    map_transaction_row,
};
pub(crate) use create_endpoint::create_transaction_endpoint;
pub(crate) use delete_endpoint::delete_transaction_endpoint;
pub(crate) use list_endpoint::list_transactions_endpoint;
pub(crate) use transfer_endpoints::{create_transfer_endpoint, delete_transfer_endpoint};
