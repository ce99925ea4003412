//! Accounts hold money and are the anchor for every ledger entry.
//!
//! This module defines the account model and database queries, plus the
//! endpoints for listing, creating and deleting accounts. Balance changes
//! never happen here, they go through [crate::ledger].

mod core;
mod create_endpoint;
mod delete_endpoint;
mod list_endpoint;

pub(crate) use core::{
    Account, AccountKind, AccountResponse, create_account_table, get_account,
    get_account_owned_by, insert_account, list_accounts_for_user,
};
pub(crate) use create_endpoint::create_account_endpoint;
pub(crate) use delete_endpoint::delete_account_endpoint;
pub(crate) use list_endpoint::list_accounts_endpoint;
