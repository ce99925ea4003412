//! The ledger keeps account balances consistent with the transaction log.
//!
//! Every operation that moves money lives here. Each one computes its balance
//! deltas from the transaction kind, applies them and writes the log row
//! inside a single database transaction, so readers never observe a log entry
//! without its balance effect or the other way around.

mod mutator;
mod operations;

pub(crate) use mutator::replay_balance;
pub(crate) use operations::{
    NewAccount, NewTransaction, create_account, create_transaction, delete_account,
    delete_transaction, delete_transfer, transfer,
};
