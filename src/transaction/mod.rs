//! Transactions, the monetary movements between a user's accounts.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and the `NewTransaction`/`TransactionUpdate` payloads
//! - The ledger rules that tie a transaction's type to its account references
//! - Database functions for storing, querying, and managing transactions
//! - Route handlers for the transaction API

mod core;
mod db;
mod endpoints;
mod ledger;

pub use core::{NewTransaction, Transaction, TransactionKind, TransactionType, TransactionUpdate};
pub(crate) use db::{TRANSACTION_COLUMNS, insert_transactions};
pub use db::{
    count_transactions, create_transaction, create_transaction_table, delete_transaction,
    get_transaction, get_transactions, map_transaction_row, update_transaction,
};
pub(crate) use endpoints::{convert_for_display, get_account_currencies};
pub use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint,
    get_transaction_endpoint, get_transactions_endpoint, update_transaction_endpoint,
};
pub use ledger::validate_amount;
