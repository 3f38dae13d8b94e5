//! Accounts, the named containers that money moves between.

mod core;
mod endpoints;

pub use core::{
    Account, AccountForm, AccountId, create_account, create_account_table, delete_account,
    get_account, get_accounts, update_account,
};
pub use endpoints::{
    create_account_endpoint, delete_account_endpoint, get_account_endpoint,
    get_accounts_endpoint, update_account_endpoint,
};
