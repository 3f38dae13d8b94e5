//! Links pair two related transactions, e.g. the two legs of a transfer
//! between accounts.
//!
//! A link is undirected and stored with the smaller transaction ID first, so
//! a pair of transactions is represented by at most one row. A transaction
//! can be in at most one link.

mod db;
mod endpoints;

pub use db::{
    LinkId, TransactionLink, create_link, create_link_table, delete_link,
    get_link_for_transaction, get_links, get_unlinked_transfers,
};
pub use endpoints::{
    create_link_endpoint, delete_link_endpoint, get_link_for_transaction_endpoint,
    get_links_endpoint, get_unlinked_transfers_endpoint,
};
