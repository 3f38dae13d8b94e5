//! Computations, named sets of transactions that are totalled together.

mod db;
mod endpoints;
mod totals;

pub use db::{
    Computation, ComputationForm, ComputationId, create_computation, create_computation_tables,
    delete_computation, get_computation, get_computations, get_included_transactions,
    rename_computation, replace_computation_transactions, set_transaction_included,
};
pub use endpoints::{
    create_computation_endpoint, delete_computation_endpoint,
    get_computation_endpoint, get_computations_endpoint, rename_computation_endpoint,
    replace_computation_transactions_endpoint, set_transaction_included_endpoint,
};
pub use totals::{ComputationTotals, compute_totals};
