//! Database initialization and helpers shared by the feature modules.

use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, Row, Transaction, TransactionBehavior, types::Type};
use rust_decimal::Decimal;

use crate::{
    Error, account::create_account_table, category::create_category_table,
    computation::create_computation_tables, csv_import::create_import_table,
    exchange_rate::create_exchange_rate_table, import_source::create_import_source_table,
    link::create_link_table, transaction::create_transaction_table,
    user::create_user_settings_table,
};

/// Create all the tables for the application's domain models.
///
/// Also turns on foreign key enforcement, which the cascading deletes of
/// imports, transactions and links rely on.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_account_table(&transaction)?;
    create_category_table(&transaction)?;
    create_import_source_table(&transaction)?;
    create_import_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_link_table(&transaction)?;
    create_computation_tables(&transaction)?;
    create_exchange_rate_table(&transaction)?;
    create_user_settings_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Acquire the lock on the shared database connection.
///
/// # Errors
/// Returns [Error::DatabaseLockError] if the mutex has been poisoned.
pub fn lock_connection(connection: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, Error> {
    connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}

/// Read a decimal stored as TEXT from column `index`.
pub fn get_decimal(row: &Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    let text: String = row.get(index)?;

    text.parse()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error)))
}
