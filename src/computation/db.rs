//! Database functions for computations and their member transactions.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    Error, UserID,
    database_id::{DatabaseId, TransactionId},
    is_unique_violation,
    transaction::{TRANSACTION_COLUMNS, Transaction, get_transaction, map_transaction_row},
};

/// Database identifier for a computation.
pub type ComputationId = DatabaseId;

/// A transaction in a computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComputationMember {
    /// The member transaction.
    pub transaction_id: TransactionId,
    /// Whether the transaction counts towards the totals.
    pub included: bool,
}

/// A named set of transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Computation {
    /// The ID of the computation.
    pub id: ComputationId,
    /// The user that owns the computation.
    pub user_id: UserID,
    /// The name, unique per user.
    pub name: String,
    /// The member transactions in the order they were added.
    pub members: Vec<ComputationMember>,
}

/// The data for creating a computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationForm {
    /// The name of the computation.
    pub name: String,
    /// The transactions in the computation, all included.
    #[serde(default)]
    pub transaction_ids: Vec<TransactionId>,
}

/// Create the computation table and its membership table.
pub fn create_computation_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS computation (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            UNIQUE(user_id, name)
        );

        CREATE TABLE IF NOT EXISTS computation_transaction (
            computation_id INTEGER NOT NULL,
            transaction_id INTEGER NOT NULL,
            included INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY(computation_id, transaction_id),
            FOREIGN KEY(computation_id) REFERENCES computation(id) ON DELETE CASCADE,
            FOREIGN KEY(transaction_id) REFERENCES \"transaction\"(id) ON DELETE CASCADE
        );",
    )?;

    Ok(())
}

/// Create a computation for `user_id` containing `form.transaction_ids`.
///
/// # Errors
/// Returns an:
/// - [Error::EmptyName] if the name is blank,
/// - [Error::NotFound] if a transaction does not belong to `user_id`,
/// - [Error::DuplicateComputationName] if the user already has a computation with the same name,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_computation(
    user_id: UserID,
    form: &ComputationForm,
    connection: &Connection,
) -> Result<Computation, Error> {
    let name = check_name(&form.name)?;
    check_transactions(user_id, &form.transaction_ids, connection)?;

    let transaction = connection.unchecked_transaction()?;

    transaction
        .execute(
            "INSERT INTO computation (user_id, name) VALUES (?1, ?2)",
            (user_id, name),
        )
        .map_err(|error| map_name_error(error, name))?;
    let id = transaction.last_insert_rowid();

    insert_members(id, &form.transaction_ids, &transaction)?;

    transaction.commit()?;

    get_computation(id, user_id, connection)
}

/// Retrieve a computation owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if `id` does not refer to a computation owned by `user_id`.
pub fn get_computation(
    id: ComputationId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Computation, Error> {
    let (id, user_id, name) = connection
        .prepare("SELECT id, user_id, name FROM computation WHERE id = ?1 AND user_id = ?2")?
        .query_row((id, user_id), |row| {
            Ok((
                row.get::<_, ComputationId>(0)?,
                row.get::<_, UserID>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

    Ok(Computation {
        id,
        user_id,
        name,
        members: get_members(id, connection)?,
    })
}

/// Retrieve the computations of `user_id`, ordered by name.
pub fn get_computations(user_id: UserID, connection: &Connection) -> Result<Vec<Computation>, Error> {
    let ids = connection
        .prepare("SELECT id FROM computation WHERE user_id = ?1 ORDER BY name")?
        .query_map([user_id], |row| row.get(0))?
        .collect::<Result<Vec<ComputationId>, _>>()?;

    ids.into_iter()
        .map(|id| get_computation(id, user_id, connection))
        .collect()
}

/// Rename a computation owned by `user_id`.
///
/// # Errors
/// Returns an:
/// - [Error::EmptyName] if the name is blank,
/// - [Error::NotFound] if `id` does not refer to a computation owned by `user_id`,
/// - or [Error::DuplicateComputationName] if the name is taken.
pub fn rename_computation(
    id: ComputationId,
    user_id: UserID,
    name: &str,
    connection: &Connection,
) -> Result<Computation, Error> {
    let name = check_name(name)?;

    let rows_affected = connection
        .execute(
            "UPDATE computation SET name = ?1 WHERE id = ?2 AND user_id = ?3",
            (name, id, user_id),
        )
        .map_err(|error| map_name_error(error, name))?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    get_computation(id, user_id, connection)
}

/// Replace the member transactions of a computation owned by `user_id`.
///
/// The old members are deleted and the new ones inserted in one SQL
/// transaction, so a failure leaves the old members in place. Every new
/// member is included.
///
/// # Errors
/// Returns [Error::NotFound] if the computation or a transaction does not belong to `user_id`.
pub fn replace_computation_transactions(
    id: ComputationId,
    user_id: UserID,
    transaction_ids: &[TransactionId],
    connection: &Connection,
) -> Result<Computation, Error> {
    get_computation(id, user_id, connection)?;
    check_transactions(user_id, transaction_ids, connection)?;

    let transaction = connection.unchecked_transaction()?;

    transaction.execute(
        "DELETE FROM computation_transaction WHERE computation_id = ?1",
        [id],
    )?;
    insert_members(id, transaction_ids, &transaction)?;

    transaction.commit()?;

    get_computation(id, user_id, connection)
}

/// Include or exclude one member transaction of a computation.
///
/// # Errors
/// Returns [Error::NotFound] if the computation does not belong to `user_id`
/// or `transaction_id` is not one of its members.
pub fn set_transaction_included(
    id: ComputationId,
    user_id: UserID,
    transaction_id: TransactionId,
    included: bool,
    connection: &Connection,
) -> Result<Computation, Error> {
    get_computation(id, user_id, connection)?;

    let rows_affected = connection.execute(
        "UPDATE computation_transaction SET included = ?1
         WHERE computation_id = ?2 AND transaction_id = ?3",
        (included, id, transaction_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    get_computation(id, user_id, connection)
}

/// Delete a computation owned by `user_id`. Its transactions are kept.
///
/// # Errors
/// Returns [Error::NotFound] if `id` does not refer to a computation owned by `user_id`.
pub fn delete_computation(
    id: ComputationId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM computation WHERE id = ?1 AND user_id = ?2",
        (id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Retrieve the included member transactions of a computation owned by `user_id`.
pub fn get_included_transactions(
    id: ComputationId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    get_computation(id, user_id, connection)?;

    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE user_id = ?1 AND id IN (
                SELECT transaction_id FROM computation_transaction
                WHERE computation_id = ?2 AND included = 1
             )
             ORDER BY date, id"
        ))?
        .query_map((user_id, id), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

fn get_members(id: ComputationId, connection: &Connection) -> Result<Vec<ComputationMember>, Error> {
    connection
        .prepare(
            "SELECT transaction_id, included FROM computation_transaction
             WHERE computation_id = ?1 ORDER BY rowid",
        )?
        .query_map([id], map_member_row)?
        .map(|maybe_member| maybe_member.map_err(Error::from))
        .collect()
}

fn map_member_row(row: &Row) -> Result<ComputationMember, rusqlite::Error> {
    Ok(ComputationMember {
        transaction_id: row.get(0)?,
        included: row.get(1)?,
    })
}

fn insert_members(
    id: ComputationId,
    transaction_ids: &[TransactionId],
    connection: &Connection,
) -> Result<(), Error> {
    let mut statement = connection.prepare(
        "INSERT OR IGNORE INTO computation_transaction (computation_id, transaction_id)
         VALUES (?1, ?2)",
    )?;

    for transaction_id in transaction_ids {
        statement.execute((id, transaction_id))?;
    }

    Ok(())
}

fn check_name(name: &str) -> Result<&str, Error> {
    let name = name.trim();

    if name.is_empty() {
        return Err(Error::EmptyName);
    }

    Ok(name)
}

fn check_transactions(
    user_id: UserID,
    transaction_ids: &[TransactionId],
    connection: &Connection,
) -> Result<(), Error> {
    for transaction_id in transaction_ids {
        get_transaction(*transaction_id, user_id, connection)?;
    }

    Ok(())
}

fn map_name_error(error: rusqlite::Error, name: &str) -> Error {
    if is_unique_violation(&error) {
        Error::DuplicateComputationName(name.to_owned())
    } else {
        error.into()
    }
}
