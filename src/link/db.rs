//! Database operations for transaction links.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::{
    Error, UserID,
    database_id::{DatabaseId, TransactionId},
    is_unique_violation,
    transaction::{Transaction, get_transaction, map_transaction_row},
};

/// Database identifier for a link.
pub type LinkId = DatabaseId;

/// An undirected pairing of two transactions owned by the same user.
///
/// `transaction_id_1` is always less than `transaction_id_2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionLink {
    /// The ID of the link.
    pub id: LinkId,
    /// The user that owns both transactions.
    pub user_id: UserID,
    /// The smaller of the two transaction IDs.
    pub transaction_id_1: TransactionId,
    /// The larger of the two transaction IDs.
    pub transaction_id_2: TransactionId,
}

impl TransactionLink {
    /// Whether `transaction_id` is either side of the link.
    pub fn contains(&self, transaction_id: TransactionId) -> bool {
        self.transaction_id_1 == transaction_id || self.transaction_id_2 == transaction_id
    }
}

/// Create the transaction link table.
///
/// The CHECK constraint keeps the pair in canonical order so the UNIQUE
/// constraint also rejects the reversed pair.
pub fn create_link_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS transaction_link (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            transaction_id_1 INTEGER NOT NULL,
            transaction_id_2 INTEGER NOT NULL,
            FOREIGN KEY(transaction_id_1) REFERENCES \"transaction\"(id) ON DELETE CASCADE,
            FOREIGN KEY(transaction_id_2) REFERENCES \"transaction\"(id) ON DELETE CASCADE,
            CHECK (transaction_id_1 < transaction_id_2),
            UNIQUE(transaction_id_1, transaction_id_2)
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_link_2 ON transaction_link(transaction_id_2);",
    )?;

    Ok(())
}

/// Link two transactions owned by `user_id`.
///
/// The argument order does not matter: the pair is stored with the smaller
/// ID first.
///
/// # Errors
/// This function will return a:
/// - [Error::SelfLink] if both IDs are the same,
/// - [Error::NotFound] if either transaction does not exist or belongs to another user,
/// - [Error::AlreadyLinked] if either transaction is already in a link,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_link(
    user_id: UserID,
    transaction_id_a: TransactionId,
    transaction_id_b: TransactionId,
    connection: &Connection,
) -> Result<TransactionLink, Error> {
    if transaction_id_a == transaction_id_b {
        return Err(Error::SelfLink);
    }

    get_transaction(transaction_id_a, user_id, connection)?;
    get_transaction(transaction_id_b, user_id, connection)?;

    if let Some(existing) = find_link_touching(transaction_id_a, transaction_id_b, connection)? {
        let linked_id = if existing.contains(transaction_id_a) {
            transaction_id_a
        } else {
            transaction_id_b
        };
        return Err(Error::AlreadyLinked(linked_id));
    }

    let (transaction_id_1, transaction_id_2) = if transaction_id_a < transaction_id_b {
        (transaction_id_a, transaction_id_b)
    } else {
        (transaction_id_b, transaction_id_a)
    };

    connection
        .prepare(
            "INSERT INTO transaction_link (user_id, transaction_id_1, transaction_id_2)
             VALUES (?1, ?2, ?3)
             RETURNING id, user_id, transaction_id_1, transaction_id_2",
        )?
        .query_row((user_id, transaction_id_1, transaction_id_2), map_row)
        .map_err(|error| {
            if is_unique_violation(&error) {
                Error::AlreadyLinked(transaction_id_1)
            } else {
                error.into()
            }
        })
}

/// Delete a link owned by `user_id`.
///
/// Returns whether a link was deleted.
pub fn delete_link(
    link_id: LinkId,
    user_id: UserID,
    connection: &Connection,
) -> Result<bool, Error> {
    let rows_affected = connection.execute(
        "DELETE FROM transaction_link WHERE id = ?1 AND user_id = ?2",
        (link_id, user_id),
    )?;

    Ok(rows_affected > 0)
}

/// Get the link that `transaction_id` is in, on either side.
pub fn get_link_for_transaction(
    transaction_id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Option<TransactionLink>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, transaction_id_1, transaction_id_2 FROM transaction_link
             WHERE user_id = ?1 AND (transaction_id_1 = ?2 OR transaction_id_2 = ?2)",
        )?
        .query_row((user_id, transaction_id), map_row)
        .optional()
        .map_err(Error::from)
}

/// Get all of the links owned by `user_id`.
pub fn get_links(user_id: UserID, connection: &Connection) -> Result<Vec<TransactionLink>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, transaction_id_1, transaction_id_2 FROM transaction_link
             WHERE user_id = ?1 ORDER BY id ASC",
        )?
        .query_map((user_id,), map_row)?
        .map(|maybe_link| maybe_link.map_err(Error::from))
        .collect()
}

/// Get the transfers of `user_id` that are not in any link, most recent first.
pub fn get_unlinked_transfers(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT t.id, t.user_id, t.transaction_type, t.source_account_id,
                t.target_account_id, t.description, t.amount, t.category_id, t.date, t.import_id
             FROM \"transaction\" t
             WHERE t.user_id = ?1
                AND t.transaction_type = 'Transfer'
                AND NOT EXISTS (
                    SELECT 1 FROM transaction_link l
                    WHERE l.transaction_id_1 = t.id OR l.transaction_id_2 = t.id
                )
             ORDER BY t.date DESC, t.id DESC",
        )?
        .query_map((user_id,), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Find a link that has either transaction on either side.
fn find_link_touching(
    transaction_id_a: TransactionId,
    transaction_id_b: TransactionId,
    connection: &Connection,
) -> Result<Option<TransactionLink>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, transaction_id_1, transaction_id_2 FROM transaction_link
             WHERE transaction_id_1 IN (?1, ?2) OR transaction_id_2 IN (?1, ?2)
             LIMIT 1",
        )?
        .query_row((transaction_id_a, transaction_id_b), map_row)
        .optional()
        .map_err(Error::from)
}

fn map_row(row: &Row) -> Result<TransactionLink, rusqlite::Error> {
    Ok(TransactionLink {
        id: row.get(0)?,
        user_id: row.get(1)?,
        transaction_id_1: row.get(2)?,
        transaction_id_2: row.get(3)?,
    })
}
