use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, UserID, exchange_rate::Currency, is_unique_violation};

/// Database identifier for an account.
pub type AccountId = i64;

/// A named container for money, e.g. a bank account or credit card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The user that owns the account.
    pub user_id: UserID,
    /// The account name, unique per user.
    pub name: String,
    /// The colour used to display the account, e.g. "#3366ff".
    pub color: String,
    /// The currency the account holds.
    pub currency: Currency,
}

/// The data for creating or updating an account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountForm {
    /// The account name.
    pub name: String,
    /// The display colour.
    #[serde(default = "default_color")]
    pub color: String,
    /// The currency the account holds.
    pub currency: Currency,
}

fn default_color() -> String {
    "#808080".to_owned()
}

pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            color TEXT NOT NULL,
            currency TEXT NOT NULL,
            UNIQUE(user_id, name)
        )",
        (),
    )?;

    Ok(())
}

/// Create an account for `user_id`.
///
/// # Errors
/// Returns an:
/// - [Error::EmptyName] if the name is blank,
/// - [Error::DuplicateAccountName] if the user already has an account with the same name,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_account(
    user_id: UserID,
    form: &AccountForm,
    connection: &Connection,
) -> Result<Account, Error> {
    let name = validate_name(&form.name)?;

    connection
        .execute(
            "INSERT INTO account (user_id, name, color, currency) VALUES (?1, ?2, ?3, ?4)",
            (user_id, name, form.color.as_str(), form.currency),
        )
        .map_err(|error| map_write_error(error, name))?;

    let id = connection.last_insert_rowid();

    Ok(Account {
        id,
        user_id,
        name: name.to_owned(),
        color: form.color.clone(),
        currency: form.currency,
    })
}

/// Retrieve an account owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the account does not exist or belongs to another user.
pub fn get_account(id: AccountId, user_id: UserID, connection: &Connection) -> Result<Account, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, color, currency FROM account
             WHERE id = ?1 AND user_id = ?2",
        )?
        .query_row((id, user_id), map_row_to_account)
        .map_err(Error::from)
}

/// Retrieve all of the user's accounts ordered by name.
pub fn get_accounts(user_id: UserID, connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, color, currency FROM account
             WHERE user_id = ?1 ORDER BY name ASC",
        )?
        .query_map((user_id,), map_row_to_account)?
        .map(|maybe_account| maybe_account.map_err(Error::from))
        .collect()
}

/// Replace the name, colour and currency of an account.
///
/// # Errors
/// Returns [Error::NotFound] if the account does not exist or belongs to
/// another user, and the same errors as [create_account] otherwise.
pub fn update_account(
    id: AccountId,
    user_id: UserID,
    form: &AccountForm,
    connection: &Connection,
) -> Result<Account, Error> {
    let name = validate_name(&form.name)?;

    let rows_affected = connection
        .execute(
            "UPDATE account SET name = ?1, color = ?2, currency = ?3
             WHERE id = ?4 AND user_id = ?5",
            (name, form.color.as_str(), form.currency, id, user_id),
        )
        .map_err(|error| map_write_error(error, name))?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    get_account(id, user_id, connection)
}

/// Delete an account and, through the foreign keys, the transactions that use it.
///
/// # Errors
/// Returns [Error::NotFound] if the account does not exist or belongs to another user.
pub fn delete_account(id: AccountId, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM account WHERE id = ?1 AND user_id = ?2",
        (id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn validate_name(name: &str) -> Result<&str, Error> {
    let name = name.trim();

    if name.is_empty() {
        Err(Error::EmptyName)
    } else {
        Ok(name)
    }
}

fn map_write_error(error: rusqlite::Error, name: &str) -> Error {
    if is_unique_violation(&error) {
        Error::DuplicateAccountName(name.to_owned())
    } else {
        error.into()
    }
}

pub fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
        currency: row.get(4)?,
    })
}
