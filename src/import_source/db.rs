//! Database operations for import sources.

use rusqlite::{Connection, Row, types::Type};
use serde::{Deserialize, Serialize};

use crate::{
    Error, UserID,
    account::{AccountId, get_account},
    database_id::DatabaseId,
    import_source::ImportSourceConfig,
    is_unique_violation,
};

/// Database identifier for an import source.
pub type ImportSourceId = DatabaseId;

/// A named, reusable CSV format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSource {
    /// The ID of the import source.
    pub id: ImportSourceId,
    /// The user that owns the import source.
    pub user_id: UserID,
    /// The name, unique per user.
    pub name: String,
    /// How to read files from this source.
    pub config: ImportSourceConfig,
    /// The accounts this source is offered for. Empty means every account.
    pub account_ids: Vec<AccountId>,
}

/// The data for creating or replacing an import source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSourceForm {
    /// The name of the import source.
    pub name: String,
    /// How to read files from this source.
    pub config: ImportSourceConfig,
    /// The accounts this source is offered for.
    #[serde(default)]
    pub account_ids: Vec<AccountId>,
}

/// Create the import source table and the table of its account restrictions.
pub fn create_import_source_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS import_source (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            config TEXT NOT NULL,
            UNIQUE(user_id, name)
        );

        CREATE TABLE IF NOT EXISTS import_source_account (
            import_source_id INTEGER NOT NULL,
            account_id INTEGER NOT NULL,
            PRIMARY KEY(import_source_id, account_id),
            FOREIGN KEY(import_source_id) REFERENCES import_source(id) ON DELETE CASCADE,
            FOREIGN KEY(account_id) REFERENCES account(id) ON DELETE CASCADE
        );",
    )?;

    Ok(())
}

/// Create an import source for `user_id`.
///
/// # Errors
/// Returns an:
/// - [Error::EmptyName] if the name is blank,
/// - [Error::InvalidImportConfig] or [Error::InvalidFieldMapping] if the config is invalid,
/// - [Error::NotFound] if a restricted account does not belong to `user_id`,
/// - [Error::DuplicateImportSourceName] if the user already has a source with the same name,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_import_source(
    user_id: UserID,
    form: &ImportSourceForm,
    connection: &Connection,
) -> Result<ImportSource, Error> {
    let name = check_form(user_id, form, connection)?;
    let config = serde_json::to_string(&form.config)?;

    let transaction = connection.unchecked_transaction()?;

    transaction
        .execute(
            "INSERT INTO import_source (user_id, name, config) VALUES (?1, ?2, ?3)",
            (user_id, name, config),
        )
        .map_err(|error| map_write_error(error, name))?;
    let id = transaction.last_insert_rowid();

    save_account_ids(id, &form.account_ids, &transaction)?;
    transaction.commit()?;

    Ok(ImportSource {
        id,
        user_id,
        name: name.to_owned(),
        config: form.config.clone(),
        account_ids: sorted_account_ids(&form.account_ids),
    })
}

/// Get an import source owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the source does not exist or belongs to another user.
pub fn get_import_source(
    id: ImportSourceId,
    user_id: UserID,
    connection: &Connection,
) -> Result<ImportSource, Error> {
    let mut import_source = connection
        .prepare("SELECT id, user_id, name, config FROM import_source WHERE id = ?1 AND user_id = ?2")?
        .query_row((id, user_id), map_row)?;

    import_source.account_ids = get_account_ids(id, connection)?;

    Ok(import_source)
}

/// Get every import source owned by `user_id`, ordered by name.
pub fn get_import_sources(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<ImportSource>, Error> {
    let import_sources = connection
        .prepare(
            "SELECT id, user_id, name, config FROM import_source
             WHERE user_id = ?1 ORDER BY name ASC",
        )?
        .query_map((user_id,), map_row)?
        .collect::<Result<Vec<_>, _>>()?;

    import_sources
        .into_iter()
        .map(|mut import_source| {
            import_source.account_ids = get_account_ids(import_source.id, connection)?;
            Ok(import_source)
        })
        .collect()
}

/// Replace the name, config and account restrictions of an import source.
///
/// # Errors
/// See [create_import_source]. Also returns [Error::NotFound] if the source
/// does not belong to `user_id`.
pub fn update_import_source(
    id: ImportSourceId,
    user_id: UserID,
    form: &ImportSourceForm,
    connection: &Connection,
) -> Result<ImportSource, Error> {
    let name = check_form(user_id, form, connection)?;
    let config = serde_json::to_string(&form.config)?;

    let transaction = connection.unchecked_transaction()?;

    let rows_affected = transaction
        .execute(
            "UPDATE import_source SET name = ?1, config = ?2 WHERE id = ?3 AND user_id = ?4",
            (name, config, id, user_id),
        )
        .map_err(|error| map_write_error(error, name))?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    save_account_ids(id, &form.account_ids, &transaction)?;
    transaction.commit()?;

    Ok(ImportSource {
        id,
        user_id,
        name: name.to_owned(),
        config: form.config.clone(),
        account_ids: sorted_account_ids(&form.account_ids),
    })
}

/// Delete an import source owned by `user_id`.
///
/// Imports that were started from the source keep their data, their source is cleared.
///
/// # Errors
/// Returns [Error::NotFound] if the source does not exist or belongs to another user.
pub fn delete_import_source(
    id: ImportSourceId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM import_source WHERE id = ?1 AND user_id = ?2",
        (id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Validate the form and return the trimmed name.
fn check_form<'a>(
    user_id: UserID,
    form: &'a ImportSourceForm,
    connection: &Connection,
) -> Result<&'a str, Error> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(Error::EmptyName);
    }

    form.config.validate()?;

    for account_id in &form.account_ids {
        get_account(*account_id, user_id, connection)?;
    }

    Ok(name)
}

/// Replace the account restrictions of an import source.
fn save_account_ids(
    import_source_id: ImportSourceId,
    account_ids: &[AccountId],
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "DELETE FROM import_source_account WHERE import_source_id = ?1",
        (import_source_id,),
    )?;

    let mut statement = connection.prepare(
        "INSERT OR IGNORE INTO import_source_account (import_source_id, account_id)
         VALUES (?1, ?2)",
    )?;

    for account_id in account_ids {
        statement.execute((import_source_id, account_id))?;
    }

    Ok(())
}

fn get_account_ids(
    import_source_id: ImportSourceId,
    connection: &Connection,
) -> Result<Vec<AccountId>, Error> {
    connection
        .prepare(
            "SELECT account_id FROM import_source_account
             WHERE import_source_id = ?1 ORDER BY account_id ASC",
        )?
        .query_map((import_source_id,), |row| row.get(0))?
        .map(|maybe_id| maybe_id.map_err(Error::from))
        .collect()
}

fn sorted_account_ids(account_ids: &[AccountId]) -> Vec<AccountId> {
    let mut account_ids = account_ids.to_vec();
    account_ids.sort_unstable();
    account_ids.dedup();
    account_ids
}

fn map_write_error(error: rusqlite::Error, name: &str) -> Error {
    if is_unique_violation(&error) {
        Error::DuplicateImportSourceName(name.to_owned())
    } else {
        error.into()
    }
}

fn map_row(row: &Row) -> Result<ImportSource, rusqlite::Error> {
    let config: String = row.get(3)?;
    let config = serde_json::from_str(&config)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(error)))?;

    Ok(ImportSource {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        config,
        account_ids: Vec::new(),
    })
}
