//! Draft imports: parse a CSV file, review the candidate transactions, then
//! commit them all at once.

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    Error, UserID,
    account::{AccountId, get_account},
    category::{CategoryId, get_categories},
    csv_import::csv::{CandidateTransaction, parse_candidates},
    database_id::DatabaseId,
    import_source::{ImportSourceId, get_import_source},
    transaction::{NewTransaction, TransactionKind, insert_transactions, validate_amount},
};

/// Database identifier for an import.
pub type ImportId = DatabaseId;

/// Maps the temporary ID of each candidate to its category, `None` while unmapped.
pub type CategoryMap = BTreeMap<Uuid, Option<CategoryId>>;

/// Where an import is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    /// The candidates are still being reviewed.
    Draft,
    /// The candidates have been turned into transactions.
    Completed,
}

impl ImportStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Draft => "draft",
            ImportStatus::Completed => "completed",
        }
    }
}

impl ToSql for ImportStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ImportStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "draft" => Ok(ImportStatus::Draft),
            "completed" => Ok(ImportStatus::Completed),
            other => Err(FromSqlError::Other(
                format!("invalid import status \"{other}\"").into(),
            )),
        }
    }
}

/// The working set of a draft import.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImportPreview {
    /// The transactions that will be created, in file order.
    pub candidates: Vec<CandidateTransaction>,
    /// The category chosen for each candidate.
    #[serde(default)]
    pub category_map: CategoryMap,
}

/// One CSV upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Import {
    /// The ID of the import.
    pub id: ImportId,
    /// The user that owns the import.
    pub user_id: UserID,
    /// The name of the uploaded file.
    pub filename: String,
    /// The import source the file was parsed with, `None` if it has since been deleted.
    pub import_source_id: Option<ImportSourceId>,
    /// The account candidates are assigned to.
    pub default_account_id: AccountId,
    /// Whether the import is a draft or completed.
    pub status: ImportStatus,
    /// The candidates and their categories.
    pub preview: ImportPreview,
    /// The number of candidates found when the file was parsed.
    pub total_rows: usize,
    /// The number of transactions created on completion.
    pub imported_rows: usize,
    /// When the file was parsed.
    pub created_at: OffsetDateTime,
    /// When the import was completed.
    pub completed_at: Option<OffsetDateTime>,
}

const IMPORT_COLUMNS: &str = "id, user_id, filename, import_source_id, default_account_id, \
    status, preview, total_rows, imported_rows, created_at, completed_at";

/// Create the import table.
///
/// Transactions reference this table so that deleting an import also deletes
/// the transactions it created.
pub fn create_import_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS import (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            filename TEXT NOT NULL,
            import_source_id INTEGER,
            default_account_id INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('draft', 'completed')),
            preview TEXT NOT NULL,
            total_rows INTEGER NOT NULL,
            imported_rows INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            completed_at TEXT,
            FOREIGN KEY(import_source_id) REFERENCES import_source(id) ON DELETE SET NULL,
            FOREIGN KEY(default_account_id) REFERENCES account(id) ON DELETE CASCADE
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_import_user ON import(user_id);",
        (),
    )?;

    Ok(())
}

/// Parse `text` with the config of import source `import_source_id` and save
/// the candidates as a new draft import.
///
/// Every candidate starts without a category. A file that yields no
/// candidates still creates an (empty) draft.
///
/// # Errors
/// Returns an:
/// - [Error::NotFound] if the import source or default account does not belong to `user_id`,
/// - [Error::InvalidCSV] or [Error::InvalidImportConfig] if the file cannot be parsed,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn start_import(
    user_id: UserID,
    filename: &str,
    text: &str,
    import_source_id: ImportSourceId,
    default_account_id: AccountId,
    connection: &Connection,
) -> Result<Import, Error> {
    let import_source = get_import_source(import_source_id, user_id, connection)?;
    get_account(default_account_id, user_id, connection)?;

    let candidates = parse_candidates(text, &import_source.config, default_account_id)?;
    let category_map = candidates
        .iter()
        .map(|candidate| (candidate.temp_id, None))
        .collect();
    let total_rows = candidates.len();
    let preview = ImportPreview {
        candidates,
        category_map,
    };

    let import = connection
        .prepare(&format!(
            "INSERT INTO import (user_id, filename, import_source_id, default_account_id, status,
                preview, total_rows, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             RETURNING {IMPORT_COLUMNS}"
        ))?
        .query_row(
            (
                user_id,
                filename,
                import_source_id,
                default_account_id,
                ImportStatus::Draft,
                serde_json::to_string(&preview)?,
                total_rows as i64,
                OffsetDateTime::now_utc(),
            ),
            map_import_row,
        )?;

    tracing::info!(
        "Started import {} of \"{filename}\" with {total_rows} candidates",
        import.id
    );

    Ok(import)
}

/// Replace the working set of a draft import with `preview`.
///
/// # Errors
/// Returns an:
/// - [Error::NotFound] if the import does not belong to `user_id`,
/// - [Error::ImportAlreadyCompleted] if the import is not a draft,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn save_draft(
    import_id: ImportId,
    user_id: UserID,
    preview: &ImportPreview,
    connection: &Connection,
) -> Result<Import, Error> {
    let import = get_import(import_id, user_id, connection)?;

    if import.status != ImportStatus::Draft {
        return Err(Error::ImportAlreadyCompleted);
    }

    connection.execute(
        "UPDATE import SET preview = ?1 WHERE id = ?2 AND user_id = ?3",
        (serde_json::to_string(preview)?, import_id, user_id),
    )?;

    get_import(import_id, user_id, connection)
}

/// Turn every candidate of a draft import into a transaction.
///
/// `category_map` must give one of the caller's categories to every
/// candidate. A category ID of zero or less counts as unmapped. All
/// candidates are checked before anything is written, and the transactions are inserted in
/// candidate order together with the status change in one SQL transaction.
///
/// # Errors
/// Returns an:
/// - [Error::NotFound] if the import, or a referenced account, does not belong to `user_id`,
/// - [Error::ImportAlreadyCompleted] if the import is not a draft,
/// - [Error::IncompleteImport] listing every candidate without a known category or with invalid accounts,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn complete_import(
    import_id: ImportId,
    user_id: UserID,
    category_map: &CategoryMap,
    connection: &Connection,
) -> Result<Import, Error> {
    let import = get_import(import_id, user_id, connection)?;

    if import.status != ImportStatus::Draft {
        return Err(Error::ImportAlreadyCompleted);
    }

    let categories: BTreeSet<CategoryId> = get_categories(user_id, connection)?
        .into_iter()
        .map(|category| category.id)
        .collect();

    let new_transactions =
        resolve_candidates(&import.preview.candidates, category_map, &categories)?;

    let transaction = connection.unchecked_transaction()?;

    let inserted = insert_transactions(user_id, &new_transactions, Some(import_id), &transaction)?;

    let preview = ImportPreview {
        candidates: import.preview.candidates,
        category_map: category_map.clone(),
    };

    transaction.execute(
        "UPDATE import SET status = ?1, imported_rows = ?2, completed_at = ?3, preview = ?4
         WHERE id = ?5 AND user_id = ?6",
        (
            ImportStatus::Completed,
            inserted.len() as i64,
            OffsetDateTime::now_utc(),
            serde_json::to_string(&preview)?,
            import_id,
            user_id,
        ),
    )?;

    transaction.commit()?;

    tracing::info!(
        "Completed import {import_id} with {} transactions",
        inserted.len()
    );

    get_import(import_id, user_id, connection)
}

/// Build the transactions for `candidates`, collecting one message per
/// candidate that cannot be committed.
fn resolve_candidates(
    candidates: &[CandidateTransaction],
    category_map: &CategoryMap,
    categories: &BTreeSet<CategoryId>,
) -> Result<Vec<NewTransaction>, Error> {
    let mut errors = Vec::new();
    let mut new_transactions = Vec::with_capacity(candidates.len());

    for (index, candidate) in candidates.iter().enumerate() {
        let row = format!(
            "Row {} ({}, \"{}\", {})",
            index + 1,
            candidate.date,
            candidate.description,
            candidate.amount
        );

        let category_id = match category_map.get(&candidate.temp_id).copied().flatten() {
            Some(category_id) if categories.contains(&category_id) => Some(category_id),
            Some(category_id) if category_id > 0 => {
                errors.push(format!("{row}: category {category_id} does not exist"));
                None
            }
            _ => {
                errors.push(format!("{row}: no category selected"));
                None
            }
        };

        let kind = TransactionKind::new(
            candidate.transaction_type,
            candidate.source_account_id,
            candidate.target_account_id,
        )
        .inspect_err(|error| errors.push(format!("{row}: {error}")));

        if let Err(error) = validate_amount(candidate.amount) {
            errors.push(format!("{row}: {error}"));
        }

        if let (Some(category_id), Ok(kind)) = (category_id, kind) {
            new_transactions.push(NewTransaction {
                kind,
                description: candidate.description.clone(),
                amount: candidate.amount,
                category_id,
                date: candidate.date,
            });
        }
    }

    if errors.is_empty() {
        Ok(new_transactions)
    } else {
        Err(Error::IncompleteImport(errors))
    }
}

/// Retrieve an import owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if `import_id` does not refer to an import owned by `user_id`.
pub fn get_import(
    import_id: ImportId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Import, Error> {
    connection
        .prepare(&format!(
            "SELECT {IMPORT_COLUMNS} FROM import WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_row((import_id, user_id), map_import_row)
        .map_err(Error::from)
}

/// Retrieve the imports of `user_id`, newest first.
pub fn get_imports(user_id: UserID, connection: &Connection) -> Result<Vec<Import>, Error> {
    connection
        .prepare(&format!(
            "SELECT {IMPORT_COLUMNS} FROM import WHERE user_id = ?1 ORDER BY id DESC"
        ))?
        .query_map([user_id], map_import_row)?
        .map(|maybe_import| maybe_import.map_err(Error::from))
        .collect()
}

/// Delete an import owned by `user_id` and every transaction it created.
///
/// # Errors
/// Returns [Error::NotFound] if `import_id` does not refer to an import owned by `user_id`.
pub fn delete_import(
    import_id: ImportId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM import WHERE id = ?1 AND user_id = ?2",
        (import_id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    tracing::info!("Deleted import {import_id}");

    Ok(())
}

fn map_import_row(row: &Row) -> Result<Import, rusqlite::Error> {
    let preview_text: String = row.get(6)?;
    let preview = serde_json::from_str(&preview_text)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(error)))?;

    Ok(Import {
        id: row.get(0)?,
        user_id: row.get(1)?,
        filename: row.get(2)?,
        import_source_id: row.get(3)?,
        default_account_id: row.get(4)?,
        status: row.get(5)?,
        preview,
        total_rows: row.get::<_, i64>(7)? as usize,
        imported_rows: row.get::<_, i64>(8)? as usize,
        created_at: row.get(9)?,
        completed_at: row.get(10)?,
    })
}
