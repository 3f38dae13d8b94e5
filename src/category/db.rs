//! Database operations for categories.

use rusqlite::{Connection, Row};

use crate::{
    Error, UserID,
    category::{Category, CategoryForm, CategoryId, CategoryName},
    is_foreign_key_violation, is_unique_violation,
};

/// Create a category and return it with its generated ID.
///
/// # Errors
/// Returns [Error::DuplicateCategoryName] if the user already has a category with the same name.
pub fn create_category(
    user_id: UserID,
    form: &CategoryForm,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .execute(
            "INSERT INTO category (user_id, name, default_transaction_type) VALUES (?1, ?2, ?3)",
            (user_id, form.name.as_ref(), form.default_transaction_type),
        )
        .map_err(|error| map_write_error(error, &form.name))?;

    let id = connection.last_insert_rowid();

    Ok(Category {
        id,
        user_id,
        name: form.name.clone(),
        default_transaction_type: form.default_transaction_type,
    })
}

/// Retrieve a single category owned by `user_id`.
pub fn get_category(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, default_transaction_type FROM category
             WHERE id = ?1 AND user_id = ?2",
        )?
        .query_row((category_id, user_id), map_row)
        .map_err(|error| error.into())
}

/// Retrieve all of the user's categories ordered alphabetically by name.
pub fn get_categories(user_id: UserID, connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, default_transaction_type FROM category
             WHERE user_id = ?1 ORDER BY name ASC",
        )?
        .query_map((user_id,), map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Update a category's name and default type. Returns an error if the category doesn't exist.
pub fn update_category(
    category_id: CategoryId,
    user_id: UserID,
    form: &CategoryForm,
    connection: &Connection,
) -> Result<Category, Error> {
    let rows_affected = connection
        .execute(
            "UPDATE category SET name = ?1, default_transaction_type = ?2
             WHERE id = ?3 AND user_id = ?4",
            (
                form.name.as_ref(),
                form.default_transaction_type,
                category_id,
                user_id,
            ),
        )
        .map_err(|error| map_write_error(error, &form.name))?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    get_category(category_id, user_id, connection)
}

/// Delete a category by ID.
///
/// # Errors
/// Returns an:
/// - [Error::NotFound] if the category doesn't exist,
/// - or [Error::CategoryInUse] if transactions still use the category.
pub fn delete_category(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    get_category(category_id, user_id, connection)?;

    let in_use: bool = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM \"transaction\" WHERE category_id = ?1)",
        (category_id,),
        |row| row.get(0),
    )?;

    if in_use {
        return Err(Error::CategoryInUse);
    }

    let rows_affected = connection
        .execute(
            "DELETE FROM category WHERE id = ?1 AND user_id = ?2",
            (category_id, user_id),
        )
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                Error::CategoryInUse
            } else {
                error.into()
            }
        })?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Initialize the category table and indexes.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            default_transaction_type TEXT NOT NULL,
            UNIQUE(user_id, name)
        );

        CREATE INDEX IF NOT EXISTS idx_category_user ON category(user_id);",
    )?;

    Ok(())
}

fn map_write_error(error: rusqlite::Error, name: &CategoryName) -> Error {
    if is_unique_violation(&error) {
        Error::DuplicateCategoryName(name.to_string())
    } else {
        error.into()
    }
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let raw_name: String = row.get(2)?;

    Ok(Category {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: CategoryName::new_unchecked(&raw_name),
        default_transaction_type: row.get(3)?,
    })
}
