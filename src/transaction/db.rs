//! Database functions for storing, querying and managing transactions.

use rusqlite::{Connection, Row};

use crate::{
    Error, UserID,
    account::{AccountId, get_account},
    category::get_category,
    csv_import::ImportId,
    database_id::TransactionId,
    db::get_decimal,
    transaction::{
        NewTransaction, Transaction, TransactionUpdate,
        ledger::{merge_update, validate_amount},
    },
};

pub(crate) const TRANSACTION_COLUMNS: &str = "id, user_id, transaction_type, source_account_id, \
     target_account_id, description, amount, category_id, date, import_id";

/// Create the transaction table in the database.
///
/// The table mirrors the account reference rules with a CHECK constraint so
/// that rows written outside of [create_transaction] cannot break them either.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                transaction_type TEXT NOT NULL
                    CHECK (transaction_type IN ('Debit', 'Credit', 'Transfer')),
                source_account_id INTEGER,
                target_account_id INTEGER,
                description TEXT NOT NULL,
                amount TEXT NOT NULL,
                category_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                import_id INTEGER,
                FOREIGN KEY(source_account_id) REFERENCES account(id) ON DELETE CASCADE,
                FOREIGN KEY(target_account_id) REFERENCES account(id) ON DELETE CASCADE,
                FOREIGN KEY(category_id) REFERENCES category(id) ON DELETE RESTRICT,
                FOREIGN KEY(import_id) REFERENCES import(id) ON DELETE CASCADE,
                CHECK (
                    (transaction_type = 'Debit' AND source_account_id IS NOT NULL)
                    OR (transaction_type = 'Credit' AND target_account_id IS NOT NULL)
                    OR (transaction_type = 'Transfer'
                        AND source_account_id IS NOT NULL
                        AND target_account_id IS NOT NULL
                        AND source_account_id <> target_account_id)
                )
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_import ON \"transaction\"(import_id);",
        (),
    )?;

    Ok(())
}

/// Create a new transaction for `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidTransaction] if the account references or amount are invalid,
/// - [Error::NotFound] if a referenced account or the category does not belong to `user_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    user_id: UserID,
    new_transaction: &NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    check_new_transaction(user_id, new_transaction, connection)?;

    connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (user_id, transaction_type, source_account_id,
                target_account_id, description, amount, category_id, date, import_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                user_id,
                new_transaction.kind.transaction_type(),
                new_transaction.kind.source_account_id(),
                new_transaction.kind.target_account_id(),
                new_transaction.description.as_str(),
                new_transaction.amount.to_string(),
                new_transaction.category_id,
                new_transaction.date,
            ),
            map_transaction_row,
        )
        .map_err(Error::from)
}

/// Insert `new_transactions` in order, stamping each with `import_id`.
///
/// Every transaction is checked before anything is written. The inserts are
/// not wrapped in an SQL transaction here: pass a [rusqlite::Transaction] as
/// `connection` to make the batch atomic.
///
/// # Errors
/// Returns the first error found by [create_transaction]'s checks, or an
/// [Error::SqlError] if an insert fails.
pub(crate) fn insert_transactions(
    user_id: UserID,
    new_transactions: &[NewTransaction],
    import_id: Option<ImportId>,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    for new_transaction in new_transactions {
        check_new_transaction(user_id, new_transaction, connection)?;
    }

    let mut statement = connection.prepare(&format!(
        "INSERT INTO \"transaction\" (user_id, transaction_type, source_account_id,
            target_account_id, description, amount, category_id, date, import_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         RETURNING {TRANSACTION_COLUMNS}"
    ))?;

    new_transactions
        .iter()
        .map(|new_transaction| {
            statement
                .query_row(
                    (
                        user_id,
                        new_transaction.kind.transaction_type(),
                        new_transaction.kind.source_account_id(),
                        new_transaction.kind.target_account_id(),
                        new_transaction.description.as_str(),
                        new_transaction.amount.to_string(),
                        new_transaction.category_id,
                        new_transaction.date,
                        import_id,
                    ),
                    map_transaction_row,
                )
                .map_err(Error::from)
        })
        .collect()
}

/// Retrieve a transaction owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by `user_id`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_row((id, user_id), map_transaction_row)
        .map_err(Error::from)
}

/// Retrieve the transactions of `user_id`, most recent first.
///
/// Transactions on the same date are ordered by reverse insertion order. If
/// `account_id` is given, only transactions where it is the source or target
/// account are returned.
pub fn get_transactions(
    user_id: UserID,
    account_id: Option<AccountId>,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE user_id = ?1
                AND (?2 IS NULL OR source_account_id = ?2 OR target_account_id = ?2)
             ORDER BY date DESC, id DESC"
        ))?
        .query_map((user_id, account_id), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Apply a partial update to a transaction owned by `user_id`.
///
/// The fields missing from `update` are filled in from the stored row and
/// the merged transaction is validated as a whole before it is written.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the transaction, or a newly referenced account or
///   category, does not belong to `user_id`,
/// - [Error::InvalidTransaction] if the merged transaction is invalid,
/// - or [Error::SqlError] there is some other SQL error.
pub fn update_transaction(
    id: TransactionId,
    user_id: UserID,
    update: &TransactionUpdate,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let current = get_transaction(id, user_id, connection)?;
    let merged = merge_update(&current, update)?;
    check_new_transaction(user_id, &merged, connection)?;

    connection
        .prepare(&format!(
            "UPDATE \"transaction\"
             SET transaction_type = ?1, source_account_id = ?2, target_account_id = ?3,
                description = ?4, amount = ?5, category_id = ?6, date = ?7
             WHERE id = ?8 AND user_id = ?9
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                merged.kind.transaction_type(),
                merged.kind.source_account_id(),
                merged.kind.target_account_id(),
                merged.description.as_str(),
                merged.amount.to_string(),
                merged.category_id,
                merged.date,
                id,
                user_id,
            ),
            map_transaction_row,
        )
        .map_err(Error::from)
}

/// Delete a transaction owned by `user_id`.
///
/// Any link or computation membership referring to the transaction is
/// deleted with it.
///
/// # Errors
/// Returns [Error::NotFound] if `id` does not refer to a transaction owned by `user_id`.
pub fn delete_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Get the number of transactions owned by `user_id`.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(user_id: UserID, connection: &Connection) -> Result<usize, Error> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(id) FROM \"transaction\" WHERE user_id = ?1",
        (user_id,),
        |row| row.get(0),
    )?;

    Ok(usize::try_from(count).unwrap_or_default())
}

/// Map a database row to a Transaction.
///
/// Expects the columns in the order of [TRANSACTION_COLUMNS].
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        transaction_type: row.get(2)?,
        source_account_id: row.get(3)?,
        target_account_id: row.get(4)?,
        description: row.get(5)?,
        amount: get_decimal(row, 6)?,
        category_id: row.get(7)?,
        date: row.get(8)?,
        import_id: row.get(9)?,
    })
}

/// Check the ledger rules and that every referenced account and the category
/// belong to `user_id`.
fn check_new_transaction(
    user_id: UserID,
    new_transaction: &NewTransaction,
    connection: &Connection,
) -> Result<(), Error> {
    new_transaction.kind.validate()?;
    validate_amount(new_transaction.amount)?;

    for account_id in [
        new_transaction.kind.source_account_id(),
        new_transaction.kind.target_account_id(),
    ]
    .into_iter()
    .flatten()
    {
        get_account(account_id, user_id, connection)?;
    }

    get_category(new_transaction.category_id, user_id, connection)?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use time::macros::date;

    use crate::{
        Error, UserID,
        account::{AccountForm, create_account, delete_account},
        category::{CategoryForm, CategoryName, create_category, delete_category},
        db::initialize,
        exchange_rate::Currency,
        transaction::{
            NewTransaction, TransactionKind, TransactionType, TransactionUpdate,
            count_transactions, create_transaction, delete_transaction, get_transaction,
            get_transactions, update_transaction,
        },
    };

    struct Fixture {
        connection: Connection,
        user_id: UserID,
        checking: i64,
        savings: i64,
        category: i64,
    }

    fn get_fixture() -> Fixture {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user_id = UserID::new(1);

        let checking = create_account(user_id, &account_form("Checking"), &connection)
            .unwrap()
            .id;
        let savings = create_account(user_id, &account_form("Savings"), &connection)
            .unwrap()
            .id;
        let category = create_category(
            user_id,
            &CategoryForm {
                name: CategoryName::new_unchecked("Groceries"),
                default_transaction_type: TransactionType::Debit,
            },
            &connection,
        )
        .unwrap()
        .id;

        Fixture {
            connection,
            user_id,
            checking,
            savings,
            category,
        }
    }

    fn account_form(name: &str) -> AccountForm {
        AccountForm {
            name: name.to_owned(),
            color: "#000000".to_owned(),
            currency: Currency::SGD,
        }
    }

    fn debit(fixture: &Fixture, amount: Decimal) -> NewTransaction {
        NewTransaction {
            kind: TransactionKind::Debit {
                source_account_id: fixture.checking,
            },
            description: "Groceries".to_owned(),
            amount,
            category_id: fixture.category,
            date: date!(2025 - 02 - 14),
        }
    }

    #[test]
    fn create_succeeds() {
        let fixture = get_fixture();
        let amount = Decimal::new(1230, 2);

        let transaction =
            create_transaction(fixture.user_id, &debit(&fixture, amount), &fixture.connection)
                .expect("could not create transaction");

        assert_eq!(transaction.amount, amount);
        assert_eq!(transaction.transaction_type, TransactionType::Debit);
        assert_eq!(transaction.source_account_id, Some(fixture.checking));
        assert_eq!(transaction.target_account_id, None);
        assert_eq!(transaction.import_id, None);
        assert_eq!(
            get_transaction(transaction.id, fixture.user_id, &fixture.connection),
            Ok(transaction)
        );
    }

    #[test]
    fn create_fails_on_same_account_transfer() {
        let fixture = get_fixture();
        let new_transaction = NewTransaction {
            kind: TransactionKind::Transfer {
                source_account_id: fixture.checking,
                target_account_id: fixture.checking,
            },
            ..debit(&fixture, Decimal::ONE)
        };

        let result = create_transaction(fixture.user_id, &new_transaction, &fixture.connection);

        assert!(matches!(result, Err(Error::InvalidTransaction(_))));
        assert_eq!(count_transactions(fixture.user_id, &fixture.connection), Ok(0));
    }

    #[test]
    fn create_fails_on_negative_amount() {
        let fixture = get_fixture();

        let result = create_transaction(
            fixture.user_id,
            &debit(&fixture, Decimal::new(-500, 2)),
            &fixture.connection,
        );

        assert!(matches!(result, Err(Error::InvalidTransaction(_))));
    }

    #[test]
    fn create_fails_on_other_users_account() {
        let fixture = get_fixture();

        let result = create_transaction(
            UserID::new(2),
            &debit(&fixture, Decimal::ONE),
            &fixture.connection,
        );

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn get_fails_for_other_user() {
        let fixture = get_fixture();
        let transaction = create_transaction(
            fixture.user_id,
            &debit(&fixture, Decimal::ONE),
            &fixture.connection,
        )
        .unwrap();

        let result = get_transaction(transaction.id, UserID::new(2), &fixture.connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn get_transactions_orders_by_date_then_id_descending() {
        let fixture = get_fixture();
        let mut older = debit(&fixture, Decimal::ONE);
        older.date = date!(2025 - 01 - 01);
        let first = create_transaction(fixture.user_id, &older, &fixture.connection).unwrap();
        let second = create_transaction(
            fixture.user_id,
            &debit(&fixture, Decimal::TWO),
            &fixture.connection,
        )
        .unwrap();
        let third = create_transaction(
            fixture.user_id,
            &debit(&fixture, Decimal::TEN),
            &fixture.connection,
        )
        .unwrap();

        let ids: Vec<i64> = get_transactions(fixture.user_id, None, &fixture.connection)
            .unwrap()
            .into_iter()
            .map(|transaction| transaction.id)
            .collect();

        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[test]
    fn get_transactions_filters_by_account() {
        let fixture = get_fixture();
        create_transaction(
            fixture.user_id,
            &debit(&fixture, Decimal::ONE),
            &fixture.connection,
        )
        .unwrap();
        let credit = create_transaction(
            fixture.user_id,
            &NewTransaction {
                kind: TransactionKind::Credit {
                    target_account_id: fixture.savings,
                },
                ..debit(&fixture, Decimal::TEN)
            },
            &fixture.connection,
        )
        .unwrap();

        let transactions =
            get_transactions(fixture.user_id, Some(fixture.savings), &fixture.connection).unwrap();

        assert_eq!(transactions, vec![credit]);
    }

    #[test]
    fn update_description_of_transfer_succeeds() {
        let fixture = get_fixture();
        let transfer = create_transaction(
            fixture.user_id,
            &NewTransaction {
                kind: TransactionKind::Transfer {
                    source_account_id: fixture.checking,
                    target_account_id: fixture.savings,
                },
                ..debit(&fixture, Decimal::TEN)
            },
            &fixture.connection,
        )
        .unwrap();

        let updated = update_transaction(
            transfer.id,
            fixture.user_id,
            &TransactionUpdate {
                description: Some("Monthly savings".to_owned()),
                ..Default::default()
            },
            &fixture.connection,
        )
        .expect("could not update transaction");

        assert_eq!(updated.description, "Monthly savings");
        assert_eq!(updated.source_account_id, Some(fixture.checking));
        assert_eq!(updated.target_account_id, Some(fixture.savings));
    }

    #[test]
    fn update_to_same_account_transfer_fails_and_keeps_row() {
        let fixture = get_fixture();
        let original = create_transaction(
            fixture.user_id,
            &debit(&fixture, Decimal::ONE),
            &fixture.connection,
        )
        .unwrap();

        let result = update_transaction(
            original.id,
            fixture.user_id,
            &TransactionUpdate {
                transaction_type: Some(TransactionType::Transfer),
                target_account_id: Some(fixture.checking),
                ..Default::default()
            },
            &fixture.connection,
        );

        assert!(matches!(result, Err(Error::InvalidTransaction(_))));
        assert_eq!(
            get_transaction(original.id, fixture.user_id, &fixture.connection),
            Ok(original)
        );
    }

    #[test]
    fn delete_removes_transaction() {
        let fixture = get_fixture();
        let transaction = create_transaction(
            fixture.user_id,
            &debit(&fixture, Decimal::ONE),
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(
            delete_transaction(transaction.id, UserID::new(2), &fixture.connection),
            Err(Error::NotFound)
        );
        assert_eq!(
            delete_transaction(transaction.id, fixture.user_id, &fixture.connection),
            Ok(())
        );
        assert_eq!(
            get_transaction(transaction.id, fixture.user_id, &fixture.connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn deleting_account_deletes_its_transactions() {
        let fixture = get_fixture();
        create_transaction(
            fixture.user_id,
            &debit(&fixture, Decimal::ONE),
            &fixture.connection,
        )
        .unwrap();

        delete_account(fixture.checking, fixture.user_id, &fixture.connection).unwrap();

        assert_eq!(count_transactions(fixture.user_id, &fixture.connection), Ok(0));
    }

    #[test]
    fn category_in_use_cannot_be_deleted() {
        let fixture = get_fixture();
        create_transaction(
            fixture.user_id,
            &debit(&fixture, Decimal::ONE),
            &fixture.connection,
        )
        .unwrap();

        let result = delete_category(fixture.category, fixture.user_id, &fixture.connection);

        assert_eq!(result, Err(Error::CategoryInUse));
    }
}
