//! Caller identity and per-user settings.

use std::{
    fmt::Display,
    sync::{Arc, Mutex},
};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::{AppState, Error, db::lock_connection, exchange_rate::Currency};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl rusqlite::ToSql for UserID {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl rusqlite::types::FromSql for UserID {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        i64::column_result(value).map(UserID)
    }
}

/// Create the table holding per-user settings.
pub fn create_user_settings_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user_settings (
            user_id INTEGER PRIMARY KEY,
            display_currency TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Get the currency the user wants amounts displayed in, USD if never set.
pub fn get_display_currency(user_id: UserID, connection: &Connection) -> Result<Currency, Error> {
    let currency = connection
        .query_row(
            "SELECT display_currency FROM user_settings WHERE user_id = ?1",
            (user_id,),
            |row| row.get(0),
        )
        .optional()?;

    Ok(currency.unwrap_or_default())
}

/// Set the currency the user wants amounts displayed in.
pub fn set_display_currency(
    user_id: UserID,
    currency: Currency,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO user_settings (user_id, display_currency) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET display_currency = excluded.display_currency",
        (user_id, currency),
    )?;

    Ok(())
}

/// The state needed to read and write user settings.
#[derive(Debug, Clone)]
pub struct UserSettingsState {
    /// The database connection for managing settings.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for UserSettingsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The body of display currency requests and responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct DisplayCurrencyBody {
    /// The currency code, e.g. "SGD".
    pub currency: Currency,
}

/// A route handler for getting the caller's display currency.
pub async fn get_display_currency_endpoint(
    State(state): State<UserSettingsState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let connection = match lock_connection(&state.db_connection) {
        Ok(connection) => connection,
        Err(error) => return error.into_response(),
    };

    get_display_currency(user_id, &connection)
        .map(|currency| Json(DisplayCurrencyBody { currency }))
        .into_response()
}

/// A route handler for setting the caller's display currency.
pub async fn set_display_currency_endpoint(
    State(state): State<UserSettingsState>,
    Extension(user_id): Extension<UserID>,
    Json(body): Json<DisplayCurrencyBody>,
) -> Response {
    let connection = match lock_connection(&state.db_connection) {
        Ok(connection) => connection,
        Err(error) => return error.into_response(),
    };

    set_display_currency(user_id, body.currency, &connection)
        .map(|_| Json(body))
        .into_response()
}

#[cfg(test)]
mod display_currency_tests {
    use rusqlite::Connection;

    use crate::{
        UserID,
        db::initialize,
        exchange_rate::Currency,
        user::{get_display_currency, set_display_currency},
    };

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    #[test]
    fn defaults_to_usd() {
        let connection = get_test_connection();

        assert_eq!(
            get_display_currency(UserID::new(1), &connection),
            Ok(Currency::USD)
        );
    }

    #[test]
    fn set_overwrites_previous_value() {
        let connection = get_test_connection();
        let user_id = UserID::new(1);

        set_display_currency(user_id, Currency::SGD, &connection).unwrap();
        set_display_currency(user_id, Currency::EUR, &connection).unwrap();

        assert_eq!(get_display_currency(user_id, &connection), Ok(Currency::EUR));
        assert_eq!(
            get_display_currency(UserID::new(2), &connection),
            Ok(Currency::USD)
        );
    }
}
