//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{
    Error,
    db::initialize,
    exchange_rate::{Clock, ExchangeRates, RateProvider},
};

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,

    /// The exchange rate cache and converter, sharing `db_connection`.
    pub exchange_rates: ExchangeRates,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `rate_provider` is called to fill in missing rates for today, and
    /// `clock` decides what "today" is.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        rate_provider: Arc<dyn RateProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        let connection = Arc::new(Mutex::new(db_connection));

        Ok(Self {
            exchange_rates: ExchangeRates::new(connection.clone(), rate_provider, clock),
            db_connection: connection,
        })
    }
}
