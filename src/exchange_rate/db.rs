//! Database operations for cached exchange rates.

use rusqlite::{Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;

use crate::{Error, db::get_decimal, exchange_rate::Currency};

/// A cached USD to `currency` rate for a single day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeRate {
    /// The currency that one US dollar is converted into.
    pub currency: Currency,
    /// The day the rate applies to.
    pub date: Date,
    /// How many units of `currency` one US dollar buys.
    pub rate: Decimal,
    /// The name of the provider the rate came from.
    pub source: String,
}

/// Create the exchange rate table.
///
/// Rates are keyed by (currency, date) so that re-fetching a day replaces
/// rather than duplicates its rates.
pub fn create_exchange_rate_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS exchange_rate (
            currency TEXT NOT NULL,
            date TEXT NOT NULL,
            rate TEXT NOT NULL,
            source TEXT NOT NULL,
            PRIMARY KEY(currency, date)
        );

        CREATE INDEX IF NOT EXISTS idx_exchange_rate_date ON exchange_rate(date);",
    )?;

    Ok(())
}

/// Insert a rate, replacing the rate and source of an existing (currency, date) entry.
pub fn upsert_rate(rate: &ExchangeRate, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO exchange_rate (currency, date, rate, source) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(currency, date) DO UPDATE SET rate = excluded.rate, source = excluded.source",
        (
            rate.currency,
            rate.date,
            rate.rate.to_string(),
            rate.source.as_str(),
        ),
    )?;

    Ok(())
}

/// Get the cached USD to `currency` rate for `date`, if there is one.
pub fn get_cached_rate(
    currency: Currency,
    date: Date,
    connection: &Connection,
) -> Result<Option<Decimal>, Error> {
    connection
        .prepare("SELECT rate FROM exchange_rate WHERE currency = ?1 AND date = ?2")?
        .query_row((currency, date), |row| get_decimal(row, 0))
        .optional()
        .map_err(Error::from)
}

/// Count the rates cached for `date` across all currencies.
pub fn count_rates_on(date: Date, connection: &Connection) -> Result<usize, Error> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM exchange_rate WHERE date = ?1",
        (date,),
        |row| row.get(0),
    )?;

    Ok(usize::try_from(count).unwrap_or_default())
}

/// The most recent date that has any cached rate.
pub fn get_latest_rate_date(connection: &Connection) -> Result<Option<Date>, Error> {
    connection
        .query_row("SELECT MAX(date) FROM exchange_rate", [], |row| row.get(0))
        .map_err(Error::from)
}

/// Get every rate cached for `date`, ordered by currency code.
pub fn get_rates_on(date: Date, connection: &Connection) -> Result<Vec<ExchangeRate>, Error> {
    connection
        .prepare(
            "SELECT currency, date, rate, source FROM exchange_rate
             WHERE date = ?1 ORDER BY currency ASC",
        )?
        .query_map((date,), map_row)?
        .map(|maybe_rate| maybe_rate.map_err(Error::from))
        .collect()
}

/// Derive the `from` to `to` rate for `date` from the cached USD based rates.
///
/// Returns `Ok(None)` if a rate needed for the derivation is not cached.
///
/// # Errors
/// Returns an:
/// - [Error::ZeroRate] if the rate that would be used as a divisor is zero,
/// - or [Error::AmountOverflow] if the derived rate does not fit in a decimal.
pub fn derive_rate(
    from: Currency,
    to: Currency,
    date: Date,
    connection: &Connection,
) -> Result<Option<Decimal>, Error> {
    if from == to {
        return Ok(Some(Decimal::ONE));
    }

    if from == Currency::USD {
        return get_cached_rate(to, date, connection);
    }

    let Some(from_rate) = get_cached_rate(from, date, connection)? else {
        return Ok(None);
    };

    if from_rate.is_zero() {
        return Err(Error::ZeroRate(from, date));
    }

    if to == Currency::USD {
        return Decimal::ONE
            .checked_div(from_rate)
            .map(Some)
            .ok_or(Error::AmountOverflow);
    }

    get_cached_rate(to, date, connection)?
        .map(|to_rate| to_rate.checked_div(from_rate).ok_or(Error::AmountOverflow))
        .transpose()
}

fn map_row(row: &Row) -> Result<ExchangeRate, rusqlite::Error> {
    Ok(ExchangeRate {
        currency: row.get(0)?,
        date: row.get(1)?,
        rate: get_decimal(row, 2)?,
        source: row.get(3)?,
    })
}
