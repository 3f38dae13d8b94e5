//! The exchange rate cache and converter.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;

use crate::{
    Error,
    exchange_rate::{
        Clock, Currency, ExchangeRate, RateProvider,
        db::{count_rates_on, derive_rate, get_latest_rate_date, upsert_rate},
    },
};

/// The result of converting an amount for display.
///
/// Conversion never fails from the caller's point of view: when no rate is
/// available the original amount is passed through and `conversion_failed`
/// is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvertedAmount {
    /// The amount before conversion.
    pub original_amount: Decimal,
    /// The currency of `original_amount`.
    pub original_currency: Currency,
    /// The amount in `display_currency`, or `original_amount` if conversion
    /// was not needed or failed.
    pub converted_amount: Decimal,
    /// The currency the caller asked to display amounts in.
    pub display_currency: Currency,
    /// Whether a rate was applied to the amount.
    pub conversion_applied: bool,
    /// The date of the rate that was applied.
    pub rate_date: Option<Date>,
    /// Whether a conversion was needed but no rate could be found.
    pub conversion_failed: bool,
}

/// Converts amounts between currencies using cached USD based rates.
///
/// Missing rates for today are fetched from the [RateProvider] on demand.
/// Rates for past dates are never fetched or rewritten.
#[derive(Clone)]
pub struct ExchangeRates {
    db_connection: Arc<Mutex<Connection>>,
    provider: Arc<dyn RateProvider>,
    clock: Arc<dyn Clock>,
}

impl ExchangeRates {
    /// Create a converter that caches rates in `db_connection`.
    pub fn new(
        db_connection: Arc<Mutex<Connection>>,
        provider: Arc<dyn RateProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db_connection,
            provider,
            clock,
        }
    }

    /// Today's date according to the converter's clock.
    pub fn today(&self) -> Date {
        self.clock.today()
    }

    /// Get the rate that converts one unit of `from` into `to` on `date`.
    ///
    /// If the rate is missing and `date` is today, today's rates are fetched
    /// (only if none are cached yet) and the lookup is retried once.
    ///
    /// # Errors
    /// Returns:
    /// - [Error::RateNotFound] if no rate could be found for the pair and date,
    /// - [Error::ZeroRate] if the cached divisor rate is zero,
    /// - or [Error::SqlError]/[Error::DatabaseLockError] on database failures.
    pub async fn get_rate(&self, from: Currency, to: Currency, date: Date) -> Result<Decimal, Error> {
        if from == to {
            return Ok(Decimal::ONE);
        }

        if let Some(rate) = self.lookup_rate(from, to, date)? {
            return Ok(rate);
        }

        if date == self.clock.today() {
            if let Err(error) = self.ensure_today_rates().await {
                tracing::warn!("Could not fetch today's exchange rates: {error}");
            }

            if let Some(rate) = self.lookup_rate(from, to, date)? {
                return Ok(rate);
            }
        }

        Err(Error::RateNotFound { from, to, date })
    }

    /// Get today's rate, falling back to the most recent cached date if
    /// today's rate cannot be found.
    ///
    /// Returns the rate and the date it was taken from.
    pub async fn get_current_rate(
        &self,
        from: Currency,
        to: Currency,
    ) -> Result<(Decimal, Date), Error> {
        let today = self.clock.today();

        match self.get_rate(from, to, today).await {
            Ok(rate) => Ok((rate, today)),
            Err(error) => {
                let latest_date = {
                    let connection = self.lock()?;
                    get_latest_rate_date(&connection)?
                };

                match latest_date {
                    Some(latest_date) if latest_date != today => {
                        tracing::debug!(
                            "No {from} to {to} rate for {today}, falling back to {latest_date}"
                        );
                        let rate = self.get_rate(from, to, latest_date).await?;
                        Ok((rate, latest_date))
                    }
                    _ => Err(error),
                }
            }
        }
    }

    /// Convert `amount` of `from` into `to` using the rate on `date`, or today
    /// if `date` is `None`.
    pub async fn convert_amount(
        &self,
        amount: Decimal,
        from: Currency,
        to: Currency,
        date: Option<Date>,
    ) -> Result<Decimal, Error> {
        let date = date.unwrap_or_else(|| self.clock.today());
        let rate = self.get_rate(from, to, date).await?;

        amount.checked_mul(rate).ok_or(Error::AmountOverflow)
    }

    /// Convert `amount` of `from` into `to` at today's rate for display.
    ///
    /// Never fails: if no rate is available the original amount is returned
    /// with `conversion_failed` set.
    pub async fn convert_amount_with_metadata(
        &self,
        amount: Decimal,
        from: Currency,
        to: Currency,
    ) -> ConvertedAmount {
        let unconverted = ConvertedAmount {
            original_amount: amount,
            original_currency: from,
            converted_amount: amount,
            display_currency: to,
            conversion_applied: false,
            rate_date: None,
            conversion_failed: false,
        };

        if from == to {
            return unconverted;
        }

        let today = self.clock.today();

        match self.convert_amount(amount, from, to, Some(today)).await {
            Ok(converted_amount) => ConvertedAmount {
                converted_amount,
                conversion_applied: true,
                rate_date: Some(today),
                ..unconverted
            },
            Err(error) => {
                tracing::warn!("Could not convert {amount} {from} to {to}: {error}");
                ConvertedAmount {
                    conversion_failed: true,
                    ..unconverted
                }
            }
        }
    }

    /// Fetch and cache today's rates if no rate is cached for today.
    ///
    /// Returns the number of rates written, zero if today was already cached.
    pub async fn ensure_today_rates(&self) -> Result<usize, Error> {
        let today = self.clock.today();

        let cached = {
            let connection = self.lock()?;
            count_rates_on(today, &connection)?
        };

        if cached > 0 {
            return Ok(0);
        }

        self.refresh_today_rates().await
    }

    /// Fetch today's rates and cache them, replacing any already cached for today.
    ///
    /// Returns the number of rates written.
    ///
    /// # Errors
    /// Returns [Error::RateProviderError] if the provider call fails.
    pub async fn refresh_today_rates(&self) -> Result<usize, Error> {
        let today = self.clock.today();
        tracing::debug!("Fetching exchange rates for {today} from {}", self.provider.name());

        let rates = self.provider.fetch_usd_rates().await?;

        let connection = self.lock()?;
        let transaction = connection.unchecked_transaction()?;

        for (currency, rate) in &rates {
            upsert_rate(
                &ExchangeRate {
                    currency: *currency,
                    date: today,
                    rate: *rate,
                    source: self.provider.name().to_owned(),
                },
                &transaction,
            )?;
        }

        transaction.commit()?;
        tracing::info!("Cached {} exchange rates for {today}", rates.len());

        Ok(rates.len())
    }

    /// Get every cached rate for `date`.
    pub fn get_rates_on(&self, date: Date) -> Result<Vec<ExchangeRate>, Error> {
        let connection = self.lock()?;
        crate::exchange_rate::db::get_rates_on(date, &connection)
    }

    fn lookup_rate(&self, from: Currency, to: Currency, date: Date) -> Result<Option<Decimal>, Error> {
        let connection = self.lock()?;
        derive_rate(from, to, date, &connection)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.db_connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }
}
