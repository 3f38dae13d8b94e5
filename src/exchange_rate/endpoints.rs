//! Route handlers for converting amounts and managing the rate cache.

use axum::{
    Json,
    extract::{FromRef, Query, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    AppState, Error,
    exchange_rate::{Currency, ExchangeRate, ExchangeRates},
};

/// The state needed for currency conversion.
#[derive(Clone)]
pub struct ExchangeRateState {
    /// The exchange rate cache and converter.
    pub exchange_rates: ExchangeRates,
}

impl FromRef<AppState> for ExchangeRateState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            exchange_rates: state.exchange_rates.clone(),
        }
    }
}

/// The query parameters for a conversion.
#[derive(Debug, Deserialize)]
pub struct ConvertQuery {
    /// The amount to convert.
    pub amount: Decimal,
    /// The currency code of `amount`.
    pub from: String,
    /// The currency code to convert into.
    pub to: String,
    /// The date of the rate to use.
    ///
    /// If not given, today's rate is used, or the most recent cached rate if
    /// today's cannot be found.
    pub date: Option<Date>,
}

/// The result of a conversion.
#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    /// The amount that was converted.
    pub amount: Decimal,
    /// The currency of `amount`.
    pub from: Currency,
    /// The currency of `converted_amount`.
    pub to: Currency,
    /// The date of the rate that was used.
    pub date: Date,
    /// The rate that was applied.
    pub rate: Decimal,
    /// The amount in `to`.
    pub converted_amount: Decimal,
}

/// The query parameters for listing cached rates.
#[derive(Debug, Deserialize)]
pub struct RatesQuery {
    /// The day to list the rates of, today if not given.
    pub date: Option<Date>,
}

/// The result of refreshing today's rates.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// The day the rates were cached for.
    pub date: Date,
    /// The number of rates written.
    pub rates_cached: usize,
}

/// A route handler for converting an amount between two currencies.
///
/// Unlike converted listings, a missing rate is an error here. A request
/// without a date falls back to the latest cached rates.
pub async fn convert_amount_endpoint(
    State(state): State<ExchangeRateState>,
    Query(query): Query<ConvertQuery>,
) -> Result<Json<ConvertResponse>, Error> {
    let from: Currency = query.from.parse()?;
    let to: Currency = query.to.parse()?;
    let (rate, date) = match query.date {
        Some(date) => (state.exchange_rates.get_rate(from, to, date).await?, date),
        None => state.exchange_rates.get_current_rate(from, to).await?,
    };

    let converted_amount = query
        .amount
        .checked_mul(rate)
        .ok_or(Error::AmountOverflow)?;

    Ok(Json(ConvertResponse {
        amount: query.amount,
        from,
        to,
        date,
        rate,
        converted_amount,
    }))
}

/// A route handler for listing the cached rates of a day.
pub async fn get_exchange_rates_endpoint(
    State(state): State<ExchangeRateState>,
    Query(query): Query<RatesQuery>,
) -> Result<Json<Vec<ExchangeRate>>, Error> {
    let date = query.date.unwrap_or_else(|| state.exchange_rates.today());

    state.exchange_rates.get_rates_on(date).map(Json)
}

/// A route handler for fetching and caching today's rates.
///
/// Provider failures are returned to the caller rather than hidden.
pub async fn refresh_rates_endpoint(
    State(state): State<ExchangeRateState>,
) -> Result<Json<RefreshResponse>, Error> {
    let rates_cached = state
        .exchange_rates
        .refresh_today_rates()
        .await
        .inspect_err(|error| tracing::warn!("Could not refresh exchange rates: {error}"))?;

    Ok(Json(RefreshResponse {
        date: state.exchange_rates.today(),
        rates_cached,
    }))
}
