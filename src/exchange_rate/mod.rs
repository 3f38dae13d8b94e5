//! Currency conversion backed by a date-indexed cache of USD based exchange rates.
//!
//! Every cached rate is expressed as USD to X. Rates between two non-USD
//! currencies are derived on read by pivoting through USD.

mod clock;
mod currency;
mod db;
mod endpoints;
mod provider;
mod service;

pub use clock::{Clock, SystemClock};
pub use currency::Currency;
pub use db::{ExchangeRate, create_exchange_rate_table};
pub use endpoints::{convert_amount_endpoint, get_exchange_rates_endpoint, refresh_rates_endpoint};
pub use provider::{HttpRateProvider, RateProvider, Rates};
pub use service::{ConvertedAmount, ExchangeRates};

#[cfg(test)]
pub(crate) use clock::FixedClock;
#[cfg(test)]
pub(crate) use provider::test_utils::{FailingRateProvider, StaticRateProvider};
