//! Fetching the latest USD based exchange rates from an external API.

use std::{collections::HashMap, time::Duration};

use futures::{FutureExt, future::BoxFuture};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{Error, exchange_rate::Currency};

/// USD to X rates keyed by X.
pub type Rates = HashMap<Currency, Decimal>;

/// A source of the latest USD based exchange rates.
pub trait RateProvider: Send + Sync {
    /// A short name recorded alongside each cached rate.
    fn name(&self) -> &str;

    /// Fetch today's full table of USD to X rates, filtered to the supported currencies.
    fn fetch_usd_rates(&self) -> BoxFuture<'_, Result<Rates, Error>>;
}

/// The response body of the "latest USD rates" call.
#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: String,
    #[serde(default)]
    conversion_rates: HashMap<String, Decimal>,
}

/// A [RateProvider] that calls an ExchangeRate-API compatible HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpRateProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpRateProvider {
    /// Create a provider that fetches from `url`, e.g.
    /// `https://v6.exchangerate-api.com/v6/<key>/latest/USD`.
    ///
    /// Requests that take longer than `timeout` fail.
    ///
    /// # Errors
    /// Returns [Error::RateProviderError] if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::RateProviderError(error.to_string()))?;

        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }

    async fn fetch(&self) -> Result<Rates, Error> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|error| Error::RateProviderError(error.to_string()))?;

        let body: LatestRatesResponse = response
            .json()
            .await
            .map_err(|error| Error::RateProviderError(error.to_string()))?;

        supported_rates(body)
    }
}

impl RateProvider for HttpRateProvider {
    fn name(&self) -> &str {
        "exchangerate-api"
    }

    fn fetch_usd_rates(&self) -> BoxFuture<'_, Result<Rates, Error>> {
        self.fetch().boxed()
    }
}

/// Keep only the rates for supported currencies.
fn supported_rates(response: LatestRatesResponse) -> Result<Rates, Error> {
    if response.result != "success" {
        return Err(Error::RateProviderError(format!(
            "the provider responded with the result \"{}\"",
            response.result
        )));
    }

    Ok(response
        .conversion_rates
        .into_iter()
        .filter_map(|(code, rate)| code.parse::<Currency>().ok().map(|currency| (currency, rate)))
        .collect())
}

#[cfg(test)]
pub(crate) mod test_utils {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::{FutureExt, future::BoxFuture};

    use crate::{
        Error,
        exchange_rate::{RateProvider, Rates},
    };

    /// Returns the same rates on every call and counts the calls.
    pub(crate) struct StaticRateProvider {
        pub rates: Rates,
        pub calls: AtomicUsize,
    }

    impl StaticRateProvider {
        pub(crate) fn new(rates: Rates) -> Self {
            Self {
                rates,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RateProvider for StaticRateProvider {
        fn name(&self) -> &str {
            "static"
        }

        fn fetch_usd_rates(&self) -> BoxFuture<'_, Result<Rates, Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rates = self.rates.clone();
            async move { Ok(rates) }.boxed()
        }
    }

    /// Fails every call, like an unreachable provider.
    pub(crate) struct FailingRateProvider;

    impl RateProvider for FailingRateProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn fetch_usd_rates(&self) -> BoxFuture<'_, Result<Rates, Error>> {
            async { Err(Error::RateProviderError("connection refused".to_owned())) }.boxed()
        }
    }
}
