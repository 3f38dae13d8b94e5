use std::{fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::Error;

/// The closed set of currencies that accounts may hold and amounts may be
/// displayed in.
#[allow(clippy::upper_case_acronyms)]
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Currency {
    /// United States dollar, the pivot currency for all cached rates.
    #[default]
    USD,
    /// Euro.
    EUR,
    /// Pound sterling.
    GBP,
    /// Singapore dollar.
    SGD,
    /// Japanese yen.
    JPY,
}

impl Currency {
    /// Every supported currency.
    pub const ALL: [Currency; 5] = [
        Currency::USD,
        Currency::EUR,
        Currency::GBP,
        Currency::SGD,
        Currency::JPY,
    ];

    /// The ISO 4217 code, e.g. "USD".
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::SGD => "SGD",
            Currency::JPY => "JPY",
        }
    }
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();

        Currency::ALL
            .into_iter()
            .find(|currency| currency.code() == code)
            .ok_or_else(|| Error::UnsupportedCurrency(s.to_owned()))
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl ToSql for Currency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for Currency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, exchange_rate::Currency};

    #[test]
    fn parses_codes_case_insensitively() {
        assert_eq!("sgd".parse::<Currency>(), Ok(Currency::SGD));
        assert_eq!(" EUR ".parse::<Currency>(), Ok(Currency::EUR));
    }

    #[test]
    fn rejects_unsupported_codes() {
        assert_eq!(
            "XYZ".parse::<Currency>(),
            Err(Error::UnsupportedCurrency("XYZ".to_owned()))
        );
    }

    #[test]
    fn display_is_the_code() {
        assert_eq!(Currency::JPY.to_string(), "JPY");
    }
}
