//! Ledger is a personal multi-account ledger.
//!
//! It records debits, credits and transfers between a user's accounts,
//! bulk-imports them from bank CSV exports through a resumable, reviewable
//! draft, links related transactions together and converts amounts between
//! currencies for display.
//!
//! This library provides a JSON API over a SQLite database.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::Serialize;
use time::Date;
use tokio::signal;

mod account;
mod app_state;
mod category;
mod computation;
mod csv_import;
mod database_id;
mod db;
pub mod endpoints;
mod exchange_rate;
mod identity;
mod import_source;
mod link;
mod logging;
mod routing;
mod timezone;
mod transaction;
mod user;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use exchange_rate::{
    Clock, Currency, ExchangeRates, HttpRateProvider, RateProvider, SystemClock,
};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;
pub use user::UserID;

use crate::database_id::TransactionId;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The broad category of an [Error].
///
/// Callers use the kind to decide how to surface a failure, e.g. a
/// [ErrorKind::Validation] error is shown to the user as an actionable
/// message while an [ErrorKind::Internal] error is only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No valid caller identity was supplied.
    Unauthorized,
    /// The referenced entity does not exist or does not belong to the caller.
    NotFound,
    /// A business rule was violated.
    Validation,
    /// A CSV file or its import config is structurally unusable.
    ParseFailure,
    /// The exchange rate provider failed.
    ExternalServiceFailure,
    /// A uniqueness constraint was violated.
    Conflict,
    /// An unexpected failure, e.g. an SQL error.
    Internal,
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request did not carry a valid caller ID.
    #[error("missing or invalid caller identity")]
    Unauthorized,

    /// The requested resource was not found.
    ///
    /// Resources that belong to another user are also reported as not found
    /// so that callers cannot learn of the existence of other users' data.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The transaction type and its account references are inconsistent, or
    /// the transaction is otherwise invalid (e.g., a negative amount).
    #[error("{0}")]
    InvalidTransaction(String),

    /// The field mappings of an import source broke one or more rules.
    ///
    /// Every violation is reported, not just the first.
    #[error("invalid field mappings: {}", .0.join("; "))]
    InvalidFieldMapping(Vec<String>),

    /// The import source config is unusable for reasons other than the
    /// field mappings, e.g. a starting line of zero.
    #[error("invalid import source config: {0}")]
    InvalidImportConfig(String),

    /// The CSV had issues that prevented it from being parsed.
    #[error("could not parse the CSV file: {0}")]
    InvalidCSV(String),

    /// One or more candidate transactions of a draft import are not ready to
    /// be committed.
    ///
    /// Holds one human-readable line per offending row.
    #[error("the import cannot be completed:\n{}", .0.join("\n"))]
    IncompleteImport(Vec<String>),

    /// The uploaded file is not a CSV file.
    #[error("file type must be CSV")]
    NotCSV,

    /// The multipart form of an upload could not be read.
    #[error("could not read the uploaded form: {0}")]
    MultipartError(String),

    /// Tried to edit or complete an import that has already been completed.
    #[error("the import has already been completed")]
    ImportAlreadyCompleted,

    /// Tried to link a transaction to itself.
    #[error("a transaction cannot be linked to itself")]
    SelfLink,

    /// Tried to link a transaction that already belongs to a link.
    #[error("transaction {0} is already linked to another transaction")]
    AlreadyLinked(TransactionId),

    /// An empty string was used as a name.
    #[error("name cannot be empty")]
    EmptyName,

    /// The currency code is not one of the supported currencies.
    #[error("unsupported currency \"{0}\"")]
    UnsupportedCurrency(String),

    /// No exchange rate is cached for the currency pair on the date.
    #[error("no exchange rate found for {from} to {to} on {date}")]
    RateNotFound {
        /// The currency being converted from.
        from: Currency,
        /// The currency being converted to.
        to: Currency,
        /// The date of the requested rate.
        date: Date,
    },

    /// The cached rate for a currency is zero and cannot be used as a divisor.
    #[error("the cached exchange rate for {0} on {1} is zero")]
    ZeroRate(Currency, Date),

    /// A conversion or total does not fit in a decimal.
    #[error("the amount is too large to calculate with")]
    AmountOverflow,

    /// The exchange rate provider could not be reached or reported a failure.
    #[error("the exchange rate provider failed: {0}")]
    RateProviderError(String),

    /// The specified account name already exists for the user.
    #[error("the account \"{0}\" already exists")]
    DuplicateAccountName(String),

    /// The specified category name already exists for the user.
    #[error("the category \"{0}\" already exists")]
    DuplicateCategoryName(String),

    /// The specified import source name already exists for the user.
    #[error("the import source \"{0}\" already exists")]
    DuplicateImportSourceName(String),

    /// The specified computation name already exists for the user.
    #[error("the computation \"{0}\" already exists")]
    DuplicateComputationName(String),

    /// Tried to delete a category that transactions still refer to.
    #[error("the category is still used by one or more transactions")]
    CategoryInUse,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while serializing or deserializing JSON.
    #[error("could not (de)serialize JSON: {0}")]
    JSONSerializationError(String),
}

impl Error {
    /// The broad category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthorized => ErrorKind::Unauthorized,
            Error::NotFound => ErrorKind::NotFound,
            Error::InvalidTransaction(_)
            | Error::InvalidFieldMapping(_)
            | Error::IncompleteImport(_)
            | Error::ImportAlreadyCompleted
            | Error::SelfLink
            | Error::EmptyName
            | Error::UnsupportedCurrency(_)
            | Error::RateNotFound { .. }
            | Error::ZeroRate(_, _)
            | Error::AmountOverflow
            | Error::CategoryInUse => ErrorKind::Validation,
            Error::InvalidImportConfig(_)
            | Error::InvalidCSV(_)
            | Error::NotCSV
            | Error::MultipartError(_) => ErrorKind::ParseFailure,
            Error::RateProviderError(_) => ErrorKind::ExternalServiceFailure,
            Error::AlreadyLinked(_)
            | Error::DuplicateAccountName(_)
            | Error::DuplicateCategoryName(_)
            | Error::DuplicateImportSourceName(_)
            | Error::DuplicateComputationName(_) => ErrorKind::Conflict,
            Error::SqlError(_) | Error::DatabaseLockError | Error::JSONSerializationError(_) => {
                ErrorKind::Internal
            }
        }
    }

    fn details(&self) -> Vec<String> {
        match self {
            Error::InvalidFieldMapping(errors) | Error::IncompleteImport(errors) => errors.clone(),
            _ => Vec::new(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::JSONSerializationError(value.to_string())
    }
}

/// Whether `error` is the violation of a SQLite UNIQUE constraint.
pub(crate) fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            _,
        )
    )
}

/// Whether `error` is the violation of a SQLite FOREIGN KEY constraint.
///
/// `ON DELETE RESTRICT` actions are reported with the trigger extended code.
pub(crate) fn is_foreign_key_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
                    | rusqlite::ffi::SQLITE_CONSTRAINT_TRIGGER,
            },
            _,
        )
    )
}

#[derive(Serialize)]
struct ErrorBody {
    kind: ErrorKind,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = match kind {
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::ParseFailure => StatusCode::BAD_REQUEST,
            ErrorKind::ExternalServiceFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal errors are not intended to be shown to the client.
        let message = if kind == ErrorKind::Internal {
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            kind,
            details: self.details(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use axum::{http::StatusCode, response::IntoResponse};
    use time::macros::date;

    use crate::{Currency, Error, ErrorKind};

    #[test]
    fn validation_errors_are_distinguishable_from_not_found_and_unauthorized() {
        let error = Error::InvalidTransaction(
            "Transfer transactions require both source and target accounts".to_owned(),
        );

        assert_eq!(error.kind(), ErrorKind::Validation);
        assert_ne!(Error::NotFound.kind(), error.kind());
        assert_ne!(Error::Unauthorized.kind(), error.kind());
    }

    #[test]
    fn conflicts_map_to_client_errors() {
        let response = Error::DuplicateAccountName("Savings".to_owned()).into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn validation_maps_to_unprocessable_entity() {
        let response = Error::SelfLink.into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn rate_not_found_names_pair_and_date() {
        let error = Error::RateNotFound {
            from: Currency::SGD,
            to: Currency::EUR,
            date: date!(2024 - 03 - 01),
        };

        assert_eq!(
            error.to_string(),
            "no exchange rate found for SGD to EUR on 2024-03-01"
        );
    }

    #[test]
    fn sql_error_is_internal() {
        let error = Error::SqlError(rusqlite::Error::InvalidQuery);

        assert_eq!(error.kind(), ErrorKind::Internal);
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
