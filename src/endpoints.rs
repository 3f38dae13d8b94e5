//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/accounts/{account_id}', use [format_endpoint].

/// The route to list and create accounts.
pub const ACCOUNTS: &str = "/api/accounts";
/// The route to access a single account.
pub const ACCOUNT: &str = "/api/accounts/{account_id}";
/// The route to list and create categories.
pub const CATEGORIES: &str = "/api/categories";
/// The route to access a single category.
pub const CATEGORY: &str = "/api/categories/{category_id}";
/// The route to list and create import sources.
pub const IMPORT_SOURCES: &str = "/api/import_sources";
/// The route to access a single import source.
pub const IMPORT_SOURCE: &str = "/api/import_sources/{import_source_id}";
/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to get the link of a single transaction.
pub const TRANSACTION_LINK: &str = "/api/transactions/{transaction_id}/link";
/// The route to list and create transaction links.
pub const LINKS: &str = "/api/links";
/// The route to delete a transaction link.
pub const LINK: &str = "/api/links/{link_id}";
/// The route to list transfers that are not linked to another transaction.
pub const UNLINKED_TRANSFERS: &str = "/api/transfers/unlinked";
/// The route to list imports and to upload a CSV file to start a new import.
pub const IMPORTS: &str = "/api/imports";
/// The route to access a single import.
pub const IMPORT: &str = "/api/imports/{import_id}";
/// The route to save the working copy of a draft import.
pub const IMPORT_DRAFT: &str = "/api/imports/{import_id}/draft";
/// The route to commit a draft import.
pub const COMPLETE_IMPORT: &str = "/api/imports/{import_id}/complete";
/// The route to list the cached exchange rates for a date.
pub const EXCHANGE_RATES: &str = "/api/exchange_rates";
/// The route to fetch and cache today's exchange rates.
pub const REFRESH_EXCHANGE_RATES: &str = "/api/exchange_rates/refresh";
/// The route to convert an amount between currencies.
pub const CONVERT: &str = "/api/exchange_rates/convert";
/// The route to read and write the caller's display currency.
pub const DISPLAY_CURRENCY: &str = "/api/settings/display_currency";
/// The route to list and create computations.
pub const COMPUTATIONS: &str = "/api/computations";
/// The route to access a single computation.
pub const COMPUTATION: &str = "/api/computations/{computation_id}";
/// The route to replace the transactions of a computation.
pub const COMPUTATION_TRANSACTIONS: &str = "/api/computations/{computation_id}/transactions";
/// The route to include or exclude a single transaction of a computation.
pub const COMPUTATION_TRANSACTION: &str =
    "/api/computations/{computation_id}/transactions/{transaction_id}";

/// Replace the first parameter in `endpoint_path` with `id`.
///
/// A parameter is the text between a left brace and the next right brace,
/// e.g. '{account_id}' in '/api/accounts/{account_id}'. Routes with two
/// parameters are formatted by calling this function twice.
///
/// If no parameter is found in `endpoint_path`, the original path is returned.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let end = endpoint_path[start..]
        .find('}')
        .map_or(endpoint_path.len(), |offset| start + offset + 1);

    format!("{}{id}{}", &endpoint_path[..start], &endpoint_path[end..])
}
