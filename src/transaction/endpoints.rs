//! Route handlers for creating, reading, updating and deleting transactions.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, UserID,
    account::{AccountId, get_accounts},
    database_id::TransactionId,
    db::lock_connection,
    exchange_rate::{ConvertedAmount, Currency, ExchangeRates},
    link::{TransactionLink, get_link_for_transaction, get_links},
    transaction::{
        NewTransaction, Transaction, TransactionUpdate, create_transaction, delete_transaction,
        get_transaction, get_transactions, update_transaction,
    },
    user::get_display_currency,
};

/// The state needed to manage transactions.
#[derive(Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Converts amounts into the caller's display currency.
    pub exchange_rates: ExchangeRates,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            exchange_rates: state.exchange_rates.clone(),
        }
    }
}

/// The filters for listing transactions.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    /// Only list transactions from or to this account.
    pub account_id: Option<AccountId>,
}

/// A transaction with its amount in the caller's display currency and the
/// link it belongs to, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionView {
    /// The stored transaction.
    #[serde(flatten)]
    pub transaction: Transaction,
    /// The amount converted into the display currency.
    pub converted: ConvertedAmount,
    /// The link the transaction belongs to.
    pub link: Option<TransactionLink>,
}

/// A route handler for creating a new transaction.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Json(new_transaction): Json<NewTransaction>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let connection = lock_connection(&state.db_connection)?;

    let transaction = create_transaction(user_id, &new_transaction, &connection).inspect_err(
        |error| tracing::debug!("Could not create transaction {new_transaction:?}: {error}"),
    )?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// A route handler for listing the caller's transactions, most recent first.
///
/// Amounts are converted into the caller's display currency. A failed
/// conversion does not fail the request, the amount is shown unconverted.
pub async fn get_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<TransactionView>>, Error> {
    // The lock must be released before converting, the converter locks the
    // same connection.
    let (transactions, account_currencies, display_currency, links) = {
        let connection = lock_connection(&state.db_connection)?;

        let transactions = get_transactions(user_id, query.account_id, &connection)?;
        let account_currencies = get_account_currencies(user_id, &connection)?;
        let display_currency = get_display_currency(user_id, &connection)?;
        let links = get_links(user_id, &connection)?;

        (transactions, account_currencies, display_currency, links)
    };

    let mut links_by_transaction: HashMap<TransactionId, TransactionLink> = HashMap::new();
    for link in links {
        links_by_transaction.insert(link.transaction_id_1, link.clone());
        links_by_transaction.insert(link.transaction_id_2, link);
    }

    let mut views = Vec::with_capacity(transactions.len());

    for transaction in transactions {
        let converted = convert_for_display(
            &state.exchange_rates,
            &transaction,
            &account_currencies,
            display_currency,
        )
        .await;
        let link = links_by_transaction.remove(&transaction.id);

        views.push(TransactionView {
            transaction,
            converted,
            link,
        });
    }

    Ok(Json(views))
}

/// A route handler for getting a single transaction.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<TransactionView>, Error> {
    let (transaction, account_currencies, display_currency, link) = {
        let connection = lock_connection(&state.db_connection)?;

        let transaction = get_transaction(transaction_id, user_id, &connection)?;
        let account_currencies = get_account_currencies(user_id, &connection)?;
        let display_currency = get_display_currency(user_id, &connection)?;
        let link = get_link_for_transaction(transaction_id, user_id, &connection)?;

        (transaction, account_currencies, display_currency, link)
    };

    let converted = convert_for_display(
        &state.exchange_rates,
        &transaction,
        &account_currencies,
        display_currency,
    )
    .await;

    Ok(Json(TransactionView {
        transaction,
        converted,
        link,
    }))
}

/// A route handler for partially updating a transaction.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
    Json(update): Json<TransactionUpdate>,
) -> Result<Json<Transaction>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_transaction(transaction_id, user_id, &update, &connection)
        .inspect_err(|error| {
            tracing::debug!("Could not update transaction {transaction_id} with {update:?}: {error}")
        })
        .map(Json)
}

/// A route handler for deleting a transaction.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_transaction(transaction_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Map each of the user's account IDs to the account's currency.
pub(crate) fn get_account_currencies(
    user_id: UserID,
    connection: &Connection,
) -> Result<HashMap<AccountId, Currency>, Error> {
    Ok(get_accounts(user_id, connection)?
        .into_iter()
        .map(|account| (account.id, account.currency))
        .collect())
}

/// Convert the amount of `transaction` from the currency of its primary
/// account into `display_currency`.
pub(crate) async fn convert_for_display(
    exchange_rates: &ExchangeRates,
    transaction: &Transaction,
    account_currencies: &HashMap<AccountId, Currency>,
    display_currency: Currency,
) -> ConvertedAmount {
    let currency = transaction
        .primary_account_id()
        .and_then(|account_id| account_currencies.get(&account_id).copied())
        .unwrap_or(display_currency);

    exchange_rates
        .convert_amount_with_metadata(transaction.amount, currency, display_currency)
        .await
}
