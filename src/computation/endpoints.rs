//! Route handlers for managing computations and reading their totals.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, UserID,
    computation::{
        Computation, ComputationForm, ComputationId, ComputationTotals, compute_totals,
        create_computation, delete_computation, get_computation, get_computations,
        get_included_transactions, rename_computation, replace_computation_transactions,
        set_transaction_included,
    },
    database_id::TransactionId,
    db::lock_connection,
    exchange_rate::ExchangeRates,
    transaction::{convert_for_display, get_account_currencies},
    user::get_display_currency,
};

/// The state needed to manage computations.
#[derive(Clone)]
pub struct ComputationState {
    /// The database connection for managing computations.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Converts amounts into the caller's display currency.
    pub exchange_rates: ExchangeRates,
}

impl FromRef<AppState> for ComputationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            exchange_rates: state.exchange_rates.clone(),
        }
    }
}

/// A computation together with the totals of its included transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputationView {
    /// The stored computation.
    #[serde(flatten)]
    pub computation: Computation,
    /// The totals in the caller's display currency.
    pub totals: ComputationTotals,
}

/// The new name of a computation.
#[derive(Debug, Deserialize)]
pub struct RenameComputationBody {
    /// The new name.
    pub name: String,
}

/// The new members of a computation.
#[derive(Debug, Deserialize)]
pub struct ReplaceTransactionsBody {
    /// The transactions that replace the current members.
    pub transaction_ids: Vec<TransactionId>,
}

/// Whether a member counts towards the totals.
#[derive(Debug, Deserialize)]
pub struct SetIncludedBody {
    /// `false` to exclude the transaction.
    pub included: bool,
}

/// A route handler for creating a computation.
pub async fn create_computation_endpoint(
    State(state): State<ComputationState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<ComputationForm>,
) -> Result<(StatusCode, Json<Computation>), Error> {
    let connection = lock_connection(&state.db_connection)?;

    let computation = create_computation(user_id, &form, &connection)?;

    Ok((StatusCode::CREATED, Json(computation)))
}

/// A route handler for listing the caller's computations.
pub async fn get_computations_endpoint(
    State(state): State<ComputationState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<Computation>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_computations(user_id, &connection).map(Json)
}

/// A route handler for getting a computation with its totals.
///
/// Amounts are converted into the caller's display currency at today's rate.
/// An amount that cannot be converted is added unconverted and flagged.
pub async fn get_computation_endpoint(
    State(state): State<ComputationState>,
    Extension(user_id): Extension<UserID>,
    Path(computation_id): Path<ComputationId>,
) -> Result<Json<ComputationView>, Error> {
    let (computation, transactions, account_currencies, display_currency) = {
        let connection = lock_connection(&state.db_connection)?;

        (
            get_computation(computation_id, user_id, &connection)?,
            get_included_transactions(computation_id, user_id, &connection)?,
            get_account_currencies(user_id, &connection)?,
            get_display_currency(user_id, &connection)?,
        )
    };

    let mut amounts = Vec::with_capacity(transactions.len());
    for transaction in &transactions {
        let converted = convert_for_display(
            &state.exchange_rates,
            transaction,
            &account_currencies,
            display_currency,
        )
        .await;

        amounts.push((transaction.transaction_type, converted));
    }

    Ok(Json(ComputationView {
        computation,
        totals: compute_totals(&amounts, display_currency)?,
    }))
}

/// A route handler for renaming a computation.
pub async fn rename_computation_endpoint(
    State(state): State<ComputationState>,
    Extension(user_id): Extension<UserID>,
    Path(computation_id): Path<ComputationId>,
    Json(body): Json<RenameComputationBody>,
) -> Result<Json<Computation>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    rename_computation(computation_id, user_id, &body.name, &connection).map(Json)
}

/// A route handler for replacing the transactions of a computation.
pub async fn replace_computation_transactions_endpoint(
    State(state): State<ComputationState>,
    Extension(user_id): Extension<UserID>,
    Path(computation_id): Path<ComputationId>,
    Json(body): Json<ReplaceTransactionsBody>,
) -> Result<Json<Computation>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    replace_computation_transactions(computation_id, user_id, &body.transaction_ids, &connection)
        .map(Json)
}

/// A route handler for including or excluding one transaction of a computation.
pub async fn set_transaction_included_endpoint(
    State(state): State<ComputationState>,
    Extension(user_id): Extension<UserID>,
    Path((computation_id, transaction_id)): Path<(ComputationId, TransactionId)>,
    Json(body): Json<SetIncludedBody>,
) -> Result<Json<Computation>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    set_transaction_included(
        computation_id,
        user_id,
        transaction_id,
        body.included,
        &connection,
    )
    .map(Json)
}

/// A route handler for deleting a computation.
pub async fn delete_computation_endpoint(
    State(state): State<ComputationState>,
    Extension(user_id): Extension<UserID>,
    Path(computation_id): Path<ComputationId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_computation(computation_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::{Value, json};

    use crate::{
        endpoints::{self, format_endpoint},
        exchange_rate::Currency,
        identity::USER_ID_HEADER,
        test_utils::{FIXTURE_DATE, get_fixture, get_test_server, get_test_state},
    };

    #[tokio::test]
    async fn totals_are_converted_to_display_currency() {
        let fixture = get_fixture();
        // Checking holds SGD and savings holds USD, the display currency defaults to USD.
        let debit = fixture.debit(Decimal::new(2700, 2));
        let credit = fixture.credit(Decimal::new(50, 0));
        let server = get_test_server(get_test_state(
            fixture.connection,
            &[(Currency::USD, Decimal::ONE), (Currency::SGD, Decimal::new(135, 2))],
            FIXTURE_DATE,
        ));

        let response = server
            .post(endpoints::COMPUTATIONS)
            .add_header(USER_ID_HEADER, "1")
            .json(&json!({"name": "March", "transaction_ids": [debit.id, credit.id]}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let computation_id = response.json::<Value>()["id"].as_i64().unwrap();

        let response = server
            .get(&format_endpoint(endpoints::COMPUTATION, computation_id))
            .add_header(USER_ID_HEADER, "1")
            .await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        let total_debits = Decimal::new(2700, 2) * (Decimal::ONE / Decimal::new(135, 2));
        assert_eq!(body["name"], "March");
        assert_eq!(body["totals"]["transaction_count"], 2);
        assert_eq!(body["totals"]["total_debits"], total_debits.to_string());
        assert_eq!(body["totals"]["total_credits"], "50");
        assert_eq!(body["totals"]["display_currency"], "USD");
        assert_eq!(body["totals"]["conversion_failed"], false);
    }

    #[tokio::test]
    async fn excluded_transactions_do_not_count() {
        let fixture = get_fixture();
        let first = fixture.credit(Decimal::TEN);
        let second = fixture.credit(Decimal::ONE);
        let server = get_test_server(get_test_state(fixture.connection, &[], FIXTURE_DATE));

        let computation_id = server
            .post(endpoints::COMPUTATIONS)
            .add_header(USER_ID_HEADER, "1")
            .json(&json!({"name": "Refunds", "transaction_ids": [first.id, second.id]}))
            .await
            .json::<Value>()["id"]
            .as_i64()
            .unwrap();

        server
            .patch(&format_endpoint(
                &format_endpoint(endpoints::COMPUTATION_TRANSACTION, computation_id),
                first.id,
            ))
            .add_header(USER_ID_HEADER, "1")
            .json(&json!({"included": false}))
            .await
            .assert_status_ok();

        let body = server
            .get(&format_endpoint(endpoints::COMPUTATION, computation_id))
            .add_header(USER_ID_HEADER, "1")
            .await
            .json::<Value>();

        assert_eq!(body["totals"]["transaction_count"], 1);
        assert_eq!(body["totals"]["net"], "1");
    }

    #[tokio::test]
    async fn replace_and_delete() {
        let fixture = get_fixture();
        let first = fixture.debit(Decimal::TEN);
        let second = fixture.debit(Decimal::ONE);
        let server = get_test_server(get_test_state(fixture.connection, &[], FIXTURE_DATE));

        let computation_id = server
            .post(endpoints::COMPUTATIONS)
            .add_header(USER_ID_HEADER, "1")
            .json(&json!({"name": "Bills", "transaction_ids": [first.id]}))
            .await
            .json::<Value>()["id"]
            .as_i64()
            .unwrap();

        let response = server
            .put(&format_endpoint(
                endpoints::COMPUTATION_TRANSACTIONS,
                computation_id,
            ))
            .add_header(USER_ID_HEADER, "1")
            .json(&json!({"transaction_ids": [second.id]}))
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<Value>()["members"],
            json!([{"transaction_id": second.id, "included": true}])
        );

        server
            .delete(&format_endpoint(endpoints::COMPUTATION, computation_id))
            .add_header(USER_ID_HEADER, "1")
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .get(&format_endpoint(endpoints::COMPUTATION, computation_id))
            .add_header(USER_ID_HEADER, "1")
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn duplicate_name_is_conflict() {
        let fixture = get_fixture();
        let server = get_test_server(get_test_state(fixture.connection, &[], FIXTURE_DATE));

        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            server
                .post(endpoints::COMPUTATIONS)
                .add_header(USER_ID_HEADER, "1")
                .json(&json!({"name": "Bills"}))
                .await
                .assert_status(expected);
        }
    }
}
