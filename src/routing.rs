//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
};
use serde_json::json;

use crate::{
    AppState, Error,
    account::{
        create_account_endpoint, delete_account_endpoint, get_account_endpoint,
        get_accounts_endpoint, update_account_endpoint,
    },
    category::{
        create_category_endpoint, delete_category_endpoint, get_categories_endpoint,
        update_category_endpoint,
    },
    computation::{
        create_computation_endpoint, delete_computation_endpoint, get_computation_endpoint,
        get_computations_endpoint, rename_computation_endpoint,
        replace_computation_transactions_endpoint, set_transaction_included_endpoint,
    },
    csv_import::{
        complete_import_endpoint, delete_import_endpoint, get_import_endpoint,
        get_imports_endpoint, save_draft_endpoint, start_import_endpoint,
    },
    endpoints,
    exchange_rate::{convert_amount_endpoint, get_exchange_rates_endpoint, refresh_rates_endpoint},
    identity::identity_guard,
    import_source::{
        create_import_source_endpoint, delete_import_source_endpoint, get_import_source_endpoint,
        get_import_sources_endpoint, update_import_source_endpoint,
    },
    link::{
        create_link_endpoint, delete_link_endpoint, get_link_for_transaction_endpoint,
        get_links_endpoint, get_unlinked_transfers_endpoint,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        get_transactions_endpoint, update_transaction_endpoint,
    },
    user::{get_display_currency_endpoint, set_display_currency_endpoint},
};

/// The route for checking that the server is up.
const HEALTH: &str = "/health";

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new().route(HEALTH, get(get_health));

    let protected_routes = Router::new()
        .route(
            endpoints::ACCOUNTS,
            post(create_account_endpoint).get(get_accounts_endpoint),
        )
        .route(
            endpoints::ACCOUNT,
            get(get_account_endpoint)
                .put(update_account_endpoint)
                .delete(delete_account_endpoint),
        )
        .route(
            endpoints::CATEGORIES,
            post(create_category_endpoint).get(get_categories_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            put(update_category_endpoint).delete(delete_category_endpoint),
        )
        .route(
            endpoints::IMPORT_SOURCES,
            post(create_import_source_endpoint).get(get_import_sources_endpoint),
        )
        .route(
            endpoints::IMPORT_SOURCE,
            get(get_import_source_endpoint)
                .put(update_import_source_endpoint)
                .delete(delete_import_source_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS,
            post(create_transaction_endpoint).get(get_transactions_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .patch(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION_LINK,
            get(get_link_for_transaction_endpoint),
        )
        .route(
            endpoints::LINKS,
            post(create_link_endpoint).get(get_links_endpoint),
        )
        .route(endpoints::LINK, axum::routing::delete(delete_link_endpoint))
        .route(
            endpoints::UNLINKED_TRANSFERS,
            get(get_unlinked_transfers_endpoint),
        )
        .route(
            endpoints::IMPORTS,
            post(start_import_endpoint).get(get_imports_endpoint),
        )
        .route(
            endpoints::IMPORT,
            get(get_import_endpoint).delete(delete_import_endpoint),
        )
        .route(endpoints::IMPORT_DRAFT, put(save_draft_endpoint))
        .route(endpoints::COMPLETE_IMPORT, post(complete_import_endpoint))
        .route(endpoints::EXCHANGE_RATES, get(get_exchange_rates_endpoint))
        .route(
            endpoints::REFRESH_EXCHANGE_RATES,
            post(refresh_rates_endpoint),
        )
        .route(endpoints::CONVERT, get(convert_amount_endpoint))
        .route(
            endpoints::DISPLAY_CURRENCY,
            get(get_display_currency_endpoint).put(set_display_currency_endpoint),
        )
        .route(
            endpoints::COMPUTATIONS,
            post(create_computation_endpoint).get(get_computations_endpoint),
        )
        .route(
            endpoints::COMPUTATION,
            get(get_computation_endpoint)
                .patch(rename_computation_endpoint)
                .delete(delete_computation_endpoint),
        )
        .route(
            endpoints::COMPUTATION_TRANSACTIONS,
            put(replace_computation_transactions_endpoint),
        )
        .route(
            endpoints::COMPUTATION_TRANSACTION,
            patch(set_transaction_included_endpoint),
        )
        .layer(middleware::from_fn(identity_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

async fn get_health() -> Response {
    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}

async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use rusqlite::Connection;
    use serde_json::{Value, json};
    use time::macros::date;

    use crate::{
        endpoints, initialize_db,
        test_utils::{get_test_server, get_test_state},
    };

    fn get_server() -> axum_test::TestServer {
        let connection = Connection::open_in_memory().unwrap();
        initialize_db(&connection).unwrap();

        get_test_server(get_test_state(connection, &[], date!(2025 - 03 - 10)))
    }

    #[tokio::test]
    async fn health_does_not_need_caller_id() {
        let server = get_server();

        let response = server.get("/health").await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn api_routes_need_caller_id() {
        let server = get_server();

        let response = server.get(endpoints::ACCOUNTS).await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["kind"], "unauthorized");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let server = get_server();

        let response = server.get("/api/does_not_exist").await;

        response.assert_status_not_found();
        assert_eq!(response.json::<Value>()["kind"], "not_found");
    }
}
