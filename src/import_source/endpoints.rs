//! Route handlers for managing import sources.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error, UserID,
    db::lock_connection,
    import_source::{
        ImportSource, ImportSourceForm, ImportSourceId, create_import_source,
        delete_import_source, get_import_source, get_import_sources, update_import_source,
    },
};

/// The state needed to manage import sources.
#[derive(Debug, Clone)]
pub struct ImportSourceState {
    /// The database connection for managing import sources.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ImportSourceState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for creating an import source.
///
/// The config is validated before it is saved and every mapping error is
/// returned in the response details.
pub async fn create_import_source_endpoint(
    State(state): State<ImportSourceState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<ImportSourceForm>,
) -> Result<(StatusCode, Json<ImportSource>), Error> {
    let connection = lock_connection(&state.db_connection)?;

    let import_source = create_import_source(user_id, &form, &connection)
        .inspect_err(|error| tracing::debug!("Could not create import source: {error}"))?;

    Ok((StatusCode::CREATED, Json(import_source)))
}

/// A route handler for listing the caller's import sources.
pub async fn get_import_sources_endpoint(
    State(state): State<ImportSourceState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<ImportSource>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_import_sources(user_id, &connection).map(Json)
}

/// A route handler for getting a single import source.
pub async fn get_import_source_endpoint(
    State(state): State<ImportSourceState>,
    Extension(user_id): Extension<UserID>,
    Path(import_source_id): Path<ImportSourceId>,
) -> Result<Json<ImportSource>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_import_source(import_source_id, user_id, &connection).map(Json)
}

/// A route handler for replacing an import source.
pub async fn update_import_source_endpoint(
    State(state): State<ImportSourceState>,
    Extension(user_id): Extension<UserID>,
    Path(import_source_id): Path<ImportSourceId>,
    Json(form): Json<ImportSourceForm>,
) -> Result<Json<ImportSource>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_import_source(import_source_id, user_id, &form, &connection).map(Json)
}

/// A route handler for deleting an import source.
pub async fn delete_import_source_endpoint(
    State(state): State<ImportSourceState>,
    Extension(user_id): Extension<UserID>,
    Path(import_source_id): Path<ImportSourceId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_import_source(import_source_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        endpoints,
        identity::USER_ID_HEADER,
        test_utils::{FIXTURE_DATE, get_fixture, get_test_server, get_test_state},
    };

    #[tokio::test]
    async fn invalid_mappings_are_reported_together() {
        let fixture = get_fixture();
        let server = get_test_server(get_test_state(fixture.connection, &[], FIXTURE_DATE));

        let response = server
            .post(endpoints::IMPORT_SOURCES)
            .add_header(USER_ID_HEADER, "1")
            .json(&json!({
                "name": "Bank",
                "config": {
                    "starting_line": 1,
                    "field_mappings": [
                        {"column": "Date", "field": "date", "data_type": "date"},
                        {"column": "Amount", "field": "debit", "data_type": "string"}
                    ]
                }
            }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body = response.json::<Value>();
        assert_eq!(body["kind"], "validation");
        assert_eq!(body["details"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn create_returns_created_source() {
        let fixture = get_fixture();
        let server = get_test_server(get_test_state(fixture.connection, &[], FIXTURE_DATE));

        let response = server
            .post(endpoints::IMPORT_SOURCES)
            .add_header(USER_ID_HEADER, "1")
            .json(&json!({
                "name": "Bank",
                "config": {
                    "starting_line": 2,
                    "field_mappings": [
                        {"column": "Date", "field": "date", "data_type": "date",
                         "format": "dd/MM/yyyy", "required": true},
                        {"column": "Memo", "field": "description", "data_type": "string"},
                        {"column": "Amount", "field": "debit", "data_type": "number"},
                        {"column": "Amount", "field": "credit", "data_type": "number"}
                    ]
                }
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body = response.json::<Value>();
        assert_eq!(body["name"], "Bank");
        assert_eq!(body["config"]["starting_line"], 2);
        assert_eq!(body["account_ids"], json!([]));
    }
}
