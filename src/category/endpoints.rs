//! Route handlers for managing categories.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error, UserID,
    category::{
        Category, CategoryForm, CategoryId, create_category, delete_category, get_categories,
        update_category,
    },
    db::lock_connection,
};

/// The state needed to manage categories.
#[derive(Debug, Clone)]
pub struct CategoryState {
    /// The database connection for managing categories.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for creating a category.
pub async fn create_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<CategoryForm>,
) -> Result<(StatusCode, Json<Category>), Error> {
    let connection = lock_connection(&state.db_connection)?;

    let category = create_category(user_id, &form, &connection)?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// A route handler for listing the caller's categories.
pub async fn get_categories_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<Category>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_categories(user_id, &connection).map(Json)
}

/// A route handler for updating a category.
pub async fn update_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Path(category_id): Path<CategoryId>,
    Json(form): Json<CategoryForm>,
) -> Result<Json<Category>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_category(category_id, user_id, &form, &connection).map(Json)
}

/// A route handler for deleting a category.
pub async fn delete_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Path(category_id): Path<CategoryId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_category(category_id, user_id, &connection)
        .inspect_err(|error| tracing::debug!("Could not delete category {category_id}: {error}"))?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::Value;

    use crate::{
        endpoints::{self, format_endpoint},
        identity::USER_ID_HEADER,
        test_utils::{FIXTURE_DATE, get_fixture, get_test_server, get_test_state},
    };

    #[tokio::test]
    async fn deleting_category_in_use_is_unprocessable() {
        let fixture = get_fixture();
        fixture.debit(Decimal::ONE);
        let category = fixture.category;
        let server = get_test_server(get_test_state(fixture.connection, &[], FIXTURE_DATE));

        let response = server
            .delete(&format_endpoint(endpoints::CATEGORY, category))
            .add_header(USER_ID_HEADER, "1")
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body = response.json::<Value>();
        assert_eq!(body["kind"], "validation");
        assert_eq!(
            body["message"],
            "the category is still used by one or more transactions"
        );
    }

    #[tokio::test]
    async fn deleting_another_users_category_is_not_found() {
        let fixture = get_fixture();
        fixture.debit(Decimal::ONE);
        let category = fixture.category;
        let server = get_test_server(get_test_state(fixture.connection, &[], FIXTURE_DATE));

        server
            .delete(&format_endpoint(endpoints::CATEGORY, category))
            .add_header(USER_ID_HEADER, "2")
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn unused_category_can_be_deleted() {
        let fixture = get_fixture();
        let category = fixture.category;
        let server = get_test_server(get_test_state(fixture.connection, &[], FIXTURE_DATE));

        server
            .delete(&format_endpoint(endpoints::CATEGORY, category))
            .add_header(USER_ID_HEADER, "1")
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }
}
