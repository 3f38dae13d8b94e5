//! Route handlers for linking transactions.

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
    database_id::TransactionId,
    db::lock_connection,
    link::{
        LinkId, TransactionLink, create_link, delete_link, get_link_for_transaction, get_links,
        get_unlinked_transfers,
    },
    transaction::Transaction,
};

/// The state needed to manage links.
#[derive(Debug, Clone)]
pub struct LinkState {
    /// The database connection for managing links.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LinkState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The two transactions to link, in any order.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateLinkBody {
    /// One of the transactions.
    pub transaction_id_1: TransactionId,
    /// The other transaction.
    pub transaction_id_2: TransactionId,
}

/// The response to a delete request.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteLinkResponse {
    /// Whether a link was actually deleted.
    pub deleted: bool,
}

/// A route handler for linking two transactions.
pub async fn create_link_endpoint(
    State(state): State<LinkState>,
    Extension(user_id): Extension<UserID>,
    Json(body): Json<CreateLinkBody>,
) -> Result<(StatusCode, Json<TransactionLink>), Error> {
    let connection = lock_connection(&state.db_connection)?;

    let link = create_link(
        user_id,
        body.transaction_id_1,
        body.transaction_id_2,
        &connection,
    )
    .inspect_err(|error| tracing::debug!("Could not create link with {body:?}: {error}"))?;

    Ok((StatusCode::CREATED, Json(link)))
}

/// A route handler for listing the caller's links.
pub async fn get_links_endpoint(
    State(state): State<LinkState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<TransactionLink>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_links(user_id, &connection).map(Json)
}

/// A route handler for getting the link of a transaction, or `null`.
pub async fn get_link_for_transaction_endpoint(
    State(state): State<LinkState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<Option<TransactionLink>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_link_for_transaction(transaction_id, user_id, &connection).map(Json)
}

/// A route handler for deleting a link.
///
/// Deleting a link that does not exist is not an error, the response says
/// whether anything was deleted.
pub async fn delete_link_endpoint(
    State(state): State<LinkState>,
    Extension(user_id): Extension<UserID>,
    Path(link_id): Path<LinkId>,
) -> Result<Json<DeleteLinkResponse>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_link(link_id, user_id, &connection).map(|deleted| Json(DeleteLinkResponse { deleted }))
}

/// A route handler for listing the caller's transfers that are not linked.
pub async fn get_unlinked_transfers_endpoint(
    State(state): State<LinkState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_unlinked_transfers(user_id, &connection).map(Json)
}
