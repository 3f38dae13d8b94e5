//! Route handlers for uploading, reviewing and completing imports.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Multipart, Path, State, multipart::Field},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, UserID,
    account::AccountId,
    csv_import::{
        CategoryMap, Import, ImportId, ImportPreview, complete_import, delete_import, get_import,
        get_imports, save_draft, start_import,
    },
    database_id::DatabaseId,
    db::lock_connection,
    import_source::ImportSourceId,
};

/// The state needed for importing transactions.
#[derive(Debug, Clone)]
pub struct ImportState {
    /// The database connection for managing imports.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ImportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The category choices sent when completing an import.
#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteImportBody {
    /// The category for every candidate, keyed by the candidate's temporary ID.
    pub category_map: CategoryMap,
}

struct UploadForm {
    filename: String,
    text: String,
    import_source_id: ImportSourceId,
    default_account_id: AccountId,
}

/// Route handler for uploading a CSV file and starting a draft import.
///
/// Expects a multipart form with the fields `file` (a `text/csv` file),
/// `import_source_id` and `default_account_id`.
pub async fn start_import_endpoint(
    State(state): State<ImportState>,
    Extension(user_id): Extension<UserID>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Import>), Error> {
    let start_time = std::time::Instant::now();
    let form = read_upload_form(&mut multipart).await?;

    let connection = lock_connection(&state.db_connection)?;

    let import = start_import(
        user_id,
        &form.filename,
        &form.text,
        form.import_source_id,
        form.default_account_id,
        &connection,
    )
    .inspect_err(|error| tracing::debug!("Failed to parse \"{}\": {error}", form.filename))?;

    tracing::debug!(
        "Parsed \"{}\" in {:.1}ms",
        form.filename,
        start_time.elapsed().as_secs_f64() * 1000.0
    );

    Ok((StatusCode::CREATED, Json(import)))
}

async fn read_upload_form(multipart: &mut Multipart) -> Result<UploadForm, Error> {
    let mut file = None;
    let mut import_source_id = None;
    let mut default_account_id = None;

    while let Some(field) = multipart.next_field().await.map_err(|error| {
        tracing::error!("Could not read multipart form field: {error}");
        Error::MultipartError(error.to_string())
    })? {
        let name = field.name().unwrap_or_default().to_owned();

        match name.as_str() {
            "file" => file = Some(parse_file_field(field).await?),
            "import_source_id" => import_source_id = Some(parse_id_field(&name, field).await?),
            "default_account_id" => {
                default_account_id = Some(parse_id_field(&name, field).await?)
            }
            _ => tracing::debug!("Ignoring unexpected form field \"{name}\""),
        }
    }

    let missing = |name: &str| Error::MultipartError(format!("the form field \"{name}\" is missing"));
    let (filename, text) = file.ok_or_else(|| missing("file"))?;

    Ok(UploadForm {
        filename,
        text,
        import_source_id: import_source_id.ok_or_else(|| missing("import_source_id"))?,
        default_account_id: default_account_id.ok_or_else(|| missing("default_account_id"))?,
    })
}

async fn parse_file_field(field: Field<'_>) -> Result<(String, String), Error> {
    if field.content_type() != Some("text/csv") {
        return Err(Error::NotCSV);
    }

    let file_name = match field.file_name() {
        Some(file_name) => file_name.to_owned(),
        None => {
            tracing::error!("Could not get file name from multipart form field: {field:#?}");
            return Err(Error::MultipartError(
                "could not get file name from multipart form field".to_owned(),
            ));
        }
    };
    let data = match field.text().await {
        Ok(data) => data,
        Err(error) => {
            tracing::error!("Could not read data from multipart form field: {error}");
            return Err(Error::MultipartError(
                "could not read data from multipart form field".to_owned(),
            ));
        }
    };

    tracing::debug!("Received file '{}' that is {} bytes", file_name, data.len());

    Ok((file_name, data))
}

async fn parse_id_field(name: &str, field: Field<'_>) -> Result<DatabaseId, Error> {
    let text = field
        .text()
        .await
        .map_err(|error| Error::MultipartError(error.to_string()))?;

    text.trim()
        .parse()
        .map_err(|_| Error::MultipartError(format!("\"{name}\" must be an integer, got \"{text}\"")))
}

/// Route handler for listing the caller's imports.
pub async fn get_imports_endpoint(
    State(state): State<ImportState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<Import>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_imports(user_id, &connection).map(Json)
}

/// Route handler for getting an import with its preview.
pub async fn get_import_endpoint(
    State(state): State<ImportState>,
    Extension(user_id): Extension<UserID>,
    Path(import_id): Path<ImportId>,
) -> Result<Json<Import>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_import(import_id, user_id, &connection).map(Json)
}

/// Route handler for saving the working copy of a draft import.
pub async fn save_draft_endpoint(
    State(state): State<ImportState>,
    Extension(user_id): Extension<UserID>,
    Path(import_id): Path<ImportId>,
    Json(preview): Json<ImportPreview>,
) -> Result<Json<Import>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    save_draft(import_id, user_id, &preview, &connection).map(Json)
}

/// Route handler for completing a draft import.
pub async fn complete_import_endpoint(
    State(state): State<ImportState>,
    Extension(user_id): Extension<UserID>,
    Path(import_id): Path<ImportId>,
    Json(body): Json<CompleteImportBody>,
) -> Result<Json<Import>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    complete_import(import_id, user_id, &body.category_map, &connection)
        .inspect_err(|error| tracing::debug!("Could not complete import {import_id}: {error}"))
        .map(Json)
}

/// Route handler for deleting an import and the transactions it created.
pub async fn delete_import_endpoint(
    State(state): State<ImportState>,
    Extension(user_id): Extension<UserID>,
    Path(import_id): Path<ImportId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_import(import_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}
