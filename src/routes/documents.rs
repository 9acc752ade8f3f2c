use std::sync::Arc;

use axum::extract::{Json, Multipart, Path, State};
use axum::http::StatusCode;
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use tokio::task;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extract::extract_text_from_pdf;
use crate::models::{Document, NewDocument};
use crate::repository;
use crate::state::AppState;
use crate::storage::{inline_content_disposition, upload_key};

pub const MISSING_FILE_MESSAGE: &str =
    "No file uploaded. Please use 'file' in multipart/form-data.";
const MAX_TITLE_CHARS: usize = 255;

#[derive(Serialize)]
pub struct IngestResponse {
    pub message: &'static str,
    pub document_id: i32,
    pub char_count: usize,
}

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: i32,
    pub title: String,
    pub file: String,
    pub uploaded_at: String,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            title: doc.title,
            file: doc.file,
            uploaded_at: to_iso(doc.uploaded_at),
        }
    }
}

struct UploadRequest {
    bytes: Bytes,
    original_name: String,
    content_type: Option<String>,
    title: Option<String>,
}

pub async fn ingest_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<IngestResponse>)> {
    let mut file_bytes: Option<Bytes> = None;
    let mut original_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut title: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        let msg = format!("invalid multipart data: {err}");
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(msg)
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                original_name = field.file_name().map(|n| n.to_string());
                content_type = field.content_type().map(|mime| mime.to_string());
                let data = field.bytes().await.map_err(|err| {
                    let msg = format!("failed to read file bytes: {err}");
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(msg)
                })?;
                file_bytes = Some(data);
            }
            Some("title") => {
                let value = field.text().await.map_err(|err| {
                    let msg = format!("invalid title: {err}");
                    error!(error = %err, "invalid title field");
                    AppError::bad_request(msg)
                })?;
                title = Some(value);
            }
            _ => {}
        }
    }

    let bytes = match file_bytes {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => {
            warn!("ingest rejected: missing or empty file field");
            return Err(AppError::bad_request(MISSING_FILE_MESSAGE));
        }
    };

    let original_name = original_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "upload.pdf".to_string());
    let content_type = content_type.or_else(|| {
        mime_guess::from_path(&original_name)
            .first()
            .map(|mime| mime.to_string())
    });

    let request = UploadRequest {
        bytes,
        original_name,
        content_type,
        title,
    };

    let response = process_ingest(&state, request).await?;
    info!(
        document_id = response.document_id,
        char_count = response.char_count,
        "document ingested"
    );
    Ok((StatusCode::CREATED, Json(response)))
}

async fn process_ingest(state: &AppState, request: UploadRequest) -> AppResult<IngestResponse> {
    let UploadRequest {
        bytes,
        original_name,
        content_type,
        title,
    } = request;

    let file_key = upload_key(Uuid::new_v4(), &original_name);
    state
        .storage
        .put_object(
            &file_key,
            bytes.clone(),
            content_type,
            inline_content_disposition(&original_name),
        )
        .await
        .map_err(|err| {
            error!(error = %err, key = %file_key, "failed to store document");
            AppError::internal(format!("failed to store document: {err}"))
        })?;

    let new_document = NewDocument {
        title: derive_document_title(title.as_deref(), &original_name),
        file: file_key.clone(),
    };

    let inserted = state.db().and_then(|mut conn| {
        repository::insert_document(&mut conn, &new_document).map_err(AppError::from)
    });
    let document = match inserted {
        Ok(document) => document,
        Err(err) => {
            error!(key = %file_key, error = %err.message(), "failed to record document");
            discard_object(state, &file_key).await;
            return Err(err);
        }
    };

    let text = match extract_and_attach(state, document.id, bytes).await {
        Ok(text) => text,
        Err(err) => {
            discard_document(state, &document).await;
            return Err(err);
        }
    };

    Ok(IngestResponse {
        message: "Ingestion successful",
        document_id: document.id,
        char_count: text.chars().count(),
    })
}

async fn extract_and_attach(state: &AppState, document_id: i32, bytes: Bytes) -> AppResult<String> {
    let extractor = Arc::clone(&state.extractor);
    let text = task::spawn_blocking(move || extract_text_from_pdf(extractor.as_ref(), &bytes))
        .await
        .map_err(|join_err| {
            error!(document_id, error = %join_err, "pdf extraction crashed");
            AppError::internal(format!("Failed to process PDF: {join_err}"))
        })?;

    let mut conn = state.db()?;
    repository::attach_extracted_text(&mut conn, document_id, &text).map_err(|err| {
        error!(document_id, error = %err, "failed to attach extracted text");
        AppError::from(err)
    })?;
    Ok(text)
}

/// Rolls back a half-ingested document: the row first, then its file.
async fn discard_document(state: &AppState, document: &Document) {
    match state.db() {
        Ok(mut conn) => {
            if let Err(err) = repository::delete_document(&mut conn, document.id) {
                error!(document_id = document.id, error = %err, "failed to delete document row");
            }
        }
        Err(err) => {
            error!(document_id = document.id, error = %err.message(), "failed to delete document row");
        }
    }

    discard_object(state, &document.file).await;
}

async fn discard_object(state: &AppState, key: &str) {
    if let Err(err) = state.storage.delete_object(key).await {
        warn!(key = %key, error = %err, "failed to delete stored file");
    }
}

pub async fn list_documents(State(state): State<AppState>) -> AppResult<Json<Vec<DocumentResponse>>> {
    let mut conn = state.db()?;
    let documents = repository::list_documents(&mut conn)?;
    Ok(Json(documents.into_iter().map(DocumentResponse::from).collect()))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<DocumentResponse>> {
    let document = load_document(&state, parse_document_id(&raw_id)?)?;
    Ok(Json(document.into()))
}

/// Ids in the URL are matched as plain digits; anything that cannot name a
/// row is reported the same way as a missing row.
pub(crate) fn parse_document_id(raw: &str) -> AppResult<i64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::document_not_found());
    }
    raw.parse().map_err(|_| AppError::document_not_found())
}

pub(crate) fn load_document(state: &AppState, document_id: i64) -> AppResult<Document> {
    let Ok(document_id) = i32::try_from(document_id) else {
        return Err(AppError::document_not_found());
    };
    let mut conn = state.db()?;
    repository::find_document(&mut conn, document_id)?.ok_or_else(AppError::document_not_found)
}

fn derive_document_title(requested: Option<&str>, original_name: &str) -> String {
    let title = requested
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(original_name);
    title.chars().take(MAX_TITLE_CHARS).collect()
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
