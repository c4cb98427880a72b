//! File handlers.

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::header,
    response::Response,
    Json,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::file::{FileContent, FilePage, IncomingFile, UploadForm, UploadLimits};
use crate::web::dto::{FileListQuery, FileResponse, MessageResponse, UploadResponse};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;
use crate::web::AppState;

/// Build an inline Content-Disposition value.
///
/// Control characters are dropped and quotes and backslashes replaced in
/// the plain `filename`. Names that are not plain ASCII also get an
/// RFC 5987 `filename*`.
fn content_disposition_header(filename: &str) -> String {
    if filename.is_ascii() && !filename.chars().any(|c| c.is_control() || c == '"' || c == '\\') {
        return format!("inline; filename=\"{}\"", filename);
    }

    let fallback: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            c if !c.is_ascii() => '_',
            c => c,
        })
        .collect();
    let encoded = urlencoding::encode(filename);

    format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

fn multipart_error(e: MultipartError) -> ApiError {
    tracing::warn!("Failed to read multipart data: {}", e);
    ApiError::bad_request(format!("Invalid multipart data: {}", e.body_text()))
}

/// Collect the upload form, enforcing per-file size while reading.
async fn read_upload_form(
    mut multipart: Multipart,
    limits: UploadLimits,
) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "files" | "file" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(str::to_string);

                let mut data = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    if (data.len() + chunk.len()) as u64 > limits.max_file_size {
                        return Err(ApiError::bad_request(format!(
                            "{} exceeds the maximum size of {} bytes",
                            file_name, limits.max_file_size
                        )));
                    }
                    data.extend_from_slice(&chunk);
                }

                // Browsers send an empty part for an untouched file input
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }
                if form.files.len() >= limits.max_files {
                    return Err(ApiError::bad_request(format!(
                        "Too many files: at most {} per upload",
                        limits.max_files
                    )));
                }

                form.files.push(IncomingFile {
                    file_name,
                    content_type,
                    data,
                });
            }
            "category" => form.category = Some(field.text().await.map_err(multipart_error)?),
            "amount" => form.amount = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    Ok(form)
}

/// POST /api/files/upload
///
/// Multipart fields: `files` (repeated), optional `category` and `amount`.
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    AuthUser(session): AuthUser,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let form = read_upload_form(multipart, state.files.limits()).await?;
    let count = form.files.len();

    let files = state.files.upload(form).await?;

    tracing::info!(user_id = session.user_id, count, "Upload completed");
    Ok(Json(UploadResponse { files }))
}

/// GET /api/files
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    AuthUser(_session): AuthUser,
    Query(params): Query<FileListQuery>,
) -> Result<Json<FilePage>, ApiError> {
    let query = params.to_file_query()?;
    Ok(Json(state.files.list(&query).await?))
}

/// GET /api/files/:id
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    AuthUser(_session): AuthUser,
    Path(file_id): Path<String>,
) -> Result<Json<FileResponse>, ApiError> {
    let file = state.files.get(&file_id).await?;
    Ok(Json(FileResponse { file }))
}

/// GET /api/files/:id/view
///
/// Public, so view links can be shared.
pub async fn view_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let (record, content) = state.files.open(&file_id).await?;
    let length = content.content_length();

    let body = match content {
        FileContent::Bytes(bytes) => Body::from(bytes),
        FileContent::File { file, .. } => Body::from_stream(ReaderStream::new(file)),
        FileContent::Stream { reader, .. } => Body::from_stream(ReaderStream::new(reader)),
    };

    let mut response = Response::builder().header(header::CONTENT_TYPE, record.mime_type.as_str());
    if let Some(length) = length {
        response = response.header(header::CONTENT_LENGTH, length);
    }

    response
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&record.original_name),
        )
        .body(body)
        .map_err(|e| {
            tracing::error!(file_id = %record.id, "Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

/// DELETE /api/files/:id
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    AuthUser(session): AuthUser,
    Path(file_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let record = state.files.delete(&file_id).await?;
    tracing::info!(user_id = session.user_id, file_id = %record.id, "File removed by user");
    Ok(Json(MessageResponse::new("File deleted successfully")))
}
