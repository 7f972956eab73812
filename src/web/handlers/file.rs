//! File handlers for Web API.

use axum::{
    body::Body,
    extract::{FromRequest, Path, Query, Request, State},
    http::header,
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::storage::{
    new_file_id, unix_now, ChunkAssembler, FileMetadata, FileUpdate, MetadataUpdate, Page,
    UploadResult,
};
use crate::web::dto::{PaginationQuery, StatusResponse, ValidatedJson};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::multipart::read_chunk_form;

/// Generate a safe Content-Disposition header value for file downloads.
///
/// Control characters are stripped and quotes/backslashes replaced in the
/// plain `filename` parameter; non-ASCII names additionally get an RFC 5987
/// `filename*` parameter.
fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' => '_',
            '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && !filename.chars().any(|c| c.is_control() || c == '"' || c == '\\') {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let encoded = urlencoding::encode(filename);

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    )
}

fn is_json(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false)
}

/// GET / - Liveness probe.
pub async fn root() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}

/// POST /files - Upload one chunk.
///
/// Request body: multipart/form-data with a `file` part and the fields
/// `chunkNumber`, `totalChunks`, `filename` and, after the first chunk,
/// `fileId`.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<Json<UploadResult>, ApiError> {
    let form = read_chunk_form(req, &state, &state.upload).await?;
    let chunk = ChunkAssembler::assemble(form, &new_file_id(), unix_now())?;

    tracing::debug!(
        backend = state.backend.name(),
        file_id = %chunk.file_id,
        chunk = chunk.ordinal,
        last = chunk.is_last,
        "Upload chunk"
    );

    let result = state.backend.upload_file(chunk).await?;
    Ok(Json(result))
}

/// GET /files - List file metadata page by page.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<FileMetadata>>, ApiError> {
    let request = query.to_page_request(&state.pagination);
    let page = state.backend.get_all_files(request).await?;
    Ok(Json(page))
}

/// GET /files/:id - Download the full file content.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Response<Body>, ApiError> {
    let stored = state.backend.get_file(&file_id).await?;

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&stored.metadata.display_name()),
        )
        .header(header::CONTENT_LENGTH, stored.content.len())
        .body(Body::from(stored.content))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })?;

    Ok(response)
}

/// GET /files/:id/metadata - Metadata record of one file.
pub async fn get_file_metadata(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<FileMetadata>, ApiError> {
    let metadata = state.backend.get_file_metadata(&file_id).await?;
    Ok(Json(metadata))
}

/// PUT /files/:id - Rename a file or replace its content.
///
/// An `application/json` body `{"filename": ...}` renames the file and
/// leaves the content untouched. A multipart body replaces the content
/// in place: chunk 1 overwrites, later chunks append.
pub async fn update_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    req: Request,
) -> Result<Json<UploadResult>, ApiError> {
    let update = if is_json(&req) {
        let ValidatedJson(update) =
            ValidatedJson::<MetadataUpdate>::from_request(req, &state).await?;
        FileUpdate::Metadata(update)
    } else {
        let mut form = read_chunk_form(req, &state, &state.upload).await?;
        form.file_id = Some(file_id.clone());
        FileUpdate::Content(ChunkAssembler::assemble(form, &file_id, unix_now())?)
    };

    let result = state.backend.update_file(&file_id, update).await?;
    Ok(Json(result))
}

/// GET|PUT|DELETE /files/ - Path without a file identifier.
pub async fn missing_file_id() -> ApiError {
    ApiError::bad_request("File ID is required")
}

/// DELETE /files/:id - Remove a file and its metadata.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.backend.delete_file(&file_id).await?;
    Ok(Json(StatusResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http;

    #[test]
    fn test_content_disposition_header_simple_ascii() {
        let result = content_disposition_header("report.pdf");
        assert_eq!(result, "attachment; filename=\"report.pdf\"");
    }

    #[test]
    fn test_content_disposition_header_without_extension() {
        let result = content_disposition_header("README");
        assert_eq!(result, "attachment; filename=\"README\"");
    }

    #[test]
    fn test_content_disposition_header_unicode() {
        let result = content_disposition_header("日本語ファイル.txt");
        assert!(result.starts_with("attachment; filename=\""));
        assert!(result.contains("filename*=UTF-8''"));
        assert!(result.contains("%E6%97%A5%E6%9C%AC%E8%AA%9E"));
    }

    #[test]
    fn test_content_disposition_header_quote_and_backslash() {
        let result = content_disposition_header("a\"b\\c.txt");
        assert!(result.contains("filename=\"a_b_c.txt\""));
        assert!(result.contains("%22"));
    }

    #[test]
    fn test_content_disposition_header_control_characters() {
        let result = content_disposition_header("test\r\nX-Injected: bad.txt");
        assert!(!result.contains('\r'));
        assert!(!result.contains('\n'));
        assert!(result.starts_with("attachment; filename="));
    }

    #[test]
    fn test_is_json() {
        let req = http::Request::builder()
            .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(Body::empty())
            .unwrap();
        assert!(is_json(&req));

        let req = http::Request::builder()
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=x")
            .body(Body::empty())
            .unwrap();
        assert!(!is_json(&req));

        let req = http::Request::builder().body(Body::empty()).unwrap();
        assert!(!is_json(&req));
    }
}
