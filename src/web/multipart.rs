//! Reading chunk uploads from multipart requests.

use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, HeaderMap, StatusCode};

use crate::config::UploadConfig;
use crate::storage::ChunkForm;
use crate::web::error::ApiError;

fn too_large(config: &UploadConfig) -> ApiError {
    ApiError::bad_request(format!(
        "file chunk is too large, limit is {} MB",
        config.max_chunk_size_mb
    ))
}

/// Reject requests whose declared length exceeds the chunk limit.
pub fn check_content_length(headers: &HeaderMap, config: &UploadConfig) -> Result<(), ApiError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    match declared {
        Some(length) if length > config.max_body_bytes() => Err(too_large(config)),
        _ => Ok(()),
    }
}

fn field_error(e: MultipartError, config: &UploadConfig) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return too_large(config);
    }
    tracing::debug!("Failed to read multipart field: {}", e);
    ApiError::bad_request(format!("invalid multipart data: {}", e.body_text()))
}

/// Extract the raw chunk fields from a multipart request.
///
/// The `file` part is read as bytes; `chunkNumber`, `totalChunks`,
/// `filename` and `fileId` as text. Unknown fields are ignored.
pub async fn read_chunk_form<S>(
    req: Request,
    state: &S,
    config: &UploadConfig,
) -> Result<ChunkForm, ApiError>
where
    S: Send + Sync,
{
    check_content_length(req.headers(), config)?;

    let mut multipart = Multipart::from_request(req, state)
        .await
        .map_err(|e| ApiError::bad_request(format!("expected multipart form data: {}", e)))?;

    let mut form = ChunkForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| field_error(e, config))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let bytes = field.bytes().await.map_err(|e| field_error(e, config))?;
                form.file = Some(bytes.to_vec());
            }
            "chunkNumber" | "totalChunks" | "filename" | "fileId" => {
                let value = field.text().await.map_err(|e| field_error(e, config))?;
                match name.as_str() {
                    "chunkNumber" => form.chunk_number = Some(value),
                    "totalChunks" => form.total_chunks = Some(value),
                    "filename" => form.filename = Some(value),
                    _ => form.file_id = Some(value),
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config() -> UploadConfig {
        UploadConfig {
            max_chunk_size_mb: 1,
        }
    }

    #[test]
    fn test_content_length_within_limit() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("1048576"));
        assert!(check_content_length(&headers, &config()).is_ok());

        assert!(check_content_length(&HeaderMap::new(), &config()).is_ok());
    }

    #[test]
    fn test_content_length_over_limit() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("1048577"));

        let err = check_content_length(&headers, &config()).unwrap_err();
        assert_eq!(err.detail(), "file chunk is too large, limit is 1 MB");
    }
}
