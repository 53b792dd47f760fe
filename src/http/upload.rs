use actix_multipart::Multipart;
use futures_util::TryStreamExt;

use crate::error::ApiError;

// ============================================================================
// Image Uploads
// ============================================================================
//
// One image field is read from a multipart body into memory, up to
// MAX_UPLOAD_BYTES. The declared content type and the leading bytes must
// both say "image" before anything is handed to object storage.
//
// ============================================================================

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub extension: &'static str,
}

/// Read the image in `field_name`; other fields are skipped
pub async fn read_image(mut payload: Multipart, field_name: &str) -> Result<ImageUpload, ApiError> {
    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        if field.name() != Some(field_name) {
            continue;
        }

        let declared = field
            .content_type()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_default();
        let (content_type, extension) = ALLOWED_TYPES
            .iter()
            .find(|(mime, _)| *mime == declared)
            .copied()
            .ok_or_else(not_an_image)?;

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
            if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(ApiError::bad_request("File too large (max 5 MB)"));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(ApiError::bad_request("Uploaded file is empty"));
        }
        if sniff(&bytes) != Some(content_type) {
            return Err(not_an_image());
        }

        return Ok(ImageUpload {
            bytes,
            content_type,
            extension,
        });
    }

    Err(ApiError::bad_request(format!("No file uploaded in field '{field_name}'")))
}

/// Content type from magic bytes
fn sniff(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        _ => None,
    }
}

fn not_an_image() -> ApiError {
    ApiError::bad_request("Only image files are allowed (jpeg, png, gif, webp)")
}

fn multipart_error(e: actix_multipart::MultipartError) -> ApiError {
    ApiError::bad_request(format!("Invalid upload: {e}"))
}
