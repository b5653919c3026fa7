//! Uploaded files (user avatars), stored under the configured upload
//! directory and served from `/uploads`.

use std::path::Path;

use thiserror::Error;
use uuid::Uuid;

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// URL prefix uploads are served under.
pub const UPLOADS_PREFIX: &str = "/uploads";

/// Errors that can occur while storing an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file is empty")]
    Empty,

    #[error("file exceeds {MAX_UPLOAD_BYTES} bytes")]
    TooLarge,

    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// File extension for an accepted image content type.
fn extension_for(content_type: &str) -> Result<&'static str, UploadError> {
    match content_type {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/gif" => Ok("gif"),
        "image/webp" => Ok("webp"),
        other => Err(UploadError::UnsupportedType(other.to_owned())),
    }
}

/// Store an image under `<upload_dir>/<folder>/` with a random name and
/// return its public URL.
///
/// # Errors
///
/// Returns `UploadError` if the file is empty, too large, not an accepted
/// image type, or cannot be written.
pub async fn store_image(
    upload_dir: &Path,
    folder: &str,
    content_type: &str,
    bytes: &[u8],
) -> Result<String, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge);
    }
    let extension = extension_for(content_type)?;

    let dir = upload_dir.join(folder);
    tokio::fs::create_dir_all(&dir).await?;

    let file_name = format!("{}.{extension}", Uuid::new_v4());
    tokio::fs::write(dir.join(&file_name), bytes).await?;

    Ok(format!("{UPLOADS_PREFIX}/{folder}/{file_name}"))
}
