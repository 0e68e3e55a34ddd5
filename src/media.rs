// ============================================================================
// Chat image storage
// ============================================================================
//
// Images are uploaded over HTTP before a message is sent; the message then
// carries only the returned URL. Files land in a local directory served
// back under /uploads.
//
// ============================================================================

use async_trait::async_trait;
use pairchat_config::MediaConfig;
use pairchat_error::{AppError, AppResult};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Public path segment stored files are served under
pub const UPLOADS_ROUTE: &str = "/uploads";

#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Store an image and return the public URL for it
    async fn store_image(
        &self,
        file_name: Option<&str>,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> AppResult<String>;
}

pub struct DiskMediaStorage {
    upload_dir: PathBuf,
    public_base_url: String,
    max_file_size: usize,
}

impl DiskMediaStorage {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            upload_dir: PathBuf::from(&config.upload_dir),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            max_file_size: config.max_file_size,
        }
    }
}

/// File extension for an accepted image upload
fn image_extension(file_name: Option<&str>, content_type: Option<&str>) -> Option<&'static str> {
    let from_mime = match content_type.map(|c| c.to_ascii_lowercase()) {
        Some(mime) if mime == "image/png" => Some("png"),
        Some(mime) if mime == "image/jpeg" || mime == "image/jpg" => Some("jpg"),
        Some(mime) if mime == "image/gif" => Some("gif"),
        Some(mime) if mime == "image/webp" => Some("webp"),
        Some(mime) if !mime.starts_with("image/") && mime != "application/octet-stream" => {
            return None
        }
        _ => None,
    };
    if from_mime.is_some() {
        return from_mime;
    }

    let extension = file_name?.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("png"),
        "jpg" | "jpeg" => Some("jpg"),
        "gif" => Some("gif"),
        "webp" => Some("webp"),
        _ => None,
    }
}

#[async_trait]
impl MediaStorage for DiskMediaStorage {
    async fn store_image(
        &self,
        file_name: Option<&str>,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> AppResult<String> {
        if bytes.is_empty() {
            return Err(AppError::upload("empty file"));
        }
        if bytes.len() > self.max_file_size {
            return Err(AppError::upload(format!(
                "file exceeds {} bytes",
                self.max_file_size
            )));
        }
        let extension = image_extension(file_name, content_type)
            .ok_or_else(|| AppError::upload("only png, jpeg, gif and webp images are accepted"))?;

        fs::create_dir_all(&self.upload_dir).await?;
        let stored_name = format!("{}.{}", Uuid::new_v4(), extension);
        let mut file = fs::File::create(self.upload_dir.join(&stored_name)).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        tracing::info!(
            file = %stored_name,
            size_bytes = bytes.len(),
            "Chat image stored"
        );

        Ok(format!(
            "{}{}/{}",
            self.public_base_url, UPLOADS_ROUTE, stored_name
        ))
    }
}
