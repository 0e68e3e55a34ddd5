// ============================================================================
// Media Configuration
// ============================================================================

use crate::constants::MAX_UPLOAD_SIZE;

/// Local image storage for chat attachments
#[derive(Clone, Debug)]
pub struct MediaConfig {
    /// Directory uploaded files are written to
    pub upload_dir: String,
    /// Public base URL the returned links are built from (e.g., "https://chat.example.com")
    pub public_base_url: String,
    /// Maximum file size in bytes
    pub max_file_size: usize,
}

impl MediaConfig {
    pub(crate) fn from_env(port: u16) -> Self {
        Self {
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("http://localhost:{}", port)),
            max_file_size: std::env::var("MEDIA_MAX_FILE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_UPLOAD_SIZE),
        }
    }
}
