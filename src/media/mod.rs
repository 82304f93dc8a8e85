//! Image storage for catalog items.
//!
//! # Data Flow
//! ```text
//! multipart `productPictureFile`
//!     → validate_image (extension, size)
//!     → ObjectStore::upload(folder, image) → public URL stored on the tap
//!
//! replace / delete:
//!     stored URL → object_path_from_url → ObjectStore::remove (best effort)
//! ```
//!
//! # Design Decisions
//! - Object names are `{folder}/{millis}_{sanitized file name}`; only
//!   `[A-Za-z0-9._-]` survive sanitizing
//! - Removal failures never fail the request that triggered them

pub mod http;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub use self::http::HttpObjectStore;
pub use self::memory::MemoryObjectStore;

const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Error)]
pub enum MediaError {
    /// The file is not an acceptable image.
    #[error("{0}")]
    Rejected(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("remove failed: {0}")]
    Remove(String),

    #[error("not an object URL: {0}")]
    InvalidUrl(String),

    #[error("object store misconfigured: {0}")]
    Config(String),
}

/// An uploaded image held in memory.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    /// Content type to send upstream; derived from the extension when absent.
    pub fn mime(&self) -> String {
        if let Some(ct) = self.content_type.as_deref().filter(|ct| ct.starts_with("image/")) {
            return ct.to_string();
        }
        match self.extension().as_deref() {
            Some("png") => "image/png".to_string(),
            _ => "image/jpeg".to_string(),
        }
    }
}

/// Image object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store the image under `folder` and return its public URL.
    async fn upload(&self, folder: &str, image: &ImageUpload) -> Result<String, MediaError>;

    /// Delete the object a public URL points at.
    async fn remove(&self, url: &str) -> Result<(), MediaError>;
}

/// Accept jpg/jpeg/png files up to `max_bytes`.
pub fn validate_image(image: &ImageUpload, max_bytes: usize) -> Result<(), MediaError> {
    let allowed = image
        .extension()
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));
    if !allowed {
        return Err(MediaError::Rejected(
            "Only .jpg, .jpeg and .png images are allowed".to_string(),
        ));
    }
    if image.bytes.is_empty() {
        return Err(MediaError::Rejected("Image file is empty".to_string()));
    }
    if image.bytes.len() > max_bytes {
        return Err(MediaError::Rejected(format!(
            "Image exceeds the maximum size of {max_bytes} bytes"
        )));
    }
    Ok(())
}

/// Keep `[A-Za-z0-9._-]`, replace everything else with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

pub fn object_name(folder: &str, file_name: &str, now_ms: i64) -> String {
    format!(
        "{}/{}_{}",
        folder.trim_matches('/'),
        now_ms,
        sanitize_file_name(file_name)
    )
}

/// Object path of a public URL: its path without the leading bucket segment.
pub fn object_path_from_url(url: &str) -> Result<String, MediaError> {
    let parsed = Url::parse(url).map_err(|_| MediaError::InvalidUrl(url.to_string()))?;
    let mut segments = parsed
        .path_segments()
        .ok_or_else(|| MediaError::InvalidUrl(url.to_string()))?
        .filter(|s| !s.is_empty());

    // Leading segment is the bucket
    segments
        .next()
        .ok_or_else(|| MediaError::InvalidUrl(url.to_string()))?;

    let path = segments.collect::<Vec<_>>().join("/");
    if path.is_empty() {
        return Err(MediaError::InvalidUrl(url.to_string()));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str, len: usize) -> ImageUpload {
        ImageUpload {
            file_name: name.to_string(),
            content_type: None,
            bytes: vec![0u8; len],
        }
    }

    #[test]
    fn test_validate_image() {
        assert!(validate_image(&image("a.PNG", 10), 100).is_ok());
        assert!(validate_image(&image("a.jpeg", 100), 100).is_ok());
        assert!(validate_image(&image("a.gif", 10), 100).is_err());
        assert!(validate_image(&image("noext", 10), 100).is_err());
        assert!(validate_image(&image("a.jpg", 0), 100).is_err());

        let err = validate_image(&image("a.jpg", 101), 100).unwrap_err();
        assert!(err.to_string().contains("100 bytes"));
    }

    #[test]
    fn test_object_names() {
        assert_eq!(sanitize_file_name("my photo (1).jpg"), "my_photo__1_.jpg");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name(".."), "image");
        assert_eq!(object_name("/taps/", "a b.png", 42), "taps/42_a_b.png");
    }

    #[test]
    fn test_object_path_from_url() {
        assert_eq!(
            object_path_from_url("https://storage.example.com/bucket/taps/42_a.png").unwrap(),
            "taps/42_a.png"
        );
        assert!(object_path_from_url("https://storage.example.com/bucket").is_err());
        assert!(object_path_from_url("not a url").is_err());
    }

    #[test]
    fn test_mime_fallback() {
        assert_eq!(image("a.png", 1).mime(), "image/png");
        assert_eq!(image("a.jpg", 1).mime(), "image/jpeg");
        let typed = ImageUpload {
            content_type: Some("image/png".into()),
            ..image("a.jpg", 1)
        };
        assert_eq!(typed.mime(), "image/png");
    }
}
