//! Route handlers.
//!
//! Handlers receive an already-gated request: rate limiting, token and role
//! checks run as middleware in `server.rs`. Each handler parses its input,
//! calls one service operation and renders the success envelope.

pub mod accounts;
pub mod public;
pub mod system;
pub mod taps;

use axum::extract::Multipart;
use std::collections::HashMap;

use crate::error::AppError;
use crate::media::ImageUpload;

/// Multipart field carrying the tap image.
pub const IMAGE_FIELD: &str = "productPictureFile";

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Invalid multipart body: {}", e.body_text()))
}

/// Split a tap form into text fields and the optional image.
pub async fn read_tap_form(
    mut multipart: Multipart,
) -> Result<(HashMap<String, String>, Option<ImageUpload>), AppError> {
    let mut fields = HashMap::new();
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == IMAGE_FIELD {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(bad_multipart)?;
            // Browsers send an empty part when no file was chosen
            if file_name.is_empty() && bytes.is_empty() {
                continue;
            }
            image = Some(ImageUpload {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field.text().await.map_err(bad_multipart)?;
            fields.insert(name, value);
        }
    }

    Ok((fields, image))
}
