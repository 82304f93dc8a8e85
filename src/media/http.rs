//! Object storage over the JSON storage API.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use url::Url;

use crate::config::StorageConfig;
use crate::media::{object_name, object_path_from_url, ImageUpload, MediaError, ObjectStore};

pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: Url,
    public_base_url: String,
    bucket: String,
    access_token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(config: &StorageConfig) -> Result<Self, MediaError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| MediaError::Config(format!("endpoint {}: {e}", config.endpoint)))?;
        if endpoint.cannot_be_a_base() {
            return Err(MediaError::Config(format!("endpoint {} is not a base URL", config.endpoint)));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MediaError::Config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// `{endpoint}/{segments...}`, each segment percent-encoded.
    fn api_url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub fn public_url(&self, object: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket, object)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(&self, folder: &str, image: &ImageUpload) -> Result<String, MediaError> {
        let object = object_name(folder, &image.file_name, Utc::now().timestamp_millis());

        let mut url = self.api_url(&["upload", "storage", "v1", "b", &self.bucket, "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", &object);

        let response = self
            .authorize(self.client.post(url))
            .header(CONTENT_TYPE, image.mime())
            .body(image.bytes.clone())
            .send()
            .await
            .map_err(|e| MediaError::Upload(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Upload(format!("status {status}: {body}")));
        }

        tracing::info!(object = %object, bytes = image.bytes.len(), "Image uploaded");
        Ok(self.public_url(&object))
    }

    async fn remove(&self, url: &str) -> Result<(), MediaError> {
        let object = object_path_from_url(url)?;
        let target = self.api_url(&["storage", "v1", "b", &self.bucket, "o", &object]);

        let response = self
            .authorize(self.client.delete(target))
            .send()
            .await
            .map_err(|e| MediaError::Remove(e.to_string()))?;

        let status = response.status();
        // Already gone counts as removed
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(MediaError::Remove(format!("status {status}")));
        }

        tracing::info!(object = %object, "Image removed");
        Ok(())
    }
}
