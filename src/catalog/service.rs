use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{LiquidType, NewTap, Tap, TapFilter, TapPatch};
use crate::error::AppError;
use crate::media::{validate_image, ImageUpload, MediaError, ObjectStore};
use crate::store::Store;

/// Dashboard counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total_taps: usize,
    pub taps_by_liquid_type: BTreeMap<&'static str, usize>,
    pub total_users: usize,
}

fn rejected(e: MediaError) -> AppError {
    match e {
        MediaError::Rejected(message) => AppError::Validation(message),
        other => AppError::internal("Failed to upload image", other),
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Tap not found".to_string())
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
    media: Arc<dyn ObjectStore>,
    folder: String,
    max_image_bytes: usize,
}

impl CatalogService {
    pub fn new(
        store: Arc<dyn Store>,
        media: Arc<dyn ObjectStore>,
        folder: impl Into<String>,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            store,
            media,
            folder: folder.into(),
            max_image_bytes,
        }
    }

    /// Every tap, active or not.
    pub async fn list(&self) -> Result<Vec<Tap>, AppError> {
        self.store
            .list_taps()
            .await
            .map_err(|e| AppError::store("list_taps", "Failed to fetch taps", e))
    }

    /// Active taps, optionally narrowed to one liquid type.
    pub async fn list_public(&self, category: Option<&str>) -> Result<Vec<Tap>, AppError> {
        let category = category
            .filter(|c| !c.is_empty())
            .map(str::parse::<LiquidType>)
            .transpose()?;

        let taps = match category {
            Some(liquid) => self.store.list_taps_in_category(liquid).await,
            None => self.store.list_taps().await,
        }
        .map_err(|e| AppError::store("list_taps", "Failed to fetch taps", e))?;

        Ok(taps.into_iter().filter(Tap::is_active).collect())
    }

    pub async fn get(&self, id: &str) -> Result<Tap, AppError> {
        self.store
            .get_tap(id)
            .await
            .map_err(|e| AppError::store("get_tap", "Failed to fetch tap", e))?
            .ok_or_else(not_found)
    }

    /// Spec search over all taps. An empty filter is a validation error and
    /// an empty result is a 404.
    pub async fn query(&self, filter: &TapFilter) -> Result<Vec<Tap>, AppError> {
        if filter.is_empty() {
            return Err(AppError::Validation(
                "At least one search field must be provided.".to_string(),
            ));
        }

        let matches: Vec<Tap> = self
            .store
            .list_taps()
            .await
            .map_err(|e| AppError::store("query_taps", "Failed to process query request.", e))?
            .into_iter()
            .filter(|tap| filter.matches(tap))
            .collect();

        if matches.is_empty() {
            return Err(AppError::NotFound(
                "No matching taps found for your specifications.".to_string(),
            ));
        }
        Ok(matches)
    }

    pub async fn create(
        &self,
        actor: &str,
        form: &HashMap<String, String>,
        image: Option<ImageUpload>,
    ) -> Result<Tap, AppError> {
        let new_tap = NewTap::from_form(form)?;
        let image = image.ok_or_else(|| {
            AppError::Validation("Missing required fields or image file".to_string())
        })?;
        validate_image(&image, self.max_image_bytes).map_err(rejected)?;

        let image_url = self.media.upload(&self.folder, &image).await.map_err(rejected)?;

        let tap = new_tap.into_tap(Uuid::new_v4().to_string(), image_url, actor, Utc::now());
        if let Err(e) = self.store.create_tap(&tap).await {
            self.discard_image(&tap.image_url).await;
            return Err(AppError::store("create_tap", "Failed to create tap", e));
        }

        tracing::info!(id = %tap.id, liquid_type = %tap.liquid_type, created_by = %actor, "Tap created");
        Ok(tap)
    }

    /// Apply the supplied fields. A new image is uploaded before the record
    /// is written; the previous object is removed afterwards.
    pub async fn update(
        &self,
        actor: &str,
        id: &str,
        form: &HashMap<String, String>,
        image: Option<ImageUpload>,
    ) -> Result<Tap, AppError> {
        let patch = TapPatch::from_form(form)?;
        if let Some(image) = &image {
            validate_image(image, self.max_image_bytes).map_err(rejected)?;
        }

        let mut tap = self.get(id).await?;
        let previous_category = tap.liquid_type;
        let previous_image = tap.image_url.clone();

        let replaced = match &image {
            Some(image) => {
                tap.image_url = self.media.upload(&self.folder, image).await.map_err(rejected)?;
                true
            }
            None => false,
        };
        tap.apply(patch, actor, Utc::now());

        if let Err(e) = self.store.save_tap(&tap, previous_category).await {
            if replaced {
                self.discard_image(&tap.image_url).await;
            }
            return Err(AppError::store("update_tap", "Failed to update tap", e));
        }
        if replaced {
            self.discard_image(&previous_image).await;
        }

        tracing::info!(id = %tap.id, updated_by = %actor, image_replaced = replaced, "Tap updated");
        Ok(tap)
    }

    pub async fn delete(&self, actor: &str, id: &str) -> Result<(), AppError> {
        let tap = self.get(id).await?;
        self.discard_image(&tap.image_url).await;

        let removed = self
            .store
            .delete_tap(id)
            .await
            .map_err(|e| AppError::store("delete_tap", "Failed to delete tap", e))?;
        if !removed {
            return Err(not_found());
        }

        tracing::info!(id = %id, deleted_by = %actor, "Tap deleted");
        Ok(())
    }

    pub async fn stats(&self) -> Result<CatalogStats, AppError> {
        let taps = self.list().await?;
        let total_users = self
            .store
            .count_accounts()
            .await
            .map_err(|e| AppError::store("stats", "Failed to fetch statistics", e))?;

        let mut by_liquid: BTreeMap<&'static str, usize> =
            LiquidType::ALL.iter().map(|l| (l.as_str(), 0)).collect();
        for tap in &taps {
            *by_liquid.entry(tap.liquid_type.as_str()).or_default() += 1;
        }

        Ok(CatalogStats {
            total_taps: taps.len(),
            taps_by_liquid_type: by_liquid,
            total_users,
        })
    }

    /// Best-effort object removal; failures are logged only.
    async fn discard_image(&self, url: &str) {
        if url.is_empty() {
            return;
        }
        if let Err(e) = self.media.remove(url).await {
            tracing::warn!(url = %url, error = %e, "Failed to remove image, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TapStatus;
    use crate::error::codes;
    use crate::media::MemoryObjectStore;
    use crate::store::MemoryStore;

    const ADMIN: &str = "admin@x.com";

    struct Fixture {
        catalog: CatalogService,
        store: Arc<MemoryStore>,
        media: Arc<MemoryObjectStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let media = Arc::new(MemoryObjectStore::default());
        let catalog = CatalogService::new(store.clone(), media.clone(), "taps", 1024);
        Fixture {
            catalog,
            store,
            media,
        }
    }

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn tap_form(liquid: &str) -> HashMap<String, String> {
        form(&[
            ("title", "Brass Keg Tap"),
            ("container_type", "Keg"),
            ("material", "Brass"),
            ("size", "3/4"),
            ("flow_rate", "Fast"),
            ("liquid_type", liquid),
            ("description", "Classic tap"),
        ])
    }

    fn png(name: &str) -> ImageUpload {
        ImageUpload {
            file_name: name.to_string(),
            content_type: Some("image/png".to_string()),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[tokio::test]
    async fn test_create_indexes_and_uploads() {
        let f = fixture();
        let tap = f
            .catalog
            .create(ADMIN, &tap_form("Wine"), Some(png("tap.png")))
            .await
            .unwrap();

        assert!(Uuid::parse_str(&tap.id).is_ok());
        assert_eq!(tap.created_by, ADMIN);
        assert!(f.media.contains(&tap.image_url));
        assert_eq!(f.store.category_ids(LiquidType::Wine), vec![tap.id.clone()]);
        assert_eq!(f.catalog.get(&tap.id).await.unwrap(), tap);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let f = fixture();

        let err = f.catalog.create(ADMIN, &tap_form("Wine"), None).await.unwrap_err();
        assert_eq!(err.code(), codes::VALIDATION_FAILED);

        let err = f
            .catalog
            .create(ADMIN, &tap_form("Beer"), Some(png("tap.png")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Water, Oil, or Wine"));

        let err = f
            .catalog
            .create(ADMIN, &tap_form("Oil"), Some(png("tap.gif")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::VALIDATION_FAILED);

        let mut big = png("tap.png");
        big.bytes = vec![0; 2048];
        let err = f.catalog.create(ADMIN, &tap_form("Oil"), Some(big)).await.unwrap_err();
        assert_eq!(err.code(), codes::VALIDATION_FAILED);

        assert!(f.media.is_empty());
        assert!(f.catalog.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_failure_is_internal() {
        let f = fixture();
        f.media.set_failing(true);
        let err = f
            .catalog
            .create(ADMIN, &tap_form("Water"), Some(png("tap.png")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::INTERNAL_ERROR);
        assert!(f.catalog.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_moves_category_and_replaces_image() {
        let f = fixture();
        let tap = f
            .catalog
            .create(ADMIN, &tap_form("Water"), Some(png("old.png")))
            .await
            .unwrap();

        let updated = f
            .catalog
            .update(
                "editor@x.com",
                &tap.id,
                &form(&[("liquid_type", "Oil"), ("title", "Renamed")]),
                Some(png("new.jpg")),
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.material, "Brass");
        assert_eq!(updated.updated_by.as_deref(), Some("editor@x.com"));
        assert_ne!(updated.image_url, tap.image_url);
        assert!(f.media.contains(&updated.image_url));
        assert!(!f.media.contains(&tap.image_url));
        assert!(f.store.category_ids(LiquidType::Water).is_empty());
        assert_eq!(f.store.category_ids(LiquidType::Oil), vec![tap.id.clone()]);
    }

    #[tokio::test]
    async fn test_update_unknown_tap() {
        let f = fixture();
        let err = f
            .catalog
            .update(ADMIN, "missing", &form(&[("title", "x")]), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_survives_image_failure() {
        let f = fixture();
        let tap = f
            .catalog
            .create(ADMIN, &tap_form("Wine"), Some(png("tap.png")))
            .await
            .unwrap();

        f.media.set_failing(true);
        f.catalog.delete(ADMIN, &tap.id).await.unwrap();

        assert!(f.catalog.get(&tap.id).await.is_err());
        assert!(f.store.category_ids(LiquidType::Wine).is_empty());
        let err = f.catalog.delete(ADMIN, &tap.id).await.unwrap_err();
        assert_eq!(err.code(), codes::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_public_listing_and_query() {
        let f = fixture();
        let wine = f
            .catalog
            .create(ADMIN, &tap_form("Wine"), Some(png("a.png")))
            .await
            .unwrap();
        let water = f
            .catalog
            .create(ADMIN, &tap_form("Water"), Some(png("b.png")))
            .await
            .unwrap();
        f.catalog
            .update(ADMIN, &water.id, &form(&[("status", "inactive")]), None)
            .await
            .unwrap();

        let public = f.catalog.list_public(None).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].id, wine.id);
        assert!(f.catalog.list_public(Some("Water")).await.unwrap().is_empty());
        assert!(f.catalog.list_public(Some("Beer")).await.is_err());

        let inactive = f.catalog.get(&water.id).await.unwrap();
        assert_eq!(inactive.status, TapStatus::Inactive);

        let err = f.catalog.query(&TapFilter::default()).await.unwrap_err();
        assert_eq!(err.code(), codes::VALIDATION_FAILED);

        let by_liquid = TapFilter {
            liquid_type: Some("Wine".into()),
            ..Default::default()
        };
        assert_eq!(f.catalog.query(&by_liquid).await.unwrap().len(), 1);

        let none = TapFilter {
            material: Some("Steel".into()),
            ..Default::default()
        };
        assert_eq!(
            f.catalog.query(&none).await.unwrap_err().code(),
            codes::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_stats() {
        let f = fixture();
        for liquid in ["Wine", "Wine", "Oil"] {
            f.catalog
                .create(ADMIN, &tap_form(liquid), Some(png("t.png")))
                .await
                .unwrap();
        }

        let stats = f.catalog.stats().await.unwrap();
        assert_eq!(stats.total_taps, 3);
        assert_eq!(stats.taps_by_liquid_type["Wine"], 2);
        assert_eq!(stats.taps_by_liquid_type["Water"], 0);
        assert_eq!(stats.total_users, 0);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["tapsByLiquidType"]["Oil"], 1);
        assert_eq!(json["totalTaps"], 3);
    }
}
