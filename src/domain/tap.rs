//! Catalog items ("taps").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Liquid a tap is built for; doubles as the catalog category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiquidType {
    Water,
    Oil,
    Wine,
}

impl LiquidType {
    pub const ALL: [LiquidType; 3] = [LiquidType::Water, LiquidType::Oil, LiquidType::Wine];

    pub fn as_str(&self) -> &'static str {
        match self {
            LiquidType::Water => "Water",
            LiquidType::Oil => "Oil",
            LiquidType::Wine => "Wine",
        }
    }
}

impl fmt::Display for LiquidType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LiquidType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Water" => Ok(LiquidType::Water),
            "Oil" => Ok(LiquidType::Oil),
            "Wine" => Ok(LiquidType::Wine),
            _ => Err(AppError::Validation(
                "Invalid liquid type, must be: Water, Oil, or Wine".to_string(),
            )),
        }
    }
}

/// Listing visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TapStatus {
    #[default]
    Active,
    Inactive,
}

impl TapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TapStatus::Active => "active",
            TapStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for TapStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TapStatus::Active),
            "inactive" => Ok(TapStatus::Inactive),
            _ => Err(AppError::Validation(
                "Invalid status, must be: active or inactive".to_string(),
            )),
        }
    }
}

/// A persisted catalog item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tap {
    pub id: String,
    pub title: String,
    pub container_type: String,
    pub material: String,
    pub size: String,
    pub flow_rate: String,
    pub liquid_type: LiquidType,
    pub description: String,
    pub image_url: String,
    pub status: TapStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl Tap {
    pub fn is_active(&self) -> bool {
        self.status == TapStatus::Active
    }

    /// Apply a partial update, stamping the editor.
    pub fn apply(&mut self, patch: TapPatch, actor: &str, now: DateTime<Utc>) {
        if let Some(v) = patch.title {
            self.title = v;
        }
        if let Some(v) = patch.container_type {
            self.container_type = v;
        }
        if let Some(v) = patch.material {
            self.material = v;
        }
        if let Some(v) = patch.size {
            self.size = v;
        }
        if let Some(v) = patch.flow_rate {
            self.flow_rate = v;
        }
        if let Some(v) = patch.liquid_type {
            self.liquid_type = v;
        }
        if let Some(v) = patch.description {
            self.description = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        self.updated_at = now;
        self.updated_by = Some(actor.to_string());
    }
}

/// Validated input for creating a tap (image handled separately).
#[derive(Debug, Clone, PartialEq)]
pub struct NewTap {
    pub title: String,
    pub container_type: String,
    pub material: String,
    pub size: String,
    pub flow_rate: String,
    pub liquid_type: LiquidType,
    pub description: String,
    pub status: TapStatus,
}

impl NewTap {
    /// Build from multipart text fields. Every descriptive field is required.
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, AppError> {
        let field = |name: &str| -> Option<String> {
            form.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let missing = || AppError::Validation("Missing required fields or image file".to_string());

        let liquid_type = field("liquid_type").ok_or_else(missing)?.parse()?;
        let status = match field("status") {
            Some(s) => s.parse()?,
            None => TapStatus::Active,
        };

        Ok(Self {
            title: field("title").ok_or_else(missing)?,
            container_type: field("container_type").ok_or_else(missing)?,
            material: field("material").ok_or_else(missing)?,
            size: field("size").ok_or_else(missing)?,
            flow_rate: field("flow_rate").ok_or_else(missing)?,
            liquid_type,
            description: field("description").ok_or_else(missing)?,
            status,
        })
    }

    pub fn into_tap(self, id: String, image_url: String, actor: &str, now: DateTime<Utc>) -> Tap {
        Tap {
            id,
            title: self.title,
            container_type: self.container_type,
            material: self.material,
            size: self.size,
            flow_rate: self.flow_rate,
            liquid_type: self.liquid_type,
            description: self.description,
            image_url,
            status: self.status,
            created_at: now,
            updated_at: now,
            created_by: actor.to_string(),
            updated_by: None,
        }
    }
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TapPatch {
    pub title: Option<String>,
    pub container_type: Option<String>,
    pub material: Option<String>,
    pub size: Option<String>,
    pub flow_rate: Option<String>,
    pub liquid_type: Option<LiquidType>,
    pub description: Option<String>,
    pub status: Option<TapStatus>,
}

impl TapPatch {
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, AppError> {
        let field = |name: &str| form.get(name).cloned();
        Ok(Self {
            title: field("title"),
            container_type: field("container_type"),
            material: field("material"),
            size: field("size"),
            flow_rate: field("flow_rate"),
            liquid_type: field("liquid_type").map(|v| v.parse()).transpose()?,
            description: field("description"),
            status: field("status").map(|v| v.parse()).transpose()?,
        })
    }
}

/// Public spec search. Field names follow the front-end form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TapFilter {
    pub container_type: Option<String>,
    pub material: Option<String>,
    pub size: Option<String>,
    pub flow: Option<String>,
    pub liquid_type: Option<String>,
}

impl TapFilter {
    pub fn is_empty(&self) -> bool {
        [
            &self.container_type,
            &self.material,
            &self.size,
            &self.flow,
            &self.liquid_type,
        ]
        .iter()
        .all(|f| f.as_deref().map_or(true, str::is_empty))
    }

    /// Exact match on every supplied field.
    pub fn matches(&self, tap: &Tap) -> bool {
        fn check(filter: &Option<String>, value: &str) -> bool {
            match filter.as_deref() {
                Some(f) if !f.is_empty() => f == value,
                _ => true,
            }
        }
        check(&self.container_type, &tap.container_type)
            && check(&self.material, &tap.material)
            && check(&self.size, &tap.size)
            && check(&self.flow, &tap.flow_rate)
            && check(&self.liquid_type, tap.liquid_type.as_str())
    }
}
