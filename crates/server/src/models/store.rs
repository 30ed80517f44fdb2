//! Seller storefront domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cyclemart_core::delivery::DeliverySettings;
use cyclemart_core::{ProfileId, ServiceId, StoreCategoryId, StoreId, decimal_places};

use super::{bounded_text, optional_text};

pub const SLUG_MIN: usize = 3;
pub const SLUG_MAX: usize = 60;
pub const CATEGORY_NAME_MAX: usize = 60;
pub const SERVICE_DURATION_MIN: i32 = 5;
pub const SERVICE_DURATION_MAX: i32 = 1440;

/// A seller's store.
#[derive(Debug, Clone, Serialize)]
pub struct Store {
    pub id: StoreId,
    pub owner_id: ProfileId,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub logo_url: Option<String>,
    pub delivery: DeliverySettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A store-defined grouping of its own listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoreCategory {
    pub id: StoreCategoryId,
    pub store_id: StoreId,
    pub name: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// A workshop service offered by a store (fitting, servicing, ...).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoreService {
    pub id: ServiceId,
    pub store_id: StoreId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub duration_minutes: i32,
    pub created_at: DateTime<Utc>,
}

/// Public store page.
#[derive(Debug, Clone, Serialize)]
pub struct StoreProfile {
    #[serde(flatten)]
    pub store: Store,
    pub categories: Vec<StoreCategory>,
    pub services: Vec<StoreService>,
    pub active_listings: i64,
}

/// Check a store slug: lowercase letters, digits and hyphens, 3–60 long,
/// not starting or ending with a hyphen.
///
/// # Errors
///
/// Returns a message describing the problem.
pub fn validate_slug(slug: &str) -> Result<(), String> {
    let len = slug.len();
    if !(SLUG_MIN..=SLUG_MAX).contains(&len) {
        return Err(format!(
            "slug must be between {SLUG_MIN} and {SLUG_MAX} characters"
        ));
    }
    if !slug
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err("slug may only contain lowercase letters, digits and hyphens".to_string());
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err("slug cannot start or end with a hyphen".to_string());
    }
    Ok(())
}

/// Body of `POST /api/stores`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStore {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub logo_url: Option<String>,
}

impl NewStore {
    /// Validate and normalise the submission.
    ///
    /// # Errors
    ///
    /// Returns a message for a bad slug or name.
    pub fn validate(mut self) -> Result<Self, String> {
        self.slug = self.slug.trim().to_owned();
        validate_slug(&self.slug)?;
        self.name = bounded_text("name", &self.name, 1, 120)?;
        self.description = optional_text(self.description);
        self.location = optional_text(self.location);
        self.logo_url = optional_text(self.logo_url);
        Ok(self)
    }
}

/// Body of `PUT /api/stores/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub logo_url: Option<String>,
}

impl StoreUpdate {
    /// Apply the supplied fields to `store`.
    ///
    /// # Errors
    ///
    /// Returns a message for a blank or oversized name.
    pub fn apply_to(self, store: &mut Store) -> Result<(), String> {
        if let Some(name) = self.name.as_deref() {
            store.name = bounded_text("name", name, 1, 120)?;
        }
        if self.description.is_some() {
            store.description = optional_text(self.description);
        }
        if self.location.is_some() {
            store.location = optional_text(self.location);
        }
        if self.logo_url.is_some() {
            store.logo_url = optional_text(self.logo_url);
        }
        Ok(())
    }
}

/// Body of the store category create and update endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStoreCategory {
    pub name: String,
    #[serde(default)]
    pub position: i32,
}

impl NewStoreCategory {
    /// # Errors
    ///
    /// Returns a message when the name is blank or longer than 60 characters.
    pub fn validate(mut self) -> Result<Self, String> {
        self.name = bounded_text("name", &self.name, 1, CATEGORY_NAME_MAX)?;
        Ok(self)
    }
}

/// Body of the store service create and update endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct NewService {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub duration_minutes: i32,
}

impl NewService {
    /// # Errors
    ///
    /// Returns a message for a blank name, a negative or sub-cent price, or a
    /// duration outside 5–1440 minutes.
    pub fn validate(mut self) -> Result<Self, String> {
        self.name = bounded_text("name", &self.name, 1, 120)?;
        self.description = optional_text(self.description);
        if self.price.is_sign_negative() && !self.price.is_zero() {
            return Err("price cannot be negative".to_string());
        }
        if decimal_places(self.price) > 2 {
            return Err("price cannot have more than two decimal places".to_string());
        }
        if !(SERVICE_DURATION_MIN..=SERVICE_DURATION_MAX).contains(&self.duration_minutes) {
            return Err(format!(
                "duration_minutes must be between {SERVICE_DURATION_MIN} and {SERVICE_DURATION_MAX}"
            ));
        }
        Ok(self)
    }
}
