//! Listing domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cyclemart_core::images::ResolvedImage;
use cyclemart_core::similarity::ProductAttributes;
use cyclemart_core::{
    CategoryId, ProductCondition, ProductId, ProductStatus, StoreCategoryId, StoreId,
    decimal_places,
};

use super::{bounded_text, optional_text};

pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 140;
pub const DEFAULT_PER_PAGE: u32 = 24;
pub const MAX_PER_PAGE: u32 = 100;

/// A bike listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub category_id: CategoryId,
    pub subcategory_id: Option<CategoryId>,
    pub level3_category_id: Option<CategoryId>,
    pub store_category_id: Option<StoreCategoryId>,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub status: ProductStatus,
    pub condition: Option<ProductCondition>,
    pub bike_type: Option<String>,
    pub frame_size: Option<String>,
    pub brand: Option<String>,
    pub images_curated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The attributes used by similar-products scoring.
    #[must_use]
    pub fn attributes(&self) -> ProductAttributes {
        ProductAttributes {
            id: self.id,
            category_id: Some(self.category_id),
            subcategory_id: self.subcategory_id,
            level3_category_id: self.level3_category_id,
            bike_type: self.bike_type.clone(),
            frame_size: self.frame_size.clone(),
            price: self.price,
            condition: self.condition,
            brand: self.brand.clone(),
            created_at: self.created_at,
        }
    }
}

/// A listing in search results, with its primary image.
#[derive(Debug, Clone, Serialize)]
pub struct ProductListItem {
    #[serde(flatten)]
    pub product: Product,
    pub primary_image_url: Option<String>,
}

/// A listing with its reconciled images.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub images: Vec<ResolvedImage>,
}

/// A listing ranked against another one.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarProduct {
    #[serde(flatten)]
    pub product: Product,
    pub score: u32,
}

/// A listing waiting in the image curation queue.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CurationQueueItem {
    pub id: ProductId,
    pub title: String,
    pub status: ProductStatus,
    pub images_curated: bool,
    pub pending_images: i64,
    pub total_images: i64,
    pub updated_at: DateTime<Utc>,
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Sort order for listing search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
}

impl ProductSort {
    /// SQL `ORDER BY` clause for this sort.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id",
            Self::PriceAsc => "p.price ASC, p.created_at DESC, p.id",
            Self::PriceDesc => "p.price DESC, p.created_at DESC, p.id",
        }
    }
}

/// Query parameters for `GET /api/products`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<CategoryId>,
    pub subcategory: Option<CategoryId>,
    pub bike_type: Option<String>,
    pub condition: Option<ProductCondition>,
    pub store: Option<StoreId>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub q: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductFilter {
    /// Validated `(page, per_page)`.
    ///
    /// # Errors
    ///
    /// Returns a message when the page is zero or `per_page` is outside 1–100.
    pub fn pagination(&self) -> Result<(u32, u32), String> {
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err("page must be at least 1".to_string());
        }
        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(format!("per_page must be between 1 and {MAX_PER_PAGE}"));
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price)
            && min > max
        {
            return Err("min_price cannot exceed max_price".to_string());
        }
        Ok((page, per_page))
    }

    /// Search text, trimmed, or `None` when blank.
    #[must_use]
    pub fn search_text(&self) -> Option<String> {
        optional_text(self.q.clone())
    }
}

fn validate_price(price: Decimal) -> Result<(), String> {
    if price <= Decimal::ZERO {
        return Err("price must be greater than zero".to_string());
    }
    if decimal_places(price) > 2 {
        return Err("price cannot have more than two decimal places".to_string());
    }
    Ok(())
}

fn validate_initial_status(status: ProductStatus) -> Result<(), String> {
    match status {
        ProductStatus::Draft | ProductStatus::Active => Ok(()),
        ProductStatus::Sold | ProductStatus::Archived => {
            Err("status must be draft or active".to_string())
        }
    }
}

/// Body of `POST /api/products`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub category_id: CategoryId,
    pub subcategory_id: Option<CategoryId>,
    pub level3_category_id: Option<CategoryId>,
    pub store_category_id: Option<StoreCategoryId>,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub status: ProductStatus,
    pub condition: Option<ProductCondition>,
    pub bike_type: Option<String>,
    pub frame_size: Option<String>,
    pub brand: Option<String>,
    /// Image URLs seeded into the legacy document until curation.
    #[serde(default)]
    pub images: Vec<String>,
}

impl NewProduct {
    /// Validate and normalise the submitted listing.
    ///
    /// # Errors
    ///
    /// Returns a message for a bad title, price or initial status.
    pub fn validate(mut self) -> Result<Self, String> {
        self.title = bounded_text("title", &self.title, TITLE_MIN, TITLE_MAX)?;
        validate_price(self.price)?;
        validate_initial_status(self.status)?;
        self.description = optional_text(self.description);
        self.bike_type = optional_text(self.bike_type);
        self.frame_size = optional_text(self.frame_size);
        self.brand = optional_text(self.brand);
        self.images.retain(|url| !url.trim().is_empty());
        Ok(self)
    }

    /// Legacy JSONB document for the submitted image URLs.
    #[must_use]
    pub fn legacy_images(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.images
                .iter()
                .map(|url| serde_json::Value::String(url.trim().to_owned()))
                .collect(),
        )
    }
}

/// Body of `PUT /api/products/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub category_id: Option<CategoryId>,
    pub subcategory_id: Option<CategoryId>,
    pub level3_category_id: Option<CategoryId>,
    pub store_category_id: Option<StoreCategoryId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub status: Option<ProductStatus>,
    pub condition: Option<ProductCondition>,
    pub bike_type: Option<String>,
    pub frame_size: Option<String>,
    pub brand: Option<String>,
}

impl ProductUpdate {
    /// Validate the fields that were supplied.
    ///
    /// Owners may move a listing between draft and active; sold and archived
    /// are reached through checkout and deletion.
    ///
    /// # Errors
    ///
    /// Returns a message for a bad title, price or status.
    pub fn validate(mut self) -> Result<Self, String> {
        if let Some(title) = self.title.as_deref() {
            self.title = Some(bounded_text("title", title, TITLE_MIN, TITLE_MAX)?);
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        if let Some(status) = self.status {
            validate_initial_status(status)?;
        }
        Ok(self)
    }

    /// Apply the supplied fields to `product`.
    pub fn apply_to(self, product: &mut Product) {
        if let Some(v) = self.category_id {
            product.category_id = v;
        }
        if self.subcategory_id.is_some() {
            product.subcategory_id = self.subcategory_id;
        }
        if self.level3_category_id.is_some() {
            product.level3_category_id = self.level3_category_id;
        }
        if self.store_category_id.is_some() {
            product.store_category_id = self.store_category_id;
        }
        if let Some(v) = self.title {
            product.title = v;
        }
        if self.description.is_some() {
            product.description = optional_text(self.description);
        }
        if let Some(v) = self.price {
            product.price = v;
        }
        if let Some(v) = self.status {
            product.status = v;
        }
        if self.condition.is_some() {
            product.condition = self.condition;
        }
        if self.bike_type.is_some() {
            product.bike_type = optional_text(self.bike_type);
        }
        if self.frame_size.is_some() {
            product.frame_size = optional_text(self.frame_size);
        }
        if self.brand.is_some() {
            product.brand = optional_text(self.brand);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_product() -> NewProduct {
        serde_json::from_value(serde_json::json!({
            "category_id": "00000000-0000-0000-0000-000000000001",
            "title": "  Trek Domane SL5  ",
            "price": "1899.00",
            "brand": " ",
            "images": ["https://cdn.example/a.jpg", ""]
        }))
        .unwrap()
    }

    #[test]
    fn test_new_product_validation_normalises() {
        let product = new_product().validate().unwrap();
        assert_eq!(product.title, "Trek Domane SL5");
        assert_eq!(product.status, ProductStatus::Draft);
        assert_eq!(product.brand, None);
        assert_eq!(product.images.len(), 1);
        assert_eq!(
            product.legacy_images(),
            serde_json::json!(["https://cdn.example/a.jpg"])
        );
    }

    #[test]
    fn test_new_product_rejects_bad_price() {
        let mut product = new_product();
        product.price = Decimal::ZERO;
        assert!(product.validate().is_err());

        let mut product = new_product();
        product.price = Decimal::new(1_999, 3);
        assert!(product.validate().is_err());
    }

    #[test]
    fn test_new_product_rejects_short_title() {
        let mut product = new_product();
        product.title = "ab".to_string();
        assert!(product.validate().is_err());
    }

    #[test]
    fn test_new_product_cannot_start_sold() {
        let mut product = new_product();
        product.status = ProductStatus::Sold;
        assert!(product.validate().is_err());
    }

    #[test]
    fn test_pagination_defaults_and_bounds() {
        let filter = ProductFilter::default();
        assert_eq!(filter.pagination(), Ok((1, DEFAULT_PER_PAGE)));

        let filter = ProductFilter {
            per_page: Some(101),
            ..Default::default()
        };
        assert!(filter.pagination().is_err());

        let filter = ProductFilter {
            page: Some(0),
            ..Default::default()
        };
        assert!(filter.pagination().is_err());
    }

    #[test]
    fn test_price_range_must_be_ordered() {
        let filter = ProductFilter {
            min_price: Some(Decimal::new(500, 0)),
            max_price: Some(Decimal::new(100, 0)),
            ..Default::default()
        };
        assert!(filter.pagination().is_err());
    }

    #[test]
    fn test_sort_deserializes() {
        let filter: ProductFilter =
            serde_json::from_value(serde_json::json!({"sort": "price_desc"})).unwrap();
        assert_eq!(filter.sort, ProductSort::PriceDesc);
        assert!(filter.sort.order_by().starts_with("p.price DESC"));
    }
}
