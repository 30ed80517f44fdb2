//! Image curation rules.
//!
//! Curators click through each product image, cycling its status
//! (pending → approved → rejected → pending), pick one approved image as the
//! primary, and finally mark the product complete. Completion is destructive:
//! every image that is not approved is deleted from object storage and from
//! the `product_image` table.
//!
//! Image metadata also lives in a legacy `images` JSONB column on the product
//! row. [`reconcile`] resolves the two sources into a single list; the table
//! wins whenever it has rows.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ImageId, ImageStatus};

/// Errors raised by curation actions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CurationError {
    /// The image does not belong to the product.
    #[error("image {0} not found")]
    ImageNotFound(ImageId),
    /// Only approved images can be the primary image.
    #[error("only approved images can be primary")]
    NotApproved,
    /// Completion needs at least one approved image.
    #[error("no approved images")]
    NoApprovedImages,
    /// Completion needs exactly one approved primary image.
    #[error("exactly one approved image must be marked primary")]
    MissingPrimary,
    /// More than one approved image is flagged primary.
    #[error("{0} approved images are marked primary, expected one")]
    MultiplePrimaries(usize),
}

/// A `product_image` row as far as curation is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub id: ImageId,
    pub url: String,
    /// Object key in the storage bucket, when the image was uploaded by us.
    pub storage_path: Option<String>,
    pub status: ImageStatus,
    pub is_primary: bool,
    pub position: i32,
}

impl ImageRecord {
    /// Apply one curator click.
    ///
    /// Moving away from `approved` also drops the primary flag, so a rejected
    /// image can never remain the product's primary image.
    pub fn cycle(&mut self) {
        self.status = self.status.next();
        if !matches!(self.status, ImageStatus::Approved) {
            self.is_primary = false;
        }
    }
}

/// Mark `image_id` as the single primary image of the product.
///
/// # Errors
///
/// Returns [`CurationError::ImageNotFound`] if the image is not in `images`
/// and [`CurationError::NotApproved`] if it has not been approved.
pub fn set_primary(images: &mut [ImageRecord], image_id: ImageId) -> Result<(), CurationError> {
    let target = images
        .iter()
        .find(|img| img.id == image_id)
        .ok_or(CurationError::ImageNotFound(image_id))?;

    if target.status != ImageStatus::Approved {
        return Err(CurationError::NotApproved);
    }

    for img in images.iter_mut() {
        img.is_primary = img.id == image_id;
    }
    Ok(())
}

/// What "mark complete" will do to a product's images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionPlan {
    /// Approved images, primary first, then by position.
    pub keep: Vec<ImageRecord>,
    /// Pending and rejected images to delete.
    pub delete: Vec<ImageRecord>,
}

impl CompletionPlan {
    /// Storage object keys that must be removed before the rows go.
    #[must_use]
    pub fn storage_paths(&self) -> Vec<String> {
        self.delete
            .iter()
            .filter_map(|img| img.storage_path.clone())
            .collect()
    }

    /// Row IDs to delete.
    #[must_use]
    pub fn delete_ids(&self) -> Vec<ImageId> {
        self.delete.iter().map(|img| img.id).collect()
    }

    /// Whether `current` is still the row set this plan was made from: the
    /// same images with the same status and primary flag.
    #[must_use]
    pub fn still_applies(&self, current: &[ImageRecord]) -> bool {
        let planned: HashSet<(ImageId, ImageStatus, bool)> = self
            .keep
            .iter()
            .chain(&self.delete)
            .map(|img| (img.id, img.status, img.is_primary))
            .collect();
        current.len() == planned.len()
            && current
                .iter()
                .all(|img| planned.contains(&(img.id, img.status, img.is_primary)))
    }
}

/// Validate a product's images and work out what completion removes.
///
/// # Errors
///
/// - [`CurationError::NoApprovedImages`] when nothing is approved
/// - [`CurationError::MissingPrimary`] when no approved image is primary
/// - [`CurationError::MultiplePrimaries`] when more than one is
pub fn plan_completion(images: &[ImageRecord]) -> Result<CompletionPlan, CurationError> {
    let (mut keep, delete): (Vec<ImageRecord>, Vec<ImageRecord>) = images
        .iter()
        .cloned()
        .partition(|img| img.status == ImageStatus::Approved);

    if keep.is_empty() {
        return Err(CurationError::NoApprovedImages);
    }

    match keep.iter().filter(|img| img.is_primary).count() {
        0 => return Err(CurationError::MissingPrimary),
        1 => {}
        n => return Err(CurationError::MultiplePrimaries(n)),
    }

    keep.sort_by_key(|img| (!img.is_primary, img.position));

    Ok(CompletionPlan { keep, delete })
}

/// Where a resolved image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    Table,
    Legacy,
}

/// An image as presented to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedImage {
    /// `None` for images that only exist in the legacy JSONB document.
    pub id: Option<ImageId>,
    pub url: String,
    pub status: ImageStatus,
    pub is_primary: bool,
    pub position: i32,
    pub source: ImageSource,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyImage {
    Url(String),
    Entry {
        url: String,
        #[serde(default)]
        is_primary: bool,
        #[serde(default)]
        status: Option<ImageStatus>,
    },
}

fn decode_legacy(document: &serde_json::Value) -> Vec<ResolvedImage> {
    let Some(entries) = document.as_array() else {
        return Vec::new();
    };

    let mut images: Vec<ResolvedImage> = entries
        .iter()
        .filter_map(|entry| serde_json::from_value::<LegacyImage>(entry.clone()).ok())
        .map(|entry| match entry {
            LegacyImage::Url(url) => (url, false, ImageStatus::Approved),
            LegacyImage::Entry {
                url,
                is_primary,
                status,
            } => (url, is_primary, status.unwrap_or(ImageStatus::Approved)),
        })
        .filter(|(url, _, _)| !url.trim().is_empty())
        .zip(0..)
        .map(|((url, is_primary, status), position)| ResolvedImage {
            id: None,
            url,
            status,
            is_primary: is_primary && status == ImageStatus::Approved,
            position,
            source: ImageSource::Legacy,
        })
        .collect();

    // Keep at most one primary; fall back to the first approved entry.
    let mut seen_primary = false;
    for img in &mut images {
        if img.is_primary {
            img.is_primary = !seen_primary;
            seen_primary = true;
        }
    }
    if !seen_primary
        && let Some(first) = images
            .iter_mut()
            .find(|img| img.status == ImageStatus::Approved)
    {
        first.is_primary = true;
    }

    images
}

/// Resolve the table rows and the legacy JSONB document into one list.
///
/// Table rows are authoritative whenever there are any; the JSONB document is
/// only consulted for products that were never migrated to the table.
#[must_use]
pub fn reconcile(rows: &[ImageRecord], legacy: &serde_json::Value) -> Vec<ResolvedImage> {
    if rows.is_empty() {
        return decode_legacy(legacy);
    }

    let mut resolved: Vec<ResolvedImage> = rows
        .iter()
        .map(|row| ResolvedImage {
            id: Some(row.id),
            url: row.url.clone(),
            status: row.status,
            is_primary: row.is_primary,
            position: row.position,
            source: ImageSource::Table,
        })
        .collect();
    resolved.sort_by_key(|img| (img.position, img.id));
    resolved
}

/// Render the JSONB document written back to the product after completion.
#[must_use]
pub fn to_legacy_document(kept: &[ImageRecord]) -> serde_json::Value {
    serde_json::Value::Array(
        kept.iter()
            .map(|img| {
                serde_json::json!({
                    "url": img.url,
                    "is_primary": img.is_primary,
                    "status": ImageStatus::Approved,
                })
            })
            .collect(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    fn image(n: u128, status: ImageStatus, is_primary: bool) -> ImageRecord {
        ImageRecord {
            id: ImageId::new(Uuid::from_u128(n)),
            url: format!("https://cdn.example/{n}.jpg"),
            storage_path: Some(format!("products/p/{n}.jpg")),
            status,
            is_primary,
            position: i32::try_from(n).unwrap(),
        }
    }

    #[test]
    fn test_cycle_from_approved_drops_primary() {
        let mut img = image(1, ImageStatus::Approved, true);
        img.cycle();
        assert_eq!(img.status, ImageStatus::Rejected);
        assert!(!img.is_primary);
    }

    #[test]
    fn test_cycle_full_loop() {
        let mut img = image(1, ImageStatus::Pending, false);
        img.cycle();
        assert_eq!(img.status, ImageStatus::Approved);
        img.cycle();
        img.cycle();
        assert_eq!(img.status, ImageStatus::Pending);
    }

    #[test]
    fn test_set_primary_is_exclusive() {
        let mut images = vec![
            image(1, ImageStatus::Approved, true),
            image(2, ImageStatus::Approved, false),
        ];
        let id = images[1].id;
        set_primary(&mut images, id).unwrap();
        assert!(!images[0].is_primary);
        assert!(images[1].is_primary);
    }

    #[test]
    fn test_set_primary_requires_approval() {
        let mut images = vec![image(1, ImageStatus::Pending, false)];
        let id = images[0].id;
        assert_eq!(set_primary(&mut images, id), Err(CurationError::NotApproved));
    }

    #[test]
    fn test_set_primary_unknown_image() {
        let mut images = vec![image(1, ImageStatus::Approved, false)];
        let missing = ImageId::new(Uuid::from_u128(99));
        assert_eq!(
            set_primary(&mut images, missing),
            Err(CurationError::ImageNotFound(missing))
        );
    }

    #[test]
    fn test_plan_completion_splits_images() {
        let images = vec![
            image(1, ImageStatus::Approved, false),
            image(2, ImageStatus::Rejected, false),
            image(3, ImageStatus::Approved, true),
            image(4, ImageStatus::Pending, false),
        ];
        let plan = plan_completion(&images).unwrap();

        let kept: Vec<i32> = plan.keep.iter().map(|i| i.position).collect();
        assert_eq!(kept, vec![3, 1]);
        assert_eq!(plan.delete.len(), 2);
        assert_eq!(
            plan.storage_paths(),
            vec!["products/p/2.jpg".to_string(), "products/p/4.jpg".to_string()]
        );
    }

    #[test]
    fn test_plan_completion_requires_primary() {
        let images = vec![image(1, ImageStatus::Approved, false)];
        assert_eq!(plan_completion(&images), Err(CurationError::MissingPrimary));
    }

    #[test]
    fn test_plan_completion_ignores_primary_flag_on_rejected() {
        let images = vec![
            image(1, ImageStatus::Approved, false),
            image(2, ImageStatus::Rejected, true),
        ];
        assert_eq!(plan_completion(&images), Err(CurationError::MissingPrimary));
    }

    #[test]
    fn test_plan_completion_rejects_two_primaries() {
        let images = vec![
            image(1, ImageStatus::Approved, true),
            image(2, ImageStatus::Approved, true),
        ];
        assert_eq!(
            plan_completion(&images),
            Err(CurationError::MultiplePrimaries(2))
        );
    }

    #[test]
    fn test_plan_completion_without_approved() {
        let images = vec![image(1, ImageStatus::Pending, false)];
        assert_eq!(plan_completion(&images), Err(CurationError::NoApprovedImages));
        assert_eq!(plan_completion(&[]), Err(CurationError::NoApprovedImages));
    }

    #[test]
    fn test_plan_detects_changed_rows() {
        let images = vec![
            image(1, ImageStatus::Approved, true),
            image(2, ImageStatus::Rejected, false),
        ];
        let plan = plan_completion(&images).unwrap();
        assert!(plan.still_applies(&images));

        // A discovery run added a pending image.
        let mut grown = images.clone();
        grown.push(image(3, ImageStatus::Pending, false));
        assert!(!plan.still_applies(&grown));

        // Another curator cycled an image.
        let mut cycled = images.clone();
        cycled[1].cycle();
        assert!(!plan.still_applies(&cycled));

        assert!(!plan.still_applies(&images[..1]));
    }

    #[test]
    fn test_reconcile_prefers_table_rows() {
        let rows = vec![image(2, ImageStatus::Pending, false), image(1, ImageStatus::Approved, true)];
        let legacy = json!(["https://old.example/a.jpg"]);
        let resolved = reconcile(&rows, &legacy);

        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().all(|r| r.source == ImageSource::Table));
        assert_eq!(resolved[0].position, 1);
    }

    #[test]
    fn test_reconcile_decodes_mixed_legacy_entries() {
        let legacy = json!([
            "https://old.example/a.jpg",
            {"url": "https://old.example/b.jpg", "is_primary": true},
            {"url": "https://old.example/c.jpg", "status": "rejected"},
            {"url": ""},
            42
        ]);
        let resolved = reconcile(&[], &legacy);

        assert_eq!(resolved.len(), 3);
        assert!(!resolved[0].is_primary);
        assert!(resolved[1].is_primary);
        assert_eq!(resolved[2].status, ImageStatus::Rejected);
        assert!(resolved.iter().all(|r| r.id.is_none()));
    }

    #[test]
    fn test_reconcile_legacy_defaults_first_approved_to_primary() {
        let legacy = json!([
            {"url": "https://old.example/a.jpg", "status": "pending"},
            "https://old.example/b.jpg"
        ]);
        let resolved = reconcile(&[], &legacy);
        assert!(!resolved[0].is_primary);
        assert!(resolved[1].is_primary);
    }

    #[test]
    fn test_reconcile_legacy_keeps_single_primary() {
        let legacy = json!([
            {"url": "https://old.example/a.jpg", "is_primary": true},
            {"url": "https://old.example/b.jpg", "is_primary": true}
        ]);
        let resolved = reconcile(&[], &legacy);
        assert_eq!(resolved.iter().filter(|r| r.is_primary).count(), 1);
        assert!(resolved[0].is_primary);
    }

    #[test]
    fn test_reconcile_non_array_legacy() {
        assert!(reconcile(&[], &json!(null)).is_empty());
        assert!(reconcile(&[], &json!({"url": "x"})).is_empty());
    }

    #[test]
    fn test_legacy_document_round_trips_through_reconcile() {
        let kept = vec![image(3, ImageStatus::Approved, true), image(1, ImageStatus::Approved, false)];
        let document = to_legacy_document(&kept);
        let resolved = reconcile(&[], &document);
        assert_eq!(resolved.len(), 2);
        assert!(resolved[0].is_primary);
        assert_eq!(resolved[0].url, kept[0].url);
    }
}
