//! Background image discovery.
//!
//! Sellers upload photos straight to storage under `products/{id}/`. A
//! discovery job lists that folder and turns every object that is not yet a
//! `product_image` row into a pending image for curation.

use sqlx::PgPool;
use tracing::{error, info, instrument};

use cyclemart_core::{DiscoveryJobId, ProductId};

use super::storage::{StorageClient, StorageError, StoredObject, product_prefix};
use crate::db::discovery::JOB_TIMEOUT;
use crate::db::images::DiscoveredImage;
use crate::db::{DiscoveryJobRepository, ImageRepository, RepositoryError};

/// File extensions treated as images.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "avif"];

#[derive(Debug, thiserror::Error)]
enum DiscoveryError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("timed out after {0:?}")]
    TimedOut(std::time::Duration),
}

/// Spawn a background task that runs a queued discovery job.
///
/// The job row records progress; clients poll it until it is `completed` or
/// `failed`.
pub fn spawn_discovery(
    pool: PgPool,
    storage: StorageClient,
    job_id: DiscoveryJobId,
    product_id: ProductId,
) {
    info!(%job_id, %product_id, "Spawning image discovery task");
    tokio::spawn(async move {
        let jobs = DiscoveryJobRepository::new(&pool);

        let outcome = match jobs.mark_running(job_id).await {
            Ok(()) => tokio::time::timeout(JOB_TIMEOUT, discover(&pool, &storage, product_id))
                .await
                .unwrap_or(Err(DiscoveryError::TimedOut(JOB_TIMEOUT))),
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(found) => {
                info!(%job_id, found, "Image discovery finished");
                if let Err(e) = jobs.mark_completed(job_id, found).await {
                    error!(error = %e, %job_id, "Failed to mark discovery job completed");
                }
            }
            Err(e) => {
                error!(error = %e, %job_id, "Image discovery failed");
                if let Err(e) = jobs.mark_failed(job_id, &e.to_string()).await {
                    error!(error = %e, %job_id, "Failed to mark discovery job failed");
                }
            }
        }
    });
}

#[instrument(skip(pool, storage))]
async fn discover(
    pool: &PgPool,
    storage: &StorageClient,
    product_id: ProductId,
) -> Result<i32, DiscoveryError> {
    let images = ImageRepository::new(pool);

    let objects = storage.list(&product_prefix(product_id)).await?;
    let known = images.known_paths(product_id).await?;

    let new: Vec<DiscoveredImage> = select_new(objects, &known)
        .into_iter()
        .map(|object| DiscoveredImage {
            url: storage.public_url(&object.path),
            storage_path: object.path,
        })
        .collect();

    let inserted = images.insert_discovered(product_id, &new).await?;
    Ok(i32::try_from(inserted).unwrap_or(i32::MAX))
}

/// Image objects not yet known, sorted by path.
fn select_new(
    objects: Vec<StoredObject>,
    known: &std::collections::HashSet<String>,
) -> Vec<StoredObject> {
    let mut new: Vec<StoredObject> = objects
        .into_iter()
        .filter(|object| is_image(&object.path) && !known.contains(&object.path))
        .collect();
    new.sort_by(|a, b| a.path.cmp(&b.path));
    new
}

fn is_image(path: &str) -> bool {
    path.rsplit_once('.').is_some_and(|(_, ext)| {
        IMAGE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn object(path: &str) -> StoredObject {
        StoredObject {
            path: path.to_string(),
        }
    }

    #[test]
    fn test_is_image() {
        assert!(is_image("products/1/front.JPG"));
        assert!(is_image("products/1/side.webp"));
        assert!(!is_image("products/1/notes.txt"));
        assert!(!is_image("products/1/.emptyFolderPlaceholder"));
        assert!(!is_image("products/1/noext"));
    }

    #[test]
    fn test_select_new_skips_known_and_non_images() {
        let known: HashSet<String> = ["products/1/a.jpg".to_string()].into();
        let objects = vec![
            object("products/1/c.png"),
            object("products/1/a.jpg"),
            object("products/1/readme.md"),
            object("products/1/b.jpg"),
        ];

        let paths: Vec<String> = select_new(objects, &known)
            .into_iter()
            .map(|o| o.path)
            .collect();
        assert_eq!(paths, vec!["products/1/b.jpg", "products/1/c.png"]);
    }
}
