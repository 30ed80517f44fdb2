//! Marketplace taxonomy import.
//!
//! # Usage
//!
//! ```bash
//! cm-cli categories import taxonomy.yaml
//! ```
//!
//! # File Format
//!
//! ```yaml
//! - name: Road
//!   slug: road
//!   children:
//!     - name: Endurance
//!       slug: road-endurance
//!       children:
//!         - name: Carbon
//!           slug: road-endurance-carbon
//! - name: Mountain
//!   slug: mountain
//! ```
//!
//! Categories are matched by slug, so re-running an import updates names,
//! parents and positions in place.

use std::collections::{HashSet, VecDeque};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use cyclemart_server::db::{self, CategoryRepository};
use cyclemart_server::models::category::MAX_LEVEL;
use cyclemart_server::models::store::validate_slug;

use super::{DATABASE_URL_VAR, database_url};

/// One node of the taxonomy file.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryNode {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub children: Vec<Self>,
}

/// Errors raised by the import.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} validation errors found")]
    Invalid(usize),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] db::RepositoryError),
}

/// Number of categories per level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub level1: usize,
    pub level2: usize,
    pub level3: usize,
}

impl ImportSummary {
    const fn record(&mut self, level: i16) {
        match level {
            1 => self.level1 += 1,
            2 => self.level2 += 1,
            _ => self.level3 += 1,
        }
    }

    /// Total number of categories.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.level1 + self.level2 + self.level3
    }
}

/// Check a parsed tree: names present, slugs well-formed and unique, depth
/// at most three levels.
///
/// Returns every problem found, not just the first.
#[must_use]
pub fn validate_tree(roots: &[CategoryNode]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    let mut stack: Vec<(&CategoryNode, i16)> = roots.iter().map(|n| (n, 1)).collect();

    while let Some((node, level)) = stack.pop() {
        if node.name.trim().is_empty() {
            errors.push(format!("category '{}' has an empty name", node.slug));
        }
        if let Err(e) = validate_slug(&node.slug) {
            errors.push(format!("'{}': {e}", node.slug));
        }
        if !seen.insert(node.slug.as_str()) {
            errors.push(format!("duplicate slug '{}'", node.slug));
        }
        if level >= MAX_LEVEL && !node.children.is_empty() {
            errors.push(format!(
                "'{}' is at level {MAX_LEVEL} and cannot have children",
                node.slug
            ));
            continue;
        }
        stack.extend(node.children.iter().map(|child| (child, level + 1)));
    }

    errors
}

/// Count categories per level. Assumes the tree passed [`validate_tree`].
#[must_use]
pub fn summarize(roots: &[CategoryNode]) -> ImportSummary {
    let mut summary = ImportSummary::default();
    let mut stack: Vec<(&CategoryNode, i16)> = roots.iter().map(|n| (n, 1)).collect();
    while let Some((node, level)) = stack.pop() {
        summary.record(level);
        stack.extend(node.children.iter().map(|child| (child, level + 1)));
    }
    summary
}

/// Import a taxonomy file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or the database rejects an upsert.
pub async fn import(path: &Path, dry_run: bool) -> Result<ImportSummary, ImportError> {
    info!(path = %path.display(), "Loading taxonomy");

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ImportError::Read {
            path: path.display().to_string(),
            source,
        })?;
    let roots: Vec<CategoryNode> = serde_yaml::from_str(&content)?;

    let errors = validate_tree(&roots);
    if !errors.is_empty() {
        error!("Taxonomy validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(ImportError::Invalid(errors.len()));
    }

    let summary = summarize(&roots);
    if dry_run {
        info!(
            level1 = summary.level1,
            level2 = summary.level2,
            level3 = summary.level3,
            "Dry run: taxonomy is valid"
        );
        return Ok(summary);
    }

    let url = database_url().ok_or(ImportError::MissingEnvVar(DATABASE_URL_VAR))?;
    let pool = db::create_pool(&url).await?;
    info!("Connected to database");

    let repo = CategoryRepository::new(&pool);
    let mut queue: VecDeque<(Option<_>, i16, i32, &CategoryNode)> = (0..)
        .zip(&roots)
        .map(|(position, node)| (None, 1, position, node))
        .collect();

    while let Some((parent_id, level, position, node)) = queue.pop_front() {
        let category = repo
            .upsert(parent_id, node.name.trim(), &node.slug, level, position)
            .await?;
        queue.extend(
            (0..)
                .zip(&node.children)
                .map(|(position, child)| (Some(category.id), level + 1, position, child)),
        );
    }

    info!("Import complete!");
    info!("  Level 1: {}", summary.level1);
    info!("  Level 2: {}", summary.level2);
    info!("  Level 3: {}", summary.level3);
    info!("  Total:   {}", summary.total());

    Ok(summary)
}
