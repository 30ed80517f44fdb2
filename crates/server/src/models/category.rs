//! Marketplace taxonomy.

use serde::{Deserialize, Serialize};

use cyclemart_core::CategoryId;

use super::bounded_text;
use super::store::validate_slug;

/// Deepest level of the taxonomy.
pub const MAX_LEVEL: i16 = 3;

/// A taxonomy node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub parent_id: Option<CategoryId>,
    pub name: String,
    pub slug: String,
    pub level: i16,
    pub position: i32,
}

/// A category with its children, as returned by `GET /api/categories`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

/// Assemble flat rows into a tree ordered by position, then name.
///
/// Rows whose parent is missing are dropped.
#[must_use]
pub fn build_tree(mut categories: Vec<Category>) -> Vec<CategoryNode> {
    categories.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.name.cmp(&b.name))
    });
    children_of(None, &categories)
}

fn children_of(parent: Option<CategoryId>, all: &[Category]) -> Vec<CategoryNode> {
    all.iter()
        .filter(|c| c.parent_id == parent)
        .map(|c| CategoryNode {
            category: c.clone(),
            children: children_of(Some(c.id), all),
        })
        .collect()
}

/// Level of a new child under `parent_level`.
///
/// # Errors
///
/// Returns a message when the child would be deeper than [`MAX_LEVEL`].
pub fn child_level(parent_level: Option<i16>) -> Result<i16, String> {
    let level = parent_level.map_or(1, |l| l + 1);
    if level > MAX_LEVEL {
        return Err(format!("categories cannot be nested deeper than {MAX_LEVEL} levels"));
    }
    Ok(level)
}

/// Body of `POST /api/admin/categories`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub parent_id: Option<CategoryId>,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub position: i32,
}

impl NewCategory {
    /// # Errors
    ///
    /// Returns a message for a blank name or invalid slug.
    pub fn validate(mut self) -> Result<Self, String> {
        self.name = bounded_text("name", &self.name, 1, 80)?;
        self.slug = self.slug.trim().to_owned();
        validate_slug(&self.slug)?;
        Ok(self)
    }
}

/// Body of `PUT /api/admin/categories/{id}`. The parent cannot change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub position: Option<i32>,
}

impl CategoryUpdate {
    /// Apply the supplied fields to `category`.
    ///
    /// # Errors
    ///
    /// Returns a message for a blank name or invalid slug.
    pub fn apply_to(self, category: &mut Category) -> Result<(), String> {
        if let Some(name) = self.name.as_deref() {
            category.name = bounded_text("name", name, 1, 80)?;
        }
        if let Some(slug) = self.slug.as_deref() {
            let slug = slug.trim();
            validate_slug(slug)?;
            slug.clone_into(&mut category.slug);
        }
        if let Some(position) = self.position {
            category.position = position;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn category(n: u128, parent: Option<u128>, level: i16, position: i32) -> Category {
        Category {
            id: CategoryId::new(Uuid::from_u128(n)),
            parent_id: parent.map(|p| CategoryId::new(Uuid::from_u128(p))),
            name: format!("cat-{n}"),
            slug: format!("cat-{n}"),
            level,
            position,
        }
    }

    #[test]
    fn test_build_tree_nests_and_orders() {
        let tree = build_tree(vec![
            category(3, Some(1), 2, 1),
            category(1, None, 1, 0),
            category(2, Some(1), 2, 0),
            category(4, Some(2), 3, 0),
            category(5, None, 1, 1),
        ]);

        assert_eq!(tree.len(), 2);
        let first = &tree[0];
        assert_eq!(first.category.name, "cat-1");
        assert_eq!(first.children.len(), 2);
        assert_eq!(first.children[0].category.name, "cat-2");
        assert_eq!(first.children[0].children[0].category.name, "cat-4");
    }

    #[test]
    fn test_build_tree_drops_orphans() {
        let tree = build_tree(vec![category(1, None, 1, 0), category(2, Some(99), 2, 0)]);
        assert_eq!(tree.len(), 1);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn test_child_level() {
        assert_eq!(child_level(None), Ok(1));
        assert_eq!(child_level(Some(2)), Ok(3));
        assert!(child_level(Some(3)).is_err());
    }
}
