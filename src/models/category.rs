//! Category model
//!
//! Categories form a tree through the nullable `parent_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category entity representing a node in the category hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Category {
    /// Unique identifier
    pub id: i64,
    /// Category name (unique)
    pub name: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    pub description: Option<String>,
    /// Parent category ID (for hierarchical structure)
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Check if this is a root category (no parent)
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Category with its children for tree representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTree {
    /// The category itself
    #[serde(flatten)]
    pub category: Category,
    /// Child categories
    pub children: Vec<CategoryTree>,
}

impl CategoryTree {
    /// Create a new CategoryTree from a category with no children
    pub fn new(category: Category) -> Self {
        Self {
            category,
            children: Vec::new(),
        }
    }

    /// Assemble a forest from a flat list.
    ///
    /// Categories whose parent is missing from the list become roots. Sibling
    /// order follows the input order.
    pub fn build(categories: &[Category]) -> Vec<CategoryTree> {
        fn children_of(parent: Option<i64>, all: &[Category], known: &dyn Fn(i64) -> bool) -> Vec<CategoryTree> {
            all.iter()
                .filter(|c| match (parent, c.parent_id) {
                    (Some(p), Some(cp)) => p == cp,
                    (None, None) => true,
                    (None, Some(cp)) => !known(cp),
                    (Some(_), None) => false,
                })
                .map(|c| CategoryTree {
                    category: c.clone(),
                    children: children_of(Some(c.id), all, known),
                })
                .collect()
        }

        let known = |id: i64| categories.iter().any(|c| c.id == id);
        children_of(None, categories, &known)
    }
}

/// Input for creating a new category
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    /// URL-friendly slug (generated from the name when absent)
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
}

/// Input for updating a category.
///
/// `parent_id: Some(None)` moves the category to the root.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<i64>>,
}

/// Distinguish an absent field from an explicit `null`
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i64, parent_id: Option<i64>) -> Category {
        Category {
            id,
            name: format!("Category {}", id),
            slug: format!("category-{}", id),
            description: None,
            parent_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_tree() {
        let categories = vec![
            category(1, None),
            category(2, Some(1)),
            category(3, Some(2)),
            category(4, None),
        ];
        let forest = CategoryTree::build(&categories);

        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].category.id, 1);
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!(forest[0].children[0].category.id, 2);
        assert_eq!(forest[0].children[0].children[0].category.id, 3);
        assert!(forest[1].children.is_empty());
    }

    #[test]
    fn test_orphans_become_roots() {
        let forest = CategoryTree::build(&[category(5, Some(99))]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].category.id, 5);
    }

    #[test]
    fn test_update_parent_null_vs_absent() {
        let absent: UpdateCategoryInput = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert_eq!(absent.parent_id, None);

        let null: UpdateCategoryInput = serde_json::from_str(r#"{"parent_id": null}"#).unwrap();
        assert_eq!(null.parent_id, Some(None));

        let set: UpdateCategoryInput = serde_json::from_str(r#"{"parent_id": 3}"#).unwrap();
        assert_eq!(set.parent_id, Some(Some(3)));
    }
}
