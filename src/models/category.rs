//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category entity.
///
/// Categories form a tree through `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Category {
    /// Unique identifier
    pub id: i64,
    /// URL-friendly slug
    pub slug: String,
    /// Category name
    pub name: String,
    /// Category description
    pub description: Option<String>,
    /// Parent category ID
    pub parent_id: Option<i64>,
    /// Sort order within parent
    pub sort_order: i32,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Category {
    /// Check if this is a root category (no parent)
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Public path of the category page
    pub fn path(&self) -> String {
        format!("/categories/{}", self.slug)
    }
}

/// Category with its children for tree representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTree {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryTree>,
}

impl CategoryTree {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            children: Vec::new(),
        }
    }

    /// Build a forest from a flat list.
    ///
    /// Siblings keep the order of `categories`. Categories whose parent is
    /// missing from the list are treated as roots.
    pub fn build(categories: &[Category]) -> Vec<CategoryTree> {
        let known: std::collections::HashSet<i64> = categories.iter().map(|c| c.id).collect();
        categories
            .iter()
            .filter(|c| c.parent_id.map_or(true, |p| !known.contains(&p) || p == c.id))
            .map(|root| Self::build_node(root, categories))
            .collect()
    }

    fn build_node(category: &Category, all: &[Category]) -> CategoryTree {
        let children = all
            .iter()
            .filter(|c| c.parent_id == Some(category.id) && c.id != category.id)
            .map(|child| Self::build_node(child, all))
            .collect();
        CategoryTree {
            category: category.clone(),
            children,
        }
    }

    /// Total count of this category and all descendants
    pub fn total_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.total_count()).sum::<usize>()
    }

    /// All descendant IDs (not including self), depth-first
    pub fn descendant_ids(&self) -> Vec<i64> {
        let mut ids = Vec::new();
        for child in &self.children {
            ids.push(child.category.id);
            ids.extend(child.descendant_ids());
        }
        ids
    }
}

/// Input for creating a new category
#[derive(Debug, Clone)]
pub struct CreateCategoryInput {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub sort_order: i32,
}

/// Input for updating a category
#[derive(Debug, Clone, Default)]
pub struct UpdateCategoryInput {
    pub slug: Option<String>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub parent_id: Option<Option<i64>>,
    pub sort_order: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i64, parent_id: Option<i64>) -> Category {
        Category {
            id,
            slug: format!("cat-{}", id),
            name: format!("Category {}", id),
            description: None,
            parent_id,
            sort_order: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_tree() {
        let flat = vec![
            category(1, None),
            category(2, Some(1)),
            category(3, Some(2)),
            category(4, None),
            category(5, Some(1)),
        ];

        let forest = CategoryTree::build(&flat);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].category.id, 1);
        assert_eq!(forest[0].total_count(), 4);
        assert_eq!(forest[0].descendant_ids(), vec![2, 3, 5]);
        assert_eq!(forest[1].total_count(), 1);
    }

    #[test]
    fn test_orphans_become_roots() {
        let flat = vec![category(2, Some(99)), category(3, Some(2))];
        let forest = CategoryTree::build(&flat);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].category.id, 2);
        assert_eq!(forest[0].children[0].category.id, 3);
    }

    #[test]
    fn test_is_root_and_path() {
        assert!(category(1, None).is_root());
        assert!(!category(2, Some(1)).is_root());
        assert_eq!(category(7, None).path(), "/categories/cat-7");
    }
}
