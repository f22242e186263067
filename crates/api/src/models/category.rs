//! Product categories.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_core::{CategoryId, Slug};

use super::double_option;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub sort_order: i32,
    pub is_active: bool,
    /// Products directly in this category.
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A category with its descendants, for navigation menus.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

/// Nest a flat, already ordered list by `parent_id`.
///
/// Categories whose parent is missing from `flat` (for example an inactive
/// parent filtered out by the caller) become roots. Sibling order follows the
/// input order.
#[must_use]
pub fn build_tree(flat: Vec<Category>) -> Vec<CategoryNode> {
    let known: HashSet<CategoryId> = flat.iter().map(|c| c.id).collect();
    let mut children: HashMap<CategoryId, Vec<Category>> = HashMap::new();
    let mut roots = Vec::new();
    for category in flat {
        match category.parent_id {
            Some(parent) if known.contains(&parent) => {
                children.entry(parent).or_default().push(category);
            }
            _ => roots.push(category),
        }
    }

    roots
        .into_iter()
        .map(|c| attach(c, &mut children))
        .collect()
}

fn attach(category: Category, children: &mut HashMap<CategoryId, Vec<Category>>) -> CategoryNode {
    let kids = children.remove(&category.id).unwrap_or_default();
    CategoryNode {
        children: kids.into_iter().map(|c| attach(c, children)).collect(),
        category,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    pub name: String,
    /// Derived from `name` when absent.
    pub slug: Option<Slug>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<CategoryId>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub slug: Option<Slug>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<CategoryId>>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub(crate) const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn category(id: i32, parent: Option<i32>) -> Category {
        Category {
            id: CategoryId::new(id),
            name: format!("c{id}"),
            slug: Slug::parse(&format!("c{id}")).unwrap(),
            description: None,
            image_url: None,
            parent_id: parent.map(CategoryId::new),
            sort_order: 0,
            is_active: true,
            product_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_tree_nests_children() {
        let tree = build_tree(vec![
            category(1, None),
            category(2, Some(1)),
            category(3, Some(2)),
            category(4, None),
            category(5, Some(1)),
        ]);
        assert_eq!(tree.len(), 2);
        let first = &tree[0];
        assert_eq!(first.category.id, CategoryId::new(1));
        let child_ids: Vec<_> = first.children.iter().map(|n| n.category.id.as_i32()).collect();
        assert_eq!(child_ids, vec![2, 5]);
        assert_eq!(first.children[0].children[0].category.id, CategoryId::new(3));
    }

    #[test]
    fn test_orphans_become_roots() {
        let tree = build_tree(vec![category(7, Some(99))]);
        assert_eq!(tree.len(), 1);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn test_node_serializes_flat_with_children() {
        let tree = build_tree(vec![category(1, None), category(2, Some(1))]);
        let json = serde_json::to_value(&tree[0]).unwrap();
        assert_eq!(json["slug"], "c1");
        assert_eq!(json["children"][0]["parentId"], 1);
    }
}
