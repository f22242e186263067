//! Category management.

use sqlx::PgPool;
use tracing::instrument;

use emporium_core::{CategoryId, Slug};

use super::resolve_slug;
use crate::db::CategoryRepository;
use crate::db::categories::CategoryRecord;
use crate::error::AppError;
use crate::models::category::{Category, CategoryInput, CategoryNode, CategoryPatch, build_tree};
use crate::models::{optional_text, require_text};

const MAX_NAME_LENGTH: usize = 120;

pub struct CategoryService<'a> {
    categories: CategoryRepository<'a>,
}

impl<'a> CategoryService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            categories: CategoryRepository::new(pool),
        }
    }

    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Category>, AppError> {
        Ok(self.categories.list(include_inactive).await?)
    }

    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn tree(&self, include_inactive: bool) -> Result<Vec<CategoryNode>, AppError> {
        Ok(build_tree(self.categories.list(include_inactive).await?))
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the category does not exist.
    pub async fn get(&self, id: CategoryId) -> Result<Category, AppError> {
        self.categories
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Category"))
    }

    /// Inactive categories are hidden unless `include_inactive`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the category does not exist.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        include_inactive: bool,
    ) -> Result<Category, AppError> {
        let slug = Slug::parse(slug).map_err(|_| AppError::not_found("Category"))?;
        self.categories
            .get_by_slug(&slug)
            .await?
            .filter(|c| include_inactive || c.is_active)
            .ok_or_else(|| AppError::not_found("Category"))
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid input or a missing parent,
    /// `AppError::Conflict` for a taken slug.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CategoryInput) -> Result<Category, AppError> {
        let name = require_text("name", &input.name, MAX_NAME_LENGTH).map_err(AppError::BadRequest)?;
        if let Some(parent) = input.parent_id {
            self.require_parent(parent).await?;
        }
        let repo = &self.categories;
        let slug = resolve_slug(input.slug, &name, |s| async move {
            repo.slug_exists(&s, None).await
        })
        .await?;

        let description = optional_text(input.description.as_deref());
        let image_url = optional_text(input.image_url.as_deref());
        let category = self
            .categories
            .create(&CategoryRecord {
                name: &name,
                slug: &slug,
                description: description.as_deref(),
                image_url: image_url.as_deref(),
                parent_id: input.parent_id,
                sort_order: input.sort_order,
                is_active: input.is_active,
            })
            .await?;

        tracing::info!(category_id = %category.id, slug = %category.slug, "Category created");
        Ok(category)
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when the new parent would create a
    /// cycle, `AppError::Conflict` for a taken slug.
    #[instrument(skip(self, patch), fields(category_id = %id))]
    pub async fn update(&self, id: CategoryId, patch: CategoryPatch) -> Result<Category, AppError> {
        let current = self.get(id).await?;

        let name = match patch.name.as_deref() {
            Some(name) => require_text("name", name, MAX_NAME_LENGTH).map_err(AppError::BadRequest)?,
            None => current.name.clone(),
        };

        let slug = match patch.slug {
            Some(slug) if slug != current.slug => {
                if self.categories.slug_exists(&slug, Some(id)).await? {
                    return Err(AppError::conflict(format!("slug '{slug}' already exists")));
                }
                slug
            }
            _ => current.slug.clone(),
        };

        let parent_id = patch.parent_id.unwrap_or(current.parent_id);
        if let Some(parent) = parent_id
            && Some(parent) != current.parent_id
        {
            self.require_parent(parent).await?;
            if parent == id || self.categories.ancestors(parent).await?.contains(&id) {
                return Err(AppError::bad_request(
                    "a category cannot be nested inside itself or its descendants",
                ));
            }
        }

        let description = patch
            .description
            .map_or(current.description, |d| optional_text(d.as_deref()));
        let image_url = patch
            .image_url
            .map_or(current.image_url, |u| optional_text(u.as_deref()));

        let category = self
            .categories
            .update(
                id,
                &CategoryRecord {
                    name: &name,
                    slug: &slug,
                    description: description.as_deref(),
                    image_url: image_url.as_deref(),
                    parent_id,
                    sort_order: patch.sort_order.unwrap_or(current.sort_order),
                    is_active: patch.is_active.unwrap_or(current.is_active),
                },
            )
            .await?;
        Ok(category)
    }

    /// Delete an empty leaf category.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` when it has children or products.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn delete(&self, id: CategoryId) -> Result<(), AppError> {
        let category = self.get(id).await?;
        if self.categories.child_count(id).await? > 0 {
            return Err(AppError::conflict("category has subcategories"));
        }
        if category.product_count > 0 {
            return Err(AppError::conflict(format!(
                "category has {} products",
                category.product_count
            )));
        }
        self.categories.delete(id).await?;
        tracing::info!(category_id = %id, "Category deleted");
        Ok(())
    }

    async fn require_parent(&self, parent: CategoryId) -> Result<(), AppError> {
        if self.categories.get_by_id(parent).await?.is_none() {
            return Err(AppError::bad_request(format!(
                "parent category {parent} does not exist"
            )));
        }
        Ok(())
    }
}
