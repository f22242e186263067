//! Storefront content blocks.

use std::collections::BTreeSet;

use sqlx::PgPool;
use tracing::instrument;

use emporium_core::{AdvantageId, NavigationItemId};

use super::not_found_as;
use crate::db::CmsRepository;
use crate::db::cms::PositionedList;
use crate::error::AppError;
use crate::models::cms::{
    Advantage, AdvantageInput, AdvantagePatch, FooterBlock, HeroBlock, NavigationItem,
    NavigationItemInput, NavigationItemPatch,
};
use crate::models::{optional_text, require_text};

const MAX_LABEL_LENGTH: usize = 100;
const MAX_URL_LENGTH: usize = 500;
const MAX_TITLE_LENGTH: usize = 200;
const MAX_DESCRIPTION_LENGTH: usize = 1000;

pub struct CmsService<'a> {
    pool: &'a PgPool,
    cms: CmsRepository<'a>,
}

impl<'a> CmsService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            cms: CmsRepository::new(pool),
        }
    }

    // =========================================================================
    // Single-row blocks
    // =========================================================================

    /// The stored hero block, or the default one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn hero(&self) -> Result<HeroBlock, AppError> {
        Ok(self.cms.hero().await?.unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank title.
    #[instrument(skip_all)]
    pub async fn upsert_hero(&self, hero: HeroBlock) -> Result<HeroBlock, AppError> {
        let hero = HeroBlock {
            title: require_text("title", &hero.title, MAX_TITLE_LENGTH)
                .map_err(AppError::BadRequest)?,
            subtitle: optional_text(hero.subtitle.as_deref()),
            button_text: optional_text(hero.button_text.as_deref()),
            button_link: optional_text(hero.button_link.as_deref())
                .map(|link| check_link("buttonLink", &link))
                .transpose()?,
            image_url: optional_text(hero.image_url.as_deref()),
            is_active: hero.is_active,
        };
        let saved = self.cms.upsert_hero(&hero).await?;
        tracing::info!("Hero block updated");
        Ok(saved)
    }

    /// The stored footer, or an empty one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn footer(&self) -> Result<FooterBlock, AppError> {
        Ok(self.cms.footer().await?.unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a social link without a network or
    /// with a bad URL.
    #[instrument(skip_all)]
    pub async fn upsert_footer(&self, mut footer: FooterBlock) -> Result<FooterBlock, AppError> {
        for link in &mut footer.social_links {
            link.network = require_text("socialLinks.network", &link.network, MAX_LABEL_LENGTH)
                .map_err(AppError::BadRequest)?;
            link.url = check_link("socialLinks.url", &link.url)?;
        }
        footer.about_text = optional_text(footer.about_text.as_deref());
        footer.phone = optional_text(footer.phone.as_deref());
        footer.email = optional_text(footer.email.as_deref());
        footer.address = optional_text(footer.address.as_deref());
        footer.copyright = optional_text(footer.copyright.as_deref());

        let saved = self.cms.upsert_footer(&footer).await?;
        tracing::info!(links = saved.social_links.len(), "Footer block updated");
        Ok(saved)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn navigation(&self, include_inactive: bool) -> Result<Vec<NavigationItem>, AppError> {
        Ok(self.cms.navigation(include_inactive).await?)
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank label or a bad URL.
    pub async fn create_navigation(
        &self,
        input: NavigationItemInput,
    ) -> Result<NavigationItem, AppError> {
        let label =
            require_text("label", &input.label, MAX_LABEL_LENGTH).map_err(AppError::BadRequest)?;
        let url = check_link("url", &input.url)?;
        let item = self
            .cms
            .create_navigation(&label, &url, input.is_active, input.open_in_new_tab)
            .await?;
        tracing::info!(item_id = %item.id, position = item.position, "Navigation item created");
        Ok(item)
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` or `AppError::BadRequest`.
    pub async fn update_navigation(
        &self,
        id: NavigationItemId,
        mut patch: NavigationItemPatch,
    ) -> Result<NavigationItem, AppError> {
        if let Some(label) = patch.label.as_deref() {
            patch.label =
                Some(require_text("label", label, MAX_LABEL_LENGTH).map_err(AppError::BadRequest)?);
        }
        if let Some(url) = patch.url.as_deref() {
            patch.url = Some(check_link("url", url)?);
        }
        self.cms
            .update_navigation(id, &patch)
            .await
            .map_err(|e| not_found_as("Navigation item", e))
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the item does not exist.
    pub async fn delete_navigation(&self, id: NavigationItemId) -> Result<(), AppError> {
        self.cms
            .delete(PositionedList::Navigation, id.into())
            .await
            .map_err(|e| not_found_as("Navigation item", e))
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` unless `ids` is exactly the current set.
    pub async fn reorder_navigation(
        &self,
        ids: &[NavigationItemId],
    ) -> Result<Vec<NavigationItem>, AppError> {
        let ids: Vec<i32> = ids.iter().copied().map(i32::from).collect();
        self.reorder(PositionedList::Navigation, &ids).await?;
        self.navigation(true).await
    }

    // =========================================================================
    // Advantages
    // =========================================================================

    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn advantages(&self, include_inactive: bool) -> Result<Vec<Advantage>, AppError> {
        Ok(self.cms.advantages(include_inactive).await?)
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank title or description.
    pub async fn create_advantage(&self, input: AdvantageInput) -> Result<Advantage, AppError> {
        let title =
            require_text("title", &input.title, MAX_TITLE_LENGTH).map_err(AppError::BadRequest)?;
        let description = require_text("description", &input.description, MAX_DESCRIPTION_LENGTH)
            .map_err(AppError::BadRequest)?;
        let icon = optional_text(input.icon.as_deref());
        let advantage = self
            .cms
            .create_advantage(&title, &description, icon.as_deref(), input.is_active)
            .await?;
        tracing::info!(advantage_id = %advantage.id, "Advantage created");
        Ok(advantage)
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` or `AppError::BadRequest`.
    pub async fn update_advantage(
        &self,
        id: AdvantageId,
        mut patch: AdvantagePatch,
    ) -> Result<Advantage, AppError> {
        if let Some(title) = patch.title.as_deref() {
            patch.title =
                Some(require_text("title", title, MAX_TITLE_LENGTH).map_err(AppError::BadRequest)?);
        }
        if let Some(description) = patch.description.as_deref() {
            patch.description = Some(
                require_text("description", description, MAX_DESCRIPTION_LENGTH)
                    .map_err(AppError::BadRequest)?,
            );
        }
        patch.icon = patch.icon.map(|icon| optional_text(icon.as_deref()));
        self.cms
            .update_advantage(id, &patch)
            .await
            .map_err(|e| not_found_as("Advantage", e))
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the advantage does not exist.
    pub async fn delete_advantage(&self, id: AdvantageId) -> Result<(), AppError> {
        self.cms
            .delete(PositionedList::Advantages, id.into())
            .await
            .map_err(|e| not_found_as("Advantage", e))
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` unless `ids` is exactly the current set.
    pub async fn reorder_advantages(&self, ids: &[AdvantageId]) -> Result<Vec<Advantage>, AppError> {
        let ids: Vec<i32> = ids.iter().copied().map(i32::from).collect();
        self.reorder(PositionedList::Advantages, &ids).await?;
        self.advantages(true).await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn reorder(&self, list: PositionedList, ids: &[i32]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let current = CmsRepository::lock_ids(&mut tx, list).await?;
        check_same_ids(&current, ids)?;
        CmsRepository::set_positions(&mut tx, list, ids).await?;
        tx.commit().await?;
        tracing::info!(?list, "List reordered");
        Ok(())
    }
}

/// A reorder must name every current item exactly once.
fn check_same_ids(current: &[i32], requested: &[i32]) -> Result<(), AppError> {
    let wanted: BTreeSet<i32> = requested.iter().copied().collect();
    if wanted.len() != requested.len() {
        return Err(AppError::bad_request("ids must not contain duplicates"));
    }
    let existing: BTreeSet<i32> = current.iter().copied().collect();
    if wanted != existing {
        let missing: Vec<_> = existing.difference(&wanted).collect();
        let unknown: Vec<_> = wanted.difference(&existing).collect();
        return Err(AppError::bad_request(format!(
            "ids must list every item exactly once (missing: {missing:?}, unknown: {unknown:?})"
        )));
    }
    Ok(())
}

/// Site-relative paths, `http(s)` URLs, `mailto:` and `tel:` links.
fn check_link(field: &str, link: &str) -> Result<String, AppError> {
    let link = require_text(field, link, MAX_URL_LENGTH).map_err(AppError::BadRequest)?;
    let accepted = link.starts_with('/')
        || ["mailto:", "tel:"].iter().any(|p| link.starts_with(p))
        || url::Url::parse(&link).is_ok_and(|u| matches!(u.scheme(), "http" | "https"));
    if !accepted {
        return Err(AppError::bad_request(format!(
            "{field} must be a site path or an http(s) URL"
        )));
    }
    Ok(link)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reorder_accepts_permutation() {
        assert!(check_same_ids(&[1, 2, 3], &[3, 1, 2]).is_ok());
        assert!(check_same_ids(&[], &[]).is_ok());
    }

    #[test]
    fn test_reorder_rejects_mismatched_sets() {
        assert!(matches!(
            check_same_ids(&[1, 2, 3], &[1, 2]),
            Err(AppError::BadRequest(_))
        ));
        assert!(check_same_ids(&[1, 2], &[1, 2, 9]).is_err());
        assert!(check_same_ids(&[1, 2], &[1, 1]).is_err());
    }

    #[test]
    fn test_link_kinds() {
        assert_eq!(check_link("url", " /catalog ").unwrap(), "/catalog");
        assert!(check_link("url", "https://example.com/sale").is_ok());
        assert!(check_link("url", "mailto:shop@example.com").is_ok());
        assert!(check_link("url", "javascript:alert(1)").is_err());
        assert!(check_link("url", "").is_err());
    }
}
