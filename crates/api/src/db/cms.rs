//! CMS block repository.
//!
//! Hero and footer are single rows pinned to `id = 1`. Navigation items and
//! advantages are lists ordered by `position`.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use emporium_core::{AdvantageId, NavigationItemId};

use super::{RepositoryError, expect_affected};
use crate::models::cms::{
    Advantage, AdvantagePatch, FooterBlock, HeroBlock, NavigationItem, NavigationItemPatch,
    SocialLink,
};

/// A list whose order is stored in a `position` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionedList {
    Navigation,
    Advantages,
}

impl PositionedList {
    const fn table(self) -> &'static str {
        match self {
            Self::Navigation => "navigation_items",
            Self::Advantages => "advantages",
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HeroRow {
    title: String,
    subtitle: Option<String>,
    button_text: Option<String>,
    button_link: Option<String>,
    image_url: Option<String>,
    is_active: bool,
}

impl From<HeroRow> for HeroBlock {
    fn from(row: HeroRow) -> Self {
        Self {
            title: row.title,
            subtitle: row.subtitle,
            button_text: row.button_text,
            button_link: row.button_link,
            image_url: row.image_url,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FooterRow {
    about_text: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    social_links: Json<Vec<SocialLink>>,
    copyright: Option<String>,
}

impl From<FooterRow> for FooterBlock {
    fn from(row: FooterRow) -> Self {
        Self {
            about_text: row.about_text,
            phone: row.phone,
            email: row.email,
            address: row.address,
            social_links: row.social_links.0,
            copyright: row.copyright,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NavigationRow {
    id: NavigationItemId,
    label: String,
    url: String,
    position: i32,
    is_active: bool,
    open_in_new_tab: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<NavigationRow> for NavigationItem {
    fn from(row: NavigationRow) -> Self {
        Self {
            id: row.id,
            label: row.label,
            url: row.url,
            position: row.position,
            is_active: row.is_active,
            open_in_new_tab: row.open_in_new_tab,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdvantageRow {
    id: AdvantageId,
    title: String,
    description: String,
    icon: Option<String>,
    position: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AdvantageRow> for Advantage {
    fn from(row: AdvantageRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            icon: row.icon,
            position: row.position,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const NAV_COLUMNS: &str =
    "id, label, url, position, is_active, open_in_new_tab, created_at, updated_at";
const ADVANTAGE_COLUMNS: &str =
    "id, title, description, icon, position, is_active, created_at, updated_at";

/// Repository for CMS content.
pub struct CmsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CmsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Single-row blocks
    // =========================================================================

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn hero(&self) -> Result<Option<HeroBlock>, RepositoryError> {
        let row: Option<HeroRow> = sqlx::query_as(
            "SELECT title, subtitle, button_text, button_link, image_url, is_active FROM hero_blocks WHERE id = 1",
        )
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, hero))]
    pub async fn upsert_hero(&self, hero: &HeroBlock) -> Result<HeroBlock, RepositoryError> {
        let row: HeroRow = sqlx::query_as(
            r"
            INSERT INTO hero_blocks (id, title, subtitle, button_text, button_link, image_url, is_active)
            VALUES (1, $1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title, subtitle = EXCLUDED.subtitle,
                button_text = EXCLUDED.button_text, button_link = EXCLUDED.button_link,
                image_url = EXCLUDED.image_url, is_active = EXCLUDED.is_active,
                updated_at = NOW()
            RETURNING title, subtitle, button_text, button_link, image_url, is_active
            ",
        )
        .bind(&hero.title)
        .bind(hero.subtitle.as_deref())
        .bind(hero.button_text.as_deref())
        .bind(hero.button_link.as_deref())
        .bind(hero.image_url.as_deref())
        .bind(hero.is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn footer(&self) -> Result<Option<FooterBlock>, RepositoryError> {
        let row: Option<FooterRow> = sqlx::query_as(
            "SELECT about_text, phone, email, address, social_links, copyright FROM footer_blocks WHERE id = 1",
        )
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, footer))]
    pub async fn upsert_footer(&self, footer: &FooterBlock) -> Result<FooterBlock, RepositoryError> {
        let row: FooterRow = sqlx::query_as(
            r"
            INSERT INTO footer_blocks (id, about_text, phone, email, address, social_links, copyright)
            VALUES (1, $1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                about_text = EXCLUDED.about_text, phone = EXCLUDED.phone,
                email = EXCLUDED.email, address = EXCLUDED.address,
                social_links = EXCLUDED.social_links, copyright = EXCLUDED.copyright,
                updated_at = NOW()
            RETURNING about_text, phone, email, address, social_links, copyright
            ",
        )
        .bind(footer.about_text.as_deref())
        .bind(footer.phone.as_deref())
        .bind(footer.email.as_deref())
        .bind(footer.address.as_deref())
        .bind(Json(&footer.social_links))
        .bind(footer.copyright.as_deref())
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn navigation(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<NavigationItem>, RepositoryError> {
        let rows: Vec<NavigationRow> = sqlx::query_as(&format!(
            "SELECT {NAV_COLUMNS} FROM navigation_items WHERE $1 OR is_active ORDER BY position, id"
        ))
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Append a navigation item after the current last one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_navigation(
        &self,
        label: &str,
        url: &str,
        is_active: bool,
        open_in_new_tab: bool,
    ) -> Result<NavigationItem, RepositoryError> {
        let row: NavigationRow = sqlx::query_as(&format!(
            r"
            INSERT INTO navigation_items (label, url, is_active, open_in_new_tab, position)
            VALUES ($1, $2, $3, $4, (SELECT COALESCE(MAX(position) + 1, 0) FROM navigation_items))
            RETURNING {NAV_COLUMNS}
            "
        ))
        .bind(label)
        .bind(url)
        .bind(is_active)
        .bind(open_in_new_tab)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn update_navigation(
        &self,
        id: NavigationItemId,
        patch: &NavigationItemPatch,
    ) -> Result<NavigationItem, RepositoryError> {
        let row: Option<NavigationRow> = sqlx::query_as(&format!(
            r"
            UPDATE navigation_items SET
                label = COALESCE($2, label),
                url = COALESCE($3, url),
                is_active = COALESCE($4, is_active),
                open_in_new_tab = COALESCE($5, open_in_new_tab),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {NAV_COLUMNS}
            "
        ))
        .bind(id)
        .bind(patch.label.as_deref())
        .bind(patch.url.as_deref())
        .bind(patch.is_active)
        .bind(patch.open_in_new_tab)
        .fetch_optional(self.pool)
        .await?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    // =========================================================================
    // Advantages
    // =========================================================================

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn advantages(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<Advantage>, RepositoryError> {
        let rows: Vec<AdvantageRow> = sqlx::query_as(&format!(
            "SELECT {ADVANTAGE_COLUMNS} FROM advantages WHERE $1 OR is_active ORDER BY position, id"
        ))
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Append an advantage after the current last one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_advantage(
        &self,
        title: &str,
        description: &str,
        icon: Option<&str>,
        is_active: bool,
    ) -> Result<Advantage, RepositoryError> {
        let row: AdvantageRow = sqlx::query_as(&format!(
            r"
            INSERT INTO advantages (title, description, icon, is_active, position)
            VALUES ($1, $2, $3, $4, (SELECT COALESCE(MAX(position) + 1, 0) FROM advantages))
            RETURNING {ADVANTAGE_COLUMNS}
            "
        ))
        .bind(title)
        .bind(description)
        .bind(icon)
        .bind(is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the advantage does not exist.
    pub async fn update_advantage(
        &self,
        id: AdvantageId,
        patch: &AdvantagePatch,
    ) -> Result<Advantage, RepositoryError> {
        let row: Option<AdvantageRow> = sqlx::query_as(&format!(
            r"
            UPDATE advantages SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                icon = CASE WHEN $4 THEN $5 ELSE icon END,
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ADVANTAGE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.icon.is_some())
        .bind(patch.icon.clone().flatten())
        .bind(patch.is_active)
        .fetch_optional(self.pool)
        .await?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    // =========================================================================
    // Shared list operations
    // =========================================================================

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the row does not exist.
    pub async fn delete(&self, list: PositionedList, id: i32) -> Result<(), RepositoryError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", list.table()))
            .bind(id)
            .execute(self.pool)
            .await?;
        expect_affected(result.rows_affected())
    }

    /// Current ids of a list, locked for a reorder.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_ids(
        conn: &mut PgConnection,
        list: PositionedList,
    ) -> Result<Vec<i32>, RepositoryError> {
        let ids: Vec<i32> = sqlx::query_scalar(&format!(
            "SELECT id FROM {} ORDER BY id FOR UPDATE",
            list.table()
        ))
        .fetch_all(conn)
        .await?;
        Ok(ids)
    }

    /// Rewrite `position` so that `ids[i]` gets position `i`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_positions(
        conn: &mut PgConnection,
        list: PositionedList,
        ids: &[i32],
    ) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            r"
            UPDATE {table} t SET position = ord.position - 1, updated_at = NOW()
            FROM UNNEST($1::int[]) WITH ORDINALITY AS ord(id, position)
            WHERE t.id = ord.id
            ",
            table = list.table()
        ))
        .bind(ids)
        .execute(conn)
        .await?;
        Ok(())
    }
}
