//! Storefront content blocks: hero banner, footer, navigation and the
//! "why us" advantages strip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_core::{AdvantageId, NavigationItemId};

use super::category::default_true;
use super::double_option;

/// The home page banner. A single row; a default is served until someone
/// saves one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HeroBlock {
    pub title: String,
    pub subtitle: Option<String>,
    pub button_text: Option<String>,
    pub button_link: Option<String>,
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Default for HeroBlock {
    fn default() -> Self {
        Self {
            title: "Welcome".to_owned(),
            subtitle: None,
            button_text: Some("Shop now".to_owned()),
            button_link: Some("/catalog".to_owned()),
            image_url: None,
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FooterBlock {
    pub about_text: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub social_links: Vec<SocialLink>,
    pub copyright: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SocialLink {
    pub network: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationItem {
    pub id: NavigationItemId,
    pub label: String,
    pub url: String,
    pub position: i32,
    pub is_active: bool,
    pub open_in_new_tab: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationItemInput {
    pub label: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub open_in_new_tab: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationItemPatch {
    pub label: Option<String>,
    pub url: Option<String>,
    pub is_active: Option<bool>,
    pub open_in_new_tab: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Advantage {
    pub id: AdvantageId,
    pub title: String,
    pub description: String,
    pub icon: Option<String>,
    pub position: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvantageInput {
    pub title: String,
    pub description: String,
    pub icon: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvantagePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// New order for a positioned list: every current id, exactly once.
#[derive(Debug, Deserialize)]
pub struct ReorderRequest<Id> {
    pub ids: Vec<Id>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_footer_defaults_social_links() {
        let footer: FooterBlock = serde_json::from_str(r#"{"phone":"+7 900"}"#).unwrap();
        assert!(footer.social_links.is_empty());
        assert_eq!(footer.phone.as_deref(), Some("+7 900"));
    }

    #[test]
    fn test_reorder_request() {
        let req: ReorderRequest<NavigationItemId> =
            serde_json::from_str(r#"{"ids":[3,1,2]}"#).unwrap();
        assert_eq!(req.ids[0], NavigationItemId::new(3));
    }
}
