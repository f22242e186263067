//! Blog posts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_core::{BlogPostId, PostStatus, Slug, UserId};

use super::double_option;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: BlogPostId,
    pub title: String,
    pub slug: Slug,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub author_id: Option<UserId>,
    pub author_name: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub views: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostInput {
    pub title: String,
    pub slug: Option<Slug>,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: PostStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostPatch {
    pub title: Option<String>,
    pub slug: Option<Slug>,
    #[serde(default, deserialize_with = "double_option")]
    pub excerpt: Option<Option<String>>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub cover_image: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub status: Option<PostStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PublicPostQuery {
    pub tag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminPostQuery {
    pub status: Option<PostStatus>,
}

/// Lower-case, trim, drop blanks and duplicates while keeping order.
#[must_use]
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags(vec![
            " Coffee ".into(),
            "coffee".into(),
            String::new(),
            "Brewing".into(),
        ]);
        assert_eq!(tags, vec!["coffee", "brewing"]);
    }
}
