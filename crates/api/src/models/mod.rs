//! Domain models and request shapes.
//!
//! Response types serialize with `camelCase` keys. Request types validate
//! what serde can (emails, slugs, money); everything that needs the database
//! is checked in `services`.

pub mod blog;
pub mod category;
pub mod cms;
pub mod notification;
pub mod order;
pub mod product;
pub mod review;
pub mod support;
pub mod user;

use serde::{Deserialize, Deserializer, Serialize};

pub use user::CurrentUser;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// `?page=&limit=` query parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Clamp to `page >= 1` and `1 <= limit <= 100`.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    #[must_use]
    pub fn offset(self) -> i64 {
        let p = self.normalized();
        i64::from(p.page - 1) * i64::from(p.limit)
    }

    #[must_use]
    pub fn limit(self) -> i64 {
        i64::from(self.normalized().limit)
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        let p = pagination.normalized();
        let limit = i64::from(p.limit);
        Self {
            items,
            total,
            page: p.page,
            limit: p.limit,
            total_pages: (total + limit - 1) / limit,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

/// Distinguish an absent field from an explicit `null` in PATCH bodies.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`:
/// absent → `None`, `null` → `Some(None)`, value → `Some(Some(v))`.
///
/// # Errors
///
/// Propagates the inner deserializer's error.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trimmed, non-empty text of bounded length.
///
/// # Errors
///
/// Returns a human-readable message naming `field`.
pub fn require_text(field: &str, value: &str, max: usize) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{field} cannot be empty"));
    }
    if trimmed.chars().count() > max {
        return Err(format!("{field} must be at most {max} characters"));
    }
    Ok(trimmed.to_owned())
}

/// Optional text: blank becomes `None`.
#[must_use]
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination { page: 0, limit: 1000 }.normalized();
        assert_eq!((p.page, p.limit), (1, 100));
        let p = Pagination { page: 3, limit: 0 }.normalized();
        assert_eq!((p.page, p.limit), (3, 1));
    }

    #[test]
    fn test_offset() {
        assert_eq!(Pagination { page: 3, limit: 20 }.offset(), 40);
        assert_eq!(Pagination::default().offset(), 0);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page = Paginated::new(vec![1, 2], 41, Pagination { page: 1, limit: 20 });
        assert_eq!(page.total_pages, 3);
        let empty: Paginated<i32> = Paginated::new(vec![], 0, Pagination::default());
        assert_eq!(empty.total_pages, 0);
    }

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        parent: Option<Option<i32>>,
    }

    #[test]
    fn test_double_option() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.parent, None);
        let null: Patch = serde_json::from_str(r#"{"parent":null}"#).unwrap();
        assert_eq!(null.parent, Some(None));
        let set: Patch = serde_json::from_str(r#"{"parent":4}"#).unwrap();
        assert_eq!(set.parent, Some(Some(4)));
    }

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("name", "  Kettle ", 10).unwrap(), "Kettle");
        assert!(require_text("name", "   ", 10).is_err());
        assert!(require_text("name", "abcdefghijk", 10).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(Some("  ")), None);
        assert_eq!(optional_text(Some(" hi ")), Some("hi".to_owned()));
        assert_eq!(optional_text(None), None);
    }
}
