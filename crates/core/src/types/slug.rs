//! URL slugs for products, categories and blog posts.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug cannot be empty")]
    Empty,
    #[error("slug must be at most {max} characters")]
    TooLong { max: usize },
    #[error("slug may only contain lowercase letters, digits and single hyphens")]
    InvalidFormat,
}

/// A URL-safe identifier: `[a-z0-9]+(-[a-z0-9]+)*`.
///
/// Slugs are unique per table; uniqueness itself is enforced by the database
/// and surfaced as a conflict by the repositories.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    pub const MAX_LENGTH: usize = 160;

    /// Validate a caller-supplied slug.
    ///
    /// # Errors
    ///
    /// Returns [`SlugError`] if the slug is empty, too long or malformed.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        let well_formed = s
            .split('-')
            .all(|seg| !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
        if !well_formed {
            return Err(SlugError::InvalidFormat);
        }
        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from a human title.
    ///
    /// Lower-cases, transliterates Cyrillic, and collapses every run of other
    /// characters into a single hyphen. The result is cut to
    /// [`Self::MAX_LENGTH`] on a segment boundary when possible.
    ///
    /// ```
    /// use emporium_core::Slug;
    ///
    /// assert_eq!(Slug::from_title("Hello, World!").unwrap().as_str(), "hello-world");
    /// assert_eq!(Slug::from_title("Чайник 2000").unwrap().as_str(), "chaynik-2000");
    /// assert!(Slug::from_title("!!!").is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Empty`] when the title has no usable characters.
    pub fn from_title(title: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(title.len());
        let mut pending_hyphen = false;

        for ch in title.chars().flat_map(char::to_lowercase) {
            let mut buf = [0u8; 4];
            let piece = match transliterate(ch) {
                Some("") => continue,
                Some(latin) => latin,
                None if ch.is_ascii_alphanumeric() => &*ch.encode_utf8(&mut buf),
                None => {
                    pending_hyphen = true;
                    continue;
                }
            };
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push_str(piece);
        }

        if out.len() > Self::MAX_LENGTH {
            out.truncate(Self::MAX_LENGTH);
            if let Some(cut) = out.rfind('-') {
                out.truncate(cut);
            }
            while out.ends_with('-') {
                out.pop();
            }
        }

        if out.is_empty() {
            return Err(SlugError::Empty);
        }
        Ok(Self(out))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Append a numeric suffix, e.g. `kettle` → `kettle-2`.
    #[must_use]
    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}-{n}", self.0))
    }
}

/// Latin rendering of a lower-case Cyrillic letter.
const fn transliterate(ch: char) -> Option<&'static str> {
    Some(match ch {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' | 'э' => "e",
        'ё' => "yo",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' | 'ы' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ю' => "yu",
        'я' => "ya",
        'ъ' | 'ь' => "",
        _ => return None,
    })
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Slug {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Slug {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Slug {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        <String as sqlx::Decode<sqlx::Postgres>>::decode(value).map(Self)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Slug {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_well_formed() {
        assert!(Slug::parse("summer-sale-2024").is_ok());
        assert!(Slug::parse("a").is_ok());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
        assert_eq!(Slug::parse("Upper"), Err(SlugError::InvalidFormat));
        assert_eq!(Slug::parse("-lead"), Err(SlugError::InvalidFormat));
        assert_eq!(Slug::parse("trail-"), Err(SlugError::InvalidFormat));
        assert_eq!(Slug::parse("dou--ble"), Err(SlugError::InvalidFormat));
        assert_eq!(Slug::parse("snake_case"), Err(SlugError::InvalidFormat));
    }

    #[test]
    fn test_from_title_collapses_separators() {
        let slug = Slug::from_title("  New   Arrivals -- Spring/Summer ").unwrap();
        assert_eq!(slug.as_str(), "new-arrivals-spring-summer");
    }

    #[test]
    fn test_from_title_transliterates() {
        assert_eq!(Slug::from_title("Щётка для обуви").unwrap().as_str(), "schyotka-dlya-obuvi");
        assert_eq!(Slug::from_title("Подъезд").unwrap().as_str(), "podezd");
    }

    #[test]
    fn test_from_title_output_parses() {
        let slug = Slug::from_title("Über Café #1").unwrap();
        assert!(Slug::parse(slug.as_str()).is_ok());
    }

    #[test]
    fn test_from_title_truncates_on_boundary() {
        let title = "word ".repeat(60);
        let slug = Slug::from_title(&title).unwrap();
        assert!(slug.as_str().len() <= Slug::MAX_LENGTH);
        assert!(!slug.as_str().ends_with('-'));
        assert!(slug.as_str().ends_with("word"));
    }

    #[test]
    fn test_with_suffix() {
        let slug = Slug::parse("kettle").unwrap();
        assert_eq!(slug.with_suffix(2).as_str(), "kettle-2");
    }
}
