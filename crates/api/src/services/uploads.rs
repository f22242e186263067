//! Image uploads on local disk.
//!
//! Files land in `<dir>/<feature>/<uuid>.<ext>` and are served back under
//! `/uploads/<feature>/<file>`.

use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use emporium_core::Role;

use crate::config::UploadConfig;

/// Public URL prefix the upload directory is served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unknown upload feature '{0}'")]
    UnknownFeature(String),
    #[error("unsupported content type '{0}'; expected a JPEG, PNG, WebP, GIF or SVG image")]
    UnsupportedType(String),
    #[error("file content does not match its content type '{0}'")]
    ContentMismatch(&'static str),
    #[error("file is larger than {max} bytes")]
    TooLarge { max: usize },
    #[error("file is empty")]
    Empty,
    #[error("missing multipart field 'file'")]
    MissingFile,
    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Where an upload is used. Each gets its own directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFeature {
    Products,
    Categories,
    Blog,
    Hero,
    Advantages,
    Avatars,
}

impl UploadFeature {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Categories => "categories",
            Self::Blog => "blog",
            Self::Hero => "hero",
            Self::Advantages => "advantages",
            Self::Avatars => "avatars",
        }
    }

    /// Any signed-in user may upload an avatar; the rest is back-office work.
    #[must_use]
    pub const fn allowed_for(self, role: Role) -> bool {
        match self {
            Self::Products | Self::Categories => role.can_manage_catalog(),
            Self::Blog | Self::Hero | Self::Advantages => role.can_manage_content(),
            Self::Avatars => true,
        }
    }
}

impl FromStr for UploadFeature {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "products" => Ok(Self::Products),
            "categories" => Ok(Self::Categories),
            "blog" => Ok(Self::Blog),
            "hero" => Ok(Self::Hero),
            "advantages" => Ok(Self::Advantages),
            "avatars" => Ok(Self::Avatars),
            other => Err(UploadError::UnknownFeature(other.to_owned())),
        }
    }
}

/// Accepted image type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageKind {
    Jpeg,
    Png,
    Webp,
    Gif,
    Svg,
}

impl ImageKind {
    fn from_content_type(content_type: &str) -> Result<Self, UploadError> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Ok(Self::Jpeg),
            "image/png" => Ok(Self::Png),
            "image/webp" => Ok(Self::Webp),
            "image/gif" => Ok(Self::Gif),
            "image/svg+xml" => Ok(Self::Svg),
            _ => Err(UploadError::UnsupportedType(content_type.to_owned())),
        }
    }

    const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Svg => "svg",
        }
    }

    const fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Svg => "image/svg+xml",
        }
    }

    /// Magic-number check. SVG is text, so only look for the root element.
    fn matches(self, data: &[u8]) -> bool {
        match self {
            Self::Jpeg => data.starts_with(&[0xFF, 0xD8, 0xFF]),
            Self::Png => data.starts_with(b"\x89PNG\r\n\x1a\n"),
            Self::Gif => data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a"),
            Self::Webp => data.starts_with(b"RIFF") && data.get(8..12) == Some(b"WEBP".as_slice()),
            Self::Svg => {
                let head = data.get(..1024).unwrap_or(data);
                String::from_utf8_lossy(head).contains("<svg")
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StoredUpload {
    pub url: String,
}

/// Writes validated uploads under the configured directory.
#[derive(Debug, Clone)]
pub struct UploadService {
    dir: PathBuf,
    max_bytes: usize,
}

impl UploadService {
    #[must_use]
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            max_bytes: config.max_bytes,
        }
    }

    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validate and store one file.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] for an unsupported or mismatched type, an
    /// empty or oversized file, or a write failure.
    #[instrument(skip(self, data), fields(feature = feature.as_str(), bytes = data.len()))]
    pub async fn store(
        &self,
        feature: UploadFeature,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredUpload, UploadError> {
        let kind = ImageKind::from_content_type(content_type)?;
        if data.is_empty() {
            return Err(UploadError::Empty);
        }
        if data.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                max: self.max_bytes,
            });
        }
        if !kind.matches(data) {
            return Err(UploadError::ContentMismatch(kind.mime()));
        }

        let dir = self.dir.join(feature.as_str());
        tokio::fs::create_dir_all(&dir).await?;
        let file_name = format!("{}.{}", Uuid::new_v4(), kind.extension());
        tokio::fs::write(dir.join(&file_name), data).await?;

        tracing::info!(feature = feature.as_str(), file = %file_name, "Upload stored");
        Ok(StoredUpload {
            url: format!("{PUBLIC_PREFIX}/{}/{file_name}", feature.as_str()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn service(dir: PathBuf, max_bytes: usize) -> UploadService {
        UploadService::new(&UploadConfig { dir, max_bytes })
    }

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("emporium-uploads-{name}-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_feature_names() {
        assert_eq!("blog".parse::<UploadFeature>().unwrap(), UploadFeature::Blog);
        assert!(matches!(
            "secrets".parse::<UploadFeature>(),
            Err(UploadError::UnknownFeature(_))
        ));
    }

    #[test]
    fn test_feature_permissions() {
        assert!(UploadFeature::Avatars.allowed_for(Role::User));
        assert!(!UploadFeature::Products.allowed_for(Role::User));
        assert!(UploadFeature::Products.allowed_for(Role::ContentManager));
        assert!(UploadFeature::Hero.allowed_for(Role::ContentManager));
        assert!(!UploadFeature::Blog.allowed_for(Role::Support));
    }

    #[test]
    fn test_content_type_parameters_ignored() {
        assert_eq!(
            ImageKind::from_content_type("image/PNG; charset=binary").unwrap(),
            ImageKind::Png
        );
        assert!(ImageKind::from_content_type("application/pdf").is_err());
    }

    #[test]
    fn test_magic_numbers() {
        assert!(ImageKind::Png.matches(PNG));
        assert!(!ImageKind::Jpeg.matches(PNG));
        assert!(ImageKind::Webp.matches(b"RIFF\0\0\0\0WEBPVP8 "));
        assert!(ImageKind::Svg.matches(br#"<?xml version="1.0"?><svg xmlns="x"/>"#));
    }

    #[tokio::test]
    async fn test_store_writes_under_feature_dir() {
        let dir = temp_dir("ok");
        let stored = service(dir.clone(), 1024)
            .store(UploadFeature::Products, "image/png", PNG)
            .await
            .unwrap();

        assert!(stored.url.starts_with("/uploads/products/"));
        assert!(stored.url.ends_with(".png"));
        let file = stored.url.rsplit('/').next().unwrap();
        assert_eq!(
            tokio::fs::read(dir.join("products").join(file)).await.unwrap(),
            PNG
        );
        tokio::fs::remove_dir_all(dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_store_rejects_oversized_and_mismatched() {
        let dir = temp_dir("bad");
        let uploads = service(dir, 8);
        assert!(matches!(
            uploads.store(UploadFeature::Hero, "image/png", PNG).await,
            Err(UploadError::TooLarge { max: 8 })
        ));
        assert!(matches!(
            uploads.store(UploadFeature::Hero, "image/gif", b"GIF").await,
            Err(UploadError::ContentMismatch(_))
        ));
        assert!(matches!(
            uploads.store(UploadFeature::Hero, "image/gif", b"").await,
            Err(UploadError::Empty)
        ));
    }
}
