//! Demo data for local development.
//!
//! Every record is looked up by slug (or, for content blocks, by presence)
//! before insertion, so the command can be re-run against a live database.

use emporium_api::db::CmsRepository;
use emporium_api::error::AppError;
use emporium_api::models::category::CategoryInput;
use emporium_api::models::cms::{AdvantageInput, HeroBlock, NavigationItemInput};
use emporium_api::models::product::ProductInput;
use emporium_api::search::SearchClient;
use emporium_api::services::categories::CategoryService;
use emporium_api::services::cms::CmsService;
use emporium_api::services::products::ProductService;
use emporium_core::{CategoryId, Money, Slug};

use super::{CliError, Context};

struct SeedCategory {
    slug: &'static str,
    name: &'static str,
    parent: Option<&'static str>,
}

struct SeedProduct {
    slug: &'static str,
    name: &'static str,
    sku: &'static str,
    category: &'static str,
    price_cents: i64,
    compare_at_cents: Option<i64>,
    stock: i32,
}

const CATEGORIES: &[SeedCategory] = &[
    SeedCategory { slug: "electronics", name: "Electronics", parent: None },
    SeedCategory { slug: "headphones", name: "Headphones", parent: Some("electronics") },
    SeedCategory { slug: "home", name: "Home & Kitchen", parent: None },
    SeedCategory { slug: "books", name: "Books", parent: None },
];

const PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        slug: "wireless-headphones",
        name: "Wireless Headphones",
        sku: "HP-001",
        category: "headphones",
        price_cents: 1_299_000,
        compare_at_cents: Some(1_499_000),
        stock: 25,
    },
    SeedProduct {
        slug: "usb-c-charger",
        name: "USB-C Charger 65W",
        sku: "EL-014",
        category: "electronics",
        price_cents: 249_000,
        compare_at_cents: None,
        stock: 120,
    },
    SeedProduct {
        slug: "cast-iron-skillet",
        name: "Cast Iron Skillet",
        sku: "HK-203",
        category: "home",
        price_cents: 389_900,
        compare_at_cents: None,
        stock: 40,
    },
    SeedProduct {
        slug: "rust-in-action",
        name: "Rust in Action",
        sku: "BK-777",
        category: "books",
        price_cents: 199_000,
        compare_at_cents: Some(239_000),
        stock: 0,
    },
];

/// Seed categories, products and storefront content.
///
/// # Errors
///
/// Returns `CliError::App` for validation failures or database errors.
pub async fn run(ctx: &Context) -> Result<(), CliError> {
    let categories = CategoryService::new(&ctx.pool);
    let mut created = 0usize;
    for seed in CATEGORIES {
        if seed_category(&categories, seed).await? {
            created += 1;
        }
    }
    tracing::info!(created, total = CATEGORIES.len(), "Categories seeded");

    // Indexing is left to `search reindex` so seeding works without Elasticsearch.
    let search = SearchClient::disabled();
    let products = ProductService::new(&ctx.pool, &search);
    let mut created = 0usize;
    for seed in PRODUCTS {
        if seed_product(&categories, &products, seed).await? {
            created += 1;
        }
    }
    tracing::info!(created, total = PRODUCTS.len(), "Products seeded");

    seed_content(ctx).await?;
    tracing::info!("Seeding complete!");
    Ok(())
}

async fn seed_category(
    categories: &CategoryService<'_>,
    seed: &SeedCategory,
) -> Result<bool, CliError> {
    if exists(categories.get_by_slug(seed.slug, true).await)? {
        return Ok(false);
    }
    let parent_id = match seed.parent {
        Some(parent) => Some(category_id(categories, parent).await?),
        None => None,
    };
    categories
        .create(CategoryInput {
            name: seed.name.to_owned(),
            slug: Some(slug(seed.slug)?),
            description: None,
            image_url: None,
            parent_id,
            sort_order: 0,
            is_active: true,
        })
        .await?;
    Ok(true)
}

async fn seed_product(
    categories: &CategoryService<'_>,
    products: &ProductService<'_>,
    seed: &SeedProduct,
) -> Result<bool, CliError> {
    if exists(products.get_by_slug(seed.slug, true).await)? {
        return Ok(false);
    }
    products
        .create(ProductInput {
            name: seed.name.to_owned(),
            slug: Some(slug(seed.slug)?),
            sku: Some(seed.sku.to_owned()),
            description: None,
            price: money(seed.price_cents)?,
            compare_at_price: seed.compare_at_cents.map(money).transpose()?,
            stock: seed.stock,
            category_id: Some(category_id(categories, seed.category).await?),
            images: Vec::new(),
            is_active: true,
        })
        .await?;
    Ok(true)
}

async fn seed_content(ctx: &Context) -> Result<(), CliError> {
    let cms = CmsService::new(&ctx.pool);

    if CmsRepository::new(&ctx.pool).hero().await.map_err(AppError::from)?.is_none() {
        cms.upsert_hero(HeroBlock {
            title: "Everything for home and work".to_owned(),
            subtitle: Some("Free delivery on orders over 5000".to_owned()),
            ..HeroBlock::default()
        })
        .await?;
        tracing::info!("Hero block seeded");
    }

    if cms.navigation(true).await?.is_empty() {
        for (label, url) in [("Catalog", "/catalog"), ("Blog", "/blog"), ("Contacts", "/contacts")] {
            cms.create_navigation(NavigationItemInput {
                label: label.to_owned(),
                url: url.to_owned(),
                is_active: true,
                open_in_new_tab: false,
            })
            .await?;
        }
        tracing::info!("Navigation seeded");
    }

    if cms.advantages(true).await?.is_empty() {
        for (title, description) in [
            ("Fast delivery", "Orders ship within one business day."),
            ("Official warranty", "Every product comes with a manufacturer warranty."),
            ("Easy returns", "Return unused items within 14 days."),
        ] {
            cms.create_advantage(AdvantageInput {
                title: title.to_owned(),
                description: description.to_owned(),
                icon: None,
                is_active: true,
            })
            .await?;
        }
        tracing::info!("Advantages seeded");
    }
    Ok(())
}

async fn category_id(categories: &CategoryService<'_>, slug: &str) -> Result<CategoryId, CliError> {
    Ok(categories.get_by_slug(slug, true).await?.id)
}

/// `Ok(true)` when the lookup found a row, `Ok(false)` when it did not.
fn exists<T>(lookup: Result<T, AppError>) -> Result<bool, CliError> {
    match lookup {
        Ok(_) => Ok(true),
        Err(AppError::NotFound(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn slug(raw: &str) -> Result<Slug, CliError> {
    Slug::parse(raw).map_err(|e| CliError::Seed(format!("{raw}: {e}")))
}

fn money(cents: i64) -> Result<Money, CliError> {
    Money::from_cents(cents).map_err(|e| CliError::Seed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_seed_slugs_are_valid_and_unique() {
        let mut seen = HashSet::new();
        for raw in CATEGORIES.iter().map(|c| c.slug).chain(PRODUCTS.iter().map(|p| p.slug)) {
            assert!(Slug::parse(raw).is_ok(), "{raw}");
            assert!(seen.insert(raw), "duplicate slug {raw}");
        }
    }

    #[test]
    fn test_parents_and_categories_are_declared_first() {
        for (i, category) in CATEGORIES.iter().enumerate() {
            if let Some(parent) = category.parent {
                assert!(CATEGORIES.iter().take(i).any(|c| c.slug == parent));
            }
        }
        for product in PRODUCTS {
            assert!(CATEGORIES.iter().any(|c| c.slug == product.category));
        }
    }
}
