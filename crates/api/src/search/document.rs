//! Elasticsearch document shape and request bodies.

use std::fmt::Write as _;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};

use crate::models::product::Product;

/// What gets indexed for a product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDocument {
    pub name: String,
    pub slug: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    pub in_stock: bool,
    pub is_active: bool,
}

impl From<&Product> for ProductDocument {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            slug: product.slug.as_str().to_owned(),
            sku: product.sku.clone(),
            description: product.description.clone(),
            category: product.category_name.clone(),
            price: product.price.amount(),
            in_stock: product.in_stock(),
            is_active: product.is_active,
        }
    }
}

pub(super) fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "name": { "type": "text" },
                "slug": { "type": "keyword" },
                "sku": { "type": "text", "fields": { "raw": { "type": "keyword" } } },
                "description": { "type": "text" },
                "category": { "type": "text" },
                "price": { "type": "scaled_float", "scaling_factor": 100 },
                "inStock": { "type": "boolean" },
                "isActive": { "type": "boolean" }
            }
        }
    })
}

/// NDJSON body for `_bulk`: an `index` action line and a source line per
/// product, newline-terminated.
pub(super) fn bulk_body(index: &str, products: &[Product]) -> String {
    let mut body = String::new();
    for product in products {
        let action = json!({ "index": { "_index": index, "_id": product.id.to_string() } });
        let source = serde_json::to_string(&ProductDocument::from(product)).unwrap_or_default();
        let _ = writeln!(body, "{action}");
        let _ = writeln!(body, "{source}");
    }
    body
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use emporium_core::{Money, ProductId, Slug};

    use super::*;

    fn product(id: i32, name: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.into(),
            slug: Slug::from_title(name).unwrap(),
            sku: Some(format!("SKU-{id}")),
            description: None,
            price: Money::from_cents(1999).unwrap(),
            compare_at_price: None,
            stock: 0,
            category_id: None,
            category_name: Some("Kitchen".into()),
            images: vec![],
            is_active: true,
            rating_avg: Decimal::ZERO,
            rating_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_bulk_body_is_ndjson_pairs() {
        let body = bulk_body("products", &[product(1, "Tea Kettle"), product(2, "Mug")]);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(body.ends_with('\n'));
        let action: Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(action["index"]["_id"], "2");
        let source: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(source["name"], "Tea Kettle");
        assert_eq!(source["inStock"], false);
        assert_eq!(source["category"], "Kitchen");
    }
}
