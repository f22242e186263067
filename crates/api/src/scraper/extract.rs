//! Price extraction from a product page.
//!
//! Sources are tried from most to least structured: JSON-LD, meta tags,
//! microdata, then a currency-adjacent number anywhere in the visible text.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use emporium_core::Money;

use crate::import::{cell_text, parse_price};

static JSON_LD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script\b[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script\s*>"#)
        .expect("Invalid regex")
});

static META_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b([^>]*)>").expect("Invalid regex"));

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z_:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("Invalid regex")
});

static MICRODATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<[a-z0-9]+\b([^>]*\bitemprop\s*=\s*["']price["'][^>]*)>([^<]*)"#)
        .expect("Invalid regex")
});

static INVISIBLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(?:script|style|noscript)\s*>")
        .expect("Invalid regex")
});

static HEURISTIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:(?P<pre>[$€£₽])\s?(?P<a>\d[\d\s.,]*\d|\d))|(?:(?P<b>\d[\d\s.,]*\d|\d)\s?(?P<post>₽|руб\.?|р\.|€|\$|£|usd|eur|rub|gbp)(?:\W|$))",
    )
    .expect("Invalid regex")
});

/// Where on the page the price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    JsonLd,
    Meta,
    Microdata,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPrice {
    pub price: Money,
    pub currency: Option<String>,
    pub source: PriceSource,
}

/// Find the product price in `html`, preferring structured data.
#[must_use]
pub fn extract_price(html: &str) -> Option<ExtractedPrice> {
    from_json_ld(html)
        .or_else(|| from_meta(html))
        .or_else(|| from_microdata(html))
        .or_else(|| from_text(html))
}

// =============================================================================
// JSON-LD
// =============================================================================

fn from_json_ld(html: &str) -> Option<ExtractedPrice> {
    JSON_LD_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .filter_map(|m| serde_json::from_str::<Value>(m.as_str().trim()).ok())
        .find_map(|doc| find_offer_price(&doc, false))
        .map(|(price, currency)| ExtractedPrice {
            price,
            currency,
            source: PriceSource::JsonLd,
        })
}

/// Walk arrays, `@graph` and `Product.offers` looking for a priced offer.
fn find_offer_price(value: &Value, inside_product: bool) -> Option<(Money, Option<String>)> {
    match value {
        Value::Array(items) => items.iter().find_map(|v| find_offer_price(v, inside_product)),
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph")
                && let Some(found) = find_offer_price(graph, inside_product)
            {
                return Some(found);
            }
            let is_product = has_type(value, "Product");
            let is_offer = has_type(value, "Offer") || has_type(value, "AggregateOffer");
            if is_offer || (inside_product && map.contains_key("price")) {
                if let Some(found) = offer_price(map) {
                    return Some(found);
                }
            }
            if is_product || inside_product {
                return map.get("offers").and_then(|o| find_offer_price(o, true));
            }
            None
        }
        _ => None,
    }
}

fn offer_price(offer: &serde_json::Map<String, Value>) -> Option<(Money, Option<String>)> {
    let price = ["price", "lowPrice"]
        .iter()
        .filter_map(|key| offer.get(*key))
        .chain(
            offer
                .get("priceSpecification")
                .and_then(|detail| detail.get("price")),
        )
        .find_map(json_price)?;
    let currency = offer
        .get("priceCurrency")
        .and_then(Value::as_str)
        .map(str::to_uppercase);
    Some((price, currency))
}

fn json_price(value: &Value) -> Option<Money> {
    match value {
        Value::Number(n) => parse_price(&n.to_string()).ok(),
        Value::String(s) => parse_price(s).ok(),
        _ => None,
    }
}

fn has_type(value: &Value, wanted: &str) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => type_matches(t, wanted),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| type_matches(t, wanted)),
        _ => false,
    }
}

/// `Product`, `schema:Product` and `https://schema.org/Product` all count.
fn type_matches(value: &str, wanted: &str) -> bool {
    value
        .rsplit(['/', ':'])
        .next()
        .is_some_and(|t| t.eq_ignore_ascii_case(wanted))
}

// =============================================================================
// Meta tags and microdata
// =============================================================================

fn attributes(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .filter_map(|c| {
            let name = c.get(1)?.as_str().to_ascii_lowercase();
            let value = c.get(2).or_else(|| c.get(3))?.as_str().to_owned();
            Some((name, value))
        })
        .collect()
}

fn attr<'v>(attrs: &'v [(String, String)], name: &str) -> Option<&'v str> {
    attrs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn from_meta(html: &str) -> Option<ExtractedPrice> {
    let metas: Vec<Vec<(String, String)>> = META_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| attributes(m.as_str()))
        .collect();

    let named = |names: &[&str]| -> Option<String> {
        metas.iter().find_map(|attrs| {
            let key = attr(attrs, "itemprop").or_else(|| attr(attrs, "property"))?;
            names
                .iter()
                .any(|n| key.eq_ignore_ascii_case(n))
                .then(|| attr(attrs, "content").map(str::to_owned))
                .flatten()
        })
    };

    let price = named(&["price", "product:price:amount", "og:price:amount"])
        .and_then(|p| parse_price(&p).ok())?;
    let currency = named(&["priceCurrency", "product:price:currency", "og:price:currency"])
        .map(|c| c.trim().to_uppercase());
    Some(ExtractedPrice {
        price,
        currency,
        source: PriceSource::Meta,
    })
}

fn from_microdata(html: &str) -> Option<ExtractedPrice> {
    MICRODATA_RE.captures_iter(html).find_map(|c| {
        let attrs = attributes(c.get(1)?.as_str());
        let raw = attr(&attrs, "content")
            .map(str::to_owned)
            .or_else(|| c.get(2).map(|m| cell_text(m.as_str())))?;
        let price = parse_price(&raw).ok()?;
        Some(ExtractedPrice {
            price,
            currency: currency_code(&raw),
            source: PriceSource::Microdata,
        })
    })
}

// =============================================================================
// Visible text
// =============================================================================

fn from_text(html: &str) -> Option<ExtractedPrice> {
    let visible = cell_text(&INVISIBLE_RE.replace_all(html, " "));
    HEURISTIC_RE.captures_iter(&visible).find_map(|c| {
        let amount = c.name("a").or_else(|| c.name("b"))?.as_str();
        let symbol = c.name("pre").or_else(|| c.name("post"))?.as_str();
        let price = parse_price(amount.trim()).ok()?;
        if price == Money::ZERO {
            return None;
        }
        Some(ExtractedPrice {
            price,
            currency: currency_code(symbol),
            source: PriceSource::Heuristic,
        })
    })
}

fn currency_code(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let code = if lower.contains('₽') || lower.contains("руб") || lower.contains("р.") || lower.contains("rub") {
        "RUB"
    } else if lower.contains('€') || lower.contains("eur") {
        "EUR"
    } else if lower.contains('£') || lower.contains("gbp") {
        "GBP"
    } else if lower.contains('$') || lower.contains("usd") {
        "USD"
    } else {
        return None;
    };
    Some(code.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const JSON_LD: &str = r#"<script type="application/ld+json">
        {"@context":"https://schema.org","@type":"Product","name":"Kettle",
         "offers":{"@type":"Offer","price":"1499.00","priceCurrency":"rub"}}
    </script>"#;
    const META: &str = r#"<meta property="product:price:amount" content="1399.50">
        <meta property="product:price:currency" content="RUB">"#;
    const MICRODATA: &str = r#"<span itemprop="price" content="1299">1 299 ₽</span>"#;
    const TEXT: &str = "<div class=\"cost\">Now only 1 199 ₽!</div>";

    fn page(parts: &[&str]) -> String {
        format!("<html><head></head><body>{}</body></html>", parts.join("\n"))
    }

    #[test]
    fn test_json_ld_wins_over_everything() {
        let found = extract_price(&page(&[TEXT, MICRODATA, META, JSON_LD])).unwrap();
        assert_eq!(found.source, PriceSource::JsonLd);
        assert_eq!(found.price.to_string(), "1499.00");
        assert_eq!(found.currency.as_deref(), Some("RUB"));
    }

    #[test]
    fn test_meta_before_microdata_and_text() {
        let found = extract_price(&page(&[TEXT, MICRODATA, META])).unwrap();
        assert_eq!(found.source, PriceSource::Meta);
        assert_eq!(found.price.to_string(), "1399.50");
    }

    #[test]
    fn test_microdata_before_text() {
        let found = extract_price(&page(&[TEXT, MICRODATA])).unwrap();
        assert_eq!(found.source, PriceSource::Microdata);
        assert_eq!(found.price.to_string(), "1299.00");
    }

    #[test]
    fn test_abbreviated_currency_keeps_decimals() {
        let html = r#"<span itemprop="price">1 299,50 руб.</span>"#;
        let found = extract_price(html).unwrap();
        assert_eq!(found.source, PriceSource::Microdata);
        assert_eq!(found.price.to_string(), "1299.50");

        let html = r#"<meta itemprop="price" content="12.00 руб.">"#;
        assert_eq!(extract_price(html).unwrap().price.to_string(), "12.00");
    }

    #[test]
    fn test_heuristic_fallback() {
        let found = extract_price(&page(&[TEXT])).unwrap();
        assert_eq!(found.source, PriceSource::Heuristic);
        assert_eq!(found.price.to_string(), "1199.00");
        assert_eq!(found.currency.as_deref(), Some("RUB"));

        let found = extract_price("<p>Price: $24.99</p>").unwrap();
        assert_eq!(found.price.to_string(), "24.99");
        assert_eq!(found.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_graph_and_aggregate_offer() {
        let html = r#"<script type="application/ld+json">
            {"@graph":[{"@type":"WebPage"},
              {"@type":["Product"],"offers":{"@type":"AggregateOffer","lowPrice":89.9,"priceCurrency":"EUR"}}]}
        </script>"#;
        let found = extract_price(html).unwrap();
        assert_eq!(found.price.to_string(), "89.90");
        assert_eq!(found.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_scripts_ignored_by_heuristic() {
        let html = "<script>var price = '$5';</script><p>no price here</p>";
        assert!(extract_price(html).is_none());
    }

    #[test]
    fn test_broken_json_ld_falls_through() {
        let html = format!("<script type=\"application/ld+json\">{{oops</script>{META}");
        assert_eq!(extract_price(&html).unwrap().source, PriceSource::Meta);
    }
}
