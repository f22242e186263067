//! HTML table extraction.
//!
//! Admins paste a table copied from a spreadsheet or a supplier's site. The
//! markup is rarely well-formed, so cells are pulled out with regexes rather
//! than a DOM parser.

use std::sync::LazyLock;

use regex::Regex;

use super::price::parse_price;
use super::{ImportError, ImportRow, RowError};

static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table\s*>").expect("Invalid regex"));

static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").expect("Invalid regex"));

static CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(th|td)\b[^>]*>(.*?)</(?:th|td)\s*>").expect("Invalid regex")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("Invalid regex"));

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("Invalid regex"));

/// Product field a column feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Name,
    Sku,
    Price,
    CompareAtPrice,
    Stock,
    Category,
    Description,
}

impl Column {
    /// Map a header cell to a field. Unknown headers are ignored.
    #[must_use]
    pub fn from_header(header: &str) -> Option<Self> {
        let key = header
            .to_lowercase()
            .replace(['_', '-'], " ")
            .replace(['*', ':'], "");
        let key = key.split_whitespace().collect::<Vec<_>>().join(" ");
        match key.as_str() {
            "name" | "title" | "product" | "product name" => Some(Self::Name),
            "sku" | "article" | "article number" => Some(Self::Sku),
            "price" => Some(Self::Price),
            "compare at price" | "old price" => Some(Self::CompareAtPrice),
            "stock" | "quantity" | "qty" => Some(Self::Stock),
            "category" | "category slug" => Some(Self::Category),
            "description" => Some(Self::Description),
            _ => None,
        }
    }
}

/// Rows that parsed, and the ones that did not.
#[derive(Debug, Default)]
pub struct ParsedTable {
    pub rows: Vec<ImportRow>,
    pub errors: Vec<RowError>,
    /// Rows above the header (captions, notes) that were not imported.
    pub skipped: usize,
}

/// A cell as it appeared in the markup.
struct Cell {
    is_header: bool,
    text: String,
}

/// Parse the first `<table>` in `html`.
///
/// The header is the first row made of `<th>` cells, or the first row when
/// there is none. Rows above the header are not imported; their count is in
/// [`ParsedTable::skipped`]. Data rows are numbered from 1.
///
/// # Errors
///
/// Returns [`ImportError`] when there is no table, no header, no data, or
/// the header lacks a name or price column.
pub fn parse_table(html: &str, max_rows: usize) -> Result<ParsedTable, ImportError> {
    let table = TABLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or(ImportError::NoTable)?
        .as_str();

    let rows: Vec<Vec<Cell>> = ROW_RE
        .captures_iter(table)
        .filter_map(|c| c.get(1))
        .map(|m| cells(m.as_str()))
        .filter(|cells| !cells.is_empty())
        .collect();

    let header_at = rows
        .iter()
        .position(|row| row.iter().all(|c| c.is_header))
        .unwrap_or(0);
    let header = rows.get(header_at).ok_or(ImportError::NoHeader)?;
    let columns: Vec<Option<Column>> = header.iter().map(|c| Column::from_header(&c.text)).collect();
    for required in [Column::Name, Column::Price] {
        if !columns.contains(&Some(required)) {
            return Err(ImportError::MissingColumn(required));
        }
    }

    let data: Vec<&Vec<Cell>> = rows
        .iter()
        .skip(header_at + 1)
        .filter(|row| row.iter().any(|c| !c.text.is_empty()))
        .collect();
    if data.is_empty() {
        return Err(ImportError::NoRows);
    }
    if data.len() > max_rows {
        return Err(ImportError::TooManyRows { max: max_rows });
    }

    let mut parsed = ParsedTable {
        skipped: header_at,
        ..ParsedTable::default()
    };
    for (index, row) in data.into_iter().enumerate() {
        let number = index + 1;
        if row.len() != columns.len() {
            parsed.errors.push(RowError {
                row: number,
                message: format!("expected {} cells, found {}", columns.len(), row.len()),
            });
            continue;
        }
        match read_row(number, &columns, row) {
            Ok(item) => parsed.rows.push(item),
            Err(message) => parsed.errors.push(RowError {
                row: number,
                message,
            }),
        }
    }
    Ok(parsed)
}

fn cells(row_html: &str) -> Vec<Cell> {
    CELL_RE
        .captures_iter(row_html)
        .map(|c| Cell {
            is_header: c.get(1).is_some_and(|m| m.as_str().eq_ignore_ascii_case("th")),
            text: c.get(2).map_or_else(String::new, |m| cell_text(m.as_str())),
        })
        .collect()
}

fn read_row(number: usize, columns: &[Option<Column>], row: &[Cell]) -> Result<ImportRow, String> {
    let mut item = ImportRow {
        row: number,
        name: String::new(),
        sku: None,
        price: emporium_core::Money::ZERO,
        compare_at_price: None,
        stock: None,
        category: None,
        description: None,
    };
    let mut has_price = false;

    // First occurrence of a column wins.
    let mut seen: Vec<Column> = Vec::with_capacity(columns.len());
    for (column, cell) in columns.iter().zip(row) {
        let Some(column) = *column else { continue };
        if seen.contains(&column) {
            continue;
        }
        seen.push(column);

        let text = cell.text.as_str();
        let value = (!text.is_empty()).then(|| text.to_owned());
        match column {
            Column::Name => item.name = text.to_owned(),
            Column::Sku => item.sku = value,
            Column::Price if !text.is_empty() => {
                item.price = parse_price(text)?;
                has_price = true;
            }
            Column::Price => {}
            Column::CompareAtPrice => {
                item.compare_at_price = value.as_deref().map(parse_price).transpose()?;
            }
            Column::Stock => item.stock = value.as_deref().map(parse_stock).transpose()?,
            Column::Category => item.category = value,
            Column::Description => item.description = value,
        }
    }

    if item.name.is_empty() {
        return Err("name is required".to_owned());
    }
    if !has_price {
        return Err("price is required".to_owned());
    }
    Ok(item)
}

fn parse_stock(raw: &str) -> Result<i32, String> {
    let digits: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let stock: i32 = digits
        .parse()
        .map_err(|_| format!("stock must be a whole number: '{raw}'"))?;
    if stock < 0 {
        return Err(format!("stock cannot be negative: '{raw}'"));
    }
    Ok(stock)
}

/// Strip tags, decode entities and collapse whitespace.
#[must_use]
pub fn cell_text(html: &str) -> String {
    let with_breaks = html.replace("<br>", " ").replace("<br/>", " ").replace("<br />", " ");
    let stripped = TAG_RE.replace_all(&with_breaks, "");
    let decoded = decode_entities(&stripped);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures| {
            let entity = caps.get(1).map_or("", |m| m.as_str());
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                numeric => numeric.strip_prefix('#').and_then(|n| {
                    let code = match n.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => n.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            decoded.map_or_else(
                || caps.get(0).map_or_else(String::new, |m| m.as_str().to_owned()),
                String::from,
            )
        })
        .into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_header_aliases() {
        assert_eq!(Column::from_header("Title"), Some(Column::Name));
        assert_eq!(Column::from_header(" Article "), Some(Column::Sku));
        assert_eq!(Column::from_header("Old price"), Some(Column::CompareAtPrice));
        assert_eq!(Column::from_header("compare_at_price"), Some(Column::CompareAtPrice));
        assert_eq!(Column::from_header("QTY"), Some(Column::Stock));
        assert_eq!(Column::from_header("Category slug"), Some(Column::Category));
        assert_eq!(Column::from_header("Price*"), Some(Column::Price));
        assert_eq!(Column::from_header("Weight"), None);
    }

    #[test]
    fn test_cell_text_strips_markup() {
        assert_eq!(
            cell_text("  <b>Tea &amp; Coffee</b><br>Set&nbsp;&#8470;1 "),
            "Tea & Coffee Set №1"
        );
        assert_eq!(cell_text("&unknown; &#x41;"), "&unknown; A");
    }

    #[test]
    fn test_th_header_and_rows() {
        let html = r#"
            <p>Price list</p>
            <table class="x">
              <tr><th>Title</th><th>Article</th><th>Price</th><th>Qty</th></tr>
              <tr><td>Kettle</td><td>KT-1</td><td>1 299,50</td><td>4</td></tr>
              <tr><td>Mug</td><td></td><td>$9.99</td><td></td></tr>
            </table>"#;
        let parsed = parse_table(html, 100).unwrap();
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].sku.as_deref(), Some("KT-1"));
        assert_eq!(parsed.rows[0].price.to_string(), "1299.50");
        assert_eq!(parsed.rows[0].stock, Some(4));
        assert_eq!(parsed.rows[1].sku, None);
        assert_eq!(parsed.rows[1].stock, None);
        assert_eq!(parsed.rows[1].row, 2);
    }

    #[test]
    fn test_first_row_header_without_th() {
        let html = "<table><tr><td>name</td><td>price</td></tr><tr><td>Cup</td><td>5</td></tr></table>";
        let parsed = parse_table(html, 100).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].name, "Cup");
    }

    #[test]
    fn test_rows_above_header_are_counted() {
        let html = r"<table>
            <tr><td colspan='2'>Spring price list</td></tr>
            <tr><th>Name</th><th>Price</th></tr>
            <tr><td>Cup</td><td>5</td></tr>
        </table>";
        let parsed = parse_table(html, 100).unwrap();
        assert_eq!(parsed.skipped, 1);
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].row, 1);

        let html = "<table><tr><th>Name</th><th>Price</th></tr><tr><td>Cup</td><td>5</td></tr></table>";
        assert_eq!(parse_table(html, 100).unwrap().skipped, 0);
    }

    #[test]
    fn test_malformed_rows_reported() {
        let html = r"<table>
            <tr><th>Name</th><th>Price</th></tr>
            <tr><td>Only name</td></tr>
            <tr><td>Bad price</td><td>ask</td></tr>
            <tr><td></td><td>10</td></tr>
            <tr><td>Good</td><td>10</td></tr>
        </table>";
        let parsed = parse_table(html, 100).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        let rows: Vec<usize> = parsed.errors.iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![1, 2, 3]);
        assert!(parsed.errors[0].message.contains("expected 2 cells"));
    }

    #[test]
    fn test_missing_price_column() {
        let html = "<table><tr><th>Name</th><th>SKU</th></tr><tr><td>A</td><td>B</td></tr></table>";
        assert!(matches!(
            parse_table(html, 100),
            Err(ImportError::MissingColumn(Column::Price))
        ));
        assert!(matches!(parse_table("<p>nothing</p>", 100), Err(ImportError::NoTable)));
    }

    #[test]
    fn test_row_limit() {
        let html = "<table><tr><th>Name</th><th>Price</th></tr>\
                    <tr><td>A</td><td>1</td></tr><tr><td>B</td><td>2</td></tr></table>";
        assert!(matches!(
            parse_table(html, 1),
            Err(ImportError::TooManyRows { max: 1 })
        ));
    }
}
