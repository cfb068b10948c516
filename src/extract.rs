// Extractor - ranking page HTML → RankedTable
//
// The page is expected to carry one relevant table:
//   <tbody>
//     <tr><th>Rank</th><th>Bank name</th><th>Market cap</th></tr>   ← skipped (no <td>)
//     <tr><td>1</td><td><a>flag</a> <a>JPMorgan Chase</a></td><td>432.92</td></tr>
//   </tbody>
//
// Markup assumptions live in an ExtractionRule so a page redesign touches
// one type, not the whole extractor.

use crate::error::{EtlError, Result};
use crate::model::{BankRecord, RankedTable};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

// ============================================================================
// EXTRACTION RULE
// ============================================================================

/// Turns the `<td>` cells of one data row into a record.
///
/// Errors are plain messages; the extractor wraps them with the row number.
pub trait ExtractionRule {
    fn extract_row(&self, cells: &[ElementRef<'_>]) -> std::result::Result<BankRecord, String>;

    /// Rule name (for diagnostics)
    fn name(&self) -> &str;
}

/// Default rule for the "List of largest banks" page:
/// - name = text of the 2nd link in the 2nd cell (1st link is the flag icon)
/// - market cap = leading text of the 3rd cell
pub struct SecondLinkRule;

impl SecondLinkRule {
    const NAME_CELL: usize = 1;
    const NAME_LINK: usize = 1;
    const MARKET_CAP_CELL: usize = 2;
}

impl ExtractionRule for SecondLinkRule {
    fn extract_row(&self, cells: &[ElementRef<'_>]) -> std::result::Result<BankRecord, String> {
        let name_cell = cells
            .get(Self::NAME_CELL)
            .ok_or_else(|| format!("expected a name cell, found {} cells", cells.len()))?;

        let link_selector = selector("a").map_err(|e| e.to_string())?;
        let link = name_cell
            .select(&link_selector)
            .nth(Self::NAME_LINK)
            .ok_or("name cell does not contain a second link")?;

        let name = link.text().collect::<String>().trim().to_string();
        if name.is_empty() {
            return Err("bank name link is empty".to_string());
        }

        let cap_cell = cells
            .get(Self::MARKET_CAP_CELL)
            .ok_or_else(|| format!("expected a market cap cell, found {} cells", cells.len()))?;

        let leading = cap_cell
            .text()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .ok_or("market cap cell is empty")?;

        let market_cap_usd = parse_market_cap(leading)?;

        Ok(BankRecord::new(name, market_cap_usd))
    }

    fn name(&self) -> &str {
        "second-link"
    }
}

/// "1,234.5" → 1234.5; rejects negatives and non-finite values
fn parse_market_cap(text: &str) -> std::result::Result<f64, String> {
    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    let value: f64 = cleaned
        .parse()
        .map_err(|_| format!("market cap '{}' is not numeric", text))?;

    if !value.is_finite() || value < 0.0 {
        return Err(format!("market cap '{}' must be a finite non-negative number", text));
    }

    Ok(value)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| EtlError::Parse(format!("invalid selector '{}': {:?}", css, e)))
}

fn child_elements<'a>(parent: ElementRef<'a>, tag: &'a str) -> impl Iterator<Item = ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == tag)
}

/// Document-order index of the `<table>` owning the first `<tbody>` tag in
/// the source. The parser inserts a body into every table, so this has to be
/// decided on the raw text.
fn explicit_body_table(document: &str) -> Option<usize> {
    let lower = document.to_ascii_lowercase();
    let body_at = open_tags(&lower, "tbody").next()?;
    open_tags(&lower, "table")
        .take_while(|&at| at < body_at)
        .count()
        .checked_sub(1)
}

/// Byte offsets of `<tag` start tags in lowercased markup
fn open_tags<'a>(lower: &'a str, tag: &'a str) -> impl Iterator<Item = usize> + 'a {
    lower.match_indices('<').map(|(at, _)| at).filter(move |&at| {
        let rest = &lower[at + 1..];
        rest.starts_with(tag)
            && rest[tag.len()..]
                .chars()
                .next()
                .map_or(false, |c| c == '>' || c == '/' || c.is_ascii_whitespace())
    })
}

// ============================================================================
// EXTRACTOR
// ============================================================================

pub struct Extractor {
    rule: Box<dyn ExtractionRule>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    /// Extractor using [`SecondLinkRule`]
    pub fn new() -> Self {
        Extractor {
            rule: Box::new(SecondLinkRule),
        }
    }

    pub fn with_rule(rule: Box<dyn ExtractionRule>) -> Self {
        Extractor { rule }
    }

    /// Parse `document` into a table with the two declared base columns.
    ///
    /// `target_columns` must be `[name_column, usd_column]`. The first
    /// `<tbody>` written in the markup is used; a table without one does not
    /// count. Rows without `<td>` cells are skipped. Any row the
    /// rule cannot read fails the whole extraction - no partial table.
    pub fn extract(&self, document: &str, target_columns: &[&str]) -> Result<RankedTable> {
        let (name_column, usd_column) = match target_columns {
            [name, usd] => (*name, *usd),
            _ => {
                return Err(EtlError::Config(format!(
                    "extractor needs exactly 2 base columns (name, market cap), got {}",
                    target_columns.len()
                )))
            }
        };

        let no_body = || EtlError::Parse("document has no table body".into());
        let table_index = explicit_body_table(document).ok_or_else(no_body)?;

        let html = Html::parse_document(document);
        let body = html
            .select(&selector("table")?)
            .nth(table_index)
            .and_then(|table| child_elements(table, "tbody").next())
            .ok_or_else(no_body)?;

        let mut records = Vec::new();
        for row in child_elements(body, "tr") {
            let cells: Vec<ElementRef<'_>> = child_elements(row, "td").collect();
            if cells.is_empty() {
                continue;
            }

            let record = self.rule.extract_row(&cells).map_err(|msg| {
                EtlError::Parse(format!("data row {}: {}", records.len() + 1, msg))
            })?;
            records.push(record);
        }

        if records.is_empty() {
            return Err(EtlError::Parse("table body has no data rows".into()));
        }

        debug!(rule = self.rule.name(), rows = records.len(), "extracted ranking rows");

        Ok(RankedTable::new(name_column, usd_column, records))
    }
}
