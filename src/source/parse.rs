//! Synchronous HTML extraction helpers
//!
//! `scraper::Html` is not `Send`, so parsing happens inside synchronous
//! scopes only and is never held across an await point.

use crate::error::{Error, Result};
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

/// Extract document link URLs from a listing page.
///
/// Relative hrefs are resolved against `base_url` when one is configured;
/// unresolvable hrefs are skipped. Returned URLs preserve document order and
/// duplicates within the page.
pub fn extract_item_links(
    html: &str,
    selector: &str,
    base_url: Option<&Url>,
) -> Result<Vec<String>> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        match resolve_href(href, base_url) {
            Some(url) => links.push(url),
            None => debug!(href, "skipping unresolvable link"),
        }
    }
    Ok(links)
}

/// Extract the advertised result total from a listing page, if present.
///
/// Reads the first run of digits (commas allowed) in the selected element's
/// text, e.g. "1,234 results found" yields 1234.
pub fn extract_total(html: &str, selector: &str) -> Result<Option<u64>> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);

    let Some(element) = document.select(&selector).next() else {
        return Ok(None);
    };
    let text: String = element.text().collect();
    Ok(first_integer(&text))
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| Error::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{e:?}"),
    })
}

fn resolve_href(href: &str, base_url: Option<&Url>) -> Option<String> {
    if let Ok(url) = Url::parse(href) {
        return Some(url.into());
    }
    let base = base_url?;
    base.join(href).ok().map(Into::into)
}

fn first_integer(text: &str) -> Option<u64> {
    let mut digits = String::new();
    let mut seen = false;
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            seen = true;
        } else if seen && c == ',' {
            continue;
        } else if seen {
            break;
        }
    }
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}
