//! Search response schema
//!
//! The provider's JSON body is decoded strictly at this boundary. Anything
//! that does not match the expected shape is reported as a decode failure
//! here instead of surfacing later inside rank resolution.

use crate::rank::ProductId;
use serde::Deserialize;
use serde_json::Value;

/// One entry within a page, in provider ranking order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub identifier: ProductId,
    pub store_name: String,
    pub title: String,

    /// 1-based position within the page that carried this entry
    pub position_within_page: u32,

    /// Page number the provider reported for this entry
    pub page_number: u32,

    /// Promoted-placement label, if the provider marked the entry
    pub promoted: Option<String>,
}

impl RawEntry {
    pub fn is_promoted(&self) -> bool {
        self.promoted.is_some()
    }
}

/// A single decoded page of search results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    pub page_number: u32,
    pub items: Vec<RawEntry>,

    /// Cursor for the following page, when the provider declared one
    pub next_cursor: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: ResponseData,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    #[serde(default)]
    data: Option<Vec<CardEntry>>,

    #[serde(default)]
    cursor: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CardEntry {
    card: Card,
}

#[derive(Debug, Deserialize)]
struct Card {
    product: ProductCard,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductCard {
    nv_mid: ProductId,

    #[serde(default)]
    mall_name: Option<String>,

    product_name: String,

    #[serde(default)]
    card_type: Option<Value>,

    #[serde(default)]
    page: Option<u32>,
}

/// Decodes a response body into a page
///
/// # Returns
///
/// * `Ok(Some(SearchPage))` - The body carried at least one entry
/// * `Ok(None)` - `data.data` was absent or empty; the provider has no more results
/// * `Err(String)` - The body did not match the expected structure
pub fn decode_page(body: &str, page_number: u32) -> Result<Option<SearchPage>, String> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| format!("unexpected response body: {}", e))?;

    let cards = match response.data.data {
        Some(cards) if !cards.is_empty() => cards,
        _ => return Ok(None),
    };

    let items = cards
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| {
            let product = entry.card.product;
            let reported_page = product.page.unwrap_or(page_number);
            // Pages are read in order from 1, so a card cannot sit past the request.
            if reported_page == 0 || reported_page > page_number {
                return Err(format!(
                    "product {} reports page {} on request {}",
                    product.nv_mid, reported_page, page_number
                ));
            }
            Ok(RawEntry {
                identifier: product.nv_mid,
                store_name: product.mall_name.unwrap_or_default(),
                title: product.product_name,
                position_within_page: idx as u32 + 1,
                page_number: reported_page,
                promoted: product.card_type.and_then(marker_label),
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(Some(SearchPage {
        page_number,
        items,
        next_cursor: response.data.cursor,
    }))
}

/// Reads the promoted marker as a printable label
fn marker_label(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
