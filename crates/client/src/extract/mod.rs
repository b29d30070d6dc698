//! Candidate extraction from marketplace HTML.
//!
//! ### Selector cascade
//! Deal pages change markup frequently, so extraction runs a prioritized list
//! of structural selector groups (deal-specific structures first, generic
//! fallbacks last). The first group that yields at least one parsed candidate
//! wins; partial yields are never merged across groups.
//!
//! ### Per-field fallback chains
//! Each field has its own ordered selector chain; the first selector producing
//! non-empty text wins. A candidate that cannot produce a well-formed ASIN or
//! a usable title is silently dropped; that is high-frequency, expected
//! behavior given noisy markup.

pub mod fields;

use scraper::{ElementRef, Html, Selector};

use dealharvest_core::models::GENERIC_DESCRIPTION;
use dealharvest_core::{Category, Product, asin_from_url, is_valid_asin, product_link};

pub use fields::{
    cap_description, clean_discount, clean_price, discount_percentage, normalize_image_url, parse_rating,
    parse_review_count,
};

/// Structural selector groups, deal-oriented structures first.
const DEAL_SELECTORS: &[&str] = &[
    r#"[data-component-type="s-deals-result"]"#,
    r#"[data-component-type="s-search-result"]"#,
    ".s-result-item[data-asin]",
    "[data-asin]",
    ".s-result-item",
    ".DealCard",
    ".dealContainer",
    ".s-main-slot .s-result-item",
    ".s-result-list .s-result-item",
    "div[data-asin]",
    ".s-card-container",
    ".s-card-border",
];

const TITLE_SELECTORS: &[&str] = &[
    "h2 a span.a-text-normal",
    "h3 a span",
    "h2 a span",
    r#"[data-cy="title-recipe-collection"]"#,
    ".s-size-mini span",
    ".a-link-normal span",
    ".a-text-normal",
    "span.a-text-normal",
    "a.a-link-normal span",
    "h2 span",
    "h3 span",
];

const PRICE_SELECTORS: &[&str] = &[
    ".a-price-whole",
    ".a-price .a-offscreen",
    ".a-offscreen",
    ".a-price",
    r#"[data-a-color="price"]"#,
    ".a-price-symbol",
    ".a-price-fraction",
    "span.a-price",
    ".s-price-instructions-style",
];

const DISCOUNT_SELECTORS: &[&str] = &[
    ".savingsPercentage",
    ".a-badge-text",
    r#"[data-a-badge-color="sx-lightning-deal-red"]"#,
    ".a-size-base.a-color-price",
    ".a-color-price",
    r#"[aria-label*="%"]"#,
];

const RATING_SELECTORS: &[&str] = &[
    ".a-icon-alt",
    r#"[aria-label*="stars"]"#,
    r#"[aria-label*="out of"]"#,
    ".a-icon-star",
    "span[aria-label]",
];

const REVIEW_SELECTORS: &[&str] =
    &[".a-size-base", r##"a[href*="#customerReviews"]"##, ".a-link-normal", "span.a-size-base"];

const IMAGE_SELECTORS: &[&str] = &[
    "img[data-image-latency]",
    ".s-image",
    "img.a-dynamic-image",
    r#"[data-image-index="0"] img"#,
    "img.s-image",
    ".s-product-image-container img",
    "img[data-a-dynamic-image]",
    ".a-dynamic-image",
    r#"img[src*="images-amazon"]"#,
];

const DESCRIPTION_SELECTORS: &[&str] =
    &[".a-size-base-plus", ".s-color-secondary", r#"[data-cy="secondary-recipe-collection"]"#];

/// Deal/urgency words that count as a discount badge when no percentage badge
/// is present.
const BADGE_WORDS: &[&str] = &["lightning", "deal", "limited"];

/// Extract candidate products from one fetched deal page.
///
/// `max_candidates` bounds how many elements of the winning selector group
/// are attempted (the pipeline passes `max_deals_per_source * 2`).
pub fn extract_deals(html: &str, source_url: &str, max_candidates: usize) -> Vec<Product> {
    let document = Html::parse_document(html);
    let mut deals = Vec::new();

    for group in DEAL_SELECTORS {
        let Ok(selector) = Selector::parse(group) else { continue };

        let elements: Vec<ElementRef> = document.select(&selector).collect();
        if elements.is_empty() {
            continue;
        }
        tracing::debug!(selector = group, count = elements.len(), "selector group matched");

        for element in elements.into_iter().take(max_candidates) {
            if let Some(product) = extract_product(element) {
                tracing::debug!(asin = %product.asin, "candidate extracted");
                deals.push(product);
            }
        }

        // First group with a non-empty yield wins; never merge across groups.
        if !deals.is_empty() {
            tracing::info!(selector = group, count = deals.len(), source = source_url, "deals extracted");
            break;
        }
    }

    if deals.is_empty() {
        tracing::warn!(source = source_url, "no deals extracted; markup may have changed");
    }

    deals
}

/// Extract one candidate from a result element, or `None` when the element
/// cannot produce a valid ASIN and title.
pub fn extract_product(element: ElementRef) -> Option<Product> {
    let asin = extract_asin(element)?;

    let mut title = first_text(element, TITLE_SELECTORS).unwrap_or_default();
    if title.trim().chars().count() < 5 {
        title = first_link_text(element).unwrap_or_default();
    }
    let title = title.trim().to_string();
    if title.chars().count() < 5 {
        return None;
    }

    let price = first_text(element, PRICE_SELECTORS)
        .or_else(|| loose_price_text(element))
        .map(|t| clean_price(&t))
        .unwrap_or_else(|| dealharvest_core::models::PRICE_NOT_AVAILABLE.to_string());

    let discount = first_text(element, DISCOUNT_SELECTORS)
        .or_else(|| badge_text(element))
        .map(|t| clean_discount(&t))
        .unwrap_or_default();

    let rating = first_text(element, RATING_SELECTORS)
        .map(|t| parse_rating(&t))
        .filter(|r| *r > 0.0)
        .or_else(|| star_aria_rating(element))
        .unwrap_or(0.0);

    let review_count = first_text(element, REVIEW_SELECTORS)
        .map(|t| parse_review_count(&t))
        .filter(|n| *n > 0)
        .or_else(|| review_link_count(element))
        .unwrap_or(0);

    let image_url = extract_image_url(element);

    let description = first_text(element, DESCRIPTION_SELECTORS)
        .map(|t| cap_description(&t))
        .unwrap_or_else(|| GENERIC_DESCRIPTION.to_string());

    Some(Product {
        category: Category::from_title(&title),
        link: product_link(&asin),
        title,
        price,
        discount,
        asin,
        rating,
        review_count,
        description,
        image_url,
    })
}

/// ASIN fallback chain: structural attribute, then link paths, then the
/// serialized element as a last resort.
fn extract_asin(element: ElementRef) -> Option<String> {
    if let Some(asin) = element.value().attr("data-asin")
        && is_valid_asin(asin)
    {
        return Some(asin.to_string());
    }

    if let Ok(selector) = Selector::parse("a[href]") {
        for link in element.select(&selector) {
            if let Some(href) = link.value().attr("href")
                && let Some(asin) = asin_from_url(href)
            {
                return Some(asin);
            }
        }
    }

    asin_from_url(&element.html())
}

/// First selector in the chain producing non-empty text wins.
///
/// Works on any subtree, including a document root for whole-page extraction.
pub fn first_text(element: ElementRef, selectors: &[&str]) -> Option<String> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else { continue };
        if let Some(found) = element.select(&selector).next() {
            let text = element_text(found);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// Visible text of the element's first link, the title chain's last resort.
fn first_link_text(element: ElementRef) -> Option<String> {
    let selector = Selector::parse("a[href]").ok()?;
    element
        .select(&selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// Any span whose class mentions "price", when the price chain fails.
fn loose_price_text(element: ElementRef) -> Option<String> {
    let selector = Selector::parse(r#"span[class*="price"], span[class*="Price"]"#).ok()?;
    element
        .select(&selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// Badge text containing a deal/urgency word, used verbatim when no
/// percentage badge exists.
fn badge_text(element: ElementRef) -> Option<String> {
    let selector = Selector::parse(r#".a-badge-text, [data-a-badge-color="sx-lightning-deal-red"]"#).ok()?;
    element.select(&selector).map(element_text).find(|text| {
        let lowered = text.to_lowercase();
        BADGE_WORDS.iter().any(|w| lowered.contains(w))
    })
}

/// Rating fallback: aria-labels on star/rating-classed elements.
fn star_aria_rating(element: ElementRef) -> Option<f64> {
    let selector = Selector::parse(r#"[class*="star"] , [class*="rating"], [class*="Rating"]"#).ok()?;
    element
        .select(&selector)
        .filter_map(|el| el.value().attr("aria-label"))
        .map(parse_rating)
        .find(|r| *r > 0.0)
}

/// Review-count fallback: text of links pointing at review/rating anchors.
fn review_link_count(element: ElementRef) -> Option<u32> {
    let selector = Selector::parse(r#"a[href*="review"], a[href*="rating"]"#).ok()?;
    element
        .select(&selector)
        .map(|el| parse_review_count(&element_text(el)))
        .find(|n| *n > 0)
}

/// Image fallback chain: selector/attribute list, then the JSON-encoded
/// resolution map in `data-a-dynamic-image`.
fn extract_image_url(element: ElementRef) -> String {
    for raw in IMAGE_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else { continue };
        if let Some(img) = element.select(&selector).next() {
            let src = img.value().attr("src").or_else(|| img.value().attr("data-src"));
            if let Some(src) = src
                && src.contains("images-amazon")
            {
                return normalize_image_url(src);
            }
        }
    }

    if let Ok(selector) = Selector::parse("img[data-a-dynamic-image]")
        && let Some(img) = element.select(&selector).next()
        && let Some(raw_map) = img.value().attr("data-a-dynamic-image")
        && let Ok(map) = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw_map)
        && let Some(first_url) = map.keys().next()
    {
        return normalize_image_url(first_url);
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEAL_CARD: &str = r#"
        <html><body>
            <div data-component-type="s-search-result" data-asin="B08N5WRWNW">
                <h2><a href="/dp/B08N5WRWNW"><span class="a-text-normal">Wireless Bluetooth Headphones with Noise Cancelling</span></a></h2>
                <span class="a-price"><span class="a-offscreen">$59.99</span></span>
                <span class="savingsPercentage">-25%</span>
                <span class="a-icon-alt">4.6 out of 5 stars</span>
                <span class="a-size-base">1,234</span>
                <img class="s-image" src="https://images-na.ssl-images-amazon.com/images/I/71x._AC_UL320_.jpg">
            </div>
        </body></html>
    "#;

    #[test]
    fn test_extract_deals_full_card() {
        let deals = extract_deals(DEAL_CARD, "https://www.amazon.com/gp/goldbox", 10);
        assert_eq!(deals.len(), 1);

        let deal = &deals[0];
        assert_eq!(deal.asin, "B08N5WRWNW");
        assert_eq!(deal.title, "Wireless Bluetooth Headphones with Noise Cancelling");
        assert_eq!(deal.price, "$59.99");
        assert_eq!(deal.discount, "25% off");
        assert_eq!(deal.rating, 4.6);
        assert_eq!(deal.review_count, 1234);
        assert_eq!(deal.category, Category::Electronics);
        assert_eq!(deal.link, "https://www.amazon.com/dp/B08N5WRWNW");
        assert_eq!(deal.image_url, "https://images-na.ssl-images-amazon.com/images/I/71x.jpg");
    }

    #[test]
    fn test_extract_deals_first_group_wins() {
        // Both a deals-result and a generic [data-asin] card exist; only the
        // higher-priority group's element must be returned.
        let html = r#"
            <html><body>
                <div data-component-type="s-deals-result" data-asin="B000000001">
                    <h2><a href="/dp/B000000001"><span class="a-text-normal">Deal Page Coffee Maker</span></a></h2>
                </div>
                <div data-asin="B000000002">
                    <h2><a href="/dp/B000000002"><span class="a-text-normal">Generic Result Blender</span></a></h2>
                </div>
            </body></html>
        "#;

        let deals = extract_deals(html, "https://www.amazon.com/deals", 10);
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].asin, "B000000001");
    }

    #[test]
    fn test_extract_asin_from_href_fallback() {
        let html = r#"
            <html><body>
                <div class="DealCard">
                    <a href="/gp/product/B07XJ8C8F5?ref=deal">Instant Pot Pressure Cooker 6 Quart</a>
                </div>
            </body></html>
        "#;

        let deals = extract_deals(html, "https://www.amazon.com/deals", 10);
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].asin, "B07XJ8C8F5");
        // title came from the link text fallback
        assert_eq!(deals[0].title, "Instant Pot Pressure Cooker 6 Quart");
    }

    #[test]
    fn test_extract_drops_candidate_without_asin() {
        let html = r#"
            <html><body>
                <div class="s-result-item">
                    <h2><span>Mystery Product With No Identifier</span></h2>
                </div>
            </body></html>
        "#;

        let deals = extract_deals(html, "https://www.amazon.com/deals", 10);
        assert!(deals.is_empty());
    }

    #[test]
    fn test_extract_drops_candidate_with_short_title() {
        let html = r#"
            <html><body>
                <div data-asin="B08N5WRWNW" class="s-result-item">
                    <h2><a href="/dp/B08N5WRWNW"><span class="a-text-normal">TV</span></a></h2>
                </div>
            </body></html>
        "#;

        let deals = extract_deals(html, "https://www.amazon.com/deals", 10);
        assert!(deals.is_empty());
    }

    #[test]
    fn test_extract_rejects_malformed_asin_attribute() {
        // data-asin present but not 10 alphanumerics; href provides the real one
        let html = r#"
            <html><body>
                <div data-asin="not-valid" class="s-result-item">
                    <h2><a href="/dp/B09ABCDEF1"><span class="a-text-normal">Stainless Steel Kitchen Knife Set</span></a></h2>
                </div>
            </body></html>
        "#;

        let deals = extract_deals(html, "https://www.amazon.com/deals", 10);
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].asin, "B09ABCDEF1");
    }

    #[test]
    fn test_extract_badge_fallback_discount() {
        let html = r#"
            <html><body>
                <div data-asin="B08N5WRWNW" class="s-result-item">
                    <h2><a href="/dp/B08N5WRWNW"><span class="a-text-normal">Smart Plug 4-Pack for Home</span></a></h2>
                    <span class="a-badge-text">Lightning Deal</span>
                </div>
            </body></html>
        "#;

        let deals = extract_deals(html, "https://www.amazon.com/deals", 10);
        assert_eq!(deals.len(), 1);
        // badge text used verbatim; the badge selector chain found it first
        assert_eq!(deals[0].discount, "Lightning Deal");
    }

    #[test]
    fn test_review_count_from_reviews_anchor() {
        // count only reachable through the #customerReviews anchor selector
        let html = r##"
            <html><body>
                <div data-asin="B08N5WRWNW" class="s-result-item">
                    <h2><a href="/dp/B08N5WRWNW"><span class="a-text-normal">USB C Charging Cable 6ft Braided</span></a></h2>
                    <a href="#customerReviews">2,481</a>
                </div>
            </body></html>
        "##;

        let deals = extract_deals(html, "https://www.amazon.com/deals", 10);
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].review_count, 2481);
    }

    #[test]
    fn test_extract_defaults_when_fields_missing() {
        let html = r#"
            <html><body>
                <div data-asin="B08N5WRWNW" class="s-result-item">
                    <h2><a href="/dp/B08N5WRWNW"><span class="a-text-normal">Plain Product Listing Title</span></a></h2>
                </div>
            </body></html>
        "#;

        let deals = extract_deals(html, "https://www.amazon.com/deals", 10);
        assert_eq!(deals.len(), 1);

        let deal = &deals[0];
        assert_eq!(deal.price, "Price not available");
        assert_eq!(deal.discount, "");
        assert_eq!(deal.rating, 0.0);
        assert_eq!(deal.review_count, 0);
        assert_eq!(deal.description, GENERIC_DESCRIPTION);
        assert_eq!(deal.image_url, "");
        assert_eq!(deal.category, Category::General);
    }

    #[test]
    fn test_extract_image_dynamic_map_fallback() {
        let html = r#"
            <html><body>
                <div data-asin="B08N5WRWNW" class="s-result-item">
                    <h2><a href="/dp/B08N5WRWNW"><span class="a-text-normal">Portable Camping Lantern Pack</span></a></h2>
                    <img data-a-dynamic-image='{"https://m.media-amazon.com/images/I/81y._AC_SL1500_.jpg":[1500,1500]}'>
                </div>
            </body></html>
        "#;

        let deals = extract_deals(html, "https://www.amazon.com/deals", 10);
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].image_url, "https://m.media-amazon.com/images/I/81y.jpg");
    }

    #[test]
    fn test_extract_respects_candidate_cap() {
        let mut html = String::from("<html><body>");
        for i in 0..20 {
            html.push_str(&format!(
                r#"<div data-asin="B0000000{i:02}" class="s-result-item">
                    <h2><a href="/dp/B0000000{i:02}"><span class="a-text-normal">Numbered Product Listing {i}</span></a></h2>
                </div>"#
            ));
        }
        html.push_str("</body></html>");

        let deals = extract_deals(&html, "https://www.amazon.com/deals", 10);
        assert_eq!(deals.len(), 10);
    }

    #[test]
    fn test_extract_empty_document() {
        let deals = extract_deals("<html><body></body></html>", "https://www.amazon.com/deals", 10);
        assert!(deals.is_empty());
    }
}
