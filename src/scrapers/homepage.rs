//! Homepage snapshot adapter.
//!
//! The publisher embeds its page model as JSON in
//! `<script id="pageContext" type="application/json">`. Articles live under
//! `CLIENT_STORE_INITIAL_STATE.pageAggregation.curation.page.blocks`, two
//! levels of `children` deep, as nodes with `"type": "ARTICLE"`:
//!
//! ```text
//! blocks[] -> children[] (layouts) -> children[] -> { type, props: { id, title, url, isPremium } }
//! ```
//!
//! Nothing else about the markup is interpreted.

use crate::error::FetchError;
use crate::models::ScrapedArticle;
use crate::scrapers::SnapshotSource;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Mobile user agent; the desktop page ships a different layout.
const USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 12_3_1 like Mac OS X) \
    AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148 \
    Instagram 105.0.0.11.118 (iPhone11,8; iOS 12_3_1; en_US; en-US; scale=2.00; 828x1792; 165586599)";

const BLOCKS_POINTER: &str = "/CLIENT_STORE_INITIAL_STATE/pageAggregation/curation/page/blocks";

static PAGE_CONTEXT: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script#pageContext[type="application/json"]"#)
        .expect("pageContext selector is valid")
});

/// Fetches and parses the publisher's homepage.
#[derive(Debug)]
pub struct HomepageSource {
    client: Client,
    url: Url,
}

impl HomepageSource {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, url })
    }
}

impl SnapshotSource for HomepageSource {
    #[instrument(level = "info", skip_all, fields(url = %self.url))]
    async fn fetch_snapshot(&self) -> Result<Vec<ScrapedArticle>, FetchError> {
        let resp = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Http(format!("GET {} failed: {e}", self.url)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Http(format!(
                "GET {} -> HTTP {}",
                self.url,
                status.as_u16()
            )));
        }
        let html = resp
            .text()
            .await
            .map_err(|e| FetchError::Http(format!("GET {} failed: {e}", self.url)))?;

        let articles = parse_homepage(&html, &self.url)?;
        info!(count = articles.len(), "Scraped homepage articles");
        Ok(articles)
    }
}

/// Extract the listed articles from homepage HTML.
///
/// Nodes without an id, title or url are skipped. The category is the first
/// path segment of the article URL, or `None` when there is none.
pub fn parse_homepage(html: &str, base: &Url) -> Result<Vec<ScrapedArticle>, FetchError> {
    let document = Html::parse_document(html);
    let script = document
        .select(&PAGE_CONTEXT)
        .next()
        .ok_or_else(|| FetchError::Parse("no <script id=\"pageContext\"> found".to_string()))?;
    let raw = script.text().collect::<String>();
    let context: Value = serde_json::from_str(&raw)
        .map_err(|e| FetchError::Parse(format!("pageContext is not valid JSON: {e}")))?;
    let blocks = context
        .pointer(BLOCKS_POINTER)
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::Parse(format!("pageContext has no {BLOCKS_POINTER}")))?;

    let mut articles = Vec::new();
    let mut skipped = 0usize;
    for node in blocks
        .iter()
        .flat_map(children)
        .flat_map(children)
        .filter(|node| node.get("type").and_then(Value::as_str) == Some("ARTICLE"))
    {
        match article_from_props(node.get("props").unwrap_or(&Value::Null), base) {
            Some(article) => articles.push(article),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, "Skipped article nodes without id, title or url");
    }
    debug!(count = articles.len(), "Parsed pageContext");
    Ok(articles)
}

fn children(node: &Value) -> impl Iterator<Item = &Value> {
    node.get("children")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn article_from_props(props: &Value, base: &Url) -> Option<ScrapedArticle> {
    let id = match props.get("id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let title = props.get("title").and_then(Value::as_str)?;
    let url = props.get("url").and_then(Value::as_str)?;
    if id.is_empty() || title.is_empty() || url.is_empty() {
        return None;
    }

    Some(ScrapedArticle {
        category: category_of(url, base),
        id,
        title: title.to_string(),
        url: url.to_string(),
        is_premium: props
            .get("isPremium")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

/// First path segment of `url`, resolved against `base`.
fn category_of(url: &str, base: &Url) -> Option<String> {
    let resolved = base.join(url).ok()?;
    resolved
        .path_segments()?
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.bild.de/").unwrap()
    }

    fn page(context_json: &str) -> String {
        format!(
            r#"<!DOCTYPE html><html><head>
            <script type="application/ld+json">{{"@type":"WebSite"}}</script>
            <script id="pageContext" type="application/json">{context_json}</script>
            </head><body><h1>Startseite</h1></body></html>"#
        )
    }

    const CONTEXT: &str = r#"{
      "CLIENT_STORE_INITIAL_STATE": {
        "pageAggregation": {
          "curation": {
            "page": {
              "blocks": [
                {
                  "children": [
                    {
                      "type": "LAYOUT",
                      "children": [
                        {"type": "ARTICLE", "props": {"id": "a1", "title": "Free story", "url": "/politik/inland/free-a1.bild.html", "isPremium": false}},
                        {"type": "ARTICLE", "props": {"id": "a2", "title": "Paid story", "url": "/sport/fussball/paid-a2.bild.html", "isPremium": true}},
                        {"type": "TEASER_AD", "props": {"id": "ad1"}}
                      ]
                    }
                  ]
                },
                {
                  "children": [
                    {
                      "children": [
                        {"type": "ARTICLE", "props": {"id": "a3", "title": "Absolute", "url": "https://www.bild.de/regional/berlin/a3.bild.html"}},
                        {"type": "ARTICLE", "props": {"id": "a4", "title": "", "url": "/x/a4.bild.html"}},
                        {"type": "ARTICLE", "props": {"title": "No id", "url": "/x/none.bild.html"}},
                        {"type": "ARTICLE", "props": {"id": 5, "title": "Root", "url": "/"}}
                      ]
                    }
                  ]
                },
                {"type": "EMPTY"}
              ]
            }
          }
        }
      }
    }"#;

    #[test]
    fn test_parse_homepage_extracts_articles() {
        let articles = parse_homepage(&page(CONTEXT), &base()).unwrap();
        let ids: Vec<_> = articles.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2", "a3", "5"]);

        assert!(!articles[0].is_premium);
        assert_eq!(articles[0].category.as_deref(), Some("politik"));
        assert_eq!(articles[0].url, "/politik/inland/free-a1.bild.html");

        assert!(articles[1].is_premium);
        assert_eq!(articles[1].category.as_deref(), Some("sport"));
    }

    #[test]
    fn test_missing_premium_flag_defaults_to_free() {
        let articles = parse_homepage(&page(CONTEXT), &base()).unwrap();
        let a3 = articles.iter().find(|a| a.id == "a3").unwrap();
        assert!(!a3.is_premium);
        assert_eq!(a3.category.as_deref(), Some("regional"));
    }

    #[test]
    fn test_empty_category_is_none() {
        let articles = parse_homepage(&page(CONTEXT), &base()).unwrap();
        let root = articles.iter().find(|a| a.id == "5").unwrap();
        assert_eq!(root.category, None);
    }

    #[test]
    fn test_missing_script_is_parse_error() {
        let err = parse_homepage("<html><body>maintenance</body></html>", &base()).unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = parse_homepage(&page("{not json"), &base()).unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[test]
    fn test_missing_blocks_is_parse_error() {
        let err = parse_homepage(&page(r#"{"CLIENT_STORE_INITIAL_STATE": {}}"#), &base())
            .unwrap_err();
        assert!(err.to_string().contains("blocks"));
    }

    #[test]
    fn test_empty_blocks_is_empty_snapshot() {
        let context = r#"{"CLIENT_STORE_INITIAL_STATE":{"pageAggregation":{"curation":{"page":{"blocks":[]}}}}}"#;
        let articles = parse_homepage(&page(context), &base()).unwrap();
        assert!(articles.is_empty());
    }
}
