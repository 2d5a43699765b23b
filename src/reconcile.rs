//! Diffing of stored articles against the current homepage snapshot.
//!
//! [`reconcile`] is a pure function of the stored records, the scraped
//! snapshot and a caller-supplied `now`. It never touches the store; the
//! orchestrator applies the resulting [`Plan`].
//!
//! # Decision table
//!
//! | stored | stored premium | scraped premium | result |
//! |--------|----------------|-----------------|--------|
//! | absent | –              | any             | create |
//! | present| true           | false           | transition |
//! | present| otherwise      | any             | no-op |
//!
//! Stored ids missing from the snapshot are never touched.

use crate::models::{ArticleRecord, ArticleUpdate, ScrapedArticle};
use crate::utils::{iso_utc, parse_timestamp, round_to};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use std::collections::HashMap;

/// A premium article observed as free in this cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub id: String,
    pub title: String,
    pub update: ArticleUpdate,
}

/// Operations computed for one cycle. Creates and transitions never share an id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub creates: Vec<ArticleRecord>,
    pub transitions: Vec<Transition>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.transitions.is_empty()
    }
}

/// Compute the creates and transitions that bring the store in line with the snapshot.
///
/// An id listed more than once in `scraped` is decided by its last listing,
/// but keeps the position of its first one. Operations come out in that order.
///
/// # Arguments
///
/// * `stored` - Every article the store knows about, keyed by id
/// * `scraped` - The articles currently listed on the homepage
/// * `now` - Stamped as `published` on creates and `converted_time` on transitions
///
/// # Returns
///
/// A [`Plan`] whose creates and transitions never share an id. Ids present
/// only in `stored` produce nothing.
///
/// # Examples
///
/// ```ignore
/// let plan = reconcile(&HashMap::new(), &snapshot, Utc::now());
/// assert_eq!(plan.creates.len(), snapshot.len());
/// assert!(plan.transitions.is_empty());
/// ```
pub fn reconcile(
    stored: &HashMap<String, ArticleRecord>,
    scraped: &[ScrapedArticle],
    now: DateTime<Utc>,
) -> Plan {
    let now_iso = iso_utc(now);
    let mut plan = Plan::default();

    let latest: HashMap<&str, &ScrapedArticle> =
        scraped.iter().map(|a| (a.id.as_str(), a)).collect();
    let ordered = scraped
        .iter()
        .unique_by(|a| a.id.clone())
        .filter_map(|a| latest.get(a.id.as_str()).copied());

    for article in ordered {
        match stored.get(&article.id) {
            None => plan.creates.push(new_record(article, &now_iso)),
            Some(record) if record.is_premium && !article.is_premium => {
                let hours = record
                    .published
                    .as_deref()
                    .and_then(parse_timestamp)
                    .map(|published| hours_between(published, now));
                plan.transitions.push(Transition {
                    id: article.id.clone(),
                    title: article.title.clone(),
                    update: ArticleUpdate {
                        is_premium: false,
                        converted: true,
                        converted_time: now_iso.clone(),
                        converted_duration_hours: hours.map(|h| round_to(h, 4)),
                    },
                });
            }
            Some(_) => {}
        }
    }

    plan
}

fn new_record(article: &ScrapedArticle, published: &str) -> ArticleRecord {
    ArticleRecord {
        id: article.id.clone(),
        title: article.title.clone(),
        url: article.url.clone(),
        category: article.category.clone(),
        is_premium: article.is_premium,
        converted: false,
        published: Some(published.to_string()),
        converted_time: None,
        converted_duration_hours: None,
    }
}

fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 3_600_000.0
}
