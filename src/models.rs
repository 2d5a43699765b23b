//! Data models for tracked articles and per-cycle metrics.
//!
//! This module defines the records exchanged with the store and the homepage:
//! - [`ArticleRecord`]: an article as persisted by the store
//! - [`ScrapedArticle`]: an article as observed on the homepage right now
//! - [`ArticleUpdate`]: the fields written when a premium article turns free
//! - [`RunMetrics`]: aggregate counts for one reconciliation cycle
//! - [`Status`]: the states reported to the status sink
//!
//! Timestamps travel as RFC 3339 strings; see [`crate::utils::iso_utc`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// An article as persisted by the store.
///
/// `published` is written once at creation. `converted_time` and
/// `converted_duration_hours` are written together, once, when the article
/// leaves the paywall.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ArticleRecord {
    /// Publisher-assigned identifier, stable across cycles.
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub converted: bool,
    /// When the article was first seen. Kept as the raw string the store
    /// returned, since older rows are not guaranteed to parse.
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub converted_time: Option<String>,
    #[serde(default)]
    pub converted_duration_hours: Option<f64>,
}

/// An article as listed on the homepage during the current cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapedArticle {
    pub id: String,
    pub title: String,
    pub url: String,
    pub category: Option<String>,
    pub is_premium: bool,
}

/// Partial update applied when a premium article is observed as free.
///
/// All four fields are always serialized, `converted_duration_hours` as
/// `null` when the original publish time was unusable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleUpdate {
    pub is_premium: bool,
    pub converted: bool,
    pub converted_time: String,
    pub converted_duration_hours: Option<f64>,
}

/// Aggregate counts for one cycle, posted once to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetrics {
    /// Cycle start truncated to the hour.
    pub ts_hour: String,
    pub snapshot_total: usize,
    pub snapshot_premium: usize,
    pub snapshot_premium_pct: f64,
    pub new_count: usize,
    pub new_premium_count: usize,
}

/// States reported to the status sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Working,
    Idle,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Working => "working",
            Status::Idle => "idle",
            Status::Error => "error",
        };
        f.write_str(s)
    }
}
