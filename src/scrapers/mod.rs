//! Homepage snapshot sources.
//!
//! A snapshot source lists the articles currently shown on a publisher's
//! homepage together with their premium flag. The orchestrator only depends
//! on [`SnapshotSource`]; [`homepage::HomepageSource`] is the HTTP adapter.

use crate::error::FetchError;
use crate::models::ScrapedArticle;

pub mod homepage;

/// Produces the articles currently listed on the homepage.
pub trait SnapshotSource {
    async fn fetch_snapshot(&self) -> Result<Vec<ScrapedArticle>, FetchError>;
}
