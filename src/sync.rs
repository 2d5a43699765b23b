//! One reconciliation cycle, start to finish.
//!
//! [`Orchestrator::run_cycle`] walks the phases
//!
//! ```text
//! Idle -> Starting -> Fetching -> Reconciling -> Writing -> Reporting -> Idle
//!                        \______________\______________\-> Error -> Idle
//! ```
//!
//! and always returns to `Idle`. Only a fetch failure sends the cycle to
//! `Error`; individual write failures are logged and skipped. Status and log
//! sink failures are swallowed. Scheduling (cron, timer, `--watch-secs`) lives
//! outside this module.

use crate::api::{ArticleStore, StatusSink};
use crate::error::{FetchError, WriteError};
use crate::metrics::aggregate;
use crate::models::{ArticleRecord, RunMetrics, ScrapedArticle, Status};
use crate::reconcile::{reconcile, Plan};
use crate::scrapers::SnapshotSource;
use crate::utils::{format_minutes, iso_utc, local_time_and_date};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Phase of the cycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Starting,
    Fetching,
    Reconciling,
    Writing,
    Reporting,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Which kind of store write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Transition,
    Metrics,
}

/// A single write that failed during `Writing`.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteFailure {
    pub kind: WriteKind,
    /// Article id, or the metrics hour bucket.
    pub key: String,
    pub message: String,
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Fetch and reconcile succeeded; writes may still have failed individually.
    Completed,
    /// The cycle was aborted while fetching.
    Failed(String),
}

/// What one cycle did, for callers and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub known: usize,
    pub seen: usize,
    pub created: usize,
    pub transitioned: usize,
    pub failures: Vec<WriteFailure>,
    pub metrics: Option<RunMetrics>,
    pub metrics_posted: bool,
}

impl CycleReport {
    /// Status reported to the sink at the end of the cycle.
    pub fn status(&self) -> Status {
        match self.outcome {
            CycleOutcome::Completed => Status::Idle,
            CycleOutcome::Failed(_) => Status::Error,
        }
    }
}

/// Work carried from the fetch phase into writing.
struct Fetched {
    stored: HashMap<String, ArticleRecord>,
    scraped: Vec<ScrapedArticle>,
}

/// Sequences fetch, reconcile, write and report for one homepage.
pub struct Orchestrator<S, A> {
    source: S,
    api: A,
    source_id: String,
    site_name: String,
    timezone: Tz,
    phase: Phase,
}

impl<S, A> Orchestrator<S, A>
where
    S: SnapshotSource,
    A: ArticleStore + StatusSink,
{
    /// Creates an orchestrator in [`Phase::Idle`].
    ///
    /// Status messages render wall-clock times in `Europe/Berlin` until
    /// [`Orchestrator::with_timezone`] says otherwise.
    ///
    /// # Arguments
    ///
    /// * `source` - Where homepage snapshots come from
    /// * `api` - The article store, also used as status and log sink
    /// * `source_id` - Identifies this scraper to the status sink
    /// * `site_name` - Display name used in status messages, e.g. `BILD`
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let api = ApiClient::new("http://127.0.0.1:8000/api", "dev-secret", timeout)?;
    /// let source = HomepageSource::new(Url::parse("https://www.bild.de/")?, timeout)?;
    /// let mut orchestrator = Orchestrator::new(source, api, "z0", "BILD");
    /// let report = orchestrator.run_cycle().await;
    /// ```
    pub fn new(source: S, api: A, source_id: &str, site_name: &str) -> Self {
        Self {
            source,
            api,
            source_id: source_id.to_string(),
            site_name: site_name.to_string(),
            timezone: chrono_tz::Europe::Berlin,
            phase: Phase::Idle,
        }
    }

    /// Zone for the times and dates in status messages.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run one full cycle. Never fails; the outcome is in the returned report.
    #[instrument(level = "info", skip_all, fields(source_id = %self.source_id))]
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        self.enter(Phase::Starting);

        let (time, date) = local_time_and_date(started_at, self.timezone);
        let start_msg = format!("Start scraping {} at {time}, {date}", self.site_name);
        self.notify(Status::Working, &start_msg).await;
        self.log_at(&start_msg, started_at).await;

        let mut report = CycleReport {
            outcome: CycleOutcome::Completed,
            started_at,
            duration: Duration::ZERO,
            known: 0,
            seen: 0,
            created: 0,
            transitioned: 0,
            failures: Vec::new(),
            metrics: None,
            metrics_posted: false,
        };

        match self.fetch().await {
            Ok(fetched) => {
                report.known = fetched.stored.len();
                report.seen = fetched.scraped.len();

                self.enter(Phase::Reconciling);
                let now = Utc::now();
                let plan = reconcile(&fetched.stored, &fetched.scraped, now);
                let metrics = aggregate(&fetched.scraped, &plan.creates, started_at);
                debug!(
                    creates = plan.creates.len(),
                    transitions = plan.transitions.len(),
                    "Reconciled snapshot against store"
                );

                self.enter(Phase::Writing);
                self.apply(&plan, &mut report).await;
                report.metrics_posted = self.post_metrics(&metrics, &mut report).await;
                report.metrics = Some(metrics);

                self.log(&format!(
                    "Done. new={}, patched={}, known={}, seen={}, failed writes={}",
                    report.created,
                    report.transitioned,
                    report.known,
                    report.seen,
                    report.failures.len()
                ))
                .await;
            }
            Err(e) => {
                self.enter(Phase::Error);
                error!(error = %e, "Cycle aborted");
                report.outcome = CycleOutcome::Failed(e.to_string());
            }
        }

        self.enter(Phase::Reporting);
        report.duration = clock.elapsed();
        let ended_at = Utc::now();
        let (time, date) = local_time_and_date(ended_at, self.timezone);
        let minutes = format_minutes(report.duration.as_secs_f64() / 60.0);

        let final_msg = match &report.outcome {
            CycleOutcome::Completed => format!(
                "finished {} scraping at {time}, {date} after {minutes}min",
                self.site_name.to_lowercase()
            ),
            CycleOutcome::Failed(reason) => {
                format!("SCRAPER ERROR at {time}, {date} after {minutes}min: {reason}")
            }
        };
        self.log_at(&final_msg, ended_at).await;
        self.notify(report.status(), &final_msg).await;

        info!(
            outcome = ?report.outcome,
            created = report.created,
            transitioned = report.transitioned,
            failed_writes = report.failures.len(),
            elapsed_ms = report.duration.as_millis(),
            "Cycle complete"
        );
        self.enter(Phase::Idle);
        report
    }

    fn enter(&mut self, next: Phase) {
        debug!(from = %self.phase, to = %next, "Phase transition");
        self.phase = next;
    }

    async fn fetch(&mut self) -> Result<Fetched, FetchError> {
        self.enter(Phase::Fetching);
        let stored = self.api.list_articles().await?;
        info!(count = stored.len(), "Loaded stored articles");
        let scraped = self.source.fetch_snapshot().await?;
        info!(count = scraped.len(), "Fetched homepage snapshot");
        Ok(Fetched { stored, scraped })
    }

    /// One store call per operation; a failure never stops the rest.
    async fn apply(&self, plan: &Plan, report: &mut CycleReport) {
        for record in &plan.creates {
            match self.api.create_article(record).await {
                Ok(_) => {
                    report.created += 1;
                    self.log(&format!("CREATE {} – {:?}", record.id, record.title))
                        .await;
                }
                Err(e) => {
                    self.record_failure(report, WriteKind::Create, &record.id, &e)
                        .await
                }
            }
        }

        for transition in &plan.transitions {
            match self
                .api
                .update_article(&transition.id, &transition.update)
                .await
            {
                Ok(_) => {
                    report.transitioned += 1;
                    let hours = transition
                        .update
                        .converted_duration_hours
                        .map(|h| h.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    self.log(&format!(
                        "PATCH {} – {:?} is_premium=false, converted=true, hours={hours}",
                        transition.id, transition.title
                    ))
                    .await;
                }
                Err(e) => {
                    self.record_failure(report, WriteKind::Transition, &transition.id, &e)
                        .await
                }
            }
        }
    }

    async fn post_metrics(&self, metrics: &RunMetrics, report: &mut CycleReport) -> bool {
        match self.api.post_metrics(metrics).await {
            Ok(()) => {
                self.log(&format!(
                    "METRICS {} [snapshot: total={}, premium={}, pct={}] [new: total={}, premium={}]",
                    metrics.ts_hour,
                    metrics.snapshot_total,
                    metrics.snapshot_premium,
                    metrics.snapshot_premium_pct,
                    metrics.new_count,
                    metrics.new_premium_count
                ))
                .await;
                true
            }
            Err(e) => {
                self.record_failure(report, WriteKind::Metrics, &metrics.ts_hour, &e)
                    .await;
                false
            }
        }
    }

    async fn record_failure(
        &self,
        report: &mut CycleReport,
        kind: WriteKind,
        key: &str,
        e: &WriteError,
    ) {
        let label = match kind {
            WriteKind::Create => "create",
            WriteKind::Transition => "patch",
            WriteKind::Metrics => "metrics",
        };
        error!(%key, kind = label, error = %e, "Store write failed");
        self.log(&format!("ERR {label} {key}: {e}")).await;
        report.failures.push(WriteFailure {
            kind,
            key: key.to_string(),
            message: e.to_string(),
        });
    }

    async fn notify(&self, status: Status, message: &str) {
        if let Err(e) = self
            .api
            .upsert_status(&self.source_id, status, message)
            .await
        {
            warn!(%status, error = %e, "Status update failed");
            self.log(&format!("Status update ({status}) failed: {e}"))
                .await;
        }
    }

    async fn log(&self, message: &str) {
        self.log_at(message, Utc::now()).await;
    }

    /// Mirror a line to tracing and the remote log sink.
    async fn log_at(&self, message: &str, at: DateTime<Utc>) {
        info!(target: "premium_watch::cycle", "{message}");
        if let Err(e) = self.api.append_log(message, &iso_utc(at)).await {
            debug!(error = %e, "Log sink unavailable");
        }
    }
}
