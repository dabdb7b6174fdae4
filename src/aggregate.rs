// src/aggregate.rs
//! Fan-out/fan-in over every registered source.
//!
//! Each fetcher runs in its own task under its own timeout. Whatever a
//! fetcher does (error, panic, hang) ends up as one [`SourceOutcome`] and
//! never affects its siblings. Successful contributions are concatenated in
//! registration order, stably sorted by date descending and truncated.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::sources::{build_fetchers, ClientSettings, FetchError, SourceFetcher};
use crate::update::Update;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_runs_total", "Source fetches started.");
        describe_counter!("fetch_errors_total", "Source fetches that failed.");
        describe_counter!("fetch_timeouts_total", "Source fetches that hit the timeout.");
        describe_counter!("updates_emitted_total", "Updates returned to callers.");
        describe_histogram!("fetch_duration_ms", "Per-source fetch time in milliseconds.");
    });
}

/// What a single source contributed to one request.
#[derive(Debug)]
pub enum SourceOutcome {
    Fetched { source: String, updates: Vec<Update> },
    Failed { source: String, reason: FetchError },
    TimedOut { source: String, after: Duration },
}

impl SourceOutcome {
    pub fn source(&self) -> &str {
        match self {
            SourceOutcome::Fetched { source, .. }
            | SourceOutcome::Failed { source, .. }
            | SourceOutcome::TimedOut { source, .. } => source,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SourceOutcome::Fetched { .. })
    }

    /// Failures contribute nothing.
    pub fn into_updates(self) -> Vec<Update> {
        match self {
            SourceOutcome::Fetched { updates, .. } => updates,
            _ => Vec::new(),
        }
    }
}

pub struct Aggregator {
    fetchers: Vec<Arc<dyn SourceFetcher>>,
    result_cap: usize,
    fetch_timeout: Duration,
}

impl Aggregator {
    pub fn new(
        fetchers: Vec<Arc<dyn SourceFetcher>>,
        result_cap: usize,
        fetch_timeout: Duration,
    ) -> Self {
        ensure_metrics_described();
        Self {
            fetchers,
            result_cap,
            fetch_timeout,
        }
    }

    /// Build live fetchers from the configured source table.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, FetchError> {
        let settings = ClientSettings {
            user_agent: cfg.user_agent.clone(),
            request_timeout: cfg.fetch_timeout(),
        };
        let fetchers = build_fetchers(&cfg.sources, &settings)?;
        Ok(Self::new(fetchers, cfg.result_cap, cfg.fetch_timeout()))
    }

    pub fn result_cap(&self) -> usize {
        self.result_cap
    }

    pub fn source_names(&self) -> Vec<String> {
        self.fetchers.iter().map(|f| f.name().to_string()).collect()
    }

    /// Run every fetcher concurrently; outcomes come back in registration order.
    #[instrument(level = "debug", skip(self))]
    pub async fn collect(&self, query: &str) -> Vec<SourceOutcome> {
        let handles = self.fetchers.iter().map(|fetcher| {
            let fetcher = Arc::clone(fetcher);
            let query = query.to_string();
            let limit = self.fetch_timeout;
            tokio::spawn(async move { run_fetcher(fetcher, query, limit).await })
        });
        let joined = join_all(handles).await;

        self.fetchers
            .iter()
            .zip(joined)
            .map(|(fetcher, res)| match res {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(source = fetcher.name(), error = %e, "fetch task aborted");
                    counter!("fetch_errors_total").increment(1);
                    SourceOutcome::Failed {
                        source: fetcher.name().to_string(),
                        reason: FetchError::Aborted(e.to_string()),
                    }
                }
            })
            .collect()
    }

    /// Fan out, merge, rank, truncate. Never fails; worst case is empty.
    #[instrument(skip(self))]
    pub async fn aggregate(&self, query: &str) -> Vec<Update> {
        let outcomes = self.collect(query).await;
        let ok = outcomes.iter().filter(|o| o.is_success()).count();
        let total = outcomes.len();

        let updates = merge(outcomes, self.result_cap);
        counter!("updates_emitted_total").increment(updates.len() as u64);
        info!(sources_ok = ok, sources = total, count = updates.len(), "aggregated");
        updates
    }
}

async fn run_fetcher(
    fetcher: Arc<dyn SourceFetcher>,
    query: String,
    limit: Duration,
) -> SourceOutcome {
    let source = fetcher.name().to_string();
    counter!("fetch_runs_total").increment(1);
    let t0 = Instant::now();

    let res = tokio::time::timeout(limit, fetcher.fetch(&query)).await;
    histogram!("fetch_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    match res {
        Ok(Ok(updates)) => {
            info!(%source, count = updates.len(), "source fetched");
            SourceOutcome::Fetched { source, updates }
        }
        Ok(Err(reason)) => {
            warn!(%source, error = %reason, "source failed");
            counter!("fetch_errors_total").increment(1);
            SourceOutcome::Failed { source, reason }
        }
        Err(_) => {
            warn!(%source, timeout_ms = limit.as_millis() as u64, "source timed out");
            counter!("fetch_timeouts_total").increment(1);
            SourceOutcome::TimedOut {
                source,
                after: limit,
            }
        }
    }
}

/// Concatenate in order, sort by date descending (stable), keep `cap`.
///
/// Dates are compared as text; mixed `YYYY-MM-DD` and `YYYY-MM-DD HH:MM`
/// values order correctly only because one is a prefix of the other.
pub fn merge(outcomes: Vec<SourceOutcome>, cap: usize) -> Vec<Update> {
    let mut all: Vec<Update> = outcomes
        .into_iter()
        .flat_map(SourceOutcome::into_updates)
        .collect();
    all.sort_by(|a, b| b.date().cmp(a.date()));
    all.truncate(cap);
    all
}
