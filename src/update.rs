// src/update.rs
//! The normalized record every source emits.
//!
//! An [`Update`] can only be built through [`Update::new`], which enforces a
//! non-empty title and an absolute `http(s)` URL. Once built it is never
//! mutated; the aggregator only moves, sorts and truncates them.

use serde::Serialize;
use url::Url;

/// Date format used by sources that only know the calendar day.
pub const DAY_FORMAT: &str = "%Y-%m-%d";
/// Date format used by sources that carry a timestamp.
pub const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Update {
    title: String,
    summary: String,
    source: String,
    /// `YYYY-MM-DD` or `YYYY-MM-DD HH:MM`. Compared as text.
    date: String,
    url: Url,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UpdateError {
    #[error("title is empty")]
    EmptyTitle,
    #[error("url '{0}' is not a valid absolute url")]
    InvalidUrl(String),
    #[error("url '{0}' must use http or https")]
    UnsupportedScheme(String),
}

impl Update {
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        source: impl Into<String>,
        date: impl Into<String>,
        url: &str,
    ) -> Result<Self, UpdateError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(UpdateError::EmptyTitle);
        }

        let parsed = Url::parse(url).map_err(|_| UpdateError::InvalidUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(UpdateError::UnsupportedScheme(url.to_string()));
        }

        Ok(Self {
            title,
            summary: summary.into(),
            source: source.into(),
            date: date.into(),
            url: parsed,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}
