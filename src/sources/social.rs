// src/sources/social.rs
//! Social-media search through an external snscrape-compatible utility.
//!
//! The utility is invoked as
//! `<program> --jsonl --max-results N --since YYYY-MM-DD <scope> <search>`
//! and prints one JSON post per line. Only `url`, `date`, the post text and
//! the author's handle are read; everything else in the record is ignored.

use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::sources::types::{FetchError, SourceFetcher};
use crate::sources::{normalize_text, truncate_chars, FilterRule, SocialDescriptor};
use crate::update::{Update, DAY_FORMAT, MINUTE_FORMAT};

const TITLE_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
struct Post {
    url: String,
    date: DateTime<Utc>,
    #[serde(rename = "rawContent")]
    raw_content: Option<String>,
    content: Option<String>,
    user: Option<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    username: String,
}

pub struct SocialSearchSource {
    desc: SocialDescriptor,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Command,
}

impl SocialSearchSource {
    pub fn new(desc: SocialDescriptor) -> Self {
        Self {
            desc,
            mode: Mode::Command,
        }
    }

    /// Serve `jsonl` instead of running the utility.
    pub fn from_fixture(desc: SocialDescriptor, jsonl: &str) -> Self {
        Self {
            desc,
            mode: Mode::Fixture(jsonl.to_string()),
        }
    }

    /// The search string handed to the utility.
    pub fn search_string(&self, query: &str) -> String {
        match &self.desc.filter {
            FilterRule::Query => query.to_string(),
            FilterRule::PriorityTerms { terms } => terms
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" OR "),
        }
    }

    pub fn command_args(&self, query: &str, today: NaiveDate) -> Vec<String> {
        let since = today
            .checked_sub_days(Days::new(u64::from(self.desc.since_days)))
            .unwrap_or(today);
        vec![
            "--jsonl".to_string(),
            "--max-results".to_string(),
            self.desc.max_results.to_string(),
            "--since".to_string(),
            since.format(DAY_FORMAT).to_string(),
            self.desc.scope.clone(),
            self.search_string(query),
        ]
    }

    /// Parse utility output. The first `max_results` lines are candidates;
    /// unreadable ones are dropped.
    pub fn parse_lines(&self, jsonl: &str, query: &str) -> Vec<Update> {
        let mut out = Vec::new();
        let candidates = jsonl
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(self.desc.max_results);
        for line in candidates {
            let post: Post = match serde_json::from_str(line) {
                Ok(p) => p,
                Err(e) => {
                    debug!(source = %self.desc.name, error = %e, "skipping unreadable post");
                    continue;
                }
            };

            let text = normalize_text(
                post.raw_content
                    .as_deref()
                    .or(post.content.as_deref())
                    .unwrap_or_default(),
            );
            if !self.desc.filter.matches(&text, query) {
                continue;
            }

            let summary = match &post.user {
                Some(a) => format!("@{}: {}", a.username, text),
                None => text.clone(),
            };
            let date = post.date.format(MINUTE_FORMAT).to_string();
            match Update::new(
                truncate_chars(&text, TITLE_CHARS),
                summary,
                self.desc.name.as_str(),
                date,
                &post.url,
            ) {
                Ok(u) => out.push(u),
                Err(e) => debug!(source = %self.desc.name, error = %e, "dropping post"),
            }
        }
        out
    }
}

#[async_trait]
impl SourceFetcher for SocialSearchSource {
    #[instrument(level = "debug", skip(self), fields(source = %self.desc.name))]
    async fn fetch(&self, query: &str) -> Result<Vec<Update>, FetchError> {
        let stdout = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Command => {
                let args = self.command_args(query, Utc::now().date_naive());
                debug!(program = %self.desc.program, ?args, "running search utility");
                let output = Command::new(&self.desc.program)
                    .args(&args)
                    .stdin(Stdio::null())
                    .kill_on_drop(true)
                    .output()
                    .await
                    .map_err(|source| FetchError::Spawn {
                        program: self.desc.program.clone(),
                        source,
                    })?;
                if !output.status.success() {
                    return Err(FetchError::Command {
                        program: self.desc.program.clone(),
                        status: output.status.to_string(),
                        stderr: truncate_chars(String::from_utf8_lossy(&output.stderr).trim(), 300),
                    });
                }
                String::from_utf8_lossy(&output.stdout).into_owned()
            }
        };
        Ok(self.parse_lines(&stdout, query))
    }

    fn name(&self) -> &str {
        &self.desc.name
    }
}
