// src/sources/html.rs
use async_trait::async_trait;
use chrono::Local;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

use crate::sources::types::{FetchError, SourceFetcher};
use crate::sources::{collapse_whitespace, ClientSettings, HtmlDescriptor};
use crate::update::{Update, DAY_FORMAT};

/// Generic fetcher for any [`HtmlDescriptor`].
pub struct HtmlSource {
    desc: HtmlDescriptor,
    selector: Selector,
    mode: Mode,
}

enum Mode {
    // Owned copy so tests can pass any &str.
    Fixture(String),
    Http(reqwest::Client),
}

fn parse_selector(raw: &str) -> Result<Selector, FetchError> {
    Selector::parse(raw).map_err(|e| FetchError::InvalidSelector {
        selector: raw.to_string(),
        reason: format!("{e:?}"),
    })
}

impl HtmlSource {
    /// Build a live source with its own client.
    pub fn connect(desc: HtmlDescriptor, settings: &ClientSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout)
            .danger_accept_invalid_certs(desc.accept_invalid_certs)
            .build()?;
        Ok(Self {
            selector: parse_selector(&desc.selector)?,
            desc,
            mode: Mode::Http(client),
        })
    }

    /// Serve `html` instead of fetching the descriptor's URL.
    pub fn from_fixture(desc: HtmlDescriptor, html: &str) -> Result<Self, FetchError> {
        Ok(Self {
            selector: parse_selector(&desc.selector)?,
            desc,
            mode: Mode::Fixture(html.to_string()),
        })
    }

    pub fn descriptor(&self) -> &HtmlDescriptor {
        &self.desc
    }

    /// Pull matching anchors out of a page. `date` is stamped on every record.
    pub fn extract(&self, html: &str, query: &str, date: &str) -> Result<Vec<Update>, FetchError> {
        let document = Html::parse_document(html);
        let mut candidates = document.select(&self.selector).peekable();
        if candidates.peek().is_none() {
            return Err(FetchError::SelectorMiss(self.desc.selector.clone()));
        }

        let mut out = Vec::new();
        for element in candidates.take(self.desc.max_items) {
            let title = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
            if !self.desc.filter.matches(&title, query) {
                continue;
            }

            let Some(href) = element.value().attr("href") else {
                debug!(source = %self.desc.name, %title, "candidate without href");
                continue;
            };
            let Some(link) = self.desc.link.resolve(&self.desc.url, href) else {
                debug!(source = %self.desc.name, %href, "unresolvable link");
                continue;
            };

            match Update::new(title.clone(), title, self.desc.name.as_str(), date, link.as_str()) {
                Ok(update) => out.push(update),
                Err(e) => debug!(source = %self.desc.name, error = %e, "dropping record"),
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceFetcher for HtmlSource {
    #[instrument(level = "debug", skip(self), fields(source = %self.desc.name))]
    async fn fetch(&self, query: &str) -> Result<Vec<Update>, FetchError> {
        let today = Local::now().format(DAY_FORMAT).to_string();
        match &self.mode {
            Mode::Fixture(html) => self.extract(html, query, &today),
            Mode::Http(client) => {
                let body = client
                    .get(self.desc.url.clone())
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?;
                debug!(bytes = body.len(), "page fetched");
                self.extract(&body, query, &today)
            }
        }
    }

    fn name(&self) -> &str {
        &self.desc.name
    }
}
