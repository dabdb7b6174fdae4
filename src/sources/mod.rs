// src/sources/mod.rs
//! Source table and the generic fetchers that consume it.
//!
//! Every source is described by a [`SourceDescriptor`]: where to fetch, how
//! to locate candidates, how to turn a link into an absolute URL and which
//! candidates to keep. [`build_fetchers`] turns the table into live
//! [`SourceFetcher`]s; the per-site differences live in data, not code.

pub mod html;
pub mod social;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::sources::html::HtmlSource;
use crate::sources::social::SocialSearchSource;
pub use crate::sources::types::{FetchError, SourceFetcher};

fn default_html_cap() -> usize {
    20
}
fn default_social_cap() -> usize {
    25
}
fn default_since_days() -> u32 {
    3
}
fn default_program() -> String {
    "snscrape".to_string()
}
fn default_scope() -> String {
    "twitter-search".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceDescriptor {
    Html(HtmlDescriptor),
    SocialSearch(SocialDescriptor),
}

impl SourceDescriptor {
    pub fn name(&self) -> &str {
        match self {
            SourceDescriptor::Html(d) => &d.name,
            SourceDescriptor::SocialSearch(d) => &d.name,
        }
    }
}

/// A press-release or news page scraped with a CSS selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlDescriptor {
    /// Value written into `Update::source`.
    pub name: String,
    pub url: Url,
    /// Must select anchor elements; their text becomes the title.
    pub selector: String,
    #[serde(default)]
    pub link: LinkRule,
    #[serde(default)]
    pub filter: FilterRule,
    /// Candidates considered, in document order, before filtering.
    #[serde(default = "default_html_cap")]
    pub max_items: usize,
    /// Scoped to this source's client only.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

/// A search run through an external snscrape-compatible utility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialDescriptor {
    pub name: String,
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub filter: FilterRule,
    #[serde(default = "default_social_cap")]
    pub max_results: usize,
    #[serde(default = "default_since_days")]
    pub since_days: u32,
}

/// How an `href` becomes an absolute URL. Absolute hrefs pass through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRule {
    /// Resolve against the page URL.
    #[default]
    Page,
    /// Resolve against the site root; a leading `/` makes no difference.
    SiteRoot,
}

impl LinkRule {
    pub fn resolve(&self, page: &Url, href: &str) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }
        let resolved = match self {
            LinkRule::Page => page.join(href),
            LinkRule::SiteRoot => page
                .join("/")
                .and_then(|root| root.join(href.trim_start_matches('/'))),
        };
        resolved
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
    }
}

/// Which candidates a source keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FilterRule {
    /// Text contains the caller's query, case-insensitively.
    #[default]
    Query,
    /// Text contains any of the terms, case-insensitively. The caller's
    /// query is not consulted.
    PriorityTerms { terms: Vec<String> },
}

impl FilterRule {
    pub fn matches(&self, text: &str, query: &str) -> bool {
        let haystack = text.to_lowercase();
        match self {
            FilterRule::Query => haystack.contains(&query.to_lowercase()),
            FilterRule::PriorityTerms { terms } => terms
                .iter()
                .map(|t| t.trim().to_lowercase())
                .any(|t| !t.is_empty() && haystack.contains(&t)),
        }
    }
}

/// Decode entities, strip stray tags and collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
    let stripped = re_tags.replace_all(&decoded, " ");

    collapse_whitespace(&stripped)
}

/// Collapse whitespace runs and trim. For text already decoded by a DOM parser.
pub fn collapse_whitespace(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(s, " ").trim().to_string()
}

/// Cut to `max` chars, marking the cut with an ellipsis.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}

/// Shared knobs for the outbound clients.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub user_agent: String,
    pub request_timeout: Duration,
}

/// Turn the source table into fetchers, in table order.
pub fn build_fetchers(
    descriptors: &[SourceDescriptor],
    settings: &ClientSettings,
) -> Result<Vec<Arc<dyn SourceFetcher>>, FetchError> {
    descriptors
        .iter()
        .map(|d| -> Result<Arc<dyn SourceFetcher>, FetchError> {
            match d {
                SourceDescriptor::Html(h) => Ok(Arc::new(HtmlSource::connect(h.clone(), settings)?)),
                SourceDescriptor::SocialSearch(s) => Ok(Arc::new(SocialSearchSource::new(s.clone()))),
            }
        })
        .collect()
}

/// Sources shipped with the service when no config file is present.
pub fn builtin_sources() -> Vec<SourceDescriptor> {
    let url = |s: &str| Url::parse(s).expect("builtin source url");
    vec![
        SourceDescriptor::Html(HtmlDescriptor {
            name: "PIB India".into(),
            url: url("https://pib.gov.in/PressReleasePage.aspx"),
            selector: ".content-area ul li a".into(),
            link: LinkRule::SiteRoot,
            filter: FilterRule::Query,
            max_items: 20,
            accept_invalid_certs: false,
        }),
        SourceDescriptor::Html(HtmlDescriptor {
            name: "Sikkim Govt".into(),
            url: url("https://sikkim.gov.in/media/press-release"),
            selector: ".news-content a".into(),
            link: LinkRule::SiteRoot,
            filter: FilterRule::Query,
            max_items: 20,
            accept_invalid_certs: false,
        }),
        SourceDescriptor::Html(HtmlDescriptor {
            name: "NDTV".into(),
            url: url("https://www.ndtv.com/india"),
            selector: ".news_Itm-cont .newsHdng a".into(),
            link: LinkRule::Page,
            filter: FilterRule::Query,
            max_items: 25,
            accept_invalid_certs: false,
        }),
        SourceDescriptor::SocialSearch(SocialDescriptor {
            name: "Twitter/X".into(),
            program: default_program(),
            scope: default_scope(),
            filter: FilterRule::Query,
            max_results: 25,
            since_days: 3,
        }),
        SourceDescriptor::SocialSearch(SocialDescriptor {
            name: "Sikkim Landslide Watch".into(),
            program: default_program(),
            scope: default_scope(),
            filter: FilterRule::PriorityTerms {
                terms: [
                    "Sikkim landslide",
                    "Teesta flood",
                    "Chungthang",
                    "Sikkim rescue",
                    "#SikkimLandslide",
                    "#Teesta",
                    "#SikkimFlood",
                    "Sikkim missing",
                ]
                .map(String::from)
                .to_vec(),
            },
            max_results: 100,
            since_days: 3,
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_root_ignores_page_path_and_leading_slash() {
        let page = Url::parse("https://pib.gov.in/PressReleasePage.aspx").unwrap();
        let a = LinkRule::SiteRoot.resolve(&page, "/PressReleseDetail.aspx?PRID=1").unwrap();
        let b = LinkRule::SiteRoot.resolve(&page, "PressReleseDetail.aspx?PRID=1").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "https://pib.gov.in/PressReleseDetail.aspx?PRID=1");
    }

    #[test]
    fn page_rule_joins_relative_to_page() {
        let page = Url::parse("https://sikkim.gov.in/media/press-release").unwrap();
        let u = LinkRule::Page.resolve(&page, "release-42").unwrap();
        assert_eq!(u.as_str(), "https://sikkim.gov.in/media/release-42");
    }

    #[test]
    fn absolute_links_pass_through_and_junk_is_dropped() {
        let page = Url::parse("https://sikkim.gov.in/media/press-release").unwrap();
        let u = LinkRule::SiteRoot
            .resolve(&page, "https://cdn.sikkim.gov.in/a.pdf")
            .unwrap();
        assert_eq!(u.host_str(), Some("cdn.sikkim.gov.in"));
        assert!(LinkRule::Page.resolve(&page, "").is_none());
        assert!(LinkRule::Page.resolve(&page, "#top").is_none());
        assert!(LinkRule::Page.resolve(&page, "javascript:void(0)").is_none());
    }

    #[test]
    fn query_filter_is_case_insensitive_substring() {
        let f = FilterRule::Query;
        assert!(f.matches("Sikkim Rescue operation ends", "rescue"));
        assert!(!f.matches("Cabinet approves budget", "rescue"));
    }

    #[test]
    fn priority_terms_ignore_query() {
        let f = FilterRule::PriorityTerms {
            terms: vec!["Teesta flood".into(), " ".into()],
        };
        assert!(f.matches("Fresh TEESTA FLOOD alert issued", "budget"));
        assert!(!f.matches("Budget session begins", "budget"));
    }

    #[test]
    fn normalize_text_decodes_and_collapses() {
        let s = "  NDRF&nbsp;teams \n<b>deployed</b>   in   Mangan ";
        assert_eq!(normalize_text(s), "NDRF teams deployed in Mangan");
    }

    #[test]
    fn collapse_whitespace_keeps_markup_like_text() {
        assert_eq!(collapse_whitespace("  <Rescue>\n &lt;draft&gt; "), "<Rescue> &lt;draft&gt;");
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc…");
    }

    #[test]
    fn builtin_table_names_are_unique() {
        let table = builtin_sources();
        let mut names: Vec<_> = table.iter().map(|d| d.name().to_string()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), table.len());
    }
}
