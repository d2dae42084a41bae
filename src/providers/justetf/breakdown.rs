//! Expanded country/sector tables via the profile page's own follow-up
//! requests.
//!
//! The page paginates these tables through inline ajax calls; we replay the
//! captured request URLs with the captured session cookies. The endpoint
//! answers with markup wrapped in an escaped character-data envelope, which
//! gets its own decode step instead of reusing the page parser.

use super::profile::parse_weighted_rows;
use super::{JustEtfProvider, SCRAPE_TIMEOUT, USER_AGENT};
use crate::core::composition::{BreakdownProvider, Breakdowns, PageContext};
use crate::core::model::WeightedItem;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

static CDATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").unwrap());

/// Strips the ajax envelope and returns the concatenated markup fragments.
fn decode_envelope(body: &str) -> Option<String> {
    let fragments: Vec<&str> = CDATA_RE
        .captures_iter(body)
        .map(|c| c.get(1).map_or("", |m| m.as_str()))
        .collect();
    if fragments.is_empty() {
        return None;
    }
    Some(fragments.concat())
}

impl JustEtfProvider {
    fn absolute_url(&self, relative: &str) -> String {
        format!("{}/en/{}", self.base_url, relative.trim_start_matches("./"))
    }

    async fn fetch_table(&self, page: &PageContext, relative_url: &str) -> Vec<WeightedItem> {
        let url = self.absolute_url(relative_url);
        debug!("Replaying table request to {}", url);

        let result: anyhow::Result<Vec<WeightedItem>> = async {
            let client = reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(SCRAPE_TIMEOUT)
                .build()?;
            let response = client
                .get(&url)
                .header("Cookie", page.cookies.join("; "))
                .header("Wicket-Ajax", "true")
                .send()
                .await?
                .error_for_status()?;
            let body = response.text().await?;

            let markup = decode_envelope(&body)
                .ok_or_else(|| anyhow::anyhow!("No character-data envelope in table response"))?;
            Ok(parse_weighted_rows(&markup))
        }
        .await;

        match result {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Table replay failed for {url}, falling back to page data");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl BreakdownProvider for JustEtfProvider {
    async fn fetch_breakdowns(&self, page: &PageContext) -> Breakdowns {
        if page.cookies.is_empty() {
            warn!("No session cookies captured; skipping table replay");
            return Breakdowns::default();
        }

        let countries = match &page.countries_url {
            Some(url) => self.fetch_table(page, url).await,
            None => {
                warn!("No countries table URL on profile page");
                Vec::new()
            }
        };
        let sectors = match &page.sectors_url {
            Some(url) => self.fetch_table(page, url).await,
            None => {
                warn!("No sectors table URL on profile page");
                Vec::new()
            }
        };

        Breakdowns { countries, sectors }
    }
}
