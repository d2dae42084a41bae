//! Primary profile-page fetch and synchronous extraction.

use super::{JustEtfProvider, SCRAPE_TIMEOUT, USER_AGENT};
use crate::core::composition::{FundProfile, FundProfileProvider, PageContext, UpstreamError};
use crate::core::model::{FundReturns, WeightedItem};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::SET_COOKIE;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Bounded holdings list parsed from the page itself; deeper coverage comes
/// from the extended-holdings provider.
const MAX_PROFILE_HOLDINGS: usize = 10;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<h1[^>]*id="etf-title"[^>]*>([^<]+)</h1>"#).unwrap());

static ASSET_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Asset class</td>\s*<td[^>]*>([^<]+)<").unwrap());

static FUND_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Fund size</td>\s*<td[^>]*>([^<]+)<").unwrap());

static TER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Total expense ratio</td>\s*<td[^>]*>\s*([\d.,]+)\s*%").unwrap());

static REPLICATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Replication</td>\s*<td[^>]*>([^<]+)<").unwrap());

static DISTRIBUTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Distribution policy</td>\s*<td[^>]*>([^<]+)<").unwrap());

static TOTAL_HOLDINGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Holdings</td>\s*<td[^>]*>([\d,]+)<").unwrap());

static TABLE_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<td[^>]*>([^<%][^<]*)</td>\s*<td[^>]*>\s*([+-]?\d[\d.,]*)\s*%").unwrap()
});

static RETURN_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<td[^>]*>([^<]+)</td>\s*<td[^>]*>\s*([+-]?\d[\d.,]*)\s*%").unwrap()
});

// Follow-up table request URLs embedded in the page's inline ajax calls.
static COUNTRIES_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""u":"([^"]*countriesTable[^"]*)""#).unwrap());

static SECTORS_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""u":"([^"]*sectorsTable[^"]*)""#).unwrap());

pub(crate) fn parse_percent(raw: &str) -> Option<f64> {
    raw.trim()
        .trim_start_matches('+')
        .replace(',', "")
        .parse::<f64>()
        .ok()
}

fn section<'a>(html: &'a str, id: &str) -> Option<&'a str> {
    let marker = format!("id=\"{id}\"");
    let start = html.find(&marker)?;
    let rest = &html[start..];
    let end = rest.find("</section>").unwrap_or(rest.len());
    Some(&rest[..end])
}

pub(crate) fn parse_weighted_rows(fragment: &str) -> Vec<WeightedItem> {
    TABLE_ROW_RE
        .captures_iter(fragment)
        .filter_map(|c| {
            let name = c[1].trim();
            let weight = parse_percent(&c[2])?;
            if name.is_empty() {
                return None;
            }
            Some(WeightedItem::new(name, weight))
        })
        .collect()
}

fn parse_returns(html: &str) -> FundReturns {
    let mut returns = FundReturns::default();
    let Some(fragment) = section(html, "returns-section") else {
        return returns;
    };

    for captures in RETURN_ROW_RE.captures_iter(fragment) {
        let label = captures[1].trim().to_lowercase();
        let value = parse_percent(&captures[2]);
        match label.as_str() {
            "1 month" => returns.one_month = value,
            "3 months" => returns.three_months = value,
            "6 months" => returns.six_months = value,
            "ytd" => returns.ytd = value,
            "1 year" => returns.one_year = value,
            "3 years" => returns.three_years = value,
            "5 years" => returns.five_years = value,
            "max" | "since inception" => returns.max = value,
            _ => {}
        }
    }
    returns
}

fn capture(re: &Regex, html: &str) -> Option<String> {
    re.captures(html).map(|c| c[1].trim().to_string())
}

pub(crate) fn parse_profile(html: &str) -> FundProfile {
    let etf_name = capture(&NAME_RE, html);
    if etf_name.is_none() {
        warn!("No ETF title on profile page; upstream layout may have changed");
    }

    let holdings_fragment = section(html, "holdings-section");
    let mut holdings = holdings_fragment.map(parse_weighted_rows).unwrap_or_default();
    holdings.truncate(MAX_PROFILE_HOLDINGS);

    FundProfile {
        etf_name,
        holdings,
        countries: section(html, "countries-section")
            .map(parse_weighted_rows)
            .unwrap_or_default(),
        sectors: section(html, "sectors-section")
            .map(parse_weighted_rows)
            .unwrap_or_default(),
        asset_class: capture(&ASSET_CLASS_RE, html),
        has_holdings_section: holdings_fragment.is_some(),
        total_holdings: capture(&TOTAL_HOLDINGS_RE, html)
            .and_then(|raw| raw.replace(',', "").parse().ok()),
        fund_size: capture(&FUND_SIZE_RE, html),
        ter: TER_RE.captures(html).and_then(|c| parse_percent(&c[1])),
        replication: capture(&REPLICATION_RE, html),
        distribution_policy: capture(&DISTRIBUTION_RE, html),
        returns: parse_returns(html),
        page: PageContext {
            cookies: Vec::new(),
            countries_url: capture(&COUNTRIES_URL_RE, html),
            sectors_url: capture(&SECTORS_URL_RE, html),
        },
    }
}

#[async_trait]
impl FundProfileProvider for JustEtfProvider {
    async fn fetch_profile(&self, isin: &str) -> Result<FundProfile, UpstreamError> {
        let url = self.profile_url(isin);
        debug!("Requesting fund profile from {}", url);

        let transport = |source: reqwest::Error| UpstreamError::Transport {
            url: url.clone(),
            source,
        };

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(SCRAPE_TIMEOUT)
            .build()
            .map_err(transport)?;
        let response = client.get(&url).send().await.map_err(transport)?;

        if !response.status().is_success() {
            return Err(UpstreamError::Status {
                status: response.status().as_u16(),
                url: url.clone(),
            });
        }

        // Session cookies gate the page's follow-up table requests.
        let cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .map(|pair| pair.trim().to_string())
            .collect();

        let html = response.text().await.map_err(transport)?;

        let mut profile = parse_profile(&html);
        profile.page.cookies = cookies;
        Ok(profile)
    }
}
