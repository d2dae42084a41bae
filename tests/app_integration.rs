use std::fs;

mod test_utils {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub fn profile_html(name: &str, ter: f64, holdings: &[(&str, f64)]) -> String {
        let rows: String = holdings
            .iter()
            .map(|(holding, weight)| format!("<tr><td>{holding}</td><td>{weight}%</td></tr>"))
            .collect();
        format!(
            r#"
            <h1 id="etf-title">{name}</h1>
            <table>
                <tr><td>Total expense ratio</td><td>{ter}% p.a.</td></tr>
                <tr><td>Asset class</td><td>Equity</td></tr>
            </table>
            <section id="holdings-section"><table>{rows}</table></section>
            <section id="countries-section"><table>
                <tr><td>United States</td><td>60.0%</td></tr>
            </table></section>
            <section id="sectors-section"><table>
                <tr><td>Technology</td><td>25.0%</td></tr>
            </table></section>
            "#
        )
    }

    pub async fn mount_profile(server: &MockServer, isin: &str, body: String) {
        Mock::given(method("GET"))
            .and(path("/en/etf-profile.html"))
            .and(query_param("isin", isin))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }
}

fn write_config(
    dir: &tempfile::TempDir,
    justetf_base: &str,
    yahoo_base: &str,
    positions: &str,
) -> String {
    let config_path = dir.path().join("config.yml");
    let content = format!(
        r#"---
mode: amount
positions:
{positions}
providers:
  justetf:
    base_url: "{justetf_base}"
  yahoo:
    base_url: "{yahoo_base}"
  cbonds:
    command: "sh"
    args: ["-c", "echo '{{\"holdings\": [], \"cbondsId\": \"1\"}}'"]
"#
    );
    fs::write(&config_path, content).expect("Failed to write config file");
    config_path.to_str().unwrap().to_string()
}

#[test_log::test(tokio::test)]
async fn test_full_portfolio_flow_with_mocks() {
    let justetf = wiremock::MockServer::start().await;
    let yahoo = wiremock::MockServer::start().await;

    test_utils::mount_profile(
        &justetf,
        "IE00B4L5Y983",
        test_utils::profile_html(
            "iShares Core MSCI World",
            0.20,
            &[("Apple Inc", 4.5), ("Microsoft Corp", 4.0)],
        ),
    )
    .await;
    test_utils::mount_profile(
        &justetf,
        "IE00B3RBWM25",
        test_utils::profile_html(
            "Vanguard FTSE All-World",
            0.22,
            &[("Apple Inc", 3.9), ("Nestle SA", 1.1)],
        ),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let positions = r#"  - name: "MSCI World"
    isin: "IE00B4L5Y983"
    kind: etf
    value: 600.0
  - name: "All-World"
    isin: "IE00B3RBWM25"
    kind: etf
    value: 400.0
  - name: "Apple"
    ticker: "AAPL"
    kind: stock
    value: 200.0"#;
    let config_path = write_config(&dir, &justetf.uri(), &yahoo.uri(), positions);

    let result = fundlens::run_command(
        fundlens::AppCommand::Portfolio,
        Some(&config_path),
    )
    .await;
    assert!(result.is_ok(), "Portfolio flow failed: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_search_flow_federates_funds_and_stocks() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    let justetf = wiremock::MockServer::start().await;
    let yahoo = wiremock::MockServer::start().await;

    let listing = r#"<script>var etfsData = [
        {"isin":"IE00B3RBWM25","name":"Vanguard FTSE All-World","wkn":"A1JX52","ticker":"VWRL"}
    ];</script>"#;
    Mock::given(method("GET"))
        .and(path("/en/search.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing))
        .mount(&justetf)
        .await;

    let search_body = r#"{
        "quotes": [{"symbol": "VAN", "shortname": "Vanadium Corp", "quoteType": "EQUITY"}]
    }"#;
    Mock::given(method("GET"))
        .and(path("/v1/finance/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(search_body))
        .mount(&yahoo)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir, &justetf.uri(), &yahoo.uri(), "  []");

    let result = fundlens::run_command(
        fundlens::AppCommand::Search {
            query: "van".to_string(),
        },
        Some(&config_path),
    )
    .await;
    assert!(result.is_ok(), "Search flow failed: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_unreachable_primary_page_fails_composition() {
    let justetf = wiremock::MockServer::start().await;
    let yahoo = wiremock::MockServer::start().await;

    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/en/etf-profile.html"))
        .respond_with(wiremock::ResponseTemplate::new(503))
        .mount(&justetf)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir, &justetf.uri(), &yahoo.uri(), "  []");

    let result = fundlens::run_command(
        fundlens::AppCommand::Composition {
            isin: "IE00B3RBWM25".to_string(),
            full: false,
        },
        Some(&config_path),
    )
    .await;
    assert!(result.is_err(), "Primary fetch failure must surface");
}
