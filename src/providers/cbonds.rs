//! Extended-holdings adapter backed by an external helper process.
//!
//! The secondary provider sits behind anti-automation defenses the in-process
//! client cannot pass, so a helper program (browser-impersonating Python
//! script by default) does the fetch and prints a JSON document on stdout:
//! `{ "holdings": [{"name", "weight"}], "cbondsId", "error"? }`. The helper
//! runs under a hard timeout and an output-size cap; every failure mode
//! degrades to an empty result, never an error.

use crate::core::cache::TtlCache;
use crate::core::composition::ExtendedHoldingsProvider;
use crate::core::model::{ExtendedHoldings, WeightedItem};
use crate::core::normalize::title_case_all_caps;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

const PROCESS_TIMEOUT: Duration = Duration::from_secs(45);
const MAX_OUTPUT_BYTES: usize = 2 * 1024 * 1024;
const EXTENDED_TTL: Duration = Duration::from_secs(60 * 60 * 24);

pub struct CbondsProvider {
    command: String,
    args: Vec<String>,
    process_timeout: Duration,
    cache: Arc<TtlCache<String, ExtendedHoldings>>,
}

impl CbondsProvider {
    pub fn new(
        command: &str,
        args: &[String],
        cache: Arc<TtlCache<String, ExtendedHoldings>>,
    ) -> Self {
        Self {
            command: command.to_string(),
            args: args.to_vec(),
            process_timeout: PROCESS_TIMEOUT,
            cache,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_timeout(mut self, process_timeout: Duration) -> Self {
        self.process_timeout = process_timeout;
        self
    }

    async fn run_helper(&self, isin: &str) -> Result<ExtendedHoldings> {
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .arg(isin)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            // Reaps the helper if the timeout drops the future.
            .kill_on_drop(true);

        debug!(command = %self.command, "Spawning extended-holdings helper for {isin}");
        let mut child = command.spawn().context("Failed to spawn helper process")?;
        let stdout = child
            .stdout
            .take()
            .context("Helper stdout unavailable")?;

        // Stdout is read incrementally so a runaway helper is killed at the
        // cap instead of buffered in full.
        let stdout_bytes = timeout(self.process_timeout, async {
            let mut buffer = Vec::new();
            stdout
                .take(MAX_OUTPUT_BYTES as u64 + 1)
                .read_to_end(&mut buffer)
                .await
                .context("Failed to read helper output")?;
            if buffer.len() > MAX_OUTPUT_BYTES {
                let _ = child.start_kill();
                anyhow::bail!("Helper output exceeds cap of {MAX_OUTPUT_BYTES} bytes");
            }
            let status = child.wait().await.context("Helper process failed")?;
            if !status.success() {
                anyhow::bail!("Helper process exited with {status}");
            }
            Ok(buffer)
        })
        .await
        .context("Helper process timed out")??;

        let response: HelperResponse =
            serde_json::from_slice(&stdout_bytes).context("Malformed helper output")?;
        if let Some(error) = &response.error {
            // The helper reports soft errors inline and may still carry data.
            warn!("Helper reported: {error}");
        }

        Ok(ExtendedHoldings {
            holdings: response
                .holdings
                .into_iter()
                .map(|h| WeightedItem::new(title_case_all_caps(&h.name), h.weight))
                .collect(),
            cbonds_id: response.cbonds_id.map(|id| match id {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
        })
    }
}

#[derive(Debug, Deserialize)]
struct HelperHolding {
    name: String,
    weight: f64,
}

#[derive(Debug, Deserialize)]
struct HelperResponse {
    #[serde(default)]
    holdings: Vec<HelperHolding>,
    // The helper emits either a numeric or a string id.
    #[serde(alias = "cbondsId")]
    cbonds_id: Option<serde_json::Value>,
    error: Option<String>,
}

#[async_trait]
impl ExtendedHoldingsProvider for CbondsProvider {
    async fn fetch_extended(&self, isin: &str) -> ExtendedHoldings {
        let key = isin.trim().to_uppercase();
        if let Some(cached) = self.cache.get(&key).await {
            return cached;
        }

        match self.run_helper(&key).await {
            Ok(extended) => {
                self.cache
                    .put(key, extended.clone(), Some(EXTENDED_TTL))
                    .await;
                extended
            }
            Err(e) => {
                warn!(error = %e, "Extended holdings unavailable for {key}");
                ExtendedHoldings::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SystemClock;

    fn cache() -> Arc<TtlCache<String, ExtendedHoldings>> {
        Arc::new(TtlCache::new(16, Arc::new(SystemClock)))
    }

    fn scripted_provider(script: &str) -> CbondsProvider {
        // `sh -c` swallows the appended ISIN as $0.
        CbondsProvider::new("sh", &["-c".to_string(), script.to_string()], cache())
    }

    #[tokio::test]
    async fn test_parses_helper_output_and_title_cases_names() {
        let script = r#"echo '{
            "holdings": [
                {"name": "TAIWAN SEMICONDUCTOR MANUFACTURING", "weight": 8.9},
                {"name": "Apple Inc", "weight": 4.5}
            ],
            "cbondsId": 1807
        }'"#;
        let provider = scripted_provider(script);

        let extended = provider.fetch_extended("IE00B3RBWM25").await;
        assert_eq!(extended.holdings.len(), 2);
        assert_eq!(
            extended.holdings[0].name,
            "Taiwan Semiconductor Manufacturing"
        );
        assert_eq!(extended.holdings[1].name, "Apple Inc");
        assert_eq!(extended.cbonds_id.as_deref(), Some("1807"));
    }

    #[tokio::test]
    async fn test_helper_error_with_empty_holdings() {
        let script = r#"echo '{"holdings": [], "error": "No ETF found on cbonds"}'"#;
        let provider = scripted_provider(script);

        let extended = provider.fetch_extended("XX0000000000").await;
        assert!(extended.holdings.is_empty());
        assert!(extended.cbonds_id.is_none());
    }

    #[tokio::test]
    async fn test_nonzero_exit_yields_empty() {
        let provider = scripted_provider("exit 3");
        let extended = provider.fetch_extended("IE00B3RBWM25").await;
        assert!(extended.holdings.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_output_yields_empty() {
        let provider = scripted_provider("echo 'not json'");
        let extended = provider.fetch_extended("IE00B3RBWM25").await;
        assert!(extended.holdings.is_empty());
    }

    #[tokio::test]
    async fn test_unbounded_output_is_stopped_at_the_cap() {
        // `yes` never terminates; the read must stop at the output cap long
        // before the 45s process timeout.
        let provider = scripted_provider("yes aaaaaaaaaaaaaaaa");
        let extended = tokio::time::timeout(
            Duration::from_secs(10),
            provider.fetch_extended("IE00B3RBWM25"),
        )
        .await
        .expect("helper was not stopped at the output cap");
        assert!(extended.holdings.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_yields_empty() {
        let provider = scripted_provider("sleep 5; echo '{\"holdings\": []}'")
            .with_timeout(Duration::from_millis(50));
        let extended = provider.fetch_extended("IE00B3RBWM25").await;
        assert!(extended.holdings.is_empty());
    }

    #[tokio::test]
    async fn test_successful_result_is_cached() {
        // Writing a marker file on each run makes repeat invocations visible.
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("runs");
        let script = format!(
            "echo run >> {}; echo '{{\"holdings\": [{{\"name\": \"Apple Inc\", \"weight\": 4.5}}], \"cbondsId\": \"1807\"}}'",
            marker.display()
        );
        let provider = scripted_provider(&script);

        provider.fetch_extended("IE00B3RBWM25").await;
        provider.fetch_extended("ie00b3rbwm25").await;

        let runs = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(runs.lines().count(), 1);
    }
}
