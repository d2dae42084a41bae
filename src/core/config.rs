use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::core::model::SecurityType;

/// How position values are interpreted when computing weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueMode {
    /// `value` is an invested amount; weights are value / total value.
    #[default]
    Amount,
    /// `value` is an entered percentage; weights are value / total entered,
    /// so an unnormalized total still yields weights summing to 1.
    Percent,
}

/// One user position. The aggregator reads `isin`/`ticker`/`value`/`kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub name: String,
    #[serde(default)]
    pub isin: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    pub kind: SecurityType,
    pub value: f64,
}

impl Position {
    /// Identifier used to look up a resolved composition: uppercased ISIN
    /// when present, ticker otherwise.
    pub fn identifier(&self) -> Option<String> {
        match (&self.isin, &self.ticker) {
            (Some(isin), _) if !isin.is_empty() => Some(isin.to_uppercase()),
            (_, Some(ticker)) if !ticker.is_empty() => Some(ticker.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JustEtfProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CbondsProviderConfig {
    /// Helper program, e.g. "python3".
    pub command: String,
    /// Leading arguments, e.g. the helper script path. The ISIN is appended.
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub justetf: Option<JustEtfProviderConfig>,
    pub yahoo: Option<YahooProviderConfig>,
    pub cbonds: Option<CbondsProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            justetf: Some(JustEtfProviderConfig {
                base_url: "https://www.justetf.com".to_string(),
            }),
            yahoo: Some(YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            }),
            cbonds: Some(CbondsProviderConfig {
                command: "python3".to_string(),
                args: vec!["scripts/cbonds_fetch.py".to_string()],
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub mode: ValueMode,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl AppConfig {
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "fundlens")
            .context("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.yml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::default_config_path()?;
        Self::load_from_path(path.to_str().context("Invalid config path")?)
    }

    pub fn load_from_path(path: &str) -> Result<Self> {
        debug!("Loading config from {path}");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"---
mode: percent
positions:
  - name: "Vanguard FTSE All-World"
    isin: "IE00B3RBWM25"
    kind: etf
    value: 60.0
  - name: "Apple"
    ticker: "AAPL"
    kind: stock
    value: 40.0
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.mode, ValueMode::Percent);
        assert_eq!(config.positions.len(), 2);
        assert_eq!(
            config.positions[0].identifier().as_deref(),
            Some("IE00B3RBWM25")
        );
        assert_eq!(config.positions[1].identifier().as_deref(), Some("AAPL"));
        // Provider defaults fill in when absent from the file.
        assert!(config.providers.justetf.is_some());
    }

    #[test]
    fn test_identifier_uppercases_isin() {
        let position = Position {
            name: "test".to_string(),
            isin: Some("ie00b3rbwm25".to_string()),
            ticker: None,
            kind: SecurityType::Etf,
            value: 100.0,
        };
        assert_eq!(position.identifier().as_deref(), Some("IE00B3RBWM25"));
    }
}
