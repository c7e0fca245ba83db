use std::path::PathBuf;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{PennyError, Result};
use crate::models::Instrument;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_currency")]
    pub default_currency: String,
    #[serde(default = "default_accrual_window_secs")]
    pub accrual_window_secs: i64,
    #[serde(default = "default_refund_factor")]
    pub refund_factor: f64,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_instrument")]
    pub price_instrument: Instrument,
    #[serde(default = "default_instrument")]
    pub accrual_instrument: Instrument,
    #[serde(default)]
    pub auto_backup: bool,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default)]
    pub catalog_path: Option<String>,
}

/// Longest accrual window accepted: 30 days.
pub const MAX_ACCRUAL_WINDOW_SECS: i64 = 30 * 24 * 60 * 60;

fn default_currency() -> String {
    "RUB".to_string()
}

fn default_accrual_window_secs() -> i64 {
    3 * 60 * 60
}

fn default_refund_factor() -> f64 {
    0.8
}

fn default_max_items() -> usize {
    100
}

fn default_instrument() -> Instrument {
    Instrument::Mnt
}

fn default_history_limit() -> usize {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            default_currency: default_currency(),
            accrual_window_secs: default_accrual_window_secs(),
            refund_factor: default_refund_factor(),
            max_items: default_max_items(),
            price_instrument: default_instrument(),
            accrual_instrument: default_instrument(),
            auto_backup: false,
            history_limit: default_history_limit(),
            catalog_path: None,
        }
    }
}

impl Settings {
    pub fn accrual_window(&self) -> Duration {
        Duration::seconds(self.accrual_window_secs)
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_path().join("ledger.json")
    }

    pub fn rates_path(&self) -> PathBuf {
        self.data_path().join("rates.json")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.data_path().join("backups")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_path().join("reports")
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_ACCRUAL_WINDOW_SECS).contains(&self.accrual_window_secs) {
            return Err(PennyError::Settings(format!(
                "accrual_window_secs must be within 1..={MAX_ACCRUAL_WINDOW_SECS}, got {}",
                self.accrual_window_secs
            )));
        }
        if !(0.0..=1.0).contains(&self.refund_factor) {
            return Err(PennyError::Settings(format!(
                "refund_factor must be within 0..=1, got {}",
                self.refund_factor
            )));
        }
        Ok(())
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("penny")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("penny")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| PennyError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
