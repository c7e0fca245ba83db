use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PennyError, Result};
use crate::money::convert_minor;
use crate::store::write_atomic;

/// Exchange-rate table: each pair is "units of that currency per one `base`".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rates {
    pub base: String,
    pub pairs: BTreeMap<String, f64>,
    pub updated_at: DateTime<Utc>,
}

const DEFAULT_PAIRS: &[(&str, f64)] = &[("RUB", 1.0), ("USD", 0.0108), ("EUR", 0.0100), ("KZT", 6.0)];

impl Rates {
    pub fn defaults(now: DateTime<Utc>) -> Self {
        Self {
            base: "RUB".to_string(),
            pairs: DEFAULT_PAIRS
                .iter()
                .map(|(cur, rate)| (cur.to_string(), *rate))
                .collect(),
            updated_at: now,
        }
    }

    pub fn rate(&self, currency: &str) -> Result<f64> {
        let code = currency.trim().to_uppercase();
        self.pairs
            .get(&code)
            .copied()
            .ok_or(PennyError::UnknownCurrency(code))
    }

    /// Convert minor units from one currency to another through the base.
    pub fn convert(&self, from: &str, to: &str, amount: i64) -> Result<i64> {
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        if from.eq_ignore_ascii_case(to) {
            return Ok(amount);
        }
        Ok(convert_minor(amount, from_rate, to_rate))
    }

    pub fn set(&mut self, currency: &str, rate: f64, now: DateTime<Utc>) -> Result<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(PennyError::InvalidAmount(format!("rate {rate}")));
        }
        let code = currency.trim().to_uppercase();
        if code.is_empty() {
            return Err(PennyError::Invalid("currency code is empty".to_string()));
        }
        self.pairs.insert(code, rate);
        self.updated_at = now;
        Ok(())
    }
}

pub fn load_rates(path: &Path) -> Result<Rates> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_rates(path: &Path, rates: &Rates) -> Result<()> {
    let json = serde_json::to_string_pretty(rates)?;
    write_atomic(path, format!("{json}\n").as_bytes())
}

/// Write the default table if no file exists yet.
pub fn ensure_rates_file(path: &Path, now: DateTime<Utc>) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    save_rates(path, &Rates::defaults(now))
}
