use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::U256;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{ProbeError, Result};

/// Klaytn denominations. Balances travel as peb; thresholds and alert text use
/// the configured unit.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BalanceUnit {
    Peb,
    Ston,
    Klay,
}

impl BalanceUnit {
    pub fn decimals(self) -> u8 {
        match self {
            BalanceUnit::Peb => 0,
            BalanceUnit::Ston => 9,
            BalanceUnit::Klay => 18,
        }
    }
}

impl fmt::Display for BalanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceUnit::Peb => write!(f, "peb"),
            BalanceUnit::Ston => write!(f, "ston"),
            BalanceUnit::Klay => write!(f, "KLAY"),
        }
    }
}

impl FromStr for BalanceUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "peb" => Ok(BalanceUnit::Peb),
            "ston" | "gpeb" => Ok(BalanceUnit::Ston),
            "klay" | "kaia" => Ok(BalanceUnit::Klay),
            _ => Err(format!("Invalid balance unit: {}", s)),
        }
    }
}

/// Parses a decimal amount expressed in `unit` into peb.
pub fn parse_amount(amount: &str, unit: BalanceUnit) -> Result<U256> {
    let parsed = parse_units(amount.trim(), unit.decimals()).map_err(|e| {
        ProbeError::ConfigError(format!("Invalid amount '{}' {}: {}", amount, unit, e))
    })?;
    if parsed.is_negative() {
        return Err(ProbeError::ConfigError(format!("Negative amount '{}'", amount)));
    }
    Ok(parsed.get_absolute())
}

/// Renders a peb amount in `unit` without trailing zeros ("4", "0.5").
pub fn format_amount(peb: U256, unit: BalanceUnit) -> String {
    let rendered = match format_units(peb, unit.decimals()) {
        Ok(s) => s,
        Err(_) => return peb.to_string(),
    };
    if rendered.contains('.') {
        rendered.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        rendered
    }
}
