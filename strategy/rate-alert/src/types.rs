//! Shared types for rate alerting.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use clients_exchangerate::QuoteRates;
use serde::{Deserialize, Serialize};

use crate::error::AlertError;

/// An ordered (base, quote) pair of currency codes, written `BASE/QUOTE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyPair {
    base: String,
    quote: String,
}

fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

impl CurrencyPair {
    pub fn new(base: &str, quote: &str) -> Result<Self, AlertError> {
        let base = base.trim().to_ascii_uppercase();
        let quote = quote.trim().to_ascii_uppercase();
        if !is_currency_code(&base) || !is_currency_code(&quote) {
            return Err(AlertError::InvalidPair(format!("{base}/{quote}")));
        }
        Ok(Self { base, quote })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }
}

impl FromStr for CurrencyPair {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| AlertError::InvalidPair(s.to_string()))?;
        Self::new(base, quote).map_err(|_| AlertError::InvalidPair(s.to_string()))
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = AlertError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyPair> for String {
    fn from(pair: CurrencyPair) -> Self {
        pair.to_string()
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Alert band derived from a historical series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Lower percentile of the series; alert at or below
    pub min: f64,
    /// Upper percentile of the series; alert at or above
    pub max: f64,
    pub mean: f64,
    pub historical_min: f64,
    pub historical_max: f64,
    /// Number of daily rates the band was computed from
    pub data_points: usize,
}

/// Metadata shared by every threshold written in one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMetadata {
    /// Local wall-clock time of the batch run
    pub last_updated: NaiveDateTime,
    pub percentile: u32,
    pub lookback_days: u32,
}

/// All thresholds produced by one batch run. Always replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BatchMetadata>,
    pub thresholds: BTreeMap<CurrencyPair, Threshold>,
}

impl ThresholdSet {
    pub fn new(metadata: BatchMetadata) -> Self {
        Self {
            metadata: Some(metadata),
            thresholds: BTreeMap::new(),
        }
    }

    pub fn get(&self, pair: &CurrencyPair) -> Option<&Threshold> {
        self.thresholds.get(pair)
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }
}

/// Inclusive alert bounds for one pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub min: f64,
    pub max: f64,
}

/// Pair -> alert bounds, as used by the monitor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: BTreeMap<CurrencyPair, Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules taken from a computed threshold set.
    pub fn from_thresholds(set: &ThresholdSet) -> Self {
        let rules = set
            .thresholds
            .iter()
            .map(|(pair, t)| {
                (
                    pair.clone(),
                    Rule {
                        min: t.min,
                        max: t.max,
                    },
                )
            })
            .collect();
        Self { rules }
    }

    /// Built-in bands used when no thresholds have been computed yet.
    pub fn default_static() -> Self {
        const DEFAULTS: &[(&str, &str, f64, f64)] = &[
            ("AUD", "CNY", 4.50, 4.90),
            ("CHF", "AUD", 1.50, 1.85),
            ("USD", "AUD", 1.40, 1.60),
            ("AUD", "HKD", 4.85, 5.25),
        ];
        let mut set = Self::new();
        for &(base, quote, min, max) in DEFAULTS {
            if let Ok(pair) = CurrencyPair::new(base, quote) {
                set.insert(pair, Rule { min, max });
            }
        }
        set
    }

    pub fn insert(&mut self, pair: CurrencyPair, rule: Rule) {
        self.rules.insert(pair, rule);
    }

    pub fn get(&self, pair: &CurrencyPair) -> Option<&Rule> {
        self.rules.get(pair)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CurrencyPair, &Rule)> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Distinct base currencies referenced by the rules, sorted.
    pub fn bases(&self) -> Vec<String> {
        let mut bases: Vec<String> = self.rules.keys().map(|p| p.base().to_string()).collect();
        bases.dedup();
        bases
    }
}

/// Latest rates per base currency for one poll cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateSnapshot {
    rates: BTreeMap<String, QuoteRates>,
}

impl RateSnapshot {
    pub fn insert(&mut self, base: String, rates: QuoteRates) {
        self.rates.insert(base, rates);
    }

    pub fn contains_base(&self, base: &str) -> bool {
        self.rates.contains_key(base)
    }

    pub fn rate(&self, pair: &CurrencyPair) -> Option<f64> {
        self.rates.get(pair.base())?.get(pair.quote()).copied()
    }

    pub fn bases(&self) -> impl Iterator<Item = &str> {
        self.rates.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Where a rate sits relative to its rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandState {
    /// rate <= min
    BelowMin,
    /// rate >= max
    AboveMax,
    WithinBand,
}

impl BandState {
    pub fn is_breach(self) -> bool {
        !matches!(self, Self::WithinBand)
    }
}

impl fmt::Display for BandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BelowMin => "BELOW_MIN",
            Self::AboveMax => "ABOVE_MAX",
            Self::WithinBand => "WITHIN_BAND",
        };
        f.write_str(s)
    }
}
