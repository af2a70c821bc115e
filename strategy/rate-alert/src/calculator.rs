//! Percentile-based threshold derivation.
//!
//! A pair's alert band is `[P(p), P(100 - p)]` over its daily rates for the
//! lookback window, where `P` is the nearest-rank percentile below. With the
//! default p = 10 roughly one day in ten sits at or beyond each edge.

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use clients_exchangerate::{HistoricalRateProvider, RateSourceError};
use tracing::{error, info, warn};
use utils::round_dp;

use crate::error::AlertError;
use crate::store::ThresholdStore;
use crate::types::{BatchMetadata, CurrencyPair, Threshold, ThresholdSet};

/// Decimal places kept for every stored rate statistic.
const STORED_DECIMALS: u32 = 4;

/// Nearest-rank percentile of `series`.
///
/// Sorts ascending and returns the element at `floor(n * p / 100)`, clamped
/// to `[0, n - 1]`. No interpolation between neighbours takes place, so for
/// short series the result differs from interpolating methods (numpy's
/// default, for instance). Returns `None` for an empty series.
pub fn percentile_value(series: &[f64], percentile: u32) -> Option<f64> {
    if series.is_empty() {
        return None;
    }
    let mut sorted = series.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let index = (n * percentile as usize / 100).min(n - 1);
    Some(sorted[index])
}

/// Rejects percentiles outside (0, 50]. At exactly 50 the band has zero
/// width, which is allowed but logged.
pub fn validate_percentile(percentile: u32) -> Result<(), AlertError> {
    if percentile == 0 || percentile > 50 {
        return Err(AlertError::InvalidPercentile(percentile));
    }
    if percentile == 50 {
        warn!(
            percentile,
            "percentile 50 yields a zero-width band (min == max)"
        );
    }
    Ok(())
}

/// Computes thresholds from historical data and persists them.
pub struct ThresholdCalculator<H> {
    provider: H,
    store: ThresholdStore,
}

impl<H: HistoricalRateProvider> ThresholdCalculator<H> {
    pub fn new(provider: H, store: ThresholdStore) -> Self {
        Self { provider, store }
    }

    pub fn store(&self) -> &ThresholdStore {
        &self.store
    }

    /// Daily rates for `[today - lookback_days, today]`, oldest first.
    pub async fn fetch_historical_series(
        &self,
        pair: &CurrencyPair,
        lookback_days: u32,
    ) -> Result<Vec<f64>, AlertError> {
        self.fetch_series_until(pair, lookback_days, Local::now().date_naive())
            .await
    }

    async fn fetch_series_until(
        &self,
        pair: &CurrencyPair,
        lookback_days: u32,
        end: NaiveDate,
    ) -> Result<Vec<f64>, AlertError> {
        let start = end - Duration::days(i64::from(lookback_days));
        info!(
            provider = self.provider.id(),
            %pair,
            lookback_days,
            "fetching historical data"
        );
        let series = self
            .provider
            .daily_series(pair.base(), pair.quote(), start, end)
            .await?;
        if series.is_empty() {
            return Err(RateSourceError::DataUnavailable {
                provider: self.provider.id(),
                base: pair.base().to_string(),
                quote: pair.quote().to_string(),
            }
            .into());
        }
        Ok(series.into_iter().map(|d| d.rate).collect())
    }

    /// Alert band for one pair.
    pub async fn compute_threshold(
        &self,
        pair: &CurrencyPair,
        percentile: u32,
        lookback_days: u32,
    ) -> Result<Threshold, AlertError> {
        validate_percentile(percentile)?;
        let series = match self.fetch_historical_series(pair, lookback_days).await {
            Ok(series) => series,
            Err(AlertError::Source(RateSourceError::DataUnavailable { .. })) => {
                return Err(AlertError::NoHistoricalData { pair: pair.clone() })
            }
            Err(e) => return Err(e),
        };
        threshold_from_series(pair, &series, percentile)
    }

    /// Recomputes every pair and replaces the store with the result.
    ///
    /// A pair that fails is logged and left out; the rest of the batch goes
    /// on. Only an invalid percentile or a failed write aborts.
    pub async fn update_all(
        &self,
        pairs: &[CurrencyPair],
        percentile: u32,
        lookback_days: u32,
    ) -> Result<ThresholdSet, AlertError> {
        self.update_all_at(pairs, percentile, lookback_days, Local::now().naive_local())
            .await
    }

    async fn update_all_at(
        &self,
        pairs: &[CurrencyPair],
        percentile: u32,
        lookback_days: u32,
        now: NaiveDateTime,
    ) -> Result<ThresholdSet, AlertError> {
        validate_percentile(percentile)?;
        info!(
            percentile,
            lookback_days,
            pairs = pairs.len(),
            "updating dynamic thresholds"
        );

        let mut set = ThresholdSet::new(BatchMetadata {
            last_updated: now,
            percentile,
            lookback_days,
        });
        for pair in pairs {
            match self.compute_threshold(pair, percentile, lookback_days).await {
                Ok(threshold) => {
                    info!(
                        %pair,
                        min = threshold.min,
                        max = threshold.max,
                        data_points = threshold.data_points,
                        historical_min = threshold.historical_min,
                        historical_max = threshold.historical_max,
                        "threshold computed"
                    );
                    set.thresholds.insert(pair.clone(), threshold);
                }
                Err(e) => {
                    error!(%pair, error = %e, "skipping pair");
                }
            }
        }

        self.store.save(&set)?;
        info!(
            path = %self.store.path().display(),
            count = set.len(),
            "thresholds saved"
        );
        Ok(set)
    }
}

/// Builds a [`Threshold`] from an already-fetched series.
pub fn threshold_from_series(
    pair: &CurrencyPair,
    series: &[f64],
    percentile: u32,
) -> Result<Threshold, AlertError> {
    let no_data = || AlertError::NoHistoricalData { pair: pair.clone() };
    let min = percentile_value(series, percentile).ok_or_else(no_data)?;
    let max = percentile_value(series, 100u32.saturating_sub(percentile))
        .ok_or_else(no_data)?;

    let n = series.len();
    let mean = series.iter().sum::<f64>() / n as f64;
    let historical_min = series.iter().copied().fold(f64::INFINITY, f64::min);
    let historical_max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if mean < min || mean > max {
        warn!(
            %pair,
            mean,
            min,
            max,
            "series mean falls outside the percentile band"
        );
    }

    Ok(Threshold {
        min: round_dp(min, STORED_DECIMALS),
        max: round_dp(max, STORED_DECIMALS),
        mean: round_dp(mean, STORED_DECIMALS),
        historical_min: round_dp(historical_min, STORED_DECIMALS),
        historical_max: round_dp(historical_max, STORED_DECIMALS),
        data_points: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use clients_exchangerate::DailyRate;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const SCENARIO: [f64; 10] = [1.40, 1.45, 1.50, 1.55, 1.60, 1.65, 1.70, 1.75, 1.80, 1.85];

    #[test]
    fn nearest_rank_scenario() {
        assert_eq!(percentile_value(&SCENARIO, 10), Some(1.45));
        assert_eq!(percentile_value(&SCENARIO, 90), Some(1.85));
    }

    #[test]
    fn index_is_clamped() {
        assert_eq!(percentile_value(&SCENARIO, 100), Some(1.85));
        assert_eq!(percentile_value(&SCENARIO, 0), Some(1.40));
    }

    #[test]
    fn single_element_series_always_returns_it() {
        for p in 1..=50 {
            assert_eq!(percentile_value(&[4.62], p), Some(4.62));
            assert_eq!(percentile_value(&[4.62], 100 - p), Some(4.62));
        }
    }

    #[test]
    fn empty_series_has_no_percentile() {
        assert_eq!(percentile_value(&[], 10), None);
    }

    #[test]
    fn permutation_does_not_change_result() {
        let mut shuffled = SCENARIO;
        shuffled.reverse();
        shuffled.swap(0, 7);
        shuffled.swap(3, 9);
        for p in [1, 5, 10, 25, 33, 50, 75, 90] {
            assert_eq!(
                percentile_value(&shuffled, p),
                percentile_value(&SCENARIO, p)
            );
        }
    }

    #[test]
    fn lower_bound_never_exceeds_upper_bound() {
        let series = [4.71, 4.52, 4.66, 4.49, 4.80, 4.58, 4.63, 4.91, 4.55];
        for p in 1..=50 {
            let lo = percentile_value(&series, p).unwrap();
            let hi = percentile_value(&series, 100 - p).unwrap();
            assert!(lo <= hi, "p={p}: {lo} > {hi}");
        }
        let flat = [1.5; 6];
        for p in 1..=50 {
            assert_eq!(percentile_value(&flat, p), percentile_value(&flat, 100 - p));
        }
    }

    #[test]
    fn percentile_validation() {
        assert!(validate_percentile(10).is_ok());
        assert!(validate_percentile(50).is_ok());
        assert!(matches!(
            validate_percentile(0),
            Err(AlertError::InvalidPercentile(0))
        ));
        assert!(matches!(
            validate_percentile(51),
            Err(AlertError::InvalidPercentile(51))
        ));
    }

    #[test]
    fn threshold_statistics() {
        let pair: CurrencyPair = "USD/AUD".parse().unwrap();
        let threshold = threshold_from_series(&pair, &SCENARIO, 10).unwrap();
        assert_eq!(
            threshold,
            Threshold {
                min: 1.45,
                max: 1.85,
                mean: 1.625,
                historical_min: 1.40,
                historical_max: 1.85,
                data_points: 10,
            }
        );
    }

    /// Serves canned series keyed by "BASE/QUOTE"; unknown pairs are
    /// unavailable.
    struct FakeHistory {
        series: HashMap<String, Vec<f64>>,
        requests: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
    }

    impl FakeHistory {
        fn new(entries: &[(&str, &[f64])]) -> Self {
            Self {
                series: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_vec()))
                    .collect(),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HistoricalRateProvider for FakeHistory {
        fn id(&self) -> &'static str {
            "fake-history"
        }

        async fn daily_series(
            &self,
            base: &str,
            quote: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<DailyRate>, RateSourceError> {
            let key = format!("{base}/{quote}");
            self.requests.lock().unwrap().push((key.clone(), start, end));
            match self.series.get(&key) {
                Some(rates) => Ok(rates
                    .iter()
                    .enumerate()
                    .map(|(i, &rate)| DailyRate {
                        date: start + Duration::days(i as i64),
                        rate,
                    })
                    .collect()),
                None if key == "HKD/JPY" => Err(RateSourceError::Timeout {
                    provider: "fake-history",
                }),
                None => Ok(Vec::new()),
            }
        }
    }

    fn calculator(dir: &TempDir, history: FakeHistory) -> ThresholdCalculator<FakeHistory> {
        let store = ThresholdStore::new(dir.path().join("thresholds.json"));
        ThresholdCalculator::new(history, store)
    }

    #[tokio::test]
    async fn fetch_requests_the_lookback_window() {
        let dir = TempDir::new().unwrap();
        let calc = calculator(&dir, FakeHistory::new(&[("AUD/CNY", &[4.6, 4.7])]));
        let end = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let pair: CurrencyPair = "AUD/CNY".parse().unwrap();

        let series = calc.fetch_series_until(&pair, 365, end).await.unwrap();
        assert_eq!(series, vec![4.6, 4.7]);

        let requests = calc.provider.requests.lock().unwrap();
        assert_eq!(
            requests[0],
            (
                "AUD/CNY".to_string(),
                NaiveDate::from_ymd_opt(2025, 10, 18).unwrap(),
                end
            )
        );
    }

    #[tokio::test]
    async fn empty_history_is_no_historical_data() {
        let dir = TempDir::new().unwrap();
        let calc = calculator(&dir, FakeHistory::new(&[]));
        let pair: CurrencyPair = "CHF/AUD".parse().unwrap();
        let err = calc.compute_threshold(&pair, 10, 365).await.unwrap_err();
        assert!(matches!(
            err,
            AlertError::NoHistoricalData { pair: p } if p == pair
        ));
    }

    #[tokio::test]
    async fn update_all_skips_failures_and_persists_the_rest() {
        let dir = TempDir::new().unwrap();
        let calc = calculator(
            &dir,
            FakeHistory::new(&[("USD/AUD", &SCENARIO), ("AUD/CNY", &[4.62])]),
        );
        let pairs: Vec<CurrencyPair> = ["USD/AUD", "CHF/AUD", "AUD/CNY", "HKD/JPY"]
            .iter()
            .map(|p| p.parse().unwrap())
            .collect();
        let now = NaiveDate::from_ymd_opt(2026, 10, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();

        let set = calc.update_all_at(&pairs, 10, 365, now).await.unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(&pairs[0]).unwrap().min, 1.45);
        assert_eq!(set.get(&pairs[2]).unwrap().max, 4.62);
        assert!(set.get(&pairs[1]).is_none());
        assert!(set.get(&pairs[3]).is_none());
        assert_eq!(
            set.metadata,
            Some(BatchMetadata {
                last_updated: now,
                percentile: 10,
                lookback_days: 365,
            })
        );
        assert_eq!(calc.store().load(), set);
    }

    #[tokio::test]
    async fn update_all_rejects_bad_percentile_before_fetching() {
        let dir = TempDir::new().unwrap();
        let calc = calculator(&dir, FakeHistory::new(&[("USD/AUD", &SCENARIO)]));
        let pairs: Vec<CurrencyPair> = vec!["USD/AUD".parse().unwrap()];
        let err = calc.update_all(&pairs, 60, 365).await.unwrap_err();
        assert!(matches!(err, AlertError::InvalidPercentile(60)));
        assert!(calc.provider.requests.lock().unwrap().is_empty());
        assert!(calc.store().modified().is_none());
    }

    #[tokio::test]
    async fn unwritable_store_fails_the_batch() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();
        let calc = ThresholdCalculator::new(
            FakeHistory::new(&[("USD/AUD", &SCENARIO)]),
            ThresholdStore::new(blocker.join("thresholds.json")),
        );
        let pairs: Vec<CurrencyPair> = vec!["USD/AUD".parse().unwrap()];
        let err = calc.update_all(&pairs, 10, 365).await.unwrap_err();
        assert!(matches!(err, AlertError::Persistence { .. }));
    }
}
