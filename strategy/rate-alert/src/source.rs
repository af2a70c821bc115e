//! Ordered fallback over live rate providers.

use std::sync::Arc;

use clients_exchangerate::{LiveRateProvider, QuoteRates};
use tracing::{debug, warn};

use crate::types::RateSnapshot;

/// Live rate providers tried in order until one answers.
#[derive(Clone, Default)]
pub struct RateSource {
    providers: Vec<Arc<dyn LiveRateProvider>>,
}

impl RateSource {
    pub fn new(providers: Vec<Arc<dyn LiveRateProvider>>) -> Self {
        Self { providers }
    }

    /// Appends a provider at the lowest priority.
    pub fn push(&mut self, provider: Arc<dyn LiveRateProvider>) {
        self.providers.push(provider);
    }

    pub fn provider_ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    /// Rates for `base` from the first provider that succeeds, or `None`
    /// when all of them fail. Every failure is logged.
    pub async fn fetch_base(&self, base: &str) -> Option<QuoteRates> {
        for provider in &self.providers {
            match provider.latest(base).await {
                Ok(rates) => {
                    debug!(
                        provider = provider.id(),
                        base,
                        quotes = rates.len(),
                        "rates fetched"
                    );
                    return Some(rates);
                }
                Err(e) => {
                    warn!(
                        provider = provider.id(),
                        base,
                        status = ?e.status(),
                        error = %e,
                        "rate fetch failed"
                    );
                }
            }
        }
        warn!(base, "no provider returned rates");
        None
    }

    /// Fetches each base in turn. Bases that every provider failed on are
    /// absent from the snapshot.
    pub async fn snapshot(&self, bases: &[String]) -> RateSnapshot {
        let mut snapshot = RateSnapshot::default();
        for base in bases {
            if let Some(rates) = self.fetch_base(base).await {
                snapshot.insert(base.clone(), rates);
            }
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use clients_exchangerate::RateSourceError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        id: &'static str,
        rates: Option<QuoteRates>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn ok(id: &'static str, quote: &str, rate: f64) -> Arc<Self> {
            Arc::new(Self {
                id,
                rates: Some(QuoteRates::from([(quote.to_string(), rate)])),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(id: &'static str) -> Arc<Self> {
            Arc::new(Self {
                id,
                rates: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LiveRateProvider for Scripted {
        fn id(&self) -> &'static str {
            self.id
        }

        async fn latest(&self, _base: &str) -> Result<QuoteRates, RateSourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rates.clone().ok_or(RateSourceError::Timeout { provider: self.id })
        }
    }

    #[tokio::test]
    async fn primary_answer_skips_secondary() {
        let primary = Scripted::ok("primary", "CNY", 4.6);
        let secondary = Scripted::ok("secondary", "CNY", 9.9);
        let providers: Vec<Arc<dyn LiveRateProvider>> = vec![primary.clone(), secondary.clone()];
        let source = RateSource::new(providers);

        let rates = source.fetch_base("AUD").await.unwrap();
        assert_eq!(rates["CNY"], 4.6);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_back_to_secondary() {
        let primary = Scripted::failing("primary");
        let secondary = Scripted::ok("secondary", "CNY", 4.61);
        let providers: Vec<Arc<dyn LiveRateProvider>> = vec![primary.clone(), secondary];
        let source = RateSource::new(providers);

        let rates = source.fetch_base("AUD").await.unwrap();
        assert_eq!(rates["CNY"], 4.61);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_failing_leaves_base_out_of_snapshot() {
        let providers: Vec<Arc<dyn LiveRateProvider>> =
            vec![Scripted::failing("primary"), Scripted::failing("secondary")];
        let source = RateSource::new(providers);
        let snapshot = source.snapshot(&["AUD".to_string()]).await;
        assert!(snapshot.is_empty());
        assert!(!snapshot.contains_base("AUD"));
    }

    #[tokio::test]
    async fn empty_chain_yields_nothing() {
        let source = RateSource::default();
        assert!(source.provider_ids().is_empty());
        assert!(source.fetch_base("USD").await.is_none());
    }
}
