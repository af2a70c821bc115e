//! Exchange rate monitor.
//!
//! Polls live rates for every base currency the rules reference, compares
//! each pair against its band and notifies on a breach. One cycle runs to
//! completion before the monitor sleeps. Shutdown is only observed while
//! sleeping; an in-flight fetch is never cancelled.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{Datelike, Local, NaiveDateTime};
use clients_notifier::Notifier;
use tracing::{debug, info, warn};

use crate::source::RateSource;
use crate::store::ThresholdStore;
use crate::types::{BandState, BatchMetadata, CurrencyPair, RateSnapshot, Rule, RuleSet};

/// Monitor tuning knobs.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub update_day_of_month: u32,
    pub reminder_interval: chrono::Duration,
    pub reload_thresholds: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3600),
            update_day_of_month: 1,
            reminder_interval: chrono::Duration::days(7),
            reload_thresholds: false,
        }
    }
}

/// Where the active rules came from.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOrigin {
    /// Computed thresholds from the store.
    Dynamic(Option<BatchMetadata>),
    /// Built-in or configured static bands.
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorState {
    #[default]
    Idle,
    Fetching,
    Evaluating,
    Notifying,
    Sleeping,
    Stopped,
}

/// Per-run state threaded through the polling loop.
#[derive(Debug, Clone, Default)]
pub struct MonitorSession {
    pub state: MonitorState,
    pub cycles: u64,
    /// The outdated-thresholds check runs once per process.
    pub reminder_checked: bool,
    /// When the next follow-up reminder is due. Once set it keeps being
    /// rescheduled until the process exits, even if thresholds get
    /// refreshed in the meantime.
    pub next_reminder: Option<NaiveDateTime>,
}

/// Result of evaluating one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairEvaluation {
    pub pair: CurrencyPair,
    pub rate: f64,
    pub rule: Rule,
    pub state: BandState,
}

/// What one poll cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub evaluations: Vec<PairEvaluation>,
    /// Pairs with no rate this cycle (base fetch failed or quote missing)
    pub skipped: Vec<CurrencyPair>,
    pub notifications: usize,
}

/// Classifies `rate` against `rule`. Both bounds are inclusive breaches.
pub fn evaluate_pair(rate: f64, rule: &Rule) -> BandState {
    if rate <= rule.min {
        BandState::BelowMin
    } else if rate >= rule.max {
        BandState::AboveMax
    } else {
        BandState::WithinBand
    }
}

/// Notification (title, message) for a breach; `None` when within band.
pub fn alert_text(
    pair: &CurrencyPair,
    rate: f64,
    rule: &Rule,
    state: BandState,
) -> Option<(String, String)> {
    match state {
        BandState::BelowMin => Some((
            format!("Low Rate Alert: {pair} = {rate}"),
            format!(
                "{pair} has fallen below your minimum threshold ({})",
                rule.min
            ),
        )),
        BandState::AboveMax => Some((
            format!("High Rate Alert: {pair} = {rate}"),
            format!("{pair} has exceeded your maximum threshold ({})", rule.max),
        )),
        BandState::WithinBand => None,
    }
}

pub struct RateMonitor {
    source: RateSource,
    notifier: Arc<dyn Notifier>,
    store: ThresholdStore,
    fallback: RuleSet,
    rules: RuleSet,
    origin: RuleOrigin,
    loaded_modified: Option<SystemTime>,
    settings: MonitorSettings,
}

impl RateMonitor {
    /// Creates a monitor, loading rules from `store` or falling back to
    /// `fallback` when the store holds no thresholds.
    pub fn new(
        source: RateSource,
        notifier: Arc<dyn Notifier>,
        store: ThresholdStore,
        fallback: RuleSet,
        settings: MonitorSettings,
    ) -> Self {
        let loaded_modified = store.modified();
        let set = store.load();
        let (rules, origin) = if set.is_empty() {
            (fallback.clone(), RuleOrigin::Static)
        } else {
            (RuleSet::from_thresholds(&set), RuleOrigin::Dynamic(set.metadata))
        };
        Self {
            source,
            notifier,
            store,
            fallback,
            rules,
            origin,
            loaded_modified,
            settings,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn origin(&self) -> &RuleOrigin {
        &self.origin
    }

    async fn notify(&self, title: &str, message: &str) -> bool {
        match self.notifier.notify(title, message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    notifier = self.notifier.name(),
                    error = %e,
                    "failed to deliver notification"
                );
                false
            }
        }
    }

    /// Fetches a fresh snapshot and checks every rule against it.
    pub async fn poll_cycle(&self, session: &mut MonitorSession) -> CycleReport {
        session.cycles += 1;
        session.state = MonitorState::Fetching;
        let snapshot = self.source.snapshot(&self.rules.bases()).await;

        let mut report = CycleReport::default();
        if snapshot.is_empty() {
            warn!(cycle = session.cycles, "no rates fetched this cycle");
            report.skipped = self.rules.iter().map(|(pair, _)| pair.clone()).collect();
            return report;
        }

        session.state = MonitorState::Evaluating;
        self.evaluate_snapshot(&snapshot, session, &mut report).await;
        report
    }

    async fn evaluate_snapshot(
        &self,
        snapshot: &RateSnapshot,
        session: &mut MonitorSession,
        report: &mut CycleReport,
    ) {
        for (pair, rule) in self.rules.iter() {
            let Some(rate) = snapshot.rate(pair) else {
                if snapshot.contains_base(pair.base()) {
                    warn!(%pair, "quote currency missing from rates");
                } else {
                    warn!(
                        %pair,
                        base = pair.base(),
                        "skipping pair, base currency unavailable"
                    );
                }
                report.skipped.push(pair.clone());
                continue;
            };

            let state = evaluate_pair(rate, rule);
            if let Some((title, message)) = alert_text(pair, rate, rule, state) {
                session.state = MonitorState::Notifying;
                if self.notify(&title, &message).await {
                    report.notifications += 1;
                }
                session.state = MonitorState::Evaluating;
            }
            info!(
                %state,
                "{pair}: {rate} (Alert range: {} - {})",
                rule.min,
                rule.max
            );
            report.evaluations.push(PairEvaluation {
                pair: pair.clone(),
                rate,
                rule: *rule,
                state,
            });
        }
    }

    /// Outdated-thresholds reminder.
    ///
    /// The first call of a run checks whether `now` is the update day and
    /// the stored thresholds predate this month; if so it notifies once and
    /// schedules follow-ups every `reminder_interval`. Later calls only fire
    /// those follow-ups, each one rescheduled from the time it fired, so a
    /// long gap between calls yields a single late reminder. A run started
    /// after the update day never reminds for that month.
    pub async fn check_reminder(&self, session: &mut MonitorSession, now: NaiveDateTime) {
        if !session.reminder_checked {
            session.reminder_checked = true;
            let update_day = self.settings.update_day_of_month;
            if now.day() == update_day && self.store.is_stale(update_day, now.date()) {
                self.send_reminder().await;
                session.next_reminder = Some(now + self.settings.reminder_interval);
            }
            return;
        }

        if let Some(due) = session.next_reminder {
            if now >= due {
                self.send_reminder().await;
                session.next_reminder = Some(now + self.settings.reminder_interval);
            }
        }
    }

    async fn send_reminder(&self) {
        let last = match self.store.status().last_updated {
            Some(t) => t.format("%Y-%m-%d").to_string(),
            None => "never".to_string(),
        };
        info!(last_updated = %last, "thresholds are outdated");
        self.notify(
            "Exchange rate thresholds outdated",
            &format!(
                "Thresholds were last updated: {last}. Run update-thresholds to refresh them."
            ),
        )
        .await;
    }

    /// Reloads rules when the store file changed since the last load.
    ///
    /// An unreadable or empty store keeps the current rules. Returns true
    /// when the rules were replaced.
    pub fn reload_if_changed(&mut self) -> bool {
        let modified = self.store.modified();
        if modified.is_none() || modified == self.loaded_modified {
            return false;
        }
        self.loaded_modified = modified;

        match self.store.try_load() {
            Ok(set) if !set.is_empty() => {
                self.rules = RuleSet::from_thresholds(&set);
                self.origin = RuleOrigin::Dynamic(set.metadata);
                info!(pairs = self.rules.len(), "reloaded thresholds");
                true
            }
            Ok(_) => {
                warn!("threshold store is empty, keeping current rules");
                false
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "failed to reload thresholds, keeping current rules"
                );
                false
            }
        }
    }

    fn log_startup(&self) {
        match &self.origin {
            RuleOrigin::Dynamic(Some(meta)) => info!(
                pairs = self.rules.len(),
                last_updated = %meta.last_updated,
                percentile = meta.percentile,
                lookback_days = meta.lookback_days,
                "exchange rate monitor started with dynamic thresholds"
            ),
            RuleOrigin::Dynamic(None) => info!(
                pairs = self.rules.len(),
                "exchange rate monitor started with dynamic thresholds"
            ),
            RuleOrigin::Static => info!(
                pairs = self.rules.len(),
                static_pairs = self.fallback.len(),
                "exchange rate monitor started with static thresholds"
            ),
        }
        debug!(
            providers = ?self.source.provider_ids(),
            "live rate providers"
        );
    }

    /// Runs until `shutdown` resolves, returning the final session.
    pub async fn run<F>(mut self, shutdown: F) -> MonitorSession
    where
        F: Future<Output = ()>,
    {
        self.log_startup();
        let mut session = MonitorSession::default();
        tokio::pin!(shutdown);

        loop {
            if self.settings.reload_thresholds {
                self.reload_if_changed();
            }
            self.check_reminder(&mut session, Local::now().naive_local())
                .await;
            self.poll_cycle(&mut session).await;

            session.state = MonitorState::Sleeping;
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        session.state = MonitorState::Stopped;
        info!(cycles = session.cycles, "exchange rate monitor stopped");
        session
    }
}
