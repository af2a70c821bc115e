//! Notification sinks for rate alerts.
//!
//! Every sink implements [`Notifier`]. Callers treat delivery failures as
//! non-fatal: they are logged and the caller carries on.

mod desktop;
mod telegram;

use anyhow::Result;
use async_trait::async_trait;

pub use desktop::{DesktopBackend, DesktopNotifier};
pub use telegram::TelegramBot;

/// Something that can show the user a (title, message) pair.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, title: &str, message: &str) -> Result<()>;
}

/// Fans a notification out to several sinks.
///
/// A failing sink does not stop delivery to the others; the call only
/// fails when every sink failed.
pub struct MultiNotifier {
    sinks: Vec<Box<dyn Notifier>>,
}

impl MultiNotifier {
    pub fn new(sinks: Vec<Box<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl Notifier for MultiNotifier {
    fn name(&self) -> &'static str {
        "multi"
    }

    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        let mut delivered = self.sinks.is_empty();
        let mut last_err = None;
        for sink in &self.sinks {
            match sink.notify(title, message).await {
                Ok(()) => delivered = true,
                Err(e) => {
                    tracing::warn!(sink = sink.name(), error = %e, "notification failed");
                    last_err = Some(e);
                }
            }
        }
        match (delivered, last_err) {
            (false, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn notify(&self, _title: &str, _message: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("sink down");
            }
            Ok(())
        }
    }

    fn sink(calls: &Arc<AtomicUsize>, fail: bool) -> Box<dyn Notifier> {
        Box::new(Counting {
            calls: Arc::clone(calls),
            fail,
        })
    }

    #[tokio::test]
    async fn one_failing_sink_does_not_block_the_rest() {
        let calls = Arc::new(AtomicUsize::new(0));
        let multi = MultiNotifier::new(vec![sink(&calls, true), sink(&calls, false)]);
        multi.notify("t", "m").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn all_sinks_failing_is_an_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let multi = MultiNotifier::new(vec![sink(&calls, true), sink(&calls, true)]);
        assert!(multi.notify("t", "m").await.is_err());
    }
}
