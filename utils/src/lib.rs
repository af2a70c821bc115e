//! Shared utilities for the rate-alert workspace.

use tracing_subscriber::EnvFilter;

/// Rounds `value` to `decimals` decimal places (half away from zero).
pub fn round_dp(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_four_places() {
        assert_eq!(round_dp(4.631_249, 4), 4.6312);
        assert_eq!(round_dp(1.456_78, 4), 1.4568);
        assert_eq!(round_dp(-0.000_04, 4), -0.0);
        assert_eq!(round_dp(1.5, 0), 2.0);
    }
}
