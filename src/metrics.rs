//! Service metrics with Prometheus text export.

use crate::games::types::GameKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Prometheus-compatible metrics registry.
///
/// Counters are atomics; monetary sums are mutex-guarded floats since they
/// are only touched once per settlement.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    pub bets_dice_total: AtomicU64,
    pub bets_slots_total: AtomicU64,
    pub bets_crash_total: AtomicU64,

    pub settlements_total: AtomicU64,
    pub settlement_failures_total: AtomicU64,
    wagered_total: Mutex<f64>,
    payouts_total: Mutex<f64>,

    pub crash_rounds_active: AtomicU64,
    pub crash_cashouts_total: AtomicU64,
    pub crash_crashes_total: AtomicU64,

    pub websocket_connections_active: AtomicU64,
    pub http_requests_total: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_bet(&self, kind: GameKind, stake: f64) {
        let counter = match kind {
            GameKind::Dice => &self.bets_dice_total,
            GameKind::Slots => &self.bets_slots_total,
            GameKind::Crash => &self.bets_crash_total,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        *self.wagered_total.lock().unwrap() += stake;
    }

    pub fn record_settlement(&self, payout: f64) {
        self.settlements_total.fetch_add(1, Ordering::SeqCst);
        *self.payouts_total.lock().unwrap() += payout;
    }

    pub fn record_settlement_failure(&self) {
        self.settlement_failures_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_crash_end(&self, cashed_out: bool) {
        if cashed_out {
            self.crash_cashouts_total.fetch_add(1, Ordering::SeqCst);
        } else {
            self.crash_crashes_total.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn set_crash_rounds_active(&self, count: usize) {
        self.crash_rounds_active.store(count as u64, Ordering::SeqCst);
    }

    pub fn record_http_request(&self) {
        self.http_requests_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn websocket_opened(&self) {
        self.websocket_connections_active.fetch_add(1, Ordering::SeqCst);
    }

    pub fn websocket_closed(&self) {
        self.websocket_connections_active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn wagered_total(&self) -> f64 {
        *self.wagered_total.lock().unwrap()
    }

    pub fn payouts_total(&self) -> f64 {
        *self.payouts_total.lock().unwrap()
    }

    /// Generate Prometheus text exposition format.
    pub fn to_prometheus_format(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "# HELP stakehouse_bets_total Total bets accepted per game\n\
             # TYPE stakehouse_bets_total counter\n\
             stakehouse_bets_total{{game=\"dice\"}} {}\n\
             stakehouse_bets_total{{game=\"slots\"}} {}\n\
             stakehouse_bets_total{{game=\"crash\"}} {}\n\n",
            self.bets_dice_total.load(Ordering::SeqCst),
            self.bets_slots_total.load(Ordering::SeqCst),
            self.bets_crash_total.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP stakehouse_settlements_total Total settlements applied\n\
             # TYPE stakehouse_settlements_total counter\n\
             stakehouse_settlements_total {}\n\n",
            self.settlements_total.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP stakehouse_settlement_failures_total Settlements that failed to apply\n\
             # TYPE stakehouse_settlement_failures_total counter\n\
             stakehouse_settlement_failures_total {}\n\n",
            self.settlement_failures_total.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP stakehouse_wagered_total Sum of all stakes accepted\n\
             # TYPE stakehouse_wagered_total counter\n\
             stakehouse_wagered_total {}\n\n",
            self.wagered_total()
        ));

        output.push_str(&format!(
            "# HELP stakehouse_payouts_total Sum of all payouts credited\n\
             # TYPE stakehouse_payouts_total counter\n\
             stakehouse_payouts_total {}\n\n",
            self.payouts_total()
        ));

        output.push_str(&format!(
            "# HELP stakehouse_crash_rounds_active Live crash rounds\n\
             # TYPE stakehouse_crash_rounds_active gauge\n\
             stakehouse_crash_rounds_active {}\n\n",
            self.crash_rounds_active.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP stakehouse_crash_rounds_ended_total Crash rounds by exit path\n\
             # TYPE stakehouse_crash_rounds_ended_total counter\n\
             stakehouse_crash_rounds_ended_total{{path=\"cashout\"}} {}\n\
             stakehouse_crash_rounds_ended_total{{path=\"crash\"}} {}\n\n",
            self.crash_cashouts_total.load(Ordering::SeqCst),
            self.crash_crashes_total.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP stakehouse_http_requests_total Total HTTP requests\n\
             # TYPE stakehouse_http_requests_total counter\n\
             stakehouse_http_requests_total {}\n\n",
            self.http_requests_total.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP stakehouse_websocket_connections_active Active websocket connections\n\
             # TYPE stakehouse_websocket_connections_active gauge\n\
             stakehouse_websocket_connections_active {}\n",
            self.websocket_connections_active.load(Ordering::SeqCst)
        ));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bet_and_settlement_accounting() {
        let metrics = MetricsRegistry::new();
        metrics.record_bet(GameKind::Dice, 10.0);
        metrics.record_bet(GameKind::Crash, 5.0);
        metrics.record_settlement(19.8);

        assert_eq!(metrics.bets_dice_total.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.bets_crash_total.load(Ordering::SeqCst), 1);
        assert!((metrics.wagered_total() - 15.0).abs() < 1e-9);
        assert!((metrics.payouts_total() - 19.8).abs() < 1e-9);
    }

    #[test]
    fn test_prometheus_format_contains_metrics() {
        let metrics = MetricsRegistry::new();
        metrics.record_bet(GameKind::Slots, 2.0);
        let text = metrics.to_prometheus_format();

        assert!(text.contains("stakehouse_bets_total{game=\"slots\"} 1"));
        assert!(text.contains("# TYPE stakehouse_settlements_total counter"));
        assert!(text.contains("stakehouse_crash_rounds_active 0"));
    }
}
