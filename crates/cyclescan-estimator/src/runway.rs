//! Runway projection: how long the current balance lasts at the
//! estimated burn rate.

use serde::{Deserialize, Serialize};

use cyclescan_core::config::RunwayConfig;

use crate::rate::{RateEstimate, RateOutcome};

/// Largest integer an `f64` represents exactly (2^53 - 1).
const MAX_SAFE_INTEGER: u128 = (1 << 53) - 1;

/// Urgency bucket for a runway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Ok,
    Good,
    /// No measurable burn.
    Infinite,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Ok => "ok",
            Severity::Good => "good",
            Severity::Infinite => "infinite",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunwayEstimate {
    /// Days until the balance reaches zero; `None` when nothing burns.
    pub days: Option<f64>,
    pub severity: Severity,
    /// Window whose rate drove the projection.
    pub window: Option<String>,
    /// The per-hour rate used.
    pub rate: Option<u128>,
}

impl RunwayEstimate {
    pub fn infinite() -> Self {
        Self {
            days: None,
            severity: Severity::Infinite,
            window: None,
            rate: None,
        }
    }

    fn for_window(mut self, window: &str) -> Self {
        if self.days.is_some() {
            self.window = Some(window.to_string());
        }
        self
    }
}

/// Severity thresholds, in days.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunwayPolicy {
    pub critical_days: f64,
    pub warning_days: f64,
    pub ok_days: f64,
}

impl Default for RunwayPolicy {
    fn default() -> Self {
        RunwayConfig::default().into()
    }
}

impl From<RunwayConfig> for RunwayPolicy {
    fn from(config: RunwayConfig) -> Self {
        Self {
            critical_days: config.critical_days,
            warning_days: config.warning_days,
            ok_days: config.ok_days,
        }
    }
}

impl RunwayPolicy {
    pub fn severity(&self, days: f64) -> Severity {
        if days < self.critical_days {
            Severity::Critical
        } else if days < self.warning_days {
            Severity::Warning
        } else if days < self.ok_days {
            Severity::Ok
        } else {
            Severity::Good
        }
    }

    /// Project `balance` against a per-hour rate.
    pub fn project(&self, balance: u128, rate_per_hour: u128) -> RunwayEstimate {
        match days_until_empty(balance, rate_per_hour) {
            Some(days) => RunwayEstimate {
                days: Some(days),
                severity: self.severity(days),
                window: None,
                rate: Some(rate_per_hour),
            },
            None => RunwayEstimate::infinite(),
        }
    }

    /// Project using the longest window with a positive rate, falling back
    /// to shorter windows when the long ones hold no data.
    pub fn project_outcomes(&self, balance: u128, outcomes: &[RateOutcome]) -> RunwayEstimate {
        match choose_estimate(outcomes) {
            Some(estimate) => self
                .project(balance, estimate.rate)
                .for_window(&estimate.window.name),
            None => RunwayEstimate::infinite(),
        }
    }

    /// Same policy over `(window name, span, rate)` triples, for callers
    /// that already summed rates across entities.
    pub fn project_rates<'a>(
        &self,
        balance: u128,
        rates: impl IntoIterator<Item = (&'a str, u64, u128)>,
    ) -> RunwayEstimate {
        let chosen = rates
            .into_iter()
            .filter(|&(_, _, rate)| rate > 0)
            .max_by_key(|&(_, span, _)| span);
        match chosen {
            Some((name, _, rate)) => self.project(balance, rate).for_window(name),
            None => RunwayEstimate::infinite(),
        }
    }
}

/// The estimate from the longest window whose rate is positive.
pub fn choose_estimate(outcomes: &[RateOutcome]) -> Option<&RateEstimate> {
    outcomes
        .iter()
        .filter_map(RateOutcome::estimate)
        .filter(|e| e.rate > 0)
        .max_by_key(|e| e.window.span_ms)
}

/// `balance / (rate * 24)` in days.
///
/// The whole-day quotient and remainder are computed in `u128`. Only the
/// fractional day goes through `f64`, with both operands shifted down
/// until they fit the 53-bit exact range.
pub fn days_until_empty(balance: u128, rate_per_hour: u128) -> Option<f64> {
    if rate_per_hour == 0 {
        return None;
    }
    let per_day = rate_per_hour.saturating_mul(24);
    let whole = balance / per_day;
    let mut rem = balance % per_day;
    let mut divisor = per_day;
    while divisor > MAX_SAFE_INTEGER {
        rem >>= 1;
        divisor >>= 1;
    }
    Some(whole as f64 + rem as f64 / divisor as f64)
}
