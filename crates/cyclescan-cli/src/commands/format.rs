//! Text rendering helpers shared by the commands.

use cyclescan_core::MS_PER_HOUR;
use cyclescan_estimator::{RunwayEstimate, Severity};

/// Shown wherever a figure could not be estimated.
pub const PLACEHOLDER: &str = "—";

/// Cycle amounts with T/B/M suffixes.
pub fn cycles(amount: u128) -> String {
    const UNITS: [(u128, &str); 3] = [
        (1_000_000_000_000, "T"),
        (1_000_000_000, "B"),
        (1_000_000, "M"),
    ];
    for (scale, suffix) in UNITS {
        if amount >= scale {
            return format!("{:.2}{suffix}", amount as f64 / scale as f64);
        }
    }
    amount.to_string()
}

pub fn rate(rate_per_hour: Option<u128>) -> String {
    match rate_per_hour {
        Some(rate) => format!("{}/h", cycles(rate)),
        None => PLACEHOLDER.to_string(),
    }
}

pub fn balance(balance: Option<u128>) -> String {
    balance.map_or_else(|| PLACEHOLDER.to_string(), cycles)
}

pub fn runway(runway: &RunwayEstimate) -> String {
    match runway.days {
        Some(days) => format!("{days:.1}d"),
        None => "∞".to_string(),
    }
}

pub fn severity(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "🔴 critical",
        Severity::Warning => "🟠 warning",
        Severity::Ok => "🟡 ok",
        Severity::Good => "🟢 good",
        Severity::Infinite => "⚪ no burn",
    }
}

/// How long before `now_ms` the instant `at_ms` was, coarsely.
pub fn age(now_ms: u64, at_ms: Option<u64>) -> String {
    let Some(at) = at_ms else {
        return PLACEHOLDER.to_string();
    };
    let elapsed = now_ms.saturating_sub(at);
    if elapsed < MS_PER_HOUR {
        format!("{}m ago", elapsed / 60_000)
    } else if elapsed < 48 * MS_PER_HOUR {
        format!("{}h ago", elapsed / MS_PER_HOUR)
    } else {
        format!("{}d ago", elapsed / (24 * MS_PER_HOUR))
    }
}

/// Cut a label to `width` characters for table columns.
pub fn clip(label: &str, width: usize) -> String {
    if label.chars().count() <= width {
        label.to_string()
    } else {
        let mut out: String = label.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_suffixes() {
        assert_eq!(cycles(999), "999");
        assert_eq!(cycles(2_500_000), "2.50M");
        assert_eq!(cycles(1_000_000_000), "1.00B");
        assert_eq!(cycles(3_210_000_000_000), "3.21T");
    }

    #[test]
    fn missing_figures_use_placeholder() {
        assert_eq!(rate(None), PLACEHOLDER);
        assert_eq!(balance(None), PLACEHOLDER);
        assert_eq!(age(10, None), PLACEHOLDER);
        assert_eq!(runway(&RunwayEstimate::infinite()), "∞");
    }

    #[test]
    fn ages() {
        let now = 100 * MS_PER_HOUR;
        assert_eq!(age(now, Some(now - 5 * 60_000)), "5m ago");
        assert_eq!(age(now, Some(now - 3 * MS_PER_HOUR)), "3h ago");
        assert_eq!(age(now, Some(0)), "4d ago");
    }

    #[test]
    fn clip_long_labels() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("abcdefghijkl", 5), "abcd…");
    }
}
