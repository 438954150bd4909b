//! Group aggregation — per-project totals over member entities.
//!
//! Balances and per-window rates are summed over members. Members flagged
//! invalid are left out of every sum under [`AggregateView::ValidOnly`]
//! but are still counted, so switching to [`AggregateView::IncludeAll`]
//! re-runs the same sums over the full member set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cyclescan_core::{EntityId, GroupId, Window};

use crate::rate::{RateEstimate, RateOutcome};
use crate::runway::{RunwayEstimate, RunwayPolicy};

/// Which members contribute to the sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateView {
    #[default]
    ValidOnly,
    IncludeAll,
}

impl AggregateView {
    fn includes(&self, member: &MemberEstimate) -> bool {
        match self {
            AggregateView::ValidOnly => member.valid,
            AggregateView::IncludeAll => true,
        }
    }
}

/// One entity's contribution to a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberEstimate {
    pub entity_id: EntityId,
    pub balance: u128,
    pub outcomes: Vec<RateOutcome>,
    pub valid: bool,
    pub website: Option<String>,
}

impl MemberEstimate {
    /// The estimate from the longest window that produced one.
    fn widest_estimate(&self) -> Option<&RateEstimate> {
        self.outcomes
            .iter()
            .filter_map(RateOutcome::estimate)
            .max_by_key(|e| e.window.span_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAggregate {
    pub group_id: GroupId,
    /// Members that contributed to the sums.
    pub member_count: usize,
    /// Members left out by the view.
    pub excluded_count: usize,
    pub total_balance: u128,
    /// Summed per-hour rate per window. A window is present only when at
    /// least one contributing member has an estimate for it.
    pub total_rate_per_window: BTreeMap<String, u128>,
    pub aggregated_replenishment_count: usize,
    /// Summed, not averaged: many sparse members stay distinguishable from
    /// one well-sampled member.
    pub sample_count: usize,
    pub website: Option<String>,
    pub runway: RunwayEstimate,
}

impl GroupAggregate {
    pub fn total_rate(&self, window: &str) -> Option<u128> {
        self.total_rate_per_window.get(window).copied()
    }
}

/// Sum `members` into a group aggregate.
///
/// `windows` supplies the spans used to pick the group runway's window.
pub fn aggregate(
    group_id: &str,
    members: &[MemberEstimate],
    windows: &[Window],
    policy: &RunwayPolicy,
    view: AggregateView,
) -> GroupAggregate {
    let mut total_balance: u128 = 0;
    let mut totals: BTreeMap<String, u128> = BTreeMap::new();
    let mut replenishments = 0usize;
    let mut samples = 0usize;
    let mut member_count = 0usize;
    let mut website: Option<String> = None;

    for member in members.iter().filter(|m| view.includes(m)) {
        member_count += 1;
        total_balance = total_balance.saturating_add(member.balance);

        for estimate in member.outcomes.iter().filter_map(RateOutcome::estimate) {
            let total = totals.entry(estimate.window.name.clone()).or_insert(0);
            *total = total.saturating_add(estimate.rate);
        }

        if let Some(widest) = member.widest_estimate() {
            replenishments += widest.replenishment_count;
            samples += widest.sample_count;
        }

        if website.is_none() {
            website = member.website.clone().filter(|w| !w.is_empty());
        }
    }

    let runway = policy.project_rates(
        total_balance,
        windows.iter().filter_map(|w| {
            totals
                .get(&w.name)
                .map(|&rate| (w.name.as_str(), w.span_ms, rate))
        }),
    );

    GroupAggregate {
        group_id: group_id.to_string(),
        member_count,
        excluded_count: members.len() - member_count,
        total_balance,
        total_rate_per_window: totals,
        aggregated_replenishment_count: replenishments,
        sample_count: samples,
        website,
        runway,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runway::Severity;
    use cyclescan_core::MS_PER_HOUR;

    fn estimate(window: &Window, rate: u128, samples: usize, replenishments: usize) -> RateOutcome {
        RateOutcome::Estimated(RateEstimate {
            window: window.clone(),
            rate,
            net_rate: Some(rate),
            sample_count: samples,
            snapshot_count: samples + 1,
            actual_duration: MS_PER_HOUR,
            replenishment_count: replenishments,
            total_replenished: 0,
            consumed: rate,
            inferred: 0,
            net_change: -(rate as i128),
            first_timestamp: 0,
            last_timestamp: MS_PER_HOUR,
        })
    }

    fn member(id: &str, balance: u128, rate: u128, valid: bool) -> MemberEstimate {
        MemberEstimate {
            entity_id: id.to_string(),
            balance,
            outcomes: vec![
                estimate(&Window::recent(), rate * 2, 1, 0),
                estimate(&Window::short_term(), rate, 4, 1),
            ],
            valid,
            website: None,
        }
    }

    fn agg(members: &[MemberEstimate], view: AggregateView) -> GroupAggregate {
        aggregate("proj", members, &Window::defaults(), &RunwayPolicy::default(), view)
    }

    #[test]
    fn sums_balances_and_rates() {
        let members = vec![
            member("a", 1000, 10, true),
            member("b", 2000, 20, true),
            member("c", 3000, 30, true),
        ];
        let g = agg(&members, AggregateView::ValidOnly);
        assert_eq!(g.member_count, 3);
        assert_eq!(g.total_balance, 6000);
        assert_eq!(g.total_rate("short"), Some(60));
        assert_eq!(g.total_rate("recent"), Some(120));
        assert_eq!(g.total_rate("long"), None);
        assert_eq!(g.aggregated_replenishment_count, 3);
        assert_eq!(g.sample_count, 12);
    }

    #[test]
    fn flipping_validity_removes_exactly_one_contribution() {
        let mut members = vec![member("a", 1000, 10, true), member("b", 2000, 20, true)];
        let before = agg(&members, AggregateView::ValidOnly);

        members[1].valid = false;
        let after = agg(&members, AggregateView::ValidOnly);

        assert_eq!(before.total_balance - after.total_balance, 2000);
        assert_eq!(
            before.total_rate("short").unwrap() - after.total_rate("short").unwrap(),
            20
        );
        assert_eq!(after.member_count, 1);
        assert_eq!(after.excluded_count, 1);

        let all = agg(&members, AggregateView::IncludeAll);
        assert_eq!(all.total_balance, before.total_balance);
        assert_eq!(all.excluded_count, 0);
    }

    #[test]
    fn members_without_estimates_add_balance_only() {
        let silent = MemberEstimate {
            entity_id: "quiet".to_string(),
            balance: 500,
            outcomes: vec![RateOutcome::InsufficientData {
                window: Window::short_term(),
                snapshots: 1,
            }],
            valid: true,
            website: Some("https://example.org".to_string()),
        };
        let g = agg(&[silent, member("a", 1000, 10, true)], AggregateView::ValidOnly);
        assert_eq!(g.total_balance, 1500);
        assert_eq!(g.total_rate("short"), Some(10));
        assert_eq!(g.website.as_deref(), Some("https://example.org"));
    }

    #[test]
    fn group_runway_uses_summed_figures() {
        // 24_000 over (10 + 30) per hour on the short window: 25 days.
        let g = agg(
            &[member("a", 12_000, 10, true), member("b", 12_000, 30, true)],
            AggregateView::ValidOnly,
        );
        assert_eq!(g.runway.window.as_deref(), Some("short"));
        assert_eq!(g.runway.days, Some(25.0));
        assert_eq!(g.runway.severity, Severity::Critical);
    }

    #[test]
    fn empty_group_is_infinite() {
        let g = agg(&[member("a", 100, 10, false)], AggregateView::ValidOnly);
        assert_eq!(g.member_count, 0);
        assert_eq!(g.total_balance, 0);
        assert!(g.total_rate_per_window.is_empty());
        assert_eq!(g.runway.severity, Severity::Infinite);
    }
}
