use serde::Serialize;
use tracing::debug;

use cyclescan_core::config::MAX_PAGE_LIMIT;
use cyclescan_estimator::{EntityReport, RunwayEstimate};

use super::{Context, format};

#[derive(Debug, Serialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub entity_id: String,
    pub group: Option<String>,
    pub balance: Option<u128>,
    /// Per-hour rate for each configured window; `None` where no estimate.
    pub rates: Vec<(String, Option<u128>)>,
    pub runway: RunwayEstimate,
    pub last_seen: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardPage {
    pub sort_window: String,
    pub total: usize,
    pub offset: usize,
    pub rows: Vec<LeaderboardRow>,
}

pub async fn run(
    ctx: &Context,
    offset: usize,
    limit: Option<usize>,
    all: bool,
) -> anyhow::Result<()> {
    let engine = ctx.engine()?;
    let sort_window = engine.window(&ctx.config.leaderboard.sort_window)?.name.clone();
    let limit = limit
        .unwrap_or(ctx.config.leaderboard.page_limit)
        .min(MAX_PAGE_LIMIT);

    let entities = ctx
        .store
        .list_entities()?
        .into_iter()
        .filter(|meta| all || meta.valid)
        .collect();
    let reports = engine.estimate_many(entities, ctx.now_ms).await?;
    let page = rank(reports, &sort_window, offset, limit);
    debug!(total = page.total, shown = page.rows.len(), %sort_window, "leaderboard built");

    let windows: Vec<String> = engine.windows().iter().map(|w| w.name.clone()).collect();
    ctx.emit(&page, || render(&page, &windows, ctx.now_ms))
}

/// Sort by the sort window's rate, highest first. Entities without an
/// estimate rank as zero; ties break on id so pages are stable.
pub fn rank(
    mut reports: Vec<EntityReport>,
    sort_window: &str,
    offset: usize,
    limit: usize,
) -> LeaderboardPage {
    reports.sort_by(|a, b| {
        let ra = a.rate(sort_window).unwrap_or(0);
        let rb = b.rate(sort_window).unwrap_or(0);
        rb.cmp(&ra).then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    let total = reports.len();
    let rows = reports
        .into_iter()
        .enumerate()
        .skip(offset)
        .take(limit)
        .map(|(index, report)| LeaderboardRow {
            rank: index + 1,
            rates: report
                .outcomes
                .iter()
                .map(|o| (o.window().name.clone(), o.rate()))
                .collect(),
            entity_id: report.entity_id,
            group: report.group,
            balance: report.balance,
            runway: report.runway,
            last_seen: report.last_seen,
        })
        .collect();
    LeaderboardPage {
        sort_window: sort_window.to_string(),
        total,
        offset,
        rows,
    }
}

pub(super) fn render(page: &LeaderboardPage, windows: &[String], now_ms: u64) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\nTop burners by {} rate ({} entities)\n\n",
        page.sort_window, page.total
    ));

    out.push_str(&format!("{:>4}  {:<28} {:<16} {:>10}", "#", "entity", "group", "balance"));
    for window in windows {
        out.push_str(&format!(" {:>12}", window));
    }
    out.push_str(&format!(" {:>9}  {}\n", "runway", "seen"));

    for row in &page.rows {
        out.push_str(&format!(
            "{:>4}  {:<28} {:<16} {:>10}",
            row.rank,
            format::clip(&row.entity_id, 28),
            format::clip(row.group.as_deref().unwrap_or(format::PLACEHOLDER), 16),
            format::balance(row.balance),
        ));
        for (_, rate) in &row.rates {
            out.push_str(&format!(" {:>12}", format::rate(*rate)));
        }
        out.push_str(&format!(
            " {:>9}  {}\n",
            format::runway(&row.runway),
            format::age(now_ms, row.last_seen)
        ));
    }

    if page.rows.is_empty() {
        out.push_str("  (no entities on this page)\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyclescan_core::{MS_PER_HOUR, Snapshot, Window};
    use cyclescan_estimator::{RateOutcome, estimate_window};

    fn report(id: &str, per_hour: Option<u128>) -> EntityReport {
        let window = Window::short_term();
        let outcome = match per_hour {
            Some(rate) => estimate_window(
                &[Snapshot::new(0, 10 * rate), Snapshot::new(MS_PER_HOUR, 9 * rate)],
                &window,
                MS_PER_HOUR,
            ),
            None => RateOutcome::InsufficientData {
                window,
                snapshots: 0,
            },
        };
        EntityReport {
            entity_id: id.to_string(),
            group: None,
            website: None,
            valid: true,
            balance: None,
            last_seen: None,
            outcomes: vec![outcome],
            runway: RunwayEstimate::infinite(),
        }
    }

    #[test]
    fn sorts_descending_with_missing_as_zero() {
        let reports = vec![
            report("slow", Some(5)),
            report("unknown", None),
            report("fast", Some(50)),
            report("idle", Some(0)),
        ];
        let page = rank(reports, "short", 0, 10);
        let ids: Vec<_> = page.rows.iter().map(|r| r.entity_id.as_str()).collect();
        assert_eq!(ids, ["fast", "slow", "idle", "unknown"]);
        assert_eq!(page.rows[0].rates[0], ("short".to_string(), Some(50)));
        assert_eq!(page.rows[3].rates[0].1, None);
    }

    #[test]
    fn pages_keep_global_rank() {
        let reports = (1..=5u128).map(|i| report(&format!("e{i}"), Some(i))).collect();
        let page = rank(reports, "short", 2, 2);
        assert_eq!(page.total, 5);
        let ranks: Vec<_> = page.rows.iter().map(|r| (r.rank, r.entity_id.as_str())).collect();
        assert_eq!(ranks, [(3, "e3"), (4, "e2")]);
    }
}
