use serde::Serialize;
use tracing::debug;

use cyclescan_estimator::{AggregateView, GroupAggregate};

use super::leaderboard::{self, LeaderboardPage};
use super::{Context, format};

#[derive(Serialize)]
struct ProjectBoard<'a> {
    sort_window: &'a str,
    view: AggregateView,
    groups: &'a [GroupAggregate],
}

pub async fn run(ctx: &Context, all: bool) -> anyhow::Result<()> {
    let engine = ctx.engine()?;
    let sort_window = engine.window(&ctx.config.leaderboard.sort_window)?.name.clone();
    let view = if all {
        AggregateView::IncludeAll
    } else {
        AggregateView::ValidOnly
    };

    // Invalid members are still reported so excluded counts are accurate.
    let entities = ctx.store.list_entities()?;
    let reports = engine.estimate_many(entities, ctx.now_ms).await?;
    let mut groups = engine.aggregate_all(&reports, view);
    sort_groups(&mut groups, &sort_window);

    let board = ProjectBoard {
        sort_window: &sort_window,
        view,
        groups: &groups,
    };
    ctx.emit(&board, || render(&groups, &sort_window))
}

#[derive(Serialize)]
struct GroupMembers<'a> {
    group: &'a GroupAggregate,
    members: &'a LeaderboardPage,
}

/// One group's total plus its members ranked by burn.
pub async fn members(ctx: &Context, group: &str, all: bool) -> anyhow::Result<()> {
    let (aggregate, page) = group_members(ctx, group, all).await?;
    let windows: Vec<String> = ctx
        .engine()?
        .windows()
        .iter()
        .map(|w| w.name.clone())
        .collect();
    let view = GroupMembers {
        group: &aggregate,
        members: &page,
    };
    ctx.emit(&view, || {
        let mut out = render(std::slice::from_ref(&aggregate), &page.sort_window);
        out.push_str(&leaderboard::render(&page, &windows, ctx.now_ms));
        out
    })
}

async fn group_members(
    ctx: &Context,
    group: &str,
    all: bool,
) -> anyhow::Result<(GroupAggregate, LeaderboardPage)> {
    let engine = ctx.engine()?;
    let sort_window = engine.window(&ctx.config.leaderboard.sort_window)?.name.clone();
    let view = if all {
        AggregateView::IncludeAll
    } else {
        AggregateView::ValidOnly
    };

    let entities: Vec<_> = ctx
        .store
        .list_entities()?
        .into_iter()
        .filter(|meta| meta.group.as_deref() == Some(group))
        .collect();
    if entities.is_empty() {
        anyhow::bail!("no entities in group {group}");
    }
    let reports = engine.estimate_many(entities, ctx.now_ms).await?;
    let aggregate = engine.aggregate_reports(group, &reports, view);

    let shown = reports.into_iter().filter(|r| all || r.valid).collect();
    let page = leaderboard::rank(shown, &sort_window, 0, usize::MAX);
    debug!(group, members = page.total, "group members ranked");
    Ok((aggregate, page))
}

fn sort_groups(groups: &mut [GroupAggregate], sort_window: &str) {
    groups.sort_by(|a, b| {
        let ra = a.total_rate(sort_window).unwrap_or(0);
        let rb = b.total_rate(sort_window).unwrap_or(0);
        rb.cmp(&ra).then_with(|| a.group_id.cmp(&b.group_id))
    });
}

fn render(groups: &[GroupAggregate], sort_window: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\nProjects by {sort_window} burn ({} groups)\n\n",
        groups.len()
    ));
    out.push_str(&format!(
        "{:<24} {:>7} {:>10} {:>12} {:>9}  {}\n",
        "project", "members", "balance", "burn", "runway", "status"
    ));
    for group in groups {
        out.push_str(&format!(
            "{:<24} {:>7} {:>10} {:>12} {:>9}  {}",
            format::clip(&group.group_id, 24),
            group.member_count,
            format::cycles(group.total_balance),
            format::rate(group.total_rate(sort_window)),
            format::runway(&group.runway),
            format::severity(group.runway.severity),
        ));
        if group.excluded_count > 0 {
            out.push_str(&format!("  ({} excluded)", group.excluded_count));
        }
        out.push('\n');
        if let Some(website) = &group.website {
            out.push_str(&format!("  {website}\n"));
        }
    }
    out
}
