use cyclescan_estimator::{EntityReport, RateBasis, RateOutcome};

use super::{Context, format};

pub fn run(ctx: &Context, entity: &str) -> anyhow::Result<()> {
    let report = ctx.engine()?.entity_report(entity, ctx.now_ms)?;
    ctx.emit(&report, || render(&report, ctx.now_ms))
}

fn render(report: &EntityReport, now_ms: u64) -> String {
    let mut out = String::new();

    out.push_str(&format!("\n{}\n", report.entity_id));
    out.push_str(&format!(
        "  Group:     {}\n",
        report.group.as_deref().unwrap_or(format::PLACEHOLDER)
    ));
    if let Some(website) = &report.website {
        out.push_str(&format!("  Website:   {website}\n"));
    }
    if !report.valid {
        out.push_str("  Flagged invalid: excluded from leaderboards and group totals\n");
    }
    out.push_str(&format!("  Balance:   {}\n", format::balance(report.balance)));
    out.push_str(&format!(
        "  Last seen: {}\n\n",
        format::age(now_ms, report.last_seen)
    ));

    out.push_str("Burn rates:\n");
    for outcome in &report.outcomes {
        let window = outcome.window();
        match outcome {
            RateOutcome::InsufficientData { snapshots, .. } => {
                out.push_str(&format!(
                    "  {:<8} {:>12}   insufficient data ({snapshots} snapshot{})\n",
                    window.name,
                    format::PLACEHOLDER,
                    if *snapshots == 1 { "" } else { "s" },
                ));
            }
            RateOutcome::Estimated(estimate) => {
                out.push_str(&format!(
                    "  {:<8} {:>12}   {} samples, {} top-ups",
                    window.name,
                    format::rate(Some(estimate.rate)),
                    estimate.sample_count,
                    estimate.replenishment_count,
                ));
                if estimate.replenishment_count > 0 {
                    out.push_str(&format!(
                        " (+{} added, {} inferred burn)",
                        format::cycles(estimate.total_replenished),
                        format::cycles(estimate.inferred),
                    ));
                }
                if estimate.basis() == RateBasis::NoConsumptionBasis {
                    out.push_str(", no consumption observed");
                }
                if estimate.is_underfilled() {
                    out.push_str(", partial window");
                }
                out.push('\n');
            }
        }
    }

    let runway = &report.runway;
    out.push_str(&format!(
        "\nRunway: {} {}",
        format::runway(runway),
        format::severity(runway.severity)
    ));
    if let Some(window) = &runway.window {
        out.push_str(&format!(" (from {window} window)"));
    }
    out.push('\n');

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyclescan_core::{EntityMeta, EntitySnapshot, MS_PER_HOUR};

    use crate::commands::OutputFormat;

    #[test]
    fn renders_estimates_and_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::open(None, Some(dir.path()), OutputFormat::Text, Some(4 * MS_PER_HOUR))
            .unwrap();
        ctx.store
            .import_entities(&[EntityMeta::new("a").with_group("p")])
            .unwrap();
        let snapshots: Vec<EntitySnapshot> = [(3, 1_000_000), (4, 900_000)]
            .iter()
            .map(|&(h, balance)| EntitySnapshot {
                entity_id: "a".to_string(),
                timestamp: h * MS_PER_HOUR,
                balance,
            })
            .collect();
        ctx.store.put_snapshots(&snapshots).unwrap();

        let report = ctx.engine().unwrap().entity_report("a", ctx.now_ms).unwrap();
        let text = render(&report, ctx.now_ms);
        assert!(text.contains("recent"), "{text}");
        assert!(text.contains("100000/h"), "{text}");
        assert!(text.contains("critical"), "{text}");
        assert!(run(&ctx, "missing").is_err());
    }
}
