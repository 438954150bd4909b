//! Registry maintenance: labels, validity flags, removal, retention, counts.

use serde::Serialize;
use tracing::info;

use cyclescan_core::MS_PER_DAY;
use cyclescan_state::{EntityUpdate, StoreStats};

use super::{Context, format};

#[derive(Serialize)]
struct Changed<'a> {
    entity_id: &'a str,
    valid: bool,
}

pub fn set_valid(ctx: &Context, entity: &str, valid: bool) -> anyhow::Result<()> {
    if !ctx.store.set_valid(entity, valid)? {
        anyhow::bail!("unknown entity {entity}");
    }
    let changed = Changed {
        entity_id: entity,
        valid,
    };
    ctx.emit(&changed, || {
        format!("✓ {entity} marked {}\n", if valid { "valid" } else { "invalid" })
    })
}

/// Relabel an entity. An empty value clears the field.
pub fn update(
    ctx: &Context,
    entity: &str,
    group: Option<String>,
    website: Option<String>,
) -> anyhow::Result<()> {
    if group.is_none() && website.is_none() {
        anyhow::bail!("nothing to update: pass --group and/or --website");
    }
    let update = EntityUpdate { group, website };
    if !ctx.store.update_entity(entity, &update)? {
        anyhow::bail!("unknown entity {entity}");
    }
    let meta = ctx
        .store
        .get_entity(entity)?
        .ok_or_else(|| anyhow::anyhow!("entity {entity} vanished during update"))?;
    info!(entity_id = entity, group = ?meta.group, website = ?meta.website, "entity updated");
    ctx.emit(&meta, || {
        format!(
            "✓ {entity}: group {}, website {}\n",
            meta.group.as_deref().unwrap_or(format::PLACEHOLDER),
            meta.website.as_deref().unwrap_or(format::PLACEHOLDER)
        )
    })
}

pub fn remove(ctx: &Context, entities: &[String]) -> anyhow::Result<()> {
    let ids: Vec<&str> = entities.iter().map(String::as_str).collect();
    let removed = ctx.store.remove_entities(&ids)?;
    ctx.emit(&serde_json::json!({ "removed": removed }), || {
        format!("✓ Removed {removed} of {} entities\n", ids.len())
    })
}

/// Cutoff for a retention of `days` ending at `now_ms`.
pub fn retention_cutoff(now_ms: u64, days: u64) -> u64 {
    now_ms.saturating_sub(days.saturating_mul(MS_PER_DAY))
}

pub fn prune(ctx: &Context, days: Option<u64>) -> anyhow::Result<()> {
    let days = days.unwrap_or(ctx.config.retention.days);
    let cutoff = retention_cutoff(ctx.now_ms, days);
    let pruned = ctx.store.prune_before(cutoff)?;
    info!(days, cutoff, pruned, "retention applied");
    ctx.emit(&serde_json::json!({ "pruned": pruned, "cutoff_ms": cutoff }), || {
        format!("✓ Pruned {pruned} snapshots older than {days} days\n")
    })
}

#[derive(Serialize)]
struct StatsView {
    #[serde(flatten)]
    stats: StoreStats,
    data_version: u64,
}

pub fn stats(ctx: &Context) -> anyhow::Result<()> {
    let view = StatsView {
        stats: ctx.store.stats()?,
        data_version: ctx.store.data_version()?,
    };
    ctx.emit(&view, || {
        format!(
            "Entities:  {}\nSnapshots: {}\nGroups:    {}\n",
            view.stats.entities, view.stats.snapshots, view.stats.groups
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyclescan_core::{EntityMeta, EntitySnapshot};

    use crate::commands::OutputFormat;

    fn ctx(dir: &std::path::Path, now: u64) -> Context {
        Context::open(None, Some(dir), OutputFormat::Json, Some(now)).unwrap()
    }

    #[test]
    fn cutoff_saturates() {
        assert_eq!(retention_cutoff(3 * MS_PER_DAY, 1), 2 * MS_PER_DAY);
        assert_eq!(retention_cutoff(MS_PER_DAY, 30), 0);
    }

    #[test]
    fn prune_uses_configured_retention() {
        let dir = tempfile::tempdir().unwrap();
        let now = 40 * MS_PER_DAY;
        let ctx = ctx(dir.path(), now);
        ctx.store.import_entities(&[EntityMeta::new("a")]).unwrap();
        ctx.store
            .put_snapshots(&[
                EntitySnapshot {
                    entity_id: "a".into(),
                    timestamp: MS_PER_DAY,
                    balance: 5,
                },
                EntitySnapshot {
                    entity_id: "a".into(),
                    timestamp: 35 * MS_PER_DAY,
                    balance: 4,
                },
            ])
            .unwrap();

        prune(&ctx, None).unwrap();
        let left = ctx.store.list_snapshots("a", 0).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].timestamp, 35 * MS_PER_DAY);
    }

    #[test]
    fn update_relabels_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path(), 0);
        assert!(update(&ctx, "ghost", Some("p".into()), None).is_err());

        ctx.store
            .import_entities(&[EntityMeta::new("a").with_group("old")])
            .unwrap();
        assert!(update(&ctx, "a", None, None).is_err());

        update(&ctx, "a", Some("new".into()), Some("https://example.org".into())).unwrap();
        let meta = ctx.store.get_entity("a").unwrap().unwrap();
        assert_eq!(meta.group.as_deref(), Some("new"));
        assert_eq!(meta.website.as_deref(), Some("https://example.org"));

        update(&ctx, "a", Some(String::new()), None).unwrap();
        let meta = ctx.store.get_entity("a").unwrap().unwrap();
        assert_eq!(meta.group, None);
        assert_eq!(meta.website.as_deref(), Some("https://example.org"));
    }

    #[test]
    fn set_valid_unknown_entity_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path(), 0);
        assert!(set_valid(&ctx, "ghost", false).is_err());
        ctx.store.import_entities(&[EntityMeta::new("a")]).unwrap();
        set_valid(&ctx, "a", false).unwrap();
        assert!(!ctx.store.get_entity("a").unwrap().unwrap().valid);
    }
}
