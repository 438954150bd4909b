//! Registry dump as JSON. The output is accepted by `import --entities`.

use std::path::Path;

use anyhow::Context as _;
use serde::Serialize;
use tracing::info;

use cyclescan_core::{EntityMeta, Snapshot};

use super::Context;

#[derive(Debug, Serialize)]
pub struct ExportedEntity {
    #[serde(flatten)]
    pub meta: EntityMeta,
    /// Most recent snapshot, if any were recorded.
    pub latest: Option<Snapshot>,
}

pub fn collect(ctx: &Context) -> anyhow::Result<Vec<ExportedEntity>> {
    ctx.store
        .list_entities()?
        .into_iter()
        .map(|meta| {
            let latest = ctx.store.latest_balance(&meta.entity_id)?;
            Ok(ExportedEntity { meta, latest })
        })
        .collect()
}

pub fn run(ctx: &Context, output: Option<&Path>) -> anyhow::Result<()> {
    let entities = collect(ctx)?;
    let json = serde_json::to_string_pretty(&entities)?;
    match output {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .with_context(|| format!("writing {}", path.display()))?;
            info!(count = entities.len(), path = %path.display(), "registry exported");
            eprintln!("✓ Exported {} entities to {}", entities.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyclescan_core::EntitySnapshot;

    use crate::commands::OutputFormat;

    #[test]
    fn export_carries_latest_snapshot_and_reimports() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::open(None, Some(dir.path()), OutputFormat::Json, Some(0)).unwrap();
        ctx.store
            .import_entities(&[
                EntityMeta::new("a").with_group("p"),
                EntityMeta::new("b").with_valid(false),
            ])
            .unwrap();
        let big = u64::MAX as u128 * 7;
        ctx.store
            .put_snapshots(&[
                EntitySnapshot {
                    entity_id: "a".into(),
                    timestamp: 5,
                    balance: 1,
                },
                EntitySnapshot {
                    entity_id: "a".into(),
                    timestamp: 9,
                    balance: big,
                },
            ])
            .unwrap();

        let exported = collect(&ctx).unwrap();
        assert_eq!(exported.len(), 2);
        let a = exported.iter().find(|e| e.meta.entity_id == "a").unwrap();
        assert_eq!(a.latest, Some(Snapshot::new(9, big)));
        let b = exported.iter().find(|e| e.meta.entity_id == "b").unwrap();
        assert_eq!(b.latest, None);

        let path = dir.path().join("registry.json");
        run(&ctx, Some(&path)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains(&big.to_string()));
        let metas: Vec<EntityMeta> = serde_json::from_str(&text).unwrap();
        let mut ids: Vec<_> = metas.iter().map(|m| (m.entity_id.as_str(), m.valid)).collect();
        ids.sort();
        assert_eq!(ids, [("a", true), ("b", false)]);
    }
}
