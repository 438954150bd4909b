use std::path::Path;

use anyhow::Context as _;
use serde::Serialize;
use tracing::info;

use cyclescan_core::{EntityMeta, EntitySnapshot};

use super::Context;

#[derive(Serialize)]
struct ImportSummary {
    entities: usize,
    snapshots: usize,
    data_version: u64,
}

pub fn run(ctx: &Context, entities: Option<&Path>, snapshots: Option<&Path>) -> anyhow::Result<()> {
    if entities.is_none() && snapshots.is_none() {
        anyhow::bail!("nothing to import: pass --entities and/or --snapshots");
    }

    let mut summary = ImportSummary {
        entities: 0,
        snapshots: 0,
        data_version: 0,
    };
    if let Some(path) = entities {
        let metas: Vec<EntityMeta> = read_json(path)?;
        summary.entities = ctx.store.import_entities(&metas)?;
        info!(count = summary.entities, path = %path.display(), "entities imported");
    }
    if let Some(path) = snapshots {
        let records: Vec<EntitySnapshot> = read_json(path)?;
        summary.snapshots = ctx.store.put_snapshots(&records)?;
        info!(count = summary.snapshots, path = %path.display(), "snapshots imported");
    }
    summary.data_version = ctx.store.data_version()?;

    ctx.emit(&summary, || {
        format!(
            "✓ Imported {} entities and {} snapshots\n",
            summary.entities, summary.snapshots
        )
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}
