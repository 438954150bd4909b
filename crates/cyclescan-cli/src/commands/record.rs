use serde::Serialize;

use cyclescan_core::EntitySnapshot;

use super::{Context, format};

#[derive(Serialize)]
struct Recorded<'a> {
    entity_id: &'a str,
    timestamp: u64,
    balance: u128,
}

pub fn run(ctx: &Context, entity: &str, balance: u128, at: Option<u64>) -> anyhow::Result<()> {
    if ctx.store.get_entity(entity)?.is_none() {
        anyhow::bail!("unknown entity {entity}; import it first");
    }
    let timestamp = at.unwrap_or(ctx.now_ms);
    ctx.store.put_snapshot(&EntitySnapshot {
        entity_id: entity.to_string(),
        timestamp,
        balance,
    })?;

    let recorded = Recorded {
        entity_id: entity,
        timestamp,
        balance,
    };
    ctx.emit(&recorded, || {
        format!("✓ Recorded {} for {entity} at {timestamp}\n", format::cycles(balance))
    })
}
