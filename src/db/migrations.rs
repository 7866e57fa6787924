use anyhow::{ensure, Context, Result};
use log::info;
use rusqlite::Connection;

/// Schema scripts in order; the script at index `n` upgrades `user_version`
/// from `n` to `n + 1`.
const SCHEMAS: &[&str] = &[include_str!("schemas/schema_v1.sql")];

fn target_version() -> i32 {
    SCHEMAS.len() as i32
}

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let target = target_version();
    let applied: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("could not read schema version")?;
    ensure!(
        applied <= target,
        "durable store is at schema v{applied}, newer than the supported v{target}"
    );
    if applied == target {
        return Ok(());
    }

    let tx = conn.transaction().context("could not begin schema upgrade")?;
    for (idx, script) in SCHEMAS.iter().enumerate().skip(applied as usize) {
        let version = idx + 1;
        tx.execute_batch(script)
            .with_context(|| format!("schema v{version} did not apply"))?;
        info!("durable store upgraded to schema v{version}");
    }
    tx.pragma_update(None, "user_version", target)
        .context("could not record schema version")?;
    tx.commit().context("could not commit schema upgrade")
}
