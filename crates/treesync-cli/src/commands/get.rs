//! Get command - print the current value of a location

use anyhow::{bail, Context, Result};
use std::time::Duration;
use treesync_client::{Location, TreeSyncClient};

use crate::output::{leaf_rows, OutputContext, OutputFormat};

/// Wait for the first snapshot of `location` and print it
pub async fn get(
    client: &TreeSyncClient,
    location: &Location,
    timeout_secs: u64,
    ctx: &OutputContext,
) -> Result<()> {
    let mut sub = client.connect(location);

    let change = tokio::time::timeout(Duration::from_secs(timeout_secs), sub.next_change())
        .await
        .with_context(|| format!("No value received from {} within {}s", location, timeout_secs))?;

    let change = match change {
        Some(change) => change?,
        None => bail!("Stream for {} ended before a value arrived", location),
    };
    sub.close();

    let value = change.snapshot.value();
    match ctx.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Table | OutputFormat::Csv => {
            ctx.print(&leaf_rows(value, "/"));
        }
    }

    Ok(())
}
