//! Watch command - follow a location in real time

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Notify;
use treesync_client::{ChangeKind, ChangeNotification, Location, TreeSyncClient};

use crate::output::{leaf_rows, print_csv, ChangeRow, OutputContext, OutputFormat};

/// Follow `location`, printing every change until Ctrl+C, the end of the
/// stream, or `count` changes
pub async fn watch(
    client: &TreeSyncClient,
    location: &Location,
    count: Option<usize>,
    ctx: &OutputContext,
) -> Result<()> {
    ctx.info(&format!("Watching {}...", location));
    ctx.info("Press Ctrl+C to stop");

    // Set up Ctrl+C handler
    let stop = Arc::new(Notify::new());
    let s = stop.clone();
    ctrlc::set_handler(move || s.notify_one())?;

    // For CSV, print header once
    if ctx.format == OutputFormat::Csv {
        println!("kind,path,value");
    }

    let mut changes = client.subscribe(location);
    let mut seen = 0;

    loop {
        tokio::select! {
            change = changes.next() => {
                match change {
                    Some(Ok(change)) => {
                        print_change(&change, ctx);
                        seen += 1;
                        if count.is_some_and(|count| seen >= count) {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        ctx.error(&format!("Subscription failed: {}", e));
                        return Err(e.into());
                    }
                    None => {
                        ctx.info("Stream ended");
                        break;
                    }
                }
            }
            _ = stop.notified() => break,
        }
    }

    drop(changes);
    ctx.success(&format!("Stopped after {} change(s)", seen));

    Ok(())
}

/// JSON line for one change
#[derive(Serialize)]
struct ChangeRecord<'a> {
    location: String,
    kind: ChangeKind,
    path: &'a str,
    value: &'a Value,
}

/// Print a change in the appropriate format
fn print_change(change: &ChangeNotification, ctx: &OutputContext) {
    let changed = change.snapshot.child(&change.path);
    let kind = match change.kind {
        ChangeKind::Put => "put",
        ChangeKind::Patch => "patch",
    };

    match ctx.format {
        OutputFormat::Table => {
            ctx.heading(kind, &change.path);
            ctx.print(&leaf_rows(changed.value(), &change.path));
        }
        OutputFormat::Json => {
            let record = ChangeRecord {
                location: change.snapshot.location().to_string(),
                kind: change.kind,
                path: &change.path,
                value: changed.value(),
            };
            // One change per line
            if let Ok(json) = serde_json::to_string(&record) {
                println!("{}", json);
            }
        }
        OutputFormat::Csv => {
            let rows: Vec<ChangeRow> = leaf_rows(changed.value(), &change.path)
                .into_iter()
                .map(|leaf| ChangeRow {
                    kind: kind.to_string(),
                    path: leaf.path,
                    value: leaf.value,
                })
                .collect();
            print_csv(&rows, false);
        }
    }
}
