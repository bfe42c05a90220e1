//! `--list` output: the filtered records as tab-separated rows or a JSON array.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use cybervault::{DirectoryController, ProfileRecord, RecordStore, SilentNotifier};

pub(crate) fn run_listing(
    store: Arc<dyn RecordStore>,
    query: Option<&str>,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let backend = store.backend();
    let mut controller = DirectoryController::new(store, SilentNotifier);
    controller
        .on_start()
        .with_context(|| format!("load records from {backend} store"))?;
    if let Some(query) = query {
        controller.on_query_change(query);
    }
    let matched = controller.visible();
    tracing::info!(
        total = controller.records().len(),
        matched = matched.len(),
        json,
        "headless listing"
    );
    if json {
        write_json(&matched, out)
    } else {
        write_table(&matched, out)
    }
}

fn write_table(records: &[&ProfileRecord], out: &mut impl Write) -> Result<()> {
    for record in records {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            record.id, record.full_name, record.email, record.phone_number
        )?;
    }
    writeln!(out, "{} record(s)", records.len())?;
    Ok(())
}

fn write_json(records: &[&ProfileRecord], out: &mut impl Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, records).context("encode records as JSON")?;
    writeln!(out)?;
    Ok(())
}
