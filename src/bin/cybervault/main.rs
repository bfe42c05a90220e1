//! CyberVault entrypoint: resolves configuration, opens the configured store,
//! then either prints a headless listing or runs the full-screen directory.

mod app;
mod form;
mod listing;
mod ui;

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use cybervault::config::AppConfig;
use cybervault::{init_tracing, open_store, session_span};

fn main() -> Result<()> {
    let mut config = AppConfig::parse();

    // A broken config file is reported and otherwise ignored.
    let file_error = config.merge_persistent().err();
    if let Some(err) = &file_error {
        eprintln!("cybervault: ignoring config file: {err}");
    }

    if let Some(path) = init_tracing(&config) {
        tracing::info!(path = %path.display(), "trace logging enabled");
    }
    if let Some(err) = file_error {
        tracing::warn!(error = %err, "config file ignored");
    }

    let store_config = config.store_config();
    let _session = session_span(&store_config, config.list).entered();
    let store = open_store(&store_config)
        .with_context(|| format!("open {} store", store_config.backend))?;
    tracing::info!("store opened");

    if config.list {
        let mut stdout = io::stdout().lock();
        return listing::run_listing(
            store,
            config.search.as_deref(),
            config.json,
            &mut stdout,
        );
    }

    let mut session = app::App::with_worker(store)?;
    session.start();
    app::run(&mut session)
}
