//! Binary entry point: resolve settings, start logging, load the catalog and
//! hand it to the terminal UI. The catalog is saved when the UI exits.
use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use library_catalog::{logging, run_app, App, CatalogStore, Cli, Settings};

fn main() -> anyhow::Result<()> {
    let settings = Settings::resolve(Cli::parse())?;

    if let Err(err) = logging::init(&settings.log_file, &settings.log_level) {
        eprintln!("warning: logging disabled: {err:#}");
    }
    info!(data_file = %settings.data_file.display(), "starting library catalog");

    let store = CatalogStore::open(&settings.data_file);
    let mut app = App::new(store, settings);
    let result = run_app(&mut app);
    if let Err(err) = &result {
        error!(error = %format!("{err:#}"), "terminal UI stopped with an error");
    }

    let closed = app
        .into_store()
        .close()
        .context("failed to save the catalog");
    result?;
    closed?;
    info!("catalog saved, exiting");
    Ok(())
}
