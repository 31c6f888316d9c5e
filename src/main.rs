use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;

use rusty_viewpoints::app::ViewpointsApp;
use rusty_viewpoints::cli::Args;
use rusty_viewpoints::data::manager::DataFileManager;
use rusty_viewpoints::state::AppState;

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let settings = args.settings()?;
    let mut manager = DataFileManager::new(settings.read, settings.write);

    // Headless conversion: read, write, exit.
    if let (Some(input), Some(output)) = (&args.input, &args.output) {
        manager
            .load(input)
            .with_context(|| format!("reading {}", input.display()))?;
        let rows = manager
            .save(output)
            .with_context(|| format!("writing {}", output.display()))?;
        log::info!("converted {} -> {} ({rows} rows)", input.display(), output.display());
        return Ok(());
    }

    if let Some(input) = &args.input {
        if let Err(e) = manager.load(input) {
            log::error!("couldn't load {}: {e}; generating default data", input.display());
        }
    }
    let state = AppState::new(manager, args.rows, args.cols);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Rusty Viewpoints",
        options,
        Box::new(|_cc| Ok(Box::new(ViewpointsApp::new(state)))),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {e}"))
}
