mod app;
mod state;
mod ui;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use app::DashboardApp;
use eframe::egui;
use plucking_dashboard::config::DashboardConfig;
use plucking_dashboard::data::fetch::{Fetch, HttpFetcher};

fn main() -> Result<()> {
    env_logger::init();

    let config = Arc::new(DashboardConfig::from_env().context("loading configuration")?);
    let fetcher: Arc<dyn Fetch> =
        Arc::new(HttpFetcher::new(&config.fetch).context("building HTTP client")?);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 900.0])
            .with_min_inner_size([640.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "U-rate gaps – Dashboard",
        options,
        Box::new(move |cc| Ok(Box::new(DashboardApp::new(cc, config, fetcher)))),
    )
    .map_err(|e| anyhow!("running dashboard window: {e}"))
}
