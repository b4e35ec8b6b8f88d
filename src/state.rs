use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use eframe::egui;
use plucking_dashboard::config::DashboardConfig;
use plucking_dashboard::data::fetch::Fetch;
use plucking_dashboard::pipeline::{load_all, DashboardReport};
use plucking_dashboard::projection::ViewMode;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Immutable settings shared with the loader thread.
    pub config: Arc<DashboardConfig>,

    fetcher: Arc<dyn Fetch>,

    /// Outcome of the last completed load (None until the first finishes).
    pub report: Option<DashboardReport>,

    /// Receives the report of an in-flight load.
    pending: Option<Receiver<DashboardReport>>,

    /// Name of the selected view mode.
    pub view_name: String,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: Arc<DashboardConfig>, fetcher: Arc<dyn Fetch>) -> Self {
        let view_name = config.default_view.clone();
        Self {
            config,
            fetcher,
            report: None,
            pending: None,
            view_name,
            status_message: None,
        }
    }

    /// Whether a load is in progress.
    pub fn loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Start loading every source on a background thread.
    pub fn start_load(&mut self, ctx: &egui::Context) {
        if self.loading() {
            return;
        }
        let (tx, rx) = mpsc::channel();
        let config = Arc::clone(&self.config);
        let fetcher = Arc::clone(&self.fetcher);
        let ctx = ctx.clone();

        let spawned = thread::Builder::new()
            .name("dashboard-loader".into())
            .spawn(move || {
                let report = load_all(&config, &fetcher);
                let _ = tx.send(report);
                ctx.request_repaint();
            });

        match spawned {
            Ok(_) => {
                log::info!("loading {} sources", self.config.sources.len());
                self.pending = Some(rx);
                self.status_message = None;
            }
            Err(e) => {
                log::error!("Failed to start loader: {e}");
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Pick up a finished load, if any.
    pub fn poll(&mut self) {
        let Some(rx) = &self.pending else {
            return;
        };
        match rx.try_recv() {
            Ok(report) => {
                self.report = Some(report);
                self.pending = None;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                log::error!("loader thread exited without a report");
                self.status_message = Some("Error: loader stopped unexpectedly".into());
                self.pending = None;
            }
        }
    }

    /// The selected view, falling back to the first configured one.
    pub fn view(&self) -> Option<&ViewMode> {
        self.config
            .view(&self.view_name)
            .or_else(|| self.config.views.first())
    }

    pub fn set_view(&mut self, name: &str) {
        self.view_name = name.to_string();
    }
}
