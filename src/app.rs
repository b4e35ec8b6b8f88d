use std::sync::Arc;

use eframe::egui;
use plucking_dashboard::config::DashboardConfig;
use plucking_dashboard::data::fetch::Fetch;

use crate::state::AppState;
use crate::ui::panels;

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct DashboardApp {
    pub state: AppState,
}

impl DashboardApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: Arc<DashboardConfig>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        let mut state = AppState::new(config, fetcher);
        state.start_load(&cc.egui_ctx);
        Self { state }
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.state.poll();

        // ---- Top panel: view selector, reload ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: source list ----
        egui::SidePanel::left("source_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &self.state);
            });

        // ---- Central panel: one chart per source ----
        egui::CentralPanel::default().show(ctx, |ui| {
            panels::charts(ui, &mut self.state);
        });
    }
}
