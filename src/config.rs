use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::fetch::FetchOptions;
use crate::data::parser::ParserOptions;
use crate::data::registry::{SourceEntry, SourceRegistry};
use crate::projection::ViewMode;

/// Environment variable naming an optional JSON configuration file.
pub const CONFIG_ENV: &str = "PLUCKING_DASHBOARD_CONFIG";

const DATA_BASE_URL: &str =
    "https://raw.githubusercontent.com/suahjl/dashboard-global-plucking/main/data-dashboard";

/// (key, label) in display order.
const COUNTRIES: &[(&str, &str)] = &[
    ("united_states", "United States"),
    ("united_kingdom", "United Kingdom"),
    ("japan", "Japan"),
    ("germany", "Germany"),
    ("italy", "Italy"),
    ("australia", "Australia"),
    ("chile", "Chile"),
];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Process-wide settings, loaded once at start-up and then only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub sources: SourceRegistry,
    pub fetch: FetchOptions,
    pub parser: ParserOptions,
    /// Column used as the chart x-axis.
    pub time_axis_key: String,
    /// Columns never plotted by default (category/label columns).
    pub non_plottable_keys: Vec<String>,
    pub views: Vec<ViewMode>,
    /// Name of the view selected at start-up.
    pub default_view: String,
    /// Optional deadline across all sources of one load.
    pub deadline_ms: Option<u64>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let entries = COUNTRIES
            .iter()
            .map(|(key, label)| {
                SourceEntry::new(
                    *key,
                    *label,
                    format!("{DATA_BASE_URL}/plucking_ugap_quarterly_{key}.csv"),
                )
            })
            .collect();

        Self {
            sources: SourceRegistry::builtin(entries),
            fetch: FetchOptions::default(),
            parser: ParserOptions::default(),
            time_axis_key: "quarter".to_string(),
            non_plottable_keys: vec!["country".to_string()],
            views: vec![ViewMode::urate_line(), ViewMode::urate_gap()],
            default_view: "urate-line".to_string(),
            deadline_ms: None,
        }
    }
}

impl DashboardConfig {
    /// Load and validate a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: DashboardConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Use the file named by [`CONFIG_ENV`] if set, otherwise the defaults.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                log::info!("loading configuration from {}", Path::new(&path).display());
                Self::load(Path::new(&path))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.time_axis_key.trim().is_empty() {
            bail!("time_axis_key must not be empty");
        }
        if self.fetch.timeout_ms == 0 {
            bail!("fetch.timeout_ms must be positive");
        }
        if self.views.is_empty() {
            bail!("at least one view must be configured");
        }
        for (i, view) in self.views.iter().enumerate() {
            if self.views[..i].iter().any(|v| v.name == view.name) {
                bail!("view '{}' is configured more than once", view.name);
            }
        }
        if self.view(&self.default_view).is_none() {
            bail!("default_view '{}' is not a configured view", self.default_view);
        }
        Ok(())
    }

    pub fn view(&self, name: &str) -> Option<&ViewMode> {
        self.views.iter().find(|v| v.name == name)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}
