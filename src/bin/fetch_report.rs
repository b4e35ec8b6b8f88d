//! Headless access to the dashboard pipeline.
//!
//! ```text
//! fetch_report                      JSON report for every source
//! fetch_report sources              JSON source listing
//! fetch_report source <key>         JSON result for one source
//! fetch_report export <key> <path>  one source's series as CSV
//! ```
//!
//! Exit status: 0 success, 3 partial load, 1 failed load or failed source,
//! 2 usage or I/O error.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use plucking_dashboard::config::DashboardConfig;
use plucking_dashboard::data::export::write_csv;
use plucking_dashboard::data::fetch::{Fetch, HttpFetcher};
use plucking_dashboard::error::PipelineError;
use plucking_dashboard::pipeline::{load_all, load_source, LoadStatus};
use serde::Serialize;

/// How an invocation ended, short of a usage or I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Partial,
    Failed,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        match status {
            Status::Ok => ExitCode::SUCCESS,
            Status::Partial => ExitCode::from(3),
            Status::Failed => ExitCode::FAILURE,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(status) => status.into(),
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<Status> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let config = Arc::new(DashboardConfig::from_env().context("loading configuration")?);
    let fetcher: Arc<dyn Fetch> =
        Arc::new(HttpFetcher::new(&config.fetch).context("building HTTP client")?);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    dispatch(&args, &config, &fetcher, &mut out)
}

fn dispatch(
    args: &[&str],
    config: &Arc<DashboardConfig>,
    fetcher: &Arc<dyn Fetch>,
    out: &mut dyn Write,
) -> Result<Status> {
    match args {
        [] => {
            let report = load_all(config, fetcher);
            write_json(out, &report).context("writing report")?;
            Ok(match report.status {
                LoadStatus::Complete | LoadStatus::NoSources => Status::Ok,
                LoadStatus::Partial => Status::Partial,
                LoadStatus::TotalFailure => Status::Failed,
            })
        }
        ["sources"] => {
            write_json(out, config.sources.entries()).context("writing source listing")?;
            Ok(Status::Ok)
        }
        ["source", key] => match load_source(config, fetcher.as_ref(), key) {
            Ok(data) => {
                write_json(out, &data).context("writing source data")?;
                Ok(Status::Ok)
            }
            Err(e) => report_failure(out, &e),
        },
        ["export", key, path] => {
            let data = match load_source(config, fetcher.as_ref(), key) {
                Ok(data) => data,
                Err(e) => return report_failure(out, &e),
            };
            let path = Path::new(path);
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            write_csv(&data.series, config.parser.delimiter, BufWriter::new(file))
                .with_context(|| format!("writing CSV to {}", path.display()))?;
            log::info!("Wrote {} rows for {key} to {}", data.series.len(), path.display());
            Ok(Status::Ok)
        }
        other => bail!(
            "unrecognised arguments {other:?}; expected nothing, `sources`, `source <key>` or `export <key> <path>`"
        ),
    }
}

fn report_failure(out: &mut dyn Write, e: &PipelineError) -> Result<Status> {
    write_json(out, &e.report()).context("writing error")?;
    Ok(Status::Failed)
}

fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use plucking_dashboard::data::fetch::{FetchError, RawDocument};
    use plucking_dashboard::data::registry::{SourceEntry, SourceRegistry};
    use plucking_dashboard::error::FetchFailure;

    use super::*;

    struct StaticFetcher(HashMap<String, &'static str>);

    impl Fetch for StaticFetcher {
        fn fetch(&self, locator: &str) -> Result<RawDocument, FetchError> {
            match self.0.get(locator) {
                Some(body) => Ok(RawDocument::new(locator, *body)),
                None => Err(FetchError {
                    status: Some(404),
                    ..FetchError::new(locator, FetchFailure::Status, "HTTP 404 Not Found")
                }),
            }
        }
    }

    const JAPAN: &str = "quarter,urate\n2023Q3,2.6\n2023Q4,2.5\n";

    fn setup(served: &[(&str, &'static str)]) -> (Arc<DashboardConfig>, Arc<dyn Fetch>) {
        let entries = ["japan", "united_kingdom"]
            .iter()
            .map(|k| SourceEntry::new(*k, k.to_uppercase(), format!("https://host/{k}.csv")))
            .collect();
        let config = DashboardConfig {
            sources: SourceRegistry::new(entries).unwrap(),
            ..DashboardConfig::default()
        };
        let fetcher: Arc<dyn Fetch> = Arc::new(StaticFetcher(
            served
                .iter()
                .map(|(k, body)| (format!("https://host/{k}.csv"), *body))
                .collect(),
        ));
        (Arc::new(config), fetcher)
    }

    fn json(out: &[u8]) -> serde_json::Value {
        serde_json::from_slice(out).unwrap()
    }

    #[test]
    fn export_of_a_failed_source_reports_the_error() {
        let (config, fetcher) = setup(&[("japan", JAPAN)]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uk.csv");
        let path = path.to_str().unwrap();

        let mut out = Vec::new();
        let status = dispatch(&["export", "united_kingdom", path], &config, &fetcher, &mut out).unwrap();

        assert_eq!(status, Status::Failed);
        let report = json(&out);
        assert_eq!(report["errorKind"], "FetchFailed");
        assert_eq!(report["underlyingStatus"], 404);
        assert!(!Path::new(path).exists());
    }

    #[test]
    fn export_of_an_unknown_source_is_not_a_usage_error() {
        let (config, fetcher) = setup(&[]);
        let mut out = Vec::new();
        let status = dispatch(&["export", "atlantis", "/tmp/never.csv"], &config, &fetcher, &mut out)
            .unwrap();
        assert_eq!(status, Status::Failed);
        assert_eq!(json(&out)["errorKind"], "SourceNotFound");
    }

    #[test]
    fn export_writes_the_series() {
        let (config, fetcher) = setup(&[("japan", JAPAN)]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("japan.csv");

        let mut out = Vec::new();
        let status = dispatch(
            &["export", "Japan", path.to_str().unwrap()],
            &config,
            &fetcher,
            &mut out,
        )
        .unwrap();

        assert_eq!(status, Status::Ok);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "\"quarter\",\"urate\"\n\"2023Q3\",\"2.6\"\n\"2023Q4\",\"2.5\"\n"
        );
    }

    #[test]
    fn aggregate_status_maps_to_partial() {
        let (config, fetcher) = setup(&[("japan", JAPAN)]);
        let mut out = Vec::new();
        let status = dispatch(&[], &config, &fetcher, &mut out).unwrap();
        assert_eq!(status, Status::Partial);
        assert_eq!(json(&out)["status"], "partial");
    }

    #[test]
    fn single_source_success_and_failure() {
        let (config, fetcher) = setup(&[("japan", JAPAN)]);

        let mut out = Vec::new();
        assert_eq!(dispatch(&["source", "japan"], &config, &fetcher, &mut out).unwrap(), Status::Ok);
        assert_eq!(json(&out)["records"][1]["quarter"], "2023Q4");

        let mut out = Vec::new();
        assert_eq!(
            dispatch(&["source", "united_kingdom"], &config, &fetcher, &mut out).unwrap(),
            Status::Failed
        );
    }

    #[test]
    fn unknown_arguments_are_usage_errors() {
        let (config, fetcher) = setup(&[]);
        let mut out = Vec::new();
        assert!(dispatch(&["frobnicate"], &config, &fetcher, &mut out).is_err());
        assert!(out.is_empty());
    }
}
