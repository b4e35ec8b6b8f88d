//! Per-source pipeline and the fan-out/fan-in aggregator over all sources.
//!
//! ```text
//!   registry ──► worker thread per source ──► fetch ► parse ► normalise
//!                        │        │        │
//!                        ▼        ▼        ▼
//!                   mpsc channel (index, result), any completion order
//!                                 │
//!                                 ▼
//!                DashboardReport in registry order, failures kept per source
//! ```

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Serialize, Serializer};

use crate::config::DashboardConfig;
use crate::data::fetch::Fetch;
use crate::data::model::{NormalizedSeries, ParseWarning, Record};
use crate::data::normalize::normalize;
use crate::data::parser::{parse_document, ParseError};
use crate::data::registry::SourceEntry;
use crate::error::{ErrorReport, FetchFailure, PipelineError};

// ---------------------------------------------------------------------------
// Per-source result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMeta {
    pub source_key: String,
    pub fetched_at: DateTime<Utc>,
    pub origin_locator: String,
    pub byte_length: usize,
    pub time_axis_key: String,
    pub warnings: Vec<ParseWarning>,
}

/// A successfully loaded source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceData {
    #[serde(rename = "records", serialize_with = "serialize_rows")]
    pub series: NormalizedSeries,
    pub meta: SourceMeta,
}

fn serialize_rows<S: Serializer>(series: &NormalizedSeries, s: S) -> Result<S::Ok, S::Error> {
    let rows: &[Record] = series.records();
    rows.serialize(s)
}

/// Run fetch → parse → normalise for the source registered under `key`.
pub fn load_source(
    config: &DashboardConfig,
    fetcher: &dyn Fetch,
    key: &str,
) -> Result<SourceData, PipelineError> {
    let entry = config.sources.get(key)?;
    run_pipeline(config, fetcher, entry)
}

fn run_pipeline(
    config: &DashboardConfig,
    fetcher: &dyn Fetch,
    entry: &SourceEntry,
) -> Result<SourceData, PipelineError> {
    let key = &entry.key;
    debug!("[{key}] fetching {}", entry.locator);

    let result = fetch_and_parse(config, fetcher, entry);
    match &result {
        Ok(data) => info!(
            "[{key}] parsed {} data points ({} bytes, {} warnings)",
            data.series.len(),
            data.meta.byte_length,
            data.meta.warnings.len()
        ),
        Err(e) => error!("[{key}] {e}"),
    }
    result
}

fn fetch_and_parse(
    config: &DashboardConfig,
    fetcher: &dyn Fetch,
    entry: &SourceEntry,
) -> Result<SourceData, PipelineError> {
    let raw = fetcher.fetch(&entry.locator)?;
    let fetched_at = Utc::now();

    let parsed = parse_document(&raw.text, &config.parser).map_err(|e| match e {
        ParseError::EmptyDocument => PipelineError::EmptyDocument {
            locator: raw.locator.clone(),
        },
    })?;

    let warnings = parsed.warnings;
    let series = normalize(parsed.records, &config.time_axis_key).map_err(|e| {
        PipelineError::NoValidRows {
            locator: raw.locator.clone(),
            time_axis_key: config.time_axis_key.clone(),
            parsed_rows: e.parsed_rows,
        }
    })?;

    Ok(SourceData {
        series,
        meta: SourceMeta {
            source_key: entry.key.clone(),
            fetched_at,
            origin_locator: raw.locator,
            byte_length: raw.byte_len,
            time_axis_key: config.time_axis_key.clone(),
            warnings,
        },
    })
}

// ---------------------------------------------------------------------------
// Aggregate over all sources
// ---------------------------------------------------------------------------

/// Result for one configured source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutcome {
    pub entry: SourceEntry,
    pub result: Result<SourceData, PipelineError>,
}

impl Serialize for SourceOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct View<'a> {
            key: &'a str,
            label: &'a str,
            locator: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            data: Option<&'a SourceData>,
            #[serde(skip_serializing_if = "Option::is_none")]
            error: Option<ErrorReport>,
        }

        View {
            key: &self.entry.key,
            label: &self.entry.label,
            locator: &self.entry.locator,
            data: self.result.as_ref().ok(),
            error: self.result.as_ref().err().map(PipelineError::report),
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    /// Every source loaded.
    Complete,
    /// Some sources loaded, some failed.
    Partial,
    /// Sources were configured but none loaded.
    TotalFailure,
    /// Nothing was configured.
    NoSources,
}

/// Outcomes of one load, one per source, in registry order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub status: LoadStatus,
    pub sources: Vec<SourceOutcome>,
}

impl DashboardReport {
    fn new(sources: Vec<SourceOutcome>) -> Self {
        let loaded = sources.iter().filter(|o| o.result.is_ok()).count();
        let status = match (loaded, sources.len()) {
            (_, 0) => LoadStatus::NoSources,
            (0, _) => LoadStatus::TotalFailure,
            (l, n) if l == n => LoadStatus::Complete,
            _ => LoadStatus::Partial,
        };
        Self { status, sources }
    }

    pub fn loaded(&self) -> usize {
        self.sources.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.sources.len() - self.loaded()
    }

    pub fn outcome(&self, key: &str) -> Option<&SourceOutcome> {
        self.sources.iter().find(|o| o.entry.key == key)
    }
}

/// Load every configured source concurrently, one worker thread each.
///
/// A failure in one source never affects another. When the config sets a
/// deadline, sources still running when it elapses are reported as timed
/// out; their workers are left to finish and their results discarded.
pub fn load_all(config: &Arc<DashboardConfig>, fetcher: &Arc<dyn Fetch>) -> DashboardReport {
    let entries = config.sources.entries().to_vec();
    let started = Instant::now();
    let deadline = config.deadline();

    let (tx, rx) = mpsc::channel::<(usize, Result<SourceData, PipelineError>)>();
    let mut slots: Vec<Option<Result<SourceData, PipelineError>>> = vec![None; entries.len()];

    for (index, entry) in entries.iter().enumerate() {
        let tx = tx.clone();
        let config = Arc::clone(config);
        let fetcher = Arc::clone(fetcher);
        let worker_entry = entry.clone();
        let spawned = thread::Builder::new()
            .name(format!("fetch-{}", entry.key))
            .spawn(move || {
                let result = run_pipeline(&config, fetcher.as_ref(), &worker_entry);
                // The receiver is gone once the deadline has passed.
                let _ = tx.send((index, result));
            });
        if let Err(e) = spawned {
            let err = PipelineError::FetchFailed {
                locator: entry.locator.clone(),
                kind: FetchFailure::WorkerFailed,
                status: None,
                message: format!("could not start pipeline worker thread: {e}; nothing was fetched"),
            };
            error!("[{}] {err}", entry.key);
            slots[index] = Some(Err(err));
        }
    }
    drop(tx);

    let mut deadline_hit = false;
    while slots.iter().any(Option::is_none) {
        let received = match deadline {
            Some(limit) => {
                let remaining = limit.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    deadline_hit = true;
                    break;
                }
                match rx.recv_timeout(remaining) {
                    Ok(msg) => msg,
                    Err(RecvTimeoutError::Timeout) => {
                        deadline_hit = true;
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(msg) => msg,
                Err(_) => break,
            },
        };
        let (index, result) = received;
        slots[index] = Some(result);
    }

    let sources: Vec<SourceOutcome> = entries
        .into_iter()
        .zip(slots)
        .map(|(entry, slot)| {
            let result = slot.unwrap_or_else(|| Err(unfinished(&entry, deadline, deadline_hit)));
            SourceOutcome { entry, result }
        })
        .collect();

    let report = DashboardReport::new(sources);
    info!(
        "loaded data for {} out of {} sources in {:?}",
        report.loaded(),
        report.sources.len(),
        started.elapsed()
    );
    if report.status == LoadStatus::TotalFailure {
        warn!("failed to load data for any source");
    }
    report
}

fn unfinished(entry: &SourceEntry, deadline: Option<Duration>, deadline_hit: bool) -> PipelineError {
    let message = match deadline {
        Some(limit) if deadline_hit => {
            format!("aggregate deadline of {} ms elapsed", limit.as_millis())
        }
        _ => "pipeline worker stopped without a result".to_string(),
    };
    let kind = if deadline_hit {
        FetchFailure::Timeout
    } else {
        FetchFailure::WorkerFailed
    };
    let err = PipelineError::FetchFailed {
        locator: entry.locator.clone(),
        kind,
        status: None,
        message,
    };
    error!("[{}] {err}", entry.key);
    err
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::data::fetch::{FetchError, RawDocument};
    use crate::data::registry::SourceRegistry;
    use crate::error::ErrorKind;

    /// Serves fixed bodies by locator; anything else is a 404.
    struct StaticFetcher(HashMap<String, String>);

    impl Fetch for StaticFetcher {
        fn fetch(&self, locator: &str) -> Result<RawDocument, FetchError> {
            match self.0.get(locator) {
                Some(body) => Ok(RawDocument::new(locator, body.clone())),
                None => Err(FetchError {
                    status: Some(404),
                    ..FetchError::new(locator, FetchFailure::Status, "HTTP 404 Not Found")
                }),
            }
        }
    }

    fn config_with(keys: &[&str]) -> DashboardConfig {
        let entries = keys
            .iter()
            .map(|k| SourceEntry::new(*k, k.to_uppercase(), format!("https://host/{k}.csv")))
            .collect();
        DashboardConfig {
            sources: SourceRegistry::new(entries).unwrap(),
            ..DashboardConfig::default()
        }
    }

    fn fetcher(bodies: &[(&str, &str)]) -> StaticFetcher {
        StaticFetcher(
            bodies
                .iter()
                .map(|(k, b)| (format!("https://host/{k}.csv"), b.to_string()))
                .collect(),
        )
    }

    #[test]
    fn loads_records_and_metadata() {
        let config = config_with(&["japan"]);
        let body = "quarter,urate,urate_ceiling,urate_gap\n2023Q1,2.6,2.4,0.2\n2023Q2,2.5,2.4,0.1\n";
        let data = load_source(&config, &fetcher(&[("japan", body)]), "japan").unwrap();

        assert_eq!(data.series.len(), 2);
        assert_eq!(data.meta.source_key, "japan");
        assert_eq!(data.meta.origin_locator, "https://host/japan.csv");
        assert_eq!(data.meta.byte_length, body.len());
        assert!(data.meta.warnings.is_empty());
    }

    #[test]
    fn unknown_key_is_never_substituted() {
        let config = config_with(&["japan"]);
        let err = load_source(&config, &fetcher(&[]), "atlantis").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceNotFound);
    }

    #[test]
    fn status_failure_keeps_locator_and_status() {
        let config = config_with(&["japan"]);
        let err = load_source(&config, &fetcher(&[]), "japan").unwrap_err();
        let report = err.report();
        assert_eq!(report.error_kind, ErrorKind::FetchFailed);
        assert_eq!(report.attempted_locator.as_deref(), Some("https://host/japan.csv"));
        assert_eq!(report.underlying_status, Some(404));
    }

    #[test]
    fn empty_body_and_header_only_are_distinct() {
        let config = config_with(&["empty", "header"]);
        let f = fetcher(&[("empty", ""), ("header", "quarter,urate\n")]);

        let empty = load_source(&config, &f, "empty").unwrap_err();
        assert_eq!(
            empty,
            PipelineError::EmptyDocument {
                locator: "https://host/empty.csv".into()
            }
        );

        let header = load_source(&config, &f, "header").unwrap_err();
        assert_eq!(
            header,
            PipelineError::NoValidRows {
                locator: "https://host/header.csv".into(),
                time_axis_key: "quarter".into(),
                parsed_rows: 0,
            }
        );
    }

    #[test]
    fn rows_without_time_axis_are_no_valid_rows() {
        let config = config_with(&["dated"]);
        let f = fetcher(&[("dated", "date,value\n2024-01,100\n2024-02,120\n")]);
        let err = load_source(&config, &f, "dated").unwrap_err();
        assert!(matches!(err, PipelineError::NoValidRows { parsed_rows: 2, .. }));
    }

    #[test]
    fn report_status_reflects_counts() {
        let config = Arc::new(config_with(&["a", "b"]));
        let ok = "quarter,urate\n2020Q1,1\n";

        let all: Arc<dyn Fetch> = Arc::new(fetcher(&[("a", ok), ("b", ok)]));
        assert_eq!(load_all(&config, &all).status, LoadStatus::Complete);

        let one: Arc<dyn Fetch> = Arc::new(fetcher(&[("b", ok)]));
        let report = load_all(&config, &one);
        assert_eq!(report.status, LoadStatus::Partial);
        assert_eq!((report.loaded(), report.failed()), (1, 1));

        let none: Arc<dyn Fetch> = Arc::new(fetcher(&[]));
        assert_eq!(load_all(&config, &none).status, LoadStatus::TotalFailure);

        let empty = Arc::new(config_with(&[]));
        assert_eq!(load_all(&empty, &none).status, LoadStatus::NoSources);
    }

    #[test]
    fn unfinished_sources_are_timeouts_only_past_the_deadline() {
        let entry = SourceEntry::new("japan", "Japan", "https://host/japan.csv");

        let lost = unfinished(&entry, None, false);
        assert!(matches!(
            lost,
            PipelineError::FetchFailed {
                kind: FetchFailure::WorkerFailed,
                status: None,
                ..
            }
        ));
        assert_eq!(lost.report().fetch_failure, Some(FetchFailure::WorkerFailed));

        let late = unfinished(&entry, Some(Duration::from_millis(250)), true);
        match late {
            PipelineError::FetchFailed { kind, message, .. } => {
                assert_eq!(kind, FetchFailure::Timeout);
                assert!(message.contains("250 ms"));
            }
            other => panic!("expected a timeout, got {other:?}"),
        }
    }

    #[test]
    fn worker_failure_serializes_as_its_own_kind() {
        assert_eq!(
            serde_json::to_value(FetchFailure::WorkerFailed).unwrap(),
            "worker_failed"
        );
    }

    #[test]
    fn outcome_json_separates_data_from_error() {
        let config = Arc::new(config_with(&["a", "b"]));
        let f: Arc<dyn Fetch> = Arc::new(fetcher(&[("a", "quarter,urate\n2020Q1,1\n")]));
        let json = serde_json::to_value(load_all(&config, &f)).unwrap();

        assert_eq!(json["status"], "partial");
        let a = &json["sources"][0];
        assert_eq!(a["key"], "a");
        assert_eq!(a["data"]["records"][0]["quarter"], "2020Q1");
        assert_eq!(a["data"]["meta"]["sourceKey"], "a");
        assert!(a.get("error").is_none());

        let b = &json["sources"][1];
        assert!(b.get("data").is_none());
        assert_eq!(b["error"]["errorKind"], "FetchFailed");
        assert_eq!(b["error"]["underlyingStatus"], 404);
    }
}
