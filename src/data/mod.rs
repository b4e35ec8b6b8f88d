/// Data layer: sources, fetching, parsing, normalising, exporting.
///
/// Architecture:
/// ```text
///   SourceRegistry   key → label, locator
///        │
///        ▼
///   ┌──────────┐
///   │  fetch    │  GET locator → RawDocument (timeout, redirect cap)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  parser   │  delimited text → ParsedDocument (records + warnings)
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ normalize │  keep rows with a time-axis value → NormalizedSeries
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  NormalizedSeries → quoted CSV
///   └──────────┘
/// ```

pub mod export;
pub mod fetch;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod registry;
