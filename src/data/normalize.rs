use super::model::{NormalizedSeries, Record};

/// Zero rows carried a value in the time-axis column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoValidRows {
    /// How many rows the parser produced before filtering.
    pub parsed_rows: usize,
}

/// Keep the rows that have a non-empty `time_axis_key` value.
///
/// Row order is preserved exactly: repeated time-axis values are neither
/// merged nor rejected, and nothing is sorted. Every other column passes
/// through untouched.
pub fn normalize(records: Vec<Record>, time_axis_key: &str) -> Result<NormalizedSeries, NoValidRows> {
    let parsed_rows = records.len();

    let kept: Vec<Record> = records
        .into_iter()
        .filter_map(|mut record| {
            let value = record.get(time_axis_key)?.trim().to_string();
            if value.is_empty() {
                return None;
            }
            record.insert(time_axis_key, value);
            Some(record)
        })
        .collect();

    if kept.is_empty() {
        return Err(NoValidRows { parsed_rows });
    }

    log::debug!(
        "kept {} of {parsed_rows} rows with a '{time_axis_key}' value",
        kept.len()
    );

    Ok(NormalizedSeries {
        time_axis_key: time_axis_key.to_string(),
        records: kept,
    })
}
