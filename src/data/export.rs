use std::io::Write;

use csv::{QuoteStyle, Terminator, WriterBuilder};

use super::model::NormalizedSeries;

/// Columns of the first record, in encounter order.
pub fn export_header(series: &NormalizedSeries) -> Vec<&str> {
    series
        .records()
        .first()
        .map(|r| r.columns().collect())
        .unwrap_or_default()
}

/// Write a series as delimited text.
///
/// Every field is quoted and embedded quotes are doubled (RFC 4180), so
/// values containing the delimiter or `"` survive a re-parse. Columns not in
/// the first record are not exported; missing cells become empty strings.
pub fn write_csv<W: Write>(series: &NormalizedSeries, delimiter: u8, writer: W) -> Result<(), csv::Error> {
    let header = export_header(series);
    if header.is_empty() {
        return Ok(());
    }

    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .double_quote(true)
        .delimiter(delimiter)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer);

    wtr.write_record(&header)?;
    for record in series.records() {
        wtr.write_record(header.iter().map(|c| record.get(c).unwrap_or("")))?;
    }
    wtr.flush()?;
    Ok(())
}

/// [`write_csv`] into a `String`.
pub fn to_csv_string(series: &NormalizedSeries, delimiter: u8) -> Result<String, csv::Error> {
    let mut buf = Vec::new();
    write_csv(series, delimiter, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
