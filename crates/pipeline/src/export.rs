//! Tabular export of a result series
//!
//! The table has exactly two columns, `Year` and `Value`. Missing values
//! are written as a token (`No Data` by default), never as zero.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use coralsurf_core::{Error, Result};
use csv::Writer;
use tracing::info;

use crate::series::{ResultSeries, SummaryValue};

fn csv_err(e: csv::Error) -> Error {
    Error::Io(e.into())
}

/// Write `series` as CSV to `writer`
pub fn write_series_csv<W: Write>(series: &ResultSeries, writer: W, missing_token: &str) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(["Year", "Value"]).map_err(csv_err)?;
    for summary in series {
        let value = match summary.value {
            SummaryValue::Value(v) => v.to_string(),
            SummaryValue::NoData(_) => missing_token.to_string(),
        };
        wtr.write_record([summary.year.to_string(), value])
            .map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write `series` as CSV to the file at `path`
pub fn write_series_csv_file<P: AsRef<Path>>(series: &ResultSeries, path: P, missing_token: &str) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_series_csv(series, file, missing_token)?;
    info!(path = ?path.as_ref(), years = series.len(), "Wrote result series");
    Ok(())
}
