use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::mpsc::Receiver,
};

use log::{debug, error};
use serde_jsonlines::JsonLinesWriter;

use crate::{EcoDriveError, telemetry::EcoDriveResult};

/// Writes every received result as one JSON line until the sender side hangs up.
///
/// Returns the last result received, which is the final state of the trip.
pub fn write_results(
    file: &Path,
    result_receiver: Receiver<EcoDriveResult>,
) -> Result<Option<EcoDriveResult>, EcoDriveError> {
    let results_file = File::create(file).map_err(|e| EcoDriveError::WriterError { source: e })?;
    let mut writer = JsonLinesWriter::new(BufWriter::new(results_file));

    let mut last = None;
    for result in &result_receiver {
        if let Err(e) = writer.write(&result) {
            error!("Error while writing result to output file: {}", e);
        }
        last = Some(result);
    }

    writer
        .flush()
        .map_err(|e| EcoDriveError::WriterError { source: e })?;
    debug!("Results written to {:?}", file);
    Ok(last)
}

/// Writes `value` as pretty JSON followed by a newline.
pub fn write_json<T: serde::Serialize>(
    mut out: impl Write,
    value: &T,
) -> Result<(), EcoDriveError> {
    serde_json::to_writer_pretty(&mut out, value)
        .map_err(|e| EcoDriveError::WriterError { source: e.into() })?;
    writeln!(out).map_err(|e| EcoDriveError::WriterError { source: e })
}
