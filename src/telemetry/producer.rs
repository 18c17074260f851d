use std::{io::BufRead, path::Path};

use log::{error, info};
use serde_jsonlines::JsonLinesReader;

use crate::EcoDriveError;

use super::TripRecord;

/// A source of location and motion samples for one trip.
///
/// Live deployments forward platform sensor callbacks; recorded trips replay
/// a JSON Lines file of `TripRecord`s in timestamp order.
///
/// # Lifecycle
///
/// 1. Call `start()` to open the underlying source
/// 2. Call `next_record()` until it returns `Ok(None)`
pub trait SensorProducer {
    fn start(&mut self) -> Result<(), EcoDriveError>;

    /// Next sample, or `None` once the source is exhausted.
    fn next_record(&mut self) -> Result<Option<TripRecord>, EcoDriveError>;
}

/// Replays a recorded trip, either from memory or from a JSON Lines file
/// written with one `TripRecord` per line.
#[derive(Debug, Default)]
pub struct RecordedTripProducer {
    cur_tick: usize,
    records: Vec<TripRecord>,
}

impl RecordedTripProducer {
    pub fn from_records(records: Vec<TripRecord>) -> Self {
        Self {
            cur_tick: 0,
            records,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or a line is not a valid `TripRecord`.
    pub fn from_file(path: &Path) -> Result<Self, EcoDriveError> {
        let lines = serde_jsonlines::json_lines::<TripRecord, _>(path).map_err(|e| {
            EcoDriveError::SensorProducerError {
                description: format!("Could not open recorded trip {:?}: {}", path, e),
            }
        })?;

        let mut records = Vec::new();
        for (line_no, record) in lines.enumerate() {
            let record = record.map_err(|e| {
                error!("Could not parse line {} of {:?}: {}", line_no + 1, path, e);
                EcoDriveError::SensorProducerError {
                    description: format!("Could not parse line {}: {}", line_no + 1, e),
                }
            })?;
            records.push(record);
        }

        info!("Loaded {} samples from {:?}", records.len(), path);
        Ok(Self::from_records(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SensorProducer for RecordedTripProducer {
    fn start(&mut self) -> Result<(), EcoDriveError> {
        self.cur_tick = 0;
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<TripRecord>, EcoDriveError> {
        let record = self.records.get(self.cur_tick).copied();
        if record.is_some() {
            self.cur_tick += 1;
        }
        Ok(record)
    }
}

/// Reads `TripRecord`s one line at a time as a sensor bridge writes them,
/// e.g. from stdin.
pub struct StreamingTripProducer<R: BufRead> {
    reader: JsonLinesReader<R>,
    line_no: usize,
}

impl<R: BufRead> StreamingTripProducer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: JsonLinesReader::new(reader),
            line_no: 0,
        }
    }
}

impl<R: BufRead> SensorProducer for StreamingTripProducer<R> {
    fn start(&mut self) -> Result<(), EcoDriveError> {
        info!("Waiting for sensor records");
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<TripRecord>, EcoDriveError> {
        self.line_no += 1;
        self.reader.read::<TripRecord>().map_err(|e| {
            error!("Could not read sensor record {}: {}", self.line_no, e);
            EcoDriveError::SensorProducerError {
                description: format!("Invalid sensor record {}: {}", self.line_no, e),
            }
        })
    }
}
