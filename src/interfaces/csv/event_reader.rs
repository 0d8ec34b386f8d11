use crate::error::{PosError, Result};
use serde::Deserialize;
use std::io::Read;

/// One inbound chat event: the session it belongs to and the opaque
/// payload exactly as a transport callback would deliver it.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EventRecord {
    pub session: i64,
    pub payload: String,
}

/// Reads a script of session events from a CSV source.
///
/// Wraps `csv::Reader` and yields `Result<EventRecord>` lazily, so large
/// scripts stream without loading whole into memory.
pub struct EventReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EventReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn events(self) -> impl Iterator<Item = Result<EventRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PosError::from))
    }
}
