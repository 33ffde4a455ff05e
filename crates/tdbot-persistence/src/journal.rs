//! JSON Lines journal of detector readings.
//!
//! One file per UTC day (`signals_YYYY-MM-DD.jsonl`), opened in append
//! mode, so an interrupted write only affects its own line. Records are
//! buffered and written on [`SignalJournal::flush`], when the buffer fills,
//! or on drop.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tdbot_core::{Instrument, TimeframeId};
use tdbot_detector::{SequenceReading, SignalSide};
use tracing::{debug, info, warn};

use crate::error::PersistenceResult;

/// One detector reading as journaled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub recorded_at: DateTime<Utc>,
    pub instrument: Instrument,
    pub timeframe: TimeframeId,
    pub variant: String,
    pub side: SignalSide,
    pub strength: u32,
    pub confirmed: bool,
    pub countdown: u32,
    pub bar_index: usize,
    pub bar_open_time: DateTime<Utc>,
}

impl SignalRecord {
    pub fn from_reading(
        recorded_at: DateTime<Utc>,
        instrument: Instrument,
        timeframe: TimeframeId,
        variant: &str,
        reading: &SequenceReading,
    ) -> Self {
        Self {
            recorded_at,
            instrument,
            timeframe,
            variant: variant.to_string(),
            side: reading.signal.side,
            strength: reading.signal.strength,
            confirmed: reading.signal.confirmed,
            countdown: reading.countdown,
            bar_index: reading.bar_index,
            bar_open_time: reading.open_time,
        }
    }
}

/// Writer for the day currently being appended to.
struct ActiveWriter {
    writer: BufWriter<File>,
    date: NaiveDate,
    records_written: usize,
}

/// Buffered, day-rotated JSON Lines journal.
pub struct SignalJournal {
    base_dir: PathBuf,
    buffer: Vec<SignalRecord>,
    max_buffer_size: usize,
    active_writer: Option<ActiveWriter>,
}

impl SignalJournal {
    /// Open a journal under `base_dir`, creating the directory.
    pub fn open(base_dir: impl AsRef<Path>, max_buffer_size: usize) -> PersistenceResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            buffer: Vec::with_capacity(max_buffer_size),
            max_buffer_size: max_buffer_size.max(1),
            active_writer: None,
        })
    }

    /// Path of the file holding records of `date`.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.base_dir
            .join(format!("signals_{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Buffer a record, flushing when the buffer is full.
    pub fn append(&mut self, record: SignalRecord) -> PersistenceResult<()> {
        self.buffer.push(record);
        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Write buffered records, each to the file of its own UTC day.
    pub fn flush(&mut self) -> PersistenceResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let records = std::mem::take(&mut self.buffer);
        let count = records.len();
        for record in &records {
            let date = record.recorded_at.date_naive();
            let active = self.writer_for(date)?;
            let json = serde_json::to_string(record)?;
            writeln!(active.writer, "{}", json)?;
            active.records_written += 1;
        }

        if let Some(active) = self.active_writer.as_mut() {
            active.writer.flush()?;
        }
        debug!(records = count, "Flushed signal journal");
        Ok(())
    }

    /// Flush and close the current file.
    pub fn close(&mut self) -> PersistenceResult<()> {
        self.flush()?;
        self.close_active_writer()
    }

    /// Writer for `date`, rotating if the open file is for another day.
    fn writer_for(&mut self, date: NaiveDate) -> PersistenceResult<&mut ActiveWriter> {
        if self.active_writer.as_ref().is_some_and(|w| w.date != date) {
            self.close_active_writer()?;
        }

        let active = match self.active_writer.take() {
            Some(active) => active,
            None => {
                let path = self.path_for(date);
                info!(path = %path.display(), "Opening signal journal (append mode)");
                let file = OpenOptions::new().create(true).append(true).open(&path)?;
                ActiveWriter {
                    writer: BufWriter::new(file),
                    date,
                    records_written: 0,
                }
            }
        };
        Ok(self.active_writer.insert(active))
    }

    fn close_active_writer(&mut self) -> PersistenceResult<()> {
        if let Some(mut active) = self.active_writer.take() {
            active.writer.flush()?;
            info!(
                date = %active.date,
                records = active.records_written,
                "Closed signal journal"
            );
        }
        Ok(())
    }
}

impl Drop for SignalJournal {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(?e, "Failed to flush signal journal on drop");
        }
    }
}
