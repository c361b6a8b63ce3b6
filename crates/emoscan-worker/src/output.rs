//! JSON Lines output.

use std::path::Path;

use emoscan_models::{DetectionMethod, EmotionReading, EmotionRecord};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::debug;
use validator::Validate;

use crate::error::WorkerResult;

type Sink = Box<dyn AsyncWrite + Send + Unpin>;

/// Writes one JSON object per line.
///
/// Without a patient id every reading is written as is. With one, readings
/// that saw a face become validated [`EmotionRecord`]s and no-face readings
/// are left out.
pub struct ReadingWriter {
    sink: BufWriter<Sink>,
    patient_id: Option<String>,
    lines: u64,
}

impl ReadingWriter {
    /// Open `path` for writing, or stdout when `None`.
    pub async fn open(path: Option<&Path>, patient_id: Option<String>) -> WorkerResult<Self> {
        let sink: Sink = match path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                Box::new(tokio::fs::File::create(path).await?)
            }
            None => Box::new(tokio::io::stdout()),
        };
        Ok(Self::from_writer(sink, patient_id))
    }

    pub fn from_writer(sink: Sink, patient_id: Option<String>) -> Self {
        Self {
            sink: BufWriter::new(sink),
            patient_id,
            lines: 0,
        }
    }

    pub async fn write_reading(&mut self, reading: &EmotionReading) -> WorkerResult<()> {
        let Some(patient_id) = self.patient_id.clone() else {
            return self.write_line(reading).await;
        };
        if !reading.face_detected {
            debug!(sequence = reading.sequence, "No face, skipping record");
            return Ok(());
        }
        let Some(mut record) = EmotionRecord::from_distribution(
            patient_id,
            Some(&reading.session_id),
            reading.distribution.clone(),
            DetectionMethod::FacialRecognition,
        ) else {
            return Ok(());
        };
        record.timestamp = reading.captured_at;
        record.validate()?;
        self.write_line(&record).await
    }

    async fn write_line<T: Serialize>(&mut self, value: &T) -> WorkerResult<()> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');
        self.sink.write_all(&line).await?;
        self.lines += 1;
        Ok(())
    }

    /// Flush buffered output and return the number of lines written.
    pub async fn finish(mut self) -> WorkerResult<u64> {
        self.sink.flush().await?;
        Ok(self.lines)
    }
}
