//! Replay mode: score a recording of face observations.

use std::path::Path;

use chrono::Utc;
use emoscan_media::detector::read_observations;
use emoscan_media::session::SessionLogger;
use emoscan_media::{metrics, EmotionScorer, MediaError, ScorerConfig};
use emoscan_models::{EmotionReading, SessionId, SessionSummary};
use tokio::sync::watch;

use crate::error::WorkerResult;
use crate::output::ReadingWriter;

/// Score every recorded frame in order and write one reading per frame.
///
/// Stops early when `shutdown` flips.
pub async fn replay(
    path: &Path,
    scorer_config: ScorerConfig,
    writer: &mut ReadingWriter,
    shutdown: &watch::Receiver<bool>,
) -> WorkerResult<SessionSummary> {
    let session_id = SessionId::new();
    let logger = SessionLogger::new(&session_id, "replay");

    let owned = path.to_path_buf();
    let frames = tokio::task::spawn_blocking(move || read_observations(&owned))
        .await
        .map_err(|e| MediaError::internal(format!("Recording load task failed: {e}")))??;
    logger.log_start(&format!("{} frames from {}", frames.len(), path.display()));

    let scorer = EmotionScorer::new(scorer_config);
    let mut summary = SessionSummary::new();

    for (sequence, observation) in frames.iter().enumerate() {
        if *shutdown.borrow() {
            logger.log_warning("Stop requested, replay cut short");
            break;
        }

        let distribution = scorer.score(observation.as_ref());
        let reading = EmotionReading {
            session_id: session_id.clone(),
            sequence: sequence as u64,
            captured_at: Utc::now(),
            face_detected: observation.is_some(),
            distribution,
        };
        match reading.dominant() {
            Some(label) if reading.face_detected => metrics::record_frame_scored(label.as_str()),
            _ => metrics::record_no_face(),
        }
        summary.record(&reading);
        writer.write_reading(&reading).await?;
    }

    logger.log_completion(&format!(
        "readings={} no_face={} dominant={:?}",
        summary.readings,
        summary.no_face,
        summary.dominant()
    ));
    Ok(summary)
}
