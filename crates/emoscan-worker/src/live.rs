//! Live mode: frames through the face mesh model.

use std::sync::Arc;
use std::time::Duration;

use emoscan_media::{
    DetectorHandle, DetectorSlot, DirectoryFrameSource, EmotionSession, FrameSource, ModelLoader,
    OrtFaceMeshLoader, SessionConfig, SessionOutcome,
};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::output::ReadingWriter;

const READING_BUFFER: usize = 32;

/// Load the configured face mesh model and run a session over the frame directory.
pub async fn run_live(
    config: &WorkerConfig,
    writer: &mut ReadingWriter,
    shutdown: watch::Receiver<bool>,
) -> WorkerResult<SessionOutcome> {
    let frames_dir = config
        .frames_dir
        .as_deref()
        .ok_or_else(|| WorkerError::config_error("EMOSCAN_FRAMES_DIR is not set"))?;
    let source = DirectoryFrameSource::open(frames_dir, config.loop_frames)?;
    info!(
        dir = %frames_dir.display(),
        frames = source.len(),
        looping = config.loop_frames,
        "Frame directory ready"
    );

    let loader: Arc<dyn ModelLoader> = Arc::new(OrtFaceMeshLoader::new(config.face_mesh.clone()));
    let slot = DetectorSlot::new(loader);
    let detector = slot.initialize().await?;

    let outcome = run_session(
        config.session,
        detector,
        source,
        writer,
        shutdown,
        config.max_duration,
    )
    .await;

    slot.teardown();
    outcome
}

/// Drive a session until it ends, a stop is requested or `max_duration` elapses.
pub async fn run_session<S>(
    session_config: SessionConfig,
    detector: DetectorHandle,
    source: S,
    writer: &mut ReadingWriter,
    mut shutdown: watch::Receiver<bool>,
    max_duration: Option<Duration>,
) -> WorkerResult<SessionOutcome>
where
    S: FrameSource + 'static,
{
    let (tx, mut rx) = mpsc::channel(READING_BUFFER);
    let handle = EmotionSession::new(session_config, detector).spawn(source, tx);
    info!(session_id = %handle.id(), "Session running");

    let deadline = async {
        match max_duration {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut write_error = None;
    let mut shutdown_open = true;
    loop {
        tokio::select! {
            reading = rx.recv() => match reading {
                Some(reading) => {
                    if let Err(e) = writer.write_reading(&reading).await {
                        write_error = Some(e);
                        break;
                    }
                }
                None => break,
            },
            changed = shutdown.changed(), if shutdown_open => match changed {
                Ok(()) if *shutdown.borrow() => {
                    info!("Shutdown requested, stopping session");
                    break;
                }
                Ok(()) => {}
                // No one can request a stop any more.
                Err(_) => shutdown_open = false,
            },
            _ = &mut deadline => {
                info!("Maximum session duration reached");
                break;
            }
        }
    }

    let outcome = handle.stop().await?;

    // Readings published before the loop stopped.
    while let Ok(reading) = rx.try_recv() {
        if write_error.is_some() {
            break;
        }
        if let Err(e) = writer.write_reading(&reading).await {
            write_error = Some(e);
        }
    }

    if let Some(e) = write_error {
        warn!("Writing readings failed: {}", e);
        return Err(e);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use emoscan_media::{BlankFrameSource, ComputeBackend, FaceMeshModel, Frame, MediaResult};
    use emoscan_models::{EmotionReading, FaceObservation};

    use super::*;

    struct NoFace;

    impl FaceMeshModel for NoFace {
        fn estimate_faces(&self, _frame: &Frame) -> MediaResult<Vec<FaceObservation>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &'static str {
            "no_face"
        }

        fn backend(&self) -> ComputeBackend {
            ComputeBackend::None
        }
    }

    fn fast() -> SessionConfig {
        SessionConfig::default().with_tick_interval(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_session_writes_until_source_ends() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("readings.jsonl");
        let mut writer = ReadingWriter::open(Some(&out), None).await.unwrap();
        let (_tx, rx) = watch::channel(false);

        let outcome = run_session(
            fast(),
            DetectorHandle::new(Arc::new(NoFace)),
            BlankFrameSource::new(Some(3)),
            &mut writer,
            rx,
            None,
        )
        .await
        .unwrap();
        assert_eq!(writer.finish().await.unwrap(), 3);
        assert_eq!(outcome.readings, 3);

        let text = std::fs::read_to_string(&out).unwrap();
        let first: EmotionReading = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert!(first.distribution.is_neutral_default());
    }

    #[tokio::test]
    async fn test_session_stops_at_max_duration() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ReadingWriter::open(Some(&dir.path().join("out.jsonl")), None)
            .await
            .unwrap();
        let (_tx, rx) = watch::channel(false);

        let outcome = run_session(
            fast(),
            DetectorHandle::new(Arc::new(NoFace)),
            BlankFrameSource::new(None),
            &mut writer,
            rx,
            Some(Duration::from_millis(250)),
        )
        .await
        .unwrap();
        assert!(outcome.readings >= 1);
        assert_eq!(writer.finish().await.unwrap(), outcome.readings);
    }

    #[tokio::test]
    async fn test_session_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ReadingWriter::open(Some(&dir.path().join("out.jsonl")), None)
            .await
            .unwrap();
        let (tx, rx) = watch::channel(false);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            tx.send(true).ok();
            tx
        });

        let outcome = run_session(
            fast(),
            DetectorHandle::new(Arc::new(NoFace)),
            BlankFrameSource::new(None),
            &mut writer,
            rx,
            None,
        )
        .await
        .unwrap();
        stopper.await.unwrap();
        assert!(outcome.ticks >= 1);
    }

    #[tokio::test]
    async fn test_run_live_requires_frames_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ReadingWriter::open(Some(&dir.path().join("out.jsonl")), None)
            .await
            .unwrap();
        let (_tx, rx) = watch::channel(false);

        let err = run_live(&WorkerConfig::default(), &mut writer, rx)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::ConfigError(_)));
    }
}
