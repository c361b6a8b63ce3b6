//! Analysis session loop.
//!
//! These run on real time with short intervals: inference happens on the
//! blocking pool, which a paused clock would race past.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{smiling_face, FailingModel, FixedModel, PanicOnceModel, SlowModel, StaticLoader};
use emoscan_media::{
    BlankFrameSource, DetectorHandle, DetectorSlot, EmotionSession, FaceMeshModel, ReplayLoader,
    SessionConfig,
};
use emoscan_models::{EmotionLabel, EmotionReading, SessionId};
use tokio::sync::mpsc;

fn fast_config() -> SessionConfig {
    SessionConfig::default()
        .with_tick_interval(Duration::from_millis(100))
        .with_inference_timeout(Duration::from_millis(500))
}

fn handle_for(model: impl FaceMeshModel + 'static) -> DetectorHandle {
    DetectorHandle::new(Arc::new(model))
}

fn drain(rx: &mut mpsc::Receiver<EmotionReading>) -> Vec<EmotionReading> {
    let mut readings = Vec::new();
    while let Ok(reading) = rx.try_recv() {
        readings.push(reading);
    }
    readings
}

#[tokio::test]
async fn test_publishes_one_reading_per_frame() {
    let (tx, mut rx) = mpsc::channel(16);
    let session = EmotionSession::new(fast_config(), handle_for(FixedModel::new(Some(smiling_face()))))
        .with_id(SessionId::from_string("session-1"));

    let outcome = session
        .spawn(BlankFrameSource::new(Some(3)), tx)
        .join()
        .await
        .unwrap();

    assert_eq!(outcome.readings, 3);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(outcome.summary.dominant(), Some(EmotionLabel::Happy));

    let readings = drain(&mut rx);
    assert_eq!(readings.len(), 3);
    for (i, reading) in readings.iter().enumerate() {
        assert_eq!(reading.sequence, i as u64);
        assert_eq!(reading.session_id.as_str(), "session-1");
        assert!(reading.face_detected);
        assert_eq!(reading.distribution.percentage(EmotionLabel::Happy), Some(86));
    }
    assert!(readings.windows(2).all(|w| w[0].captured_at <= w[1].captured_at));
}

#[tokio::test]
async fn test_no_face_publishes_neutral_default() {
    let (tx, mut rx) = mpsc::channel(16);
    let outcome = EmotionSession::new(fast_config(), handle_for(FixedModel::new(None)))
        .spawn(BlankFrameSource::new(Some(2)), tx)
        .join()
        .await
        .unwrap();

    assert_eq!(outcome.summary.no_face, 2);
    assert_eq!(outcome.summary.face_ratio(), 0.0);
    for reading in drain(&mut rx) {
        assert!(!reading.face_detected);
        assert!(reading.distribution.is_neutral_default());
    }
}

#[tokio::test]
async fn test_slow_inference_times_out_and_skips_ticks() {
    let model = Arc::new(SlowModel::new(Duration::from_millis(450)));
    let (tx, mut rx) = mpsc::channel(16);
    let config = fast_config().with_inference_timeout(Duration::from_millis(50));

    let handle = EmotionSession::new(config, DetectorHandle::new(model.clone()))
        .spawn(BlankFrameSource::new(None), tx);
    tokio::time::sleep(Duration::from_millis(380)).await;
    let outcome = handle.stop().await.unwrap();

    assert!(outcome.timeouts >= 1, "{outcome:?}");
    assert!(outcome.skipped >= 1, "{outcome:?}");
    assert_eq!(outcome.readings, 0);
    // The timed-out call was never duplicated while it was still running.
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_failed_inference_publishes_nothing() {
    let (tx, mut rx) = mpsc::channel(16);
    let outcome = EmotionSession::new(fast_config(), handle_for(FailingModel))
        .spawn(BlankFrameSource::new(Some(2)), tx)
        .join()
        .await
        .unwrap();

    assert_eq!(outcome.failures, 2);
    assert_eq!(outcome.readings, 0);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_stop_ends_session() {
    let (tx, mut rx) = mpsc::channel(64);
    let handle = EmotionSession::new(fast_config(), handle_for(FixedModel::new(Some(smiling_face()))))
        .spawn(BlankFrameSource::new(None), tx);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!handle.is_finished());
    let outcome = handle.stop().await.unwrap();

    assert!(outcome.readings >= 1);
    let readings = drain(&mut rx);
    assert_eq!(readings.len() as u64, outcome.readings);
    // Sender is gone once the loop exits.
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_dropping_handle_stops_session() {
    let (tx, mut rx) = mpsc::channel(64);
    let handle = EmotionSession::new(fast_config(), handle_for(FixedModel::new(None)))
        .spawn(BlankFrameSource::new(None), tx);
    drop(handle);

    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        while rx.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok());
}

#[tokio::test]
async fn test_dropped_receiver_ends_session() {
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let outcome = EmotionSession::new(fast_config(), handle_for(FixedModel::new(None)))
        .spawn(BlankFrameSource::new(None), tx)
        .join()
        .await
        .unwrap();
    assert_eq!(outcome.ticks, 1);
    assert_eq!(outcome.readings, 0);
    assert_eq!(outcome.summary.readings, 0);
}

#[tokio::test]
async fn test_panic_after_timeout_does_not_wedge_session() {
    let model = Arc::new(PanicOnceModel::new(Duration::from_millis(150)));
    let (tx, mut rx) = mpsc::channel(64);
    let config = fast_config().with_inference_timeout(Duration::from_millis(50));

    let handle = EmotionSession::new(config, DetectorHandle::new(model.clone()))
        .spawn(BlankFrameSource::new(None), tx);
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let outcome = handle.stop().await.unwrap();

    assert_eq!(outcome.timeouts, 1, "{outcome:?}");
    assert!(outcome.readings >= 1, "{outcome:?}");
    assert!(model.calls.load(Ordering::SeqCst) >= 2);
    let readings = drain(&mut rx);
    assert_eq!(readings.len() as u64, outcome.readings);
    assert_eq!(readings[0].dominant(), Some(EmotionLabel::Happy));
}

#[tokio::test]
async fn test_session_survives_detector_teardown() {
    let loader = Arc::new(StaticLoader::new(Arc::new(FixedModel::new(Some(smiling_face())))));
    let slot = DetectorSlot::new(loader);
    let detector = slot.initialize().await.unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    let handle = EmotionSession::new(fast_config(), detector).spawn(BlankFrameSource::new(Some(3)), tx);
    assert!(slot.teardown());

    let outcome = handle.join().await.unwrap();
    assert_eq!(outcome.readings, 3);
    assert_eq!(drain(&mut rx).len(), 3);
}

#[tokio::test]
async fn test_replayed_recording() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{}", serde_json::to_string(&smiling_face()).unwrap()).unwrap();
    writeln!(file, "null").unwrap();

    let slot = DetectorSlot::new(Arc::new(ReplayLoader::new(file.path())));
    let detector = slot.initialize().await.unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    let outcome = EmotionSession::new(fast_config(), detector)
        .spawn(BlankFrameSource::new(Some(2)), tx)
        .join()
        .await
        .unwrap();

    assert_eq!(outcome.readings, 2);
    let readings = drain(&mut rx);
    assert_eq!(readings[0].dominant(), Some(EmotionLabel::Happy));
    assert!(!readings[1].face_detected);
}

#[tokio::test]
async fn test_inference_panic_counts_as_failure() {
    let model = PanicOnceModel::new(Duration::ZERO);
    let (tx, mut rx) = mpsc::channel(16);
    let outcome = EmotionSession::new(fast_config(), handle_for(model))
        .spawn(BlankFrameSource::new(Some(3)), tx)
        .join()
        .await
        .unwrap();

    assert_eq!(outcome.failures, 1);
    assert_eq!(outcome.readings, 2);
    assert_eq!(drain(&mut rx).len(), 2);
}
