//! Detector lifecycle through the public API.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{smiling_face, FixedModel, StaticLoader};
use emoscan_media::{DetectorSlot, DetectorState, Frame, MediaError};

fn slot_with_face() -> (Arc<StaticLoader>, DetectorSlot) {
    let loader = Arc::new(StaticLoader::new(Arc::new(FixedModel::new(Some(smiling_face())))));
    let slot = DetectorSlot::new(loader.clone());
    (loader, slot)
}

#[test]
fn test_estimate_before_initialize_returns_none() {
    let (loader, slot) = slot_with_face();
    assert!(slot.estimate_faces(&Frame::new(8, 8)).is_none());
    assert_eq!(slot.state(), DetectorState::Uninitialized);
    assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_initialize_then_estimate() {
    let (_loader, slot) = slot_with_face();
    let handle = slot.initialize().await.unwrap();

    let face = slot.estimate_faces(&Frame::new(8, 8)).unwrap();
    assert_eq!(face, smiling_face());
    assert_eq!(handle.model_name(), "fixed");
}

#[tokio::test]
async fn test_repeated_initialize_reuses_model() {
    let (loader, slot) = slot_with_face();
    let a = slot.initialize().await.unwrap();
    let b = slot.initialize().await.unwrap();
    assert!(a.same_model(&b));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_teardown_then_reinitialize() {
    let (loader, slot) = slot_with_face();
    let held = slot.initialize().await.unwrap();

    assert!(slot.teardown());
    assert!(matches!(slot.require(), Err(MediaError::DetectorUnavailable)));
    assert!(held.estimate_faces(&Frame::new(8, 8)).unwrap().is_some());

    slot.initialize().await.unwrap();
    assert_eq!(slot.state(), DetectorState::Ready);
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
}

#[test]
fn test_failed_state_reports_error() {
    let slot = DetectorSlot::new(Arc::new(common::FailingLoader));
    let err = tokio_test::block_on(slot.initialize()).unwrap_err();
    assert!(matches!(err, MediaError::ModelNotFound(_)));
    assert_eq!(slot.state(), DetectorState::Failed);
    assert!(slot.last_error().is_some());
    assert!(slot.estimate_faces(&Frame::new(8, 8)).is_none());
}
