//! Periodic analysis loop.
//!
//! Each tick pulls a frame, runs inference on the blocking pool under a
//! timeout, scores the result and publishes one [`EmotionReading`]. Ticks
//! never overlap: while an inference is still executing (even one whose
//! timeout already fired) new ticks are skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use emoscan_models::{EmotionReading, FaceObservation, SessionId, SessionSummary};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::config::SessionConfig;
use super::logger::SessionLogger;
use super::source::FrameSource;
use crate::detector::{DetectorHandle, Frame};
use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::scoring::{dominant_label, EmotionScorer};

/// Counters for a finished session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session_id: String,
    /// Timer ticks observed.
    pub ticks: u64,
    /// Readings delivered to the sink, one per completed tick.
    pub readings: u64,
    /// Ticks skipped because an inference was still running.
    pub skipped: u64,
    /// Ticks abandoned because inference exceeded its timeout.
    pub timeouts: u64,
    /// Ticks abandoned because the frame source or inference failed.
    pub failures: u64,
    pub summary: SessionSummary,
}

/// Clears the in-flight flag when inference ends, unwinding included.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

enum Inference {
    Done(Option<FaceObservation>),
    TimedOut,
    Failed(MediaError),
    /// The inference task panicked or was cancelled.
    Crashed(String),
}

/// An analysis session that has not been started yet.
pub struct EmotionSession {
    id: SessionId,
    config: SessionConfig,
    detector: DetectorHandle,
    scorer: Arc<EmotionScorer>,
}

impl EmotionSession {
    pub fn new(config: SessionConfig, detector: DetectorHandle) -> Self {
        Self {
            id: SessionId::new(),
            scorer: Arc::new(EmotionScorer::new(config.scorer)),
            config,
            detector,
        }
    }

    pub fn with_id(mut self, id: SessionId) -> Self {
        self.id = id;
        self
    }

    /// Share a scorer between sessions.
    pub fn with_scorer(mut self, scorer: Arc<EmotionScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Start the tick loop on the current runtime.
    ///
    /// The session ends when [`SessionHandle::stop`] is called, the handle is
    /// dropped, the source is exhausted or the reading receiver is dropped.
    pub fn spawn<S>(self, source: S, sink: mpsc::Sender<EmotionReading>) -> SessionHandle
    where
        S: FrameSource + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let id = self.id.clone();
        let task = tokio::spawn(self.run(source, sink, shutdown_rx));
        SessionHandle {
            id,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run<S>(
        self,
        mut source: S,
        sink: mpsc::Sender<EmotionReading>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SessionOutcome
    where
        S: FrameSource + 'static,
    {
        let logger = SessionLogger::new(&self.id, source.name());
        logger.log_start(&format!(
            "tick={}ms timeout={}ms model={} labels={}",
            self.config.tick_interval.as_millis(),
            self.config.inference_timeout.as_millis(),
            self.detector.model_name(),
            self.scorer.label_set(),
        ));

        let mut outcome = SessionOutcome {
            session_id: self.id.to_string(),
            ..SessionOutcome::default()
        };
        let in_flight = Arc::new(AtomicBool::new(false));
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    logger.log_progress("Stop requested");
                    break;
                }
                _ = interval.tick() => {}
            }
            outcome.ticks += 1;

            if in_flight.load(Ordering::Acquire) {
                debug!(session_id = %self.id, "Previous inference still running, skipping tick");
                metrics::record_tick_skipped("in_flight");
                outcome.skipped += 1;
                continue;
            }

            let frame = match source.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    logger.log_progress("Frame source exhausted");
                    break;
                }
                Err(e) => {
                    logger.log_warning(&format!("Frame capture failed: {e}"));
                    outcome.failures += 1;
                    continue;
                }
            };
            let captured_at = Utc::now();

            let inference = tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    logger.log_progress("Stop requested during inference, discarding result");
                    break;
                }
                inference = self.infer(frame, &in_flight) => inference,
            };

            let observation = match inference {
                Inference::Done(observation) => observation,
                Inference::TimedOut => {
                    logger.log_warning(&format!(
                        "Inference exceeded {}ms, tick dropped",
                        self.config.inference_timeout.as_millis()
                    ));
                    metrics::record_tick_skipped("timeout");
                    outcome.timeouts += 1;
                    continue;
                }
                Inference::Failed(e) => {
                    logger.log_warning(&format!("Inference failed: {e}"));
                    outcome.failures += 1;
                    continue;
                }
                Inference::Crashed(reason) => {
                    logger.log_error(&format!("Inference task failed: {reason}"));
                    outcome.failures += 1;
                    continue;
                }
            };

            let face_detected = observation.is_some();
            let distribution = self.scorer.score(observation.as_ref());
            if face_detected {
                metrics::record_frame_scored(dominant_label(&distribution).as_str());
            } else {
                metrics::record_no_face();
            }

            let reading = EmotionReading {
                session_id: self.id.clone(),
                sequence: outcome.readings,
                captured_at,
                face_detected,
                distribution,
            };

            let permit = tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    logger.log_progress("Stop requested while publishing");
                    break;
                }
                permit = sink.reserve() => permit,
            };
            let Ok(permit) = permit else {
                logger.log_progress("Reading receiver dropped");
                break;
            };
            outcome.summary.record(&reading);
            outcome.readings += 1;
            permit.send(reading);
        }

        // Releases the capture device or file handles before reporting.
        drop(source);

        logger.log_completion(&format!(
            "ticks={} readings={} skipped={} timeouts={} failures={}",
            outcome.ticks, outcome.readings, outcome.skipped, outcome.timeouts, outcome.failures
        ));
        outcome
    }

    async fn infer(&self, frame: Frame, in_flight: &Arc<AtomicBool>) -> Inference {
        in_flight.store(true, Ordering::Release);

        let detector = self.detector.clone();
        let flag = Arc::clone(in_flight);
        let started = Instant::now();
        let task = tokio::task::spawn_blocking(move || {
            let _guard = InFlightGuard(flag);
            detector.estimate_faces(&frame)
        });

        match tokio::time::timeout(self.config.inference_timeout, task).await {
            Ok(Ok(Ok(observation))) => {
                metrics::record_inference_duration(started.elapsed().as_secs_f64());
                Inference::Done(observation)
            }
            Ok(Ok(Err(e))) => Inference::Failed(e),
            Ok(Err(e)) => Inference::Crashed(e.to_string()),
            // The blocking task keeps running; its guard clears the flag.
            Err(_) => Inference::TimedOut,
        }
    }
}

/// Control handle for a running session.
///
/// Dropping the handle stops the session.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the timer and wait for the loop to exit.
    ///
    /// A running inference is left to finish on the blocking pool and its
    /// result is discarded.
    pub async fn stop(self) -> MediaResult<SessionOutcome> {
        let Self { shutdown, task, .. } = self;
        // Err only means the loop already exited.
        let _ = shutdown.send(true);
        task.await
            .map_err(|e| MediaError::internal(format!("Session task failed: {e}")))
    }

    /// Wait for the session to end on its own (source exhausted or sink closed).
    pub async fn join(self) -> MediaResult<SessionOutcome> {
        let Self { shutdown, task, .. } = self;
        let outcome = task
            .await
            .map_err(|e| MediaError::internal(format!("Session task failed: {e}")));
        drop(shutdown);
        outcome
    }
}
