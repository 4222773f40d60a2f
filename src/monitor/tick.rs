use super::state::MonitorState;
use super::status::MonitorStatus;
use crate::alert::{AlertDispatcher, AlertPayload};
use crate::common::Clock;
use crate::config::MonitorSettings;
use crate::error::TickError;
use crate::intake::FrameSource;
use crate::pipeline::classifier::Classifier;
use crate::pipeline::preprocessing::{ImagePreprocessor, PreprocessedImage};
use crate::pipeline::scoring::{ConfidenceScorer, DetectionResult};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a classified frame contributed before any state was touched.
pub struct Observation {
    pub detection: DetectionResult,
    pub image: PreprocessedImage,
}

#[derive(Debug)]
pub enum TickOutcome {
    /// The tick forfeited its contribution; no state changed.
    Skipped(TickError),
    /// The monitor stopped while the tick was in flight; results were dropped.
    Discarded,
    Completed {
        status: MonitorStatus,
        alert_dispatched: bool,
    },
}

/// Runs one capture → classify → decide → maybe-alert iteration.
///
/// Holds the collaborators only; decision state is passed in by the scheduler.
pub struct TickEngine {
    frame_source: Arc<dyn FrameSource>,
    preprocessor: ImagePreprocessor,
    classifier: Arc<dyn Classifier>,
    scorer: ConfidenceScorer,
    dispatcher: Arc<dyn AlertDispatcher>,
    clock: Arc<dyn Clock>,
    status_tx: broadcast::Sender<MonitorStatus>,
    device_id: String,
    settings: MonitorSettings,
    last_accepted_alert_ms: AtomicI64,
}

const NO_ALERT: i64 = i64::MIN;

impl TickEngine {
    pub fn new(
        settings: MonitorSettings,
        frame_source: Arc<dyn FrameSource>,
        classifier: Arc<dyn Classifier>,
        dispatcher: Arc<dyn AlertDispatcher>,
        clock: Arc<dyn Clock>,
        status_tx: broadcast::Sender<MonitorStatus>,
        device_id: String,
    ) -> Self {
        Self {
            frame_source,
            preprocessor: ImagePreprocessor::new(),
            classifier,
            scorer: ConfidenceScorer::new(settings.fire_confidence_threshold),
            dispatcher,
            clock,
            status_tx,
            device_id,
            settings,
            last_accepted_alert_ms: AtomicI64::new(NO_ALERT),
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn initial_state(&self) -> MonitorState {
        MonitorState::new(&self.settings)
    }

    /// Time of the latest alert this engine accepted for dispatch.
    pub fn last_accepted_alert_ms(&self) -> Option<i64> {
        match self.last_accepted_alert_ms.load(Ordering::SeqCst) {
            NO_ALERT => None,
            ms => Some(ms),
        }
    }

    /// Fresh state that still honours the cooldown of the last accepted alert.
    ///
    /// Used when the state owned by a scheduler task was lost with the task.
    pub fn recovered_state(&self) -> MonitorState {
        let mut state = self.initial_state();
        if let Some(ms) = self.last_accepted_alert_ms() {
            state.cooldown.restore(ms);
        }
        state
    }

    pub async fn tick(&self, state: &mut MonitorState, cancel_token: &CancellationToken) -> TickOutcome {
        // Nothing is touched before observe returns, so abandoning it is safe.
        let observed = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                debug!("Monitor stopped while observing; abandoning tick");
                return TickOutcome::Discarded;
            }
            observed = self.observe() => observed,
        };

        let observation = match observed {
            Ok(observation) => observation,
            Err(TickError::FrameUnavailable) => {
                debug!("No frame available; skipping tick");
                return TickOutcome::Skipped(TickError::FrameUnavailable);
            }
            Err(e) => {
                warn!("Skipping tick: {}", e);
                return TickOutcome::Skipped(e);
            }
        };

        if cancel_token.is_cancelled() {
            debug!("Monitor stopped during tick; discarding result");
            return TickOutcome::Discarded;
        }

        self.decide(state, observation)
    }

    /// Capture, preprocess, classify and score. Touches no decision state.
    pub async fn observe(&self) -> Result<Observation, TickError> {
        let frame = self
            .frame_source
            .capture_frame()
            .await
            .ok_or(TickError::FrameUnavailable)?;

        let preprocessor = self.preprocessor.clone();
        let image = tokio::task::spawn_blocking(move || preprocessor.preprocess(&frame)).await??;

        let scores = self.classifier.classify(&image).await?;
        debug!("{} scores: {:?}", self.classifier.name(), scores);
        let detection = self.scorer.score(&scores)?;

        Ok(Observation { detection, image })
    }

    /// Applies one observation to the gates, publishes status and dispatches any alert.
    pub fn decide(&self, state: &mut MonitorState, observation: Observation) -> TickOutcome {
        let Observation { detection, image } = observation;

        let hits = state.debounce.update(detection.is_positive);
        let status = MonitorStatus {
            label: detection.label(),
            confidence: detection.confidence,
            hits,
            required: state.debounce.required(),
        };
        // No subscribers is fine.
        let _ = self.status_tx.send(status.clone());
        debug!("Tick status: {}", status);

        let mut alert_dispatched = false;
        if state.debounce.is_confirmed() {
            let now_ms = self.clock.now_ms();
            if state.cooldown.try_acquire(now_ms) {
                self.last_accepted_alert_ms
                    .fetch_max(now_ms, Ordering::SeqCst);
                info!(
                    confidence = detection.confidence,
                    consecutive_hits = hits,
                    "Fire confirmed; dispatching alert"
                );
                self.dispatcher.dispatch(AlertPayload::new(
                    self.device_id.clone(),
                    now_ms,
                    detection.confidence,
                    hits,
                    Some(image.evidence()),
                ));
                // Reset on acceptance, not on upload success.
                state.debounce.reset();
                alert_dispatched = true;
            } else {
                debug!(
                    consecutive_hits = hits,
                    "Fire confirmed but alert suppressed by cooldown"
                );
            }
        }

        TickOutcome::Completed {
            status,
            alert_dispatched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScoringError;
    use crate::monitor::testing::{
        scores_for, ManualClock, RecordingDispatcher, ScriptedClassifier, StaticFrameSource,
        WhenExhausted,
    };
    use std::time::Duration;
    use crate::pipeline::scoring::DetectionLabel;

    struct Harness {
        engine: TickEngine,
        source: Arc<StaticFrameSource>,
        classifier: Arc<ScriptedClassifier>,
        dispatcher: Arc<RecordingDispatcher>,
        clock: Arc<ManualClock>,
        status_rx: broadcast::Receiver<MonitorStatus>,
        token: CancellationToken,
    }

    impl Harness {
        fn new(script: Vec<Vec<f32>>) -> Self {
            Self::with_classifier(Arc::new(ScriptedClassifier::new(script)), CancellationToken::new())
        }

        fn with_classifier(classifier: Arc<ScriptedClassifier>, token: CancellationToken) -> Self {
            let source = Arc::new(StaticFrameSource::new());
            let dispatcher = Arc::new(RecordingDispatcher::default());
            let clock = ManualClock::new(1_700_000_000_000);
            let (status_tx, status_rx) = broadcast::channel(64);
            let engine = TickEngine::new(
                MonitorSettings::default(),
                source.clone(),
                classifier.clone(),
                dispatcher.clone(),
                clock.clone(),
                status_tx,
                "cam-1".to_string(),
            );
            Self {
                engine,
                source,
                classifier,
                dispatcher,
                clock,
                status_rx,
                token,
            }
        }

        async fn run(&self, state: &mut MonitorState, ticks: usize) -> Vec<TickOutcome> {
            let mut outcomes = Vec::new();
            for _ in 0..ticks {
                outcomes.push(self.engine.tick(state, &self.token).await);
            }
            outcomes
        }
    }

    fn dispatched(outcome: &TickOutcome) -> bool {
        matches!(
            outcome,
            TickOutcome::Completed {
                alert_dispatched: true,
                ..
            }
        )
    }

    #[tokio::test]
    async fn three_consecutive_hits_dispatch_one_alert() {
        let h = Harness::new(vec![scores_for(0.9), scores_for(0.85), scores_for(0.95)]);
        let mut state = h.engine.initial_state();

        let outcomes = h.run(&mut state, 3).await;
        assert!(!dispatched(&outcomes[0]));
        assert!(!dispatched(&outcomes[1]));
        assert!(dispatched(&outcomes[2]));

        let alerts = h.dispatcher.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].consecutive_hits(), 3);
        assert_eq!(alerts[0].device_id(), "cam-1");
        assert_eq!(alerts[0].timestamp_ms(), 1_700_000_000_000);
        assert!((alerts[0].confidence() - 0.95).abs() < 1e-4);
        assert_eq!(
            alerts[0].evidence_image().map(|image| image.dimensions()),
            Some((224, 224))
        );

        assert_eq!(state.debounce.consecutive_hits(), 0);
        assert_eq!(state.cooldown.last_alert_ms(), Some(1_700_000_000_000));
    }

    #[tokio::test]
    async fn a_miss_restarts_the_run() {
        let h = Harness::new(vec![
            scores_for(0.9),
            scores_for(0.9),
            scores_for(0.1),
            scores_for(0.9),
            scores_for(0.9),
            scores_for(0.9),
        ]);
        let mut state = h.engine.initial_state();

        let outcomes = h.run(&mut state, 6).await;
        let fired: Vec<bool> = outcomes.iter().map(dispatched).collect();
        assert_eq!(fired, vec![false, false, false, false, false, true]);
        assert_eq!(h.dispatcher.count(), 1);
    }

    #[tokio::test]
    async fn cooldown_suppresses_second_sequence_without_reset() {
        let h = Harness::new((0..7).map(|_| scores_for(0.9)).collect());
        let mut state = h.engine.initial_state();

        h.run(&mut state, 3).await;
        assert_eq!(h.dispatcher.count(), 1);

        h.clock.set(1_700_000_010_000);
        let outcomes = h.run(&mut state, 3).await;
        assert!(outcomes.iter().all(|outcome| !dispatched(outcome)));
        assert_eq!(h.dispatcher.count(), 1);
        // Suppressed confirmations keep counting.
        assert_eq!(state.debounce.consecutive_hits(), 3);
        assert_eq!(state.cooldown.last_alert_ms(), Some(1_700_000_000_000));

        h.clock.set(1_700_000_060_000);
        let outcomes = h.run(&mut state, 1).await;
        assert!(dispatched(&outcomes[0]));
        let alerts = h.dispatcher.alerts.lock().unwrap();
        assert_eq!(alerts[1].consecutive_hits(), 4);
        assert_eq!(state.debounce.consecutive_hits(), 0);
    }

    #[tokio::test]
    async fn malformed_scores_leave_state_untouched_and_publish_nothing() {
        let mut h = Harness::new(vec![scores_for(0.9), scores_for(0.9), vec![4.2]]);
        let mut state = h.engine.initial_state();

        h.run(&mut state, 2).await;
        while h.status_rx.try_recv().is_ok() {}
        let hits_before = state.debounce.consecutive_hits();

        let outcomes = h.run(&mut state, 1).await;
        assert!(matches!(
            outcomes[0],
            TickOutcome::Skipped(TickError::InvalidScoreVector(ScoringError::TooFewScores(1)))
        ));
        assert_eq!(state.debounce.consecutive_hits(), hits_before);
        assert_eq!(state.cooldown.last_alert_ms(), None);
        assert!(h.status_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn missing_frame_skips_without_classifying() {
        let h = Harness::new(vec![scores_for(0.9)]);
        let mut state = h.engine.initial_state();
        h.source.set_available(false);

        let outcomes = h.run(&mut state, 1).await;
        assert!(matches!(
            outcomes[0],
            TickOutcome::Skipped(TickError::FrameUnavailable)
        ));

        // The scripted scores were not consumed.
        h.source.set_available(true);
        let outcomes = h.run(&mut state, 1).await;
        assert!(matches!(outcomes[0], TickOutcome::Completed { .. }));
        assert_eq!(state.debounce.consecutive_hits(), 1);
    }

    #[tokio::test]
    async fn empty_frame_is_a_preprocessing_skip() {
        let h = Harness::new(vec![scores_for(0.9)]);
        let mut state = h.engine.initial_state();
        h.source.set_empty_frames(true);

        let outcomes = h.run(&mut state, 1).await;
        assert!(matches!(
            outcomes[0],
            TickOutcome::Skipped(TickError::Preprocessing(_))
        ));
        assert_eq!(state.debounce.consecutive_hits(), 0);
    }

    #[tokio::test]
    async fn classifier_failure_is_tolerated_indefinitely() {
        let h = Harness::new(vec![]);
        let mut state = h.engine.initial_state();

        let outcomes = h.run(&mut state, 5).await;
        assert!(outcomes
            .iter()
            .all(|outcome| matches!(outcome, TickOutcome::Skipped(TickError::Classification(_)))));

        h.classifier.push(scores_for(0.9));
        let outcomes = h.run(&mut state, 1).await;
        assert!(matches!(outcomes[0], TickOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn publishes_status_for_every_completed_tick() {
        let mut h = Harness::new(vec![scores_for(0.9), scores_for(0.2)]);
        let mut state = h.engine.initial_state();
        h.run(&mut state, 2).await;

        let first = h.status_rx.try_recv().unwrap();
        assert_eq!(first.label, DetectionLabel::Fire);
        assert_eq!((first.hits, first.required), (1, 3));

        let second = h.status_rx.try_recv().unwrap();
        assert_eq!(second.label, DetectionLabel::NoFire);
        assert!((second.confidence - 0.2).abs() < 1e-4);
        assert_eq!(second.hits, 0);
    }

    #[tokio::test]
    async fn stop_during_classification_discards_the_result() {
        let token = CancellationToken::new();
        let classifier = Arc::new(ScriptedClassifier::cancelling(
            vec![scores_for(0.99)],
            token.clone(),
        ));
        let mut h = Harness::with_classifier(classifier, token);
        let mut state = h.engine.initial_state();
        state.debounce.update(true);
        state.debounce.update(true);

        let outcomes = h.run(&mut state, 1).await;
        assert!(matches!(outcomes[0], TickOutcome::Discarded));
        assert_eq!(state.debounce.consecutive_hits(), 2);
        assert_eq!(h.dispatcher.count(), 0);
        assert!(h.status_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_a_hung_classification() {
        let classifier =
            Arc::new(ScriptedClassifier::new(vec![]).when_exhausted(WhenExhausted::Hang));
        let mut h = Harness::with_classifier(classifier, CancellationToken::new());
        let mut state = h.engine.initial_state();
        state.debounce.update(true);

        let token = h.token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let outcome = h.engine.tick(&mut state, &h.token).await;
        assert!(matches!(outcome, TickOutcome::Discarded));
        assert_eq!(state.debounce.consecutive_hits(), 1);
        assert!(h.status_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn recovered_state_keeps_the_last_accepted_alert() {
        let h = Harness::new((0..3).map(|_| scores_for(0.9)).collect());
        assert!(h.engine.recovered_state().cooldown.last_alert_ms().is_none());

        let mut state = h.engine.initial_state();
        h.run(&mut state, 3).await;

        let recovered = h.engine.recovered_state();
        assert_eq!(recovered.cooldown.last_alert_ms(), Some(1_700_000_000_000));
        assert_eq!(recovered.debounce.consecutive_hits(), 0);
    }
}
