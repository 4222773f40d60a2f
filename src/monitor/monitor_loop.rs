use super::state::MonitorState;
use super::status::MonitorStatus;
use super::tick::TickEngine;
use crate::alert::AlertDispatcher;
use crate::common::{Clock, SystemClock};
use crate::config::MonitorSettings;
use crate::error::AppError;
use crate::intake::FrameSource;
use crate::pipeline::classifier::Classifier;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const DEFAULT_STATUS_CAPACITY: usize = 16;

enum RunState {
    Stopped(MonitorState),
    Running {
        cancel_token: CancellationToken,
        task: JoinHandle<MonitorState>,
    },
}

/// Fixed-interval monitoring scheduler.
///
/// `start` and `stop` may be called from any task. While running, a single scheduler task
/// owns the [`MonitorState`] and runs ticks back to back, sleeping the capture interval
/// after each one completes.
pub struct MonitorLoop {
    engine: Arc<TickEngine>,
    interval: Duration,
    status_tx: broadcast::Sender<MonitorStatus>,
    run_state: Mutex<RunState>,
}

impl MonitorLoop {
    pub fn builder(settings: MonitorSettings) -> MonitorLoopBuilder {
        MonitorLoopBuilder::new(settings)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorStatus> {
        self.status_tx.subscribe()
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.run_state.lock().await, RunState::Running { .. })
    }

    /// Starts ticking immediately. Returns `false` if the monitor was already running.
    pub async fn start(&self) -> bool {
        let mut run_state = self.run_state.lock().await;
        let state = match &mut *run_state {
            RunState::Running { .. } => {
                debug!("Monitor already running");
                return false;
            }
            RunState::Stopped(state) => std::mem::replace(state, self.engine.initial_state()),
        };

        let cancel_token = CancellationToken::new();
        let task = tokio::spawn(run_ticks(
            Arc::clone(&self.engine),
            state,
            self.interval,
            cancel_token.clone(),
        ));
        *run_state = RunState::Running { cancel_token, task };
        info!("Monitor started, capturing every {:?}", self.interval);
        true
    }

    /// Cancels the loop, abandoning any in-flight tick, and waits for the task to finish.
    ///
    /// Clears the consecutive-hit counter but keeps the cooldown. Returns `false` if the
    /// monitor was not running.
    pub async fn stop(&self) -> bool {
        let mut run_state = self.run_state.lock().await;
        let RunState::Running { cancel_token, task } = &mut *run_state else {
            debug!("Monitor already stopped");
            return false;
        };

        cancel_token.cancel();
        // Stays Running until joined; a dropped stop() leaves the task to the next call.
        let state = match task.await {
            Ok(mut state) => {
                state.debounce.reset();
                state
            }
            Err(e) => {
                error!("Monitor task ended abnormally, recovering cooldown: {}", e);
                self.engine.recovered_state()
            }
        };
        *run_state = RunState::Stopped(state);
        info!("Monitor stopped");
        true
    }

    /// Copy of the decision state while stopped; `None` while running.
    pub async fn state_snapshot(&self) -> Option<MonitorState> {
        match &*self.run_state.lock().await {
            RunState::Stopped(state) => Some(state.clone()),
            RunState::Running { .. } => None,
        }
    }
}

impl Drop for MonitorLoop {
    fn drop(&mut self) {
        if let Ok(run_state) = self.run_state.try_lock() {
            if let RunState::Running { cancel_token, .. } = &*run_state {
                cancel_token.cancel();
            }
        }
    }
}

async fn run_ticks(
    engine: Arc<TickEngine>,
    mut state: MonitorState,
    interval: Duration,
    cancel_token: CancellationToken,
) -> MonitorState {
    while !cancel_token.is_cancelled() {
        engine.tick(&mut state, &cancel_token).await;

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    state
}

pub struct MonitorLoopBuilder {
    settings: MonitorSettings,
    frame_source: Option<Arc<dyn FrameSource>>,
    classifier: Option<Arc<dyn Classifier>>,
    dispatcher: Option<Arc<dyn AlertDispatcher>>,
    clock: Arc<dyn Clock>,
    device_id: String,
    status_capacity: usize,
}

impl MonitorLoopBuilder {
    pub fn new(settings: MonitorSettings) -> Self {
        Self {
            settings,
            frame_source: None,
            classifier: None,
            dispatcher: None,
            clock: Arc::new(SystemClock),
            device_id: String::new(),
            status_capacity: DEFAULT_STATUS_CAPACITY,
        }
    }

    pub fn frame_source(mut self, frame_source: Arc<dyn FrameSource>) -> Self {
        self.frame_source = Some(frame_source);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn AlertDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Overrides the wall clock used for alert timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    pub fn status_capacity(mut self, status_capacity: usize) -> Self {
        self.status_capacity = status_capacity.max(1);
        self
    }

    pub fn build(self) -> Result<MonitorLoop, AppError> {
        self.settings.validate().map_err(AppError::InvalidConfig)?;
        let frame_source = self
            .frame_source
            .ok_or_else(|| AppError::Monitor("Frame source not set".to_string()))?;
        let classifier = self
            .classifier
            .ok_or_else(|| AppError::Monitor("Classifier not set".to_string()))?;
        let dispatcher = self
            .dispatcher
            .ok_or_else(|| AppError::Monitor("Alert dispatcher not set".to_string()))?;

        let (status_tx, _) = broadcast::channel(self.status_capacity);
        let interval = self.settings.capture_interval();
        let engine = Arc::new(TickEngine::new(
            self.settings,
            frame_source,
            classifier,
            dispatcher,
            self.clock,
            status_tx.clone(),
            self.device_id,
        ));

        Ok(MonitorLoop {
            run_state: Mutex::new(RunState::Stopped(engine.initial_state())),
            engine,
            interval,
            status_tx,
        })
    }
}
