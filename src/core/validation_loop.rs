// Validation loop - periodically estimates a pose from the live frame and
// publishes the verdict, navigating home once the user sits properly

use crate::core::camera_controller::CameraFeed;
use crate::core::config::Config;
use crate::core::model_loader::ModelLoader;
use crate::core::surface::{Navigator, StatusSurface};
use crate::core::validation::{self, Criteria, Verdict};
use crate::models::camera::{CameraState, Frame};
use crate::models::pose::{EstimateOptions, PoseEstimate};
use crate::models::status::{Decision, SessionStatus};
use crate::platform::pose::PoseModel;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Loop timing and decision settings
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub poll_interval: Duration,
    pub redirect_delay: Duration,
    pub destination: String,
    pub options: EstimateOptions,
    pub criteria: Criteria,
    pub navigate_once: bool,
    pub single_flight: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for LoopSettings {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            redirect_delay: Duration::from_millis(config.redirect_delay_ms),
            destination: config.home_destination.clone(),
            options: EstimateOptions {
                flip_horizontal: config.flip_horizontal,
            },
            criteria: Criteria::from(config),
            navigate_once: config.navigate_once,
            single_flight: config.single_flight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Timer,
    SourceReady,
}

/// State shared by the loop task and every estimation it spawns
struct Shared {
    session: Uuid,
    settings: LoopSettings,
    loader: ModelLoader,
    camera: watch::Receiver<CameraState>,
    frames: watch::Receiver<Option<Arc<Frame>>>,
    surface: Arc<dyn StatusSurface>,
    navigator: Arc<dyn Navigator>,
    in_flight: AtomicBool,
    torn_down: AtomicBool,
    /// Held for reading across every surface write or navigation, and for
    /// writing while `torn_down` is set, so nothing lands after teardown
    gate: RwLock<()>,
    navigation_scheduled: AtomicBool,
    last_decision: Mutex<Option<Decision>>,
}

impl Shared {
    fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    fn camera_state(&self) -> CameraState {
        *self.camera.borrow()
    }

    fn last_decision(&self) -> Option<Decision> {
        self.last_decision.lock().ok().and_then(|d| *d)
    }

    fn status(&self) -> SessionStatus {
        SessionStatus::derive(&self.loader.state(), self.camera_state(), self.last_decision())
    }

    /// Caller holds the gate
    fn write_status(&self) {
        self.surface.set_status(self.status());
    }

    async fn publish_status(&self) {
        let _gate = self.gate.read().await;
        if self.is_torn_down() {
            return;
        }
        self.write_status();
    }

    async fn on_camera_changed(&self) {
        if !self.camera_state().is_on() {
            if let Ok(mut last) = self.last_decision.lock() {
                *last = None;
            }
        }
        self.publish_status().await;
    }

    /// Start one estimation if the model and camera are both ready
    fn trigger(self: &Arc<Self>, trigger: Trigger) {
        if self.is_torn_down() {
            return;
        }

        let camera_on = self.camera_state().is_on();
        let model = match self.loader.model() {
            Some(model) if camera_on => model,
            _ => {
                tracing::trace!(?trigger, camera_on, "skipping validation, not ready");
                return;
            }
        };

        let Some(frame) = self.frames.borrow().clone() else {
            tracing::trace!(?trigger, "skipping validation, no frame bound yet");
            return;
        };

        if self.settings.single_flight && self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!(?trigger, "estimation still in flight, dropping trigger");
            return;
        }

        let shared = self.clone();
        tokio::spawn(async move {
            shared.estimate_and_apply(model, frame, trigger).await;
        });
    }

    async fn estimate_and_apply(
        self: Arc<Self>,
        model: Arc<dyn PoseModel>,
        frame: Arc<Frame>,
        trigger: Trigger,
    ) {
        let options = self.settings.options;
        let sequence = frame.sequence;
        let result =
            tokio::task::spawn_blocking(move || model.estimate_single_pose(&frame, options)).await;

        if self.settings.single_flight {
            self.in_flight.store(false, Ordering::SeqCst);
        }

        if self.is_torn_down() {
            tracing::debug!(sequence, "discarding estimate after teardown");
            return;
        }

        let estimate: PoseEstimate = match result {
            Ok(Ok(Some(estimate))) => estimate,
            Ok(Ok(None)) => {
                tracing::trace!(sequence, "no pose in frame");
                return;
            }
            Ok(Err(e)) => {
                tracing::debug!(sequence, error = %e, "pose estimation failed");
                return;
            }
            Err(e) => {
                tracing::warn!(sequence, error = %e, "estimation task failed");
                return;
            }
        };

        // The camera may have been switched off while the model was busy
        let verdict = validation::validate(
            self.loader.is_ready(),
            self.camera_state().is_on(),
            Some(&estimate),
            &self.settings.criteria,
        );
        if let Some(verdict) = verdict {
            tracing::debug!(
                ?trigger,
                sequence,
                matched = verdict.matched,
                required = verdict.required,
                "pose validated"
            );
            self.apply(verdict).await;
        }
    }

    async fn apply(self: &Arc<Self>, verdict: Verdict) {
        let _gate = self.gate.read().await;
        if self.is_torn_down() {
            tracing::debug!("discarding verdict after teardown");
            return;
        }

        self.surface.set_progress(&verdict.progress_text());
        self.surface.set_message(verdict.message());
        if let Ok(mut last) = self.last_decision.lock() {
            *last = Some(verdict.decision());
        }
        self.write_status();

        if verdict.is_sitting_properly() {
            self.schedule_navigation();
        }
    }

    fn schedule_navigation(self: &Arc<Self>) {
        if self.navigation_scheduled.swap(true, Ordering::SeqCst) && self.settings.navigate_once {
            return;
        }

        let shared = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(shared.settings.redirect_delay).await;
            let _gate = shared.gate.read().await;
            if shared.is_torn_down() {
                return;
            }

            let destination = &shared.settings.destination;
            tracing::info!(session = %shared.session, %destination, "navigating");
            if let Err(e) = shared.navigator.navigate(destination).await {
                tracing::warn!(%destination, error = %e, "navigation failed");
            }
        });
    }
}

/// Handle to a running validation loop
pub struct ValidationLoop {
    shared: Arc<Shared>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ValidationLoop {
    /// Start polling. The loop fires every `poll_interval`, plus once whenever
    /// a freshly acquired source delivers its first frame.
    pub fn spawn(
        settings: LoopSettings,
        loader: ModelLoader,
        feed: CameraFeed,
        surface: Arc<dyn StatusSurface>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let shared = Arc::new(Shared {
            session: Uuid::new_v4(),
            settings,
            loader,
            camera: feed.state.clone(),
            frames: feed.frames,
            surface,
            navigator,
            in_flight: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            gate: RwLock::new(()),
            navigation_scheduled: AtomicBool::new(false),
            last_decision: Mutex::new(None),
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(Self::run(
            shared.clone(),
            feed.state,
            feed.source_ready,
            shutdown_rx,
        ));

        tracing::info!(
            session = %shared.session,
            interval_ms = shared.settings.poll_interval.as_millis() as u64,
            "validation loop started"
        );

        Self {
            shared,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    async fn run(
        shared: Arc<Shared>,
        mut camera: watch::Receiver<CameraState>,
        source_ready: Arc<tokio::sync::Notify>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let period = shared.settings.poll_interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut model = shared.loader.subscribe();

        shared.publish_status().await;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => shared.trigger(Trigger::Timer),
                _ = source_ready.notified() => shared.trigger(Trigger::SourceReady),
                Ok(()) = model.changed() => shared.publish_status().await,
                Ok(()) = camera.changed() => shared.on_camera_changed().await,
            }
        }

        tracing::info!(session = %shared.session, "validation loop stopped");
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.status()
    }

    pub fn navigation_scheduled(&self) -> bool {
        self.shared.navigation_scheduled.load(Ordering::SeqCst)
    }

    /// Stop the timer and the source-ready listener. Estimates still running
    /// are discarded, and a pending navigation never fires. Waits for a write
    /// or navigation already in progress, so nothing lands once this returns;
    /// a navigator that can block forever must be closed first.
    pub async fn shutdown(mut self) {
        {
            let _gate = self.shared.gate.write().await;
            self.shared.torn_down.store(true, Ordering::SeqCst);
        }
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ValidationLoop {
    fn drop(&mut self) {
        self.shared.torn_down.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
