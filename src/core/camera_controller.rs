// Camera controller - owns the webcam on/off state and the live video source

use crate::models::camera::{CameraError, CameraResult, CameraState, Frame};
use crate::platform::camera::CameraBackend;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{oneshot, watch, Notify};
use uuid::Uuid;

/// Latest frame of the bound source; `None` while nothing is bound
pub type FrameSlot = watch::Receiver<Option<Arc<Frame>>>;

/// Everything the validation loop needs from the camera, without owning it
#[derive(Clone)]
pub struct CameraFeed {
    pub state: watch::Receiver<CameraState>,
    pub frames: FrameSlot,
    /// Signalled once per acquired source, when its first frame lands
    pub source_ready: Arc<Notify>,
}

/// One acquired source and the thread that reads it
struct CaptureSession {
    id: Uuid,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

pub struct CameraController {
    backend: Arc<dyn CameraBackend>,
    device_index: u32,
    session: Option<CaptureSession>,
    state: watch::Sender<CameraState>,
    frames: Arc<watch::Sender<Option<Arc<Frame>>>>,
    source_ready: Arc<Notify>,
}

impl CameraController {
    pub fn new(backend: Arc<dyn CameraBackend>, device_index: u32) -> Self {
        let (state, _) = watch::channel(CameraState::Off);
        let (frames, _) = watch::channel(None);

        Self {
            backend,
            device_index,
            session: None,
            state,
            frames: Arc::new(frames),
            source_ready: Arc::new(Notify::new()),
        }
    }

    pub fn state(&self) -> CameraState {
        *self.state.borrow()
    }

    pub fn is_on(&self) -> bool {
        self.state().is_on()
    }

    /// Text for the toggle control
    pub fn label(&self) -> &'static str {
        self.state().toggle_label()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CameraState> {
        self.state.subscribe()
    }

    pub fn subscribe_frames(&self) -> FrameSlot {
        self.frames.subscribe()
    }

    pub fn source_ready(&self) -> Arc<Notify> {
        self.source_ready.clone()
    }

    pub fn feed(&self) -> CameraFeed {
        CameraFeed {
            state: self.subscribe_state(),
            frames: self.subscribe_frames(),
            source_ready: self.source_ready(),
        }
    }

    /// Acquire a live source and bind it to the frame slot
    pub async fn turn_on(&mut self) -> CameraResult<()> {
        if self.session.is_some() {
            return Ok(());
        }

        let id = Uuid::new_v4();
        let stop = Arc::new(AtomicBool::new(false));
        let (ack_tx, ack_rx) = oneshot::channel();

        let backend = self.backend.clone();
        let index = self.device_index;
        let thread_stop = stop.clone();
        let frames = self.frames.clone();
        let ready = self.source_ready.clone();

        let thread = std::thread::Builder::new()
            .name(format!("camera-capture-{}", index))
            .spawn(move || capture_loop(backend, index, thread_stop, frames, ready, ack_tx))
            .map_err(|e| CameraError::CaptureFailed(format!("Failed to spawn capture thread: {}", e)))?;

        let acquired = match ack_rx.await {
            Ok(result) => result,
            Err(_) => Err(CameraError::CaptureFailed(
                "Capture thread exited before acquiring the camera".to_string(),
            )),
        };

        match acquired {
            Ok(()) => {
                self.session = Some(CaptureSession { id, stop, thread });
                self.state.send_replace(CameraState::On);
                tracing::info!(session = %id, index, backend = %self.backend.name(), "camera on");
                Ok(())
            }
            Err(e) => {
                let _ = tokio::task::spawn_blocking(move || thread.join()).await;
                self.state.send_replace(CameraState::Denied);
                tracing::warn!(index, error = %e, "camera acquisition failed");
                Err(e)
            }
        }
    }

    /// Stop every track of the held source and unbind it; no-op when off
    pub async fn turn_off(&mut self) -> CameraResult<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };

        session.stop.store(true, Ordering::SeqCst);
        let joined = tokio::task::spawn_blocking(move || session.thread.join())
            .await
            .map_err(|e| CameraError::CaptureFailed(format!("Failed to join capture thread: {}", e)))?;

        self.frames.send_replace(None);
        self.state.send_replace(CameraState::Off);
        tracing::info!(session = %session.id, "camera off");

        joined.map_err(|_| CameraError::CaptureFailed("Capture thread panicked".to_string()))
    }

    /// The single user-facing control: on when off, off when on
    pub async fn toggle(&mut self) -> CameraResult<CameraState> {
        if self.is_on() {
            self.turn_off().await?;
        } else {
            self.turn_on().await?;
        }
        Ok(self.state())
    }
}

impl Drop for CameraController {
    fn drop(&mut self) {
        // The capture thread still stops its tracks on the way out
        if let Some(session) = self.session.take() {
            session.stop.store(true, Ordering::SeqCst);
        }
    }
}

fn capture_loop(
    backend: Arc<dyn CameraBackend>,
    index: u32,
    stop: Arc<AtomicBool>,
    frames: Arc<watch::Sender<Option<Arc<Frame>>>>,
    ready: Arc<Notify>,
    ack: oneshot::Sender<CameraResult<()>>,
) {
    let mut stream = match backend.open(index) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ack.send(Err(e));
            return;
        }
    };

    if ack.send(Ok(())).is_err() {
        stop.store(true, Ordering::SeqCst);
    }

    let mut sequence = 0u64;
    while !stop.load(Ordering::SeqCst) {
        match stream.next_frame() {
            Ok(image) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                frames.send_replace(Some(Arc::new(Frame::new(sequence, image))));
                if sequence == 0 {
                    ready.notify_one();
                }
                sequence += 1;
            }
            Err(e) => {
                tracing::warn!(index, error = %e, "failed to read frame");
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }

    match stream.stop() {
        Ok(()) => tracing::debug!(index, frames = sequence, "camera tracks stopped"),
        Err(e) => tracing::warn!(index, error = %e, "failed to stop camera tracks"),
    }
}
