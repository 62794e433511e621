// User-visible surface and navigation
//
// The validation loop only talks to these traits; the console implementations
// below are what the binary uses.

use crate::models::status::SessionStatus;
use async_trait::async_trait;
use std::io::Write;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Where status text ends up
pub trait StatusSurface: Send + Sync {
    /// The message line (success or prompt)
    fn set_message(&self, message: &str);

    /// The progress line ("Completion: NN.NN%")
    fn set_progress(&self, progress: &str);

    /// Label of the camera toggle control
    fn set_camera_label(&self, label: &str);

    fn set_status(&self, status: SessionStatus);
}

#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error("Navigation target closed")]
    Closed,
}

pub type NavigationResult<T> = Result<T, NavigationError>;

/// Leaves the posture check for another destination
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, destination: &str) -> NavigationResult<()>;
}

// ==============================================================================
// Console surface
// ==============================================================================

#[derive(Default)]
struct ConsoleLines {
    message: Option<String>,
    progress: Option<String>,
    label: Option<String>,
    status: Option<SessionStatus>,
}

/// Prints each line to stdout, only when its text changes
pub struct ConsoleSurface {
    lines: Mutex<ConsoleLines>,
    show_failures: bool,
}

impl ConsoleSurface {
    pub fn new(show_failures: bool) -> Self {
        Self {
            lines: Mutex::new(ConsoleLines::default()),
            show_failures,
        }
    }

    fn print(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", line);
        let _ = out.flush();
    }

    fn update(&self, pick: impl FnOnce(&mut ConsoleLines) -> &mut Option<String>, text: &str) -> bool {
        let Ok(mut lines) = self.lines.lock() else {
            return false;
        };
        let slot = pick(&mut *lines);
        if slot.as_deref() == Some(text) {
            return false;
        }
        *slot = Some(text.to_string());
        true
    }

    /// Current status, if one has been reported
    pub fn status(&self) -> Option<SessionStatus> {
        self.lines.lock().ok().and_then(|lines| lines.status)
    }
}

impl StatusSurface for ConsoleSurface {
    fn set_message(&self, message: &str) {
        if self.update(|l| &mut l.message, message) {
            self.print(message);
        }
    }

    fn set_progress(&self, progress: &str) {
        if self.update(|l| &mut l.progress, progress) {
            self.print(progress);
        }
    }

    fn set_camera_label(&self, label: &str) {
        if self.update(|l| &mut l.label, label) {
            self.print(&format!("[ {} ]  (t = toggle, s = status, q = quit)", label));
        }
    }

    fn set_status(&self, status: SessionStatus) {
        let changed = match self.lines.lock() {
            Ok(mut lines) => lines.status.replace(status) != Some(status),
            Err(_) => false,
        };
        if !changed {
            return;
        }

        tracing::debug!(?status, "session status");
        if self.show_failures && status.is_failure() {
            self.print(status.describe());
        }
    }
}

// ==============================================================================
// Channel navigator
// ==============================================================================

/// Hands the destination to whoever owns the receiver (the app loop)
pub struct ChannelNavigator {
    tx: mpsc::Sender<String>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(4);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Navigator for ChannelNavigator {
    async fn navigate(&self, destination: &str) -> NavigationResult<()> {
        self.tx
            .send(destination.to_string())
            .await
            .map_err(|_| NavigationError::Closed)
    }
}
