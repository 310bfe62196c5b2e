//! Transient user-facing notices ("toasts").
//!
//! Every outcome the dashboard reports to the person using it goes through
//! [`Notices`]; each notice is logged as well as broadcast to whichever
//! front end is listening.

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Broadcast sender for notices. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Notices {
    tx: broadcast::Sender<Notice>,
}

impl Notices {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn success(&self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{message}");
        self.emit(NoticeLevel::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.emit(NoticeLevel::Error, message);
    }

    fn emit(&self, level: NoticeLevel, message: String) {
        // Nobody listening is fine; notices are fire-and-forget.
        let _ = self.tx.send(Notice { level, message });
    }
}
