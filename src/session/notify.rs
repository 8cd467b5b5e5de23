use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Receives user-facing notices about session transitions (login, logout, failures).
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Default notifier: notices become log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Error => error!(target: "gymsession::notice", "{}", message),
            NoticeLevel::Success => info!(target: "gymsession::notice", "[success] {}", message),
            NoticeLevel::Info => info!(target: "gymsession::notice", "{}", message),
        }
    }
}
