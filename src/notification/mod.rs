//! User-visible notifications: one human-readable message per attempted mutation.

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

/// Notification backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationBackend {
    /// Log only
    None,
    /// Printed by the command line front end
    #[default]
    Console,
    /// Desktop notifications (via notify-rust)
    System,
    /// Console and desktop
    Both,
}

impl NotificationBackend {
    /// Parse backend from settings value (case-insensitive)
    pub fn from_settings_value(s: &str) -> Option<Self> {
        Self::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Console => "console",
            Self::System => "system",
            Self::Both => "both",
        }
    }
}

impl FromStr for NotificationBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "console" => Ok(Self::Console),
            "system" => Ok(Self::System),
            "both" => Ok(Self::Both),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Traces the notification, then hands it to the notifier.
pub fn emit(notifier: &dyn Notifier, notification: Notification) {
    match notification.level {
        NotificationLevel::Success => info!(message = %notification.message, "notification"),
        NotificationLevel::Error => error!(message = %notification.message, "notification"),
    }
    notifier.notify(&notification);
}

/// Collects notifications until drained.
#[derive(Debug, Default)]
pub struct BufferedNotifier {
    entries: Mutex<Vec<Notification>>,
}

impl BufferedNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notification> {
        match self.entries.lock() {
            Ok(mut entries) => std::mem::take(&mut *entries),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn error_count(&self) -> usize {
        self.snapshot().iter().filter(|n| n.is_error()).count()
    }
}

impl Notifier for BufferedNotifier {
    fn notify(&self, notification: &Notification) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(notification.clone()),
            Err(poisoned) => poisoned.into_inner().push(notification.clone()),
        }
    }
}

/// Leaves notifications in the log only.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) {
        debug!(level = ?notification.level, "notification kept in log only");
    }
}

#[derive(Debug, Default)]
pub struct SystemNotifier {
    pub display_duration_ms: u32,
}

impl Notifier for SystemNotifier {
    fn notify(&self, notification: &Notification) {
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            let icon = if notification.is_error() {
                "dialog-error"
            } else {
                "dialog-information"
            };
            let result = notify_rust::Notification::new()
                .summary("Task board")
                .body(&notification.message)
                .icon(icon)
                .timeout(notify_rust::Timeout::Milliseconds(self.display_duration_ms))
                .show();

            if let Err(err) = result {
                warn!(error = %err, "failed to send system notification");
            }
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            debug!(
                message = %notification.message,
                "system notifications not supported on this OS"
            );
        }
    }
}

pub struct FanoutNotifier {
    targets: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(targets: Vec<Arc<dyn Notifier>>) -> Self {
        Self { targets }
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, notification: &Notification) {
        for target in &self.targets {
            target.notify(notification);
        }
    }
}

/// Builds the notifier for a backend. `console` is the buffer the front end drains.
pub fn notifier_for_backend(
    backend: NotificationBackend,
    console: Arc<BufferedNotifier>,
    display_duration_ms: u32,
) -> Arc<dyn Notifier> {
    let system = || -> Arc<dyn Notifier> {
        Arc::new(SystemNotifier {
            display_duration_ms,
        })
    };
    match backend {
        NotificationBackend::None => Arc::new(TracingNotifier),
        NotificationBackend::Console => console,
        NotificationBackend::System => system(),
        NotificationBackend::Both => {
            let console: Arc<dyn Notifier> = console;
            Arc::new(FanoutNotifier::new(vec![console, system()]))
        }
    }
}
