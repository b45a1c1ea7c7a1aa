//! Host-side collaborators of the cart manager.
//!
//! The manager never touches a display directly. It writes markup, badge
//! counts and notifications into a [`Surface`], and asks it to confirm
//! destructive actions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// How long a host should keep a notification visible.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(3);

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Warning,
    Danger,
}

impl Level {
    /// CSS modifier used by the storefront's alert styles.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

/// A transient message for the shopper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub text: String,
}

impl Notification {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            text: text.into(),
        }
    }

    pub fn danger(text: impl Into<String>) -> Self {
        Self {
            level: Level::Danger,
            text: text.into(),
        }
    }
}

/// Display region and prompts supplied by the host.
pub trait Surface: Send + Sync {
    /// Replace the cart region with `markup`.
    fn render_cart(&self, markup: &str);

    /// Update the navigation badge.
    fn render_badge(&self, count: u32, markup: &str);

    /// Show a transient notification.
    fn notify(&self, notification: Notification);

    /// Ask the shopper to confirm; `false` aborts the action.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Everything a [`RecordingSurface`] has been asked to show.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub cart_markup: Option<String>,
    pub badge: Option<u32>,
    pub notifications: Vec<Notification>,
    pub prompts: Vec<String>,
}

/// Surface that records calls instead of displaying them.
///
/// Used by headless hosts and tests.
#[derive(Debug)]
pub struct RecordingSurface {
    confirm_answer: AtomicBool,
    recorded: Mutex<Recorded>,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RecordingSurface {
    /// Surface that answers every confirmation with `confirm_answer`.
    #[must_use]
    pub fn new(confirm_answer: bool) -> Self {
        Self {
            confirm_answer: AtomicBool::new(confirm_answer),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    pub fn set_confirm_answer(&self, answer: bool) {
        self.confirm_answer.store(answer, Ordering::SeqCst);
    }

    #[must_use]
    pub fn recorded(&self) -> Recorded {
        self.lock().clone()
    }

    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    /// Whether any notification so far contains `needle`.
    #[must_use]
    pub fn notified(&self, needle: &str) -> bool {
        self.lock()
            .notifications
            .iter()
            .any(|n| n.text.contains(needle))
    }

    #[must_use]
    pub fn cart_markup(&self) -> Option<String> {
        self.lock().cart_markup.clone()
    }

    #[must_use]
    pub fn badge(&self) -> Option<u32> {
        self.lock().badge
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Surface for RecordingSurface {
    fn render_cart(&self, markup: &str) {
        self.lock().cart_markup = Some(markup.to_string());
    }

    fn render_badge(&self, count: u32, _markup: &str) {
        self.lock().badge = Some(count);
    }

    fn notify(&self, notification: Notification) {
        self.lock().notifications.push(notification);
    }

    fn confirm(&self, prompt: &str) -> bool {
        self.lock().prompts.push(prompt.to_string());
        self.confirm_answer.load(Ordering::SeqCst)
    }
}
