//! Host shell boundary
//!
//! The chat core never renders or navigates on its own. It talks to the host
//! through two narrow traits:
//! - [`Navigator`]: route changes (login redirect, leaving a closed ticket)
//! - [`Notifier`]: the transient toast primitive
//!
//! [`TerminalShell`] implements both for the `supportchat` binary.

use std::fmt;
use std::sync::{Arc, Mutex};

use supportchat_shared::Id;

use crate::error::ClientError;

/// Views the client can navigate to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Sign-up / login view
    Auth,
    /// Ticket list view
    Support,
    /// Chat view for one ticket
    Ticket(Id),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Auth => "/auth".to_string(),
            Route::Support => "/support".to_string(),
            Route::Ticket(id) => format!("/tickets/{}", id),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// A transient user-visible message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub is_error: bool,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: true,
        }
    }
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Handle bundling the host's navigator and notifier
#[derive(Clone)]
pub struct Shell {
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
}

impl Shell {
    pub fn new(navigator: Arc<dyn Navigator>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            navigator,
            notifier,
        }
    }

    pub fn navigate(&self, route: Route) {
        tracing::info!(route = %route, "Navigating");
        self.navigator.navigate(route);
    }

    pub fn toast(&self, message: impl Into<String>) {
        self.notifier.notify(Notification::info(message));
    }

    pub fn toast_error(&self, message: impl Into<String>) {
        self.notifier.notify(Notification::error(message));
    }

    /// Surface a failed operation to the user
    pub fn report(&self, err: &ClientError) {
        match err.notification() {
            Some(message) => {
                if err.is_local() {
                    tracing::debug!(error = %err, "Input rejected");
                } else {
                    tracing::warn!(error = %err, "Operation failed");
                }
                self.toast_error(message);
            }
            None => tracing::debug!(error = %err, "Operation abandoned without notification"),
        }
    }
}

impl fmt::Debug for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shell").finish_non_exhaustive()
    }
}

/// Shell for terminal hosts: toasts go to stderr, navigation is recorded
#[derive(Debug, Default)]
pub struct TerminalShell {
    last_route: Mutex<Option<Route>>,
}

impl TerminalShell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The most recent navigation target, if any
    pub fn last_route(&self) -> Option<Route> {
        self.last_route
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn shell(self: &Arc<Self>) -> Shell {
        Shell::new(self.clone(), self.clone())
    }
}

impl Navigator for TerminalShell {
    fn navigate(&self, route: Route) {
        eprintln!("-> {}", route);
        *self
            .last_route
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(route);
    }
}

impl Notifier for TerminalShell {
    fn notify(&self, notification: Notification) {
        if notification.is_error {
            eprintln!("[error] {}", notification.message);
        } else {
            eprintln!("[info] {}", notification.message);
        }
    }
}
