//! Lifecycle events.
//!
//! Every state transition of the resolver, importer and pipeline produces a
//! [`DirectoryEvent`]. Components receive an [`EventSink`] at construction
//! and hand events to it; what happens next (a log line, a recorded list, a
//! channel drained by the caller) is up to the sink.

use std::fmt;
use std::sync::Arc;

use dir_core::{LogLevel, LoggingConfig};
use dir_model::{DirectoryEntry, LocalAccount};
use parking_lot::Mutex;
use tokio::sync::mpsc;

// ============================================================================
// Events
// ============================================================================

/// Kind of a [`DirectoryEvent`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A new local account is about to be created.
    Importing,
    /// A local account is about to be hydrated.
    Synchronizing,
    /// A local account has been hydrated.
    Synchronized,
    /// A bind is about to be attempted.
    Authenticating,
    /// The bind succeeded.
    Authenticated,
    /// The bind failed.
    AuthenticationFailed,
    /// The validation rule chain rejected the user.
    AuthenticationRejected,
    /// The user is logged in.
    AuthenticationSuccessful,
    /// A directory entry was found for submitted credentials.
    DiscoveredWithCredentials,
    /// The user was identified by the Windows/SSO server variable.
    AuthenticatedWithWindows,
    /// The user authenticated but the local account is soft-deleted.
    AuthenticatedModelTrashed,
}

impl EventKind {
    /// Returns the event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Importing => "Importing",
            Self::Synchronizing => "Synchronizing",
            Self::Synchronized => "Synchronized",
            Self::Authenticating => "Authenticating",
            Self::Authenticated => "Authenticated",
            Self::AuthenticationFailed => "AuthenticationFailed",
            Self::AuthenticationRejected => "AuthenticationRejected",
            Self::AuthenticationSuccessful => "AuthenticationSuccessful",
            Self::DiscoveredWithCredentials => "DiscoveredWithCredentials",
            Self::AuthenticatedWithWindows => "AuthenticatedWithWindows",
            Self::AuthenticatedModelTrashed => "AuthenticatedModelTrashed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle event carrying the directory entry and, where applicable,
/// the local account.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryEvent {
    /// A new local account is about to be created.
    Importing {
        /// Directory entry.
        entry: DirectoryEntry,
        /// Unsaved account.
        account: LocalAccount,
    },
    /// A local account is about to be hydrated.
    Synchronizing {
        /// Directory entry.
        entry: DirectoryEntry,
        /// Account before hydration.
        account: LocalAccount,
    },
    /// A local account has been hydrated.
    Synchronized {
        /// Directory entry.
        entry: DirectoryEntry,
        /// Account after hydration.
        account: LocalAccount,
    },
    /// A bind is about to be attempted.
    Authenticating {
        /// Directory entry.
        entry: DirectoryEntry,
        /// Identifier submitted to the bind.
        username: String,
    },
    /// The bind succeeded.
    Authenticated {
        /// Directory entry.
        entry: DirectoryEntry,
    },
    /// The bind failed.
    AuthenticationFailed {
        /// Directory entry.
        entry: DirectoryEntry,
    },
    /// The validation rule chain rejected the user.
    AuthenticationRejected {
        /// Directory entry.
        entry: DirectoryEntry,
        /// Local account, if one exists.
        account: Option<LocalAccount>,
    },
    /// The user is logged in.
    AuthenticationSuccessful {
        /// Directory entry.
        entry: DirectoryEntry,
        /// Local account, absent when nothing is stored locally.
        account: Option<LocalAccount>,
    },
    /// A directory entry was found for submitted credentials.
    DiscoveredWithCredentials {
        /// Directory entry.
        entry: DirectoryEntry,
    },
    /// The user was identified by the Windows/SSO server variable.
    AuthenticatedWithWindows {
        /// Directory entry.
        entry: DirectoryEntry,
        /// Local account, absent when nothing is stored locally.
        account: Option<LocalAccount>,
    },
    /// The user authenticated but the local account is soft-deleted.
    AuthenticatedModelTrashed {
        /// Directory entry.
        entry: DirectoryEntry,
        /// Soft-deleted account.
        account: LocalAccount,
    },
}

impl DirectoryEvent {
    /// Returns the event kind.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Importing { .. } => EventKind::Importing,
            Self::Synchronizing { .. } => EventKind::Synchronizing,
            Self::Synchronized { .. } => EventKind::Synchronized,
            Self::Authenticating { .. } => EventKind::Authenticating,
            Self::Authenticated { .. } => EventKind::Authenticated,
            Self::AuthenticationFailed { .. } => EventKind::AuthenticationFailed,
            Self::AuthenticationRejected { .. } => EventKind::AuthenticationRejected,
            Self::AuthenticationSuccessful { .. } => EventKind::AuthenticationSuccessful,
            Self::DiscoveredWithCredentials { .. } => EventKind::DiscoveredWithCredentials,
            Self::AuthenticatedWithWindows { .. } => EventKind::AuthenticatedWithWindows,
            Self::AuthenticatedModelTrashed { .. } => EventKind::AuthenticatedModelTrashed,
        }
    }

    /// Returns the directory entry.
    #[must_use]
    pub const fn entry(&self) -> &DirectoryEntry {
        match self {
            Self::Importing { entry, .. }
            | Self::Synchronizing { entry, .. }
            | Self::Synchronized { entry, .. }
            | Self::Authenticating { entry, .. }
            | Self::Authenticated { entry }
            | Self::AuthenticationFailed { entry }
            | Self::AuthenticationRejected { entry, .. }
            | Self::AuthenticationSuccessful { entry, .. }
            | Self::DiscoveredWithCredentials { entry }
            | Self::AuthenticatedWithWindows { entry, .. }
            | Self::AuthenticatedModelTrashed { entry, .. } => entry,
        }
    }

    /// Returns the local account, if the event carries one.
    #[must_use]
    pub const fn account(&self) -> Option<&LocalAccount> {
        match self {
            Self::Importing { account, .. }
            | Self::Synchronizing { account, .. }
            | Self::Synchronized { account, .. }
            | Self::AuthenticatedModelTrashed { account, .. } => Some(account),
            Self::AuthenticationRejected { account, .. }
            | Self::AuthenticationSuccessful { account, .. }
            | Self::AuthenticatedWithWindows { account, .. } => account.as_ref(),
            Self::Authenticating { .. }
            | Self::Authenticated { .. }
            | Self::AuthenticationFailed { .. }
            | Self::DiscoveredWithCredentials { .. } => None,
        }
    }

    /// Renders the human-readable log line for this event.
    #[must_use]
    pub fn message(&self) -> String {
        let name = self.entry().common_name();
        match self {
            Self::Importing { .. } => format!("User '{name}' is being imported."),
            Self::Synchronizing { .. } => format!("User '{name}' is being synchronized."),
            Self::Synchronized { .. } => format!("User '{name}' has been successfully synchronized."),
            Self::Authenticating { username, .. } => {
                format!("User '{name}' is authenticating with username: '{username}'")
            }
            Self::Authenticated { .. } => {
                format!("User '{name}' has successfully passed LDAP authentication.")
            }
            Self::AuthenticationFailed { .. } => {
                format!("User '{name}' has failed LDAP authentication.")
            }
            Self::AuthenticationRejected { .. } => format!(
                "User '{name}' has failed validation. They have been denied authentication."
            ),
            Self::AuthenticationSuccessful { .. } => {
                format!("User '{name}' has been successfully logged in.")
            }
            Self::DiscoveredWithCredentials { .. } => {
                format!("User '{name}' has been successfully found for authentication.")
            }
            Self::AuthenticatedWithWindows { .. } => {
                format!("User '{name}' has successfully authenticated via NTLM.")
            }
            Self::AuthenticatedModelTrashed { .. } => format!(
                "User '{name}' was authenticated but their local account is deleted. Access denied."
            ),
        }
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Observer of lifecycle events.
pub trait EventSink: Send + Sync {
    /// Receives one event.
    fn emit(&self, event: &DirectoryEvent);
}

/// Shared event sink handle.
pub type SharedEventSink = Arc<dyn EventSink>;

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: &DirectoryEvent) {}
}

/// Sink that renders each event to one `tracing` line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink {
    config: LoggingConfig,
}

impl LogEventSink {
    /// Creates a log sink from the logging configuration.
    #[must_use]
    pub const fn new(config: LoggingConfig) -> Self {
        Self { config }
    }
}

impl EventSink for LogEventSink {
    fn emit(&self, event: &DirectoryEvent) {
        if !self.config.enabled {
            return;
        }

        let kind = event.kind();
        let message = event.message();
        match self.config.level {
            LogLevel::Trace => tracing::trace!(event = %kind, "{message}"),
            LogLevel::Debug => tracing::debug!(event = %kind, "{message}"),
            LogLevel::Info => tracing::info!(event = %kind, "{message}"),
            LogLevel::Warn => tracing::warn!(event = %kind, "{message}"),
            LogLevel::Error => tracing::error!(event = %kind, "{message}"),
        }
    }
}

/// Sink that records events in memory.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<DirectoryEvent>>,
}

impl MemoryEventSink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<DirectoryEvent> {
        self.events.lock().clone()
    }

    /// Returns the kinds of the recorded events, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(DirectoryEvent::kind).collect()
    }

    /// Counts recorded events of one kind.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }

    /// Forgets every recorded event.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: &DirectoryEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Sink that forwards events to a channel drained by the caller.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<DirectoryEvent>,
}

impl ChannelEventSink {
    /// Creates the sink and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DirectoryEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: &DirectoryEvent) {
        if self.sender.send(event.clone()).is_err() {
            tracing::debug!(event = %event.kind(), "Event receiver dropped");
        }
    }
}

/// Sink that forwards every event to several sinks, in order.
#[derive(Default, Clone)]
pub struct CompositeEventSink {
    sinks: Vec<SharedEventSink>,
}

impl CompositeEventSink {
    /// Creates an empty composite sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink.
    #[must_use]
    pub fn with(mut self, sink: SharedEventSink) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Returns the number of sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns true if no sinks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for CompositeEventSink {
    fn emit(&self, event: &DirectoryEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
