//! Host Integration
//!
//! What the embedding application supplies: the platform it runs on, a way to
//! open URLs, a platform-ready signal, and a feed of identity changes.
//!
//! ```rust,ignore
//! let (ready, ready_listener) = platform_ready_channel();
//! let (identity, identity_updates) = identity_channel();
//!
//! // ... hand the listeners to `StoreConfig::new` ...
//!
//! ready.fire();
//! identity.push(Some("user-42".into()));
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::model::Platform;

/// Platform services provided by the embedding application
pub trait Host: Send + Sync {
    /// Current platform. Read once when the store is built.
    fn platform(&self) -> Platform;

    /// Open a URL outside the app (browser, system settings, ...)
    fn open_url(&self, url: &str);
}

/// Create the platform-ready signal pair
pub fn platform_ready_channel() -> (PlatformReady, ReadyListener) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PlatformReady(tx), ReadyListener(rx))
}

/// Host side of the platform-ready signal. May fire any number of times.
#[derive(Clone, Debug)]
pub struct PlatformReady(mpsc::UnboundedSender<()>);

impl PlatformReady {
    /// Signal that the platform is ready.
    ///
    /// Returns `false` once the store has gone away.
    pub fn fire(&self) -> bool {
        self.0.send(()).is_ok()
    }
}

/// Store side of the platform-ready signal
#[derive(Debug)]
pub struct ReadyListener(mpsc::UnboundedReceiver<()>);

impl ReadyListener {
    /// Wait for the next signal. `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<()> {
        self.0.recv().await
    }
}

/// Create the identity subscription pair
pub fn identity_channel() -> (IdentityFeed, IdentityUpdates) {
    let (tx, rx) = mpsc::unbounded_channel();
    (IdentityFeed(tx), IdentityUpdates(rx))
}

/// Host side of the identity subscription
#[derive(Clone, Debug)]
pub struct IdentityFeed(mpsc::UnboundedSender<Option<String>>);

impl IdentityFeed {
    /// Push the current identity; `None` means anonymous.
    pub fn push(&self, user_id: Option<String>) -> bool {
        self.0.send(user_id).is_ok()
    }
}

/// Store side of the identity subscription
#[derive(Debug)]
pub struct IdentityUpdates(mpsc::UnboundedReceiver<Option<String>>);

impl IdentityUpdates {
    pub async fn recv(&mut self) -> Option<Option<String>> {
        self.0.recv().await
    }
}

/// Host that remembers every URL it was asked to open
pub struct RecordingHost {
    platform: Platform,
    opened: Mutex<Vec<String>>,
}

impl RecordingHost {
    pub const fn new(platform: Platform) -> Self {
        Self {
            platform,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn last_opened(&self) -> Option<String> {
        self.lock().last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.opened.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Host for RecordingHost {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn open_url(&self, url: &str) {
        tracing::info!(url, "opening URL");
        self.lock().push(url.to_string());
    }
}
