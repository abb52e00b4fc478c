//! Application State

use std::sync::Arc;

use miap_core::{
    identity_channel, platform_ready_channel, IdentityFeed, Platform, PlatformReady,
    PurchasesSdk, RecordingHost, StoreAdapter, StoreConfig, StoreSettings,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The store adapter driven by this bridge
    pub store: Arc<StoreAdapter>,

    /// Platform-ready signal, fired by the front end
    pub ready: PlatformReady,

    /// Identity feed, pushed by the front end
    pub identity: IdentityFeed,
}

impl AppState {
    /// Wire a store to the given SDK. Must run inside the Tokio runtime.
    pub fn build(settings: StoreSettings, platform: Platform, sdk: Arc<dyn PurchasesSdk>) -> Self {
        // Opening URLs is left to the front end; the manage endpoint returns them
        let host = Arc::new(RecordingHost::new(platform));
        let (ready, ready_listener) = platform_ready_channel();
        let (identity, identity_updates) = identity_channel();

        let config = StoreConfig::new(settings, host.clone(), ready_listener, identity_updates)
            .with_dev_log(|msg| tracing::debug!(target: "miap::dev", "{}", msg))
            .with_purchase_prompt_toggle(|showing| {
                tracing::info!(showing, "purchase prompt toggled");
            })
            .with_purchase_attempt(|| tracing::info!("purchase attempt completed"));

        Self {
            store: Arc::new(StoreAdapter::new(config, sdk)),
            ready,
            identity,
        }
    }
}
