//! Store Configuration
//!
//! [`StoreSettings`] is the serializable part (API keys, catalog, SDK log
//! level). [`StoreConfig`] adds the host wiring and optional callbacks.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::host::{Host, IdentityUpdates, ReadyListener};
use crate::model::{Platform, ProductCatalog, SdkLogLevel};

/// Free-text diagnostic sink
pub type DevLog = Arc<dyn Fn(&str) + Send + Sync>;

/// Called with `true` before a purchase attempt and `false` after it settles
pub type PromptToggle = Arc<dyn Fn(bool) + Send + Sync>;

/// Called once a purchase call returns successfully
pub type PurchaseAttempt = Arc<dyn Fn() + Send + Sync>;

/// Per-platform purchasing SDK credentials
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeys {
    pub ios: String,
    pub android: String,
}

impl ApiKeys {
    pub fn new(ios: impl Into<String>, android: impl Into<String>) -> Self {
        Self {
            ios: ios.into(),
            android: android.into(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let ios = std::env::var("MIAP_IOS_API_KEY")
            .map_err(|_| StoreError::Config("MIAP_IOS_API_KEY not set".into()))?;
        let android = std::env::var("MIAP_ANDROID_API_KEY")
            .map_err(|_| StoreError::Config("MIAP_ANDROID_API_KEY not set".into()))?;

        Ok(Self::new(ios, android))
    }

    /// Web has no key.
    pub fn for_platform(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Ios => Some(self.ios.as_str()),
            Platform::Android => Some(self.android.as_str()),
            Platform::Web => None,
        }
    }
}

/// Serializable store settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    pub api_keys: ApiKeys,

    #[serde(default)]
    pub products: ProductCatalog,

    #[serde(default)]
    pub sdk_log_level: SdkLogLevel,
}

impl StoreSettings {
    pub fn new(api_keys: ApiKeys, products: ProductCatalog) -> Self {
        Self {
            api_keys,
            products,
            sdk_log_level: SdkLogLevel::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Everything needed to build a [`crate::StoreAdapter`]
pub struct StoreConfig {
    pub settings: StoreSettings,
    pub host: Arc<dyn Host>,
    pub ready: ReadyListener,
    pub identity: IdentityUpdates,
    pub dev_log: Option<DevLog>,
    pub on_purchase_prompt_toggle: Option<PromptToggle>,
    pub on_purchase_attempt: Option<PurchaseAttempt>,
}

impl StoreConfig {
    pub fn new(
        settings: StoreSettings,
        host: Arc<dyn Host>,
        ready: ReadyListener,
        identity: IdentityUpdates,
    ) -> Self {
        Self {
            settings,
            host,
            ready,
            identity,
            dev_log: None,
            on_purchase_prompt_toggle: None,
            on_purchase_attempt: None,
        }
    }

    #[must_use]
    pub fn with_dev_log(mut self, log: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.dev_log = Some(Arc::new(log));
        self
    }

    #[must_use]
    pub fn with_purchase_prompt_toggle(
        mut self,
        toggle: impl Fn(bool) + Send + Sync + 'static,
    ) -> Self {
        self.on_purchase_prompt_toggle = Some(Arc::new(toggle));
        self
    }

    #[must_use]
    pub fn with_purchase_attempt(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_purchase_attempt = Some(Arc::new(callback));
        self
    }
}
