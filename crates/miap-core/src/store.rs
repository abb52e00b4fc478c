//! Store Adapter
//!
//! One purchase API over the platform purchasing SDK. Setup waits for the
//! platform-ready signal, configures the SDK once and starts mirroring the
//! host's identity into SDK login/logout. Every public operation waits for
//! setup before touching the SDK.
//!
//! Failure surface: `restore_purchases` returns SDK errors to the caller.
//! Purchase, price lookup and subscription management log failures and
//! hand back an absent value instead.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{ApiKeys, DevLog, PromptToggle, PurchaseAttempt, StoreConfig};
use crate::error::{Result, StoreError};
use crate::gate::{GateState, ReadinessGate, SetupPhase, SetupState};
use crate::host::{Host, IdentityUpdates, ReadyListener};
use crate::model::{Platform, PlatformProductIds, PurchaseResult, SdkLogLevel, StoreProduct};
use crate::sdk::PurchasesSdk;

/// Price shown on web, where no store exists
pub const WEB_PLACEHOLDER_PRICE: &str = "$12.99";

struct StoreInner {
    platform: Platform,
    host: Arc<dyn Host>,
    sdk: Arc<dyn PurchasesSdk>,
    gate: ReadinessGate,
    setup: SetupState,
    dev_log: Option<DevLog>,
    on_purchase_prompt_toggle: Option<PromptToggle>,
    on_purchase_attempt: Option<PurchaseAttempt>,
}

impl StoreInner {
    fn trace(&self, msg: impl AsRef<str>) {
        if let Some(log) = &self.dev_log {
            log(msg.as_ref());
        }
    }

    /// Wait for setup; on failure log and return `false`
    async fn ready_or_log(&self, operation: &str) -> bool {
        match self.gate.wait().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(operation, error = %e, "store unavailable");
                self.trace(format!("Store unavailable, skipping {operation}: {e}"));
                false
            }
        }
    }

    async fn lookup(&self, product_id: &str) -> Result<Option<StoreProduct>> {
        let products = self.sdk.products(&[product_id.to_string()]).await?;
        Ok(products.into_iter().next())
    }
}

/// Cross-platform in-app-purchase store
pub struct StoreAdapter {
    inner: Arc<StoreInner>,
    products: BTreeMap<String, ProductHandle>,
}

impl StoreAdapter {
    /// Build the store and start listening for the platform-ready signal.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: StoreConfig, sdk: Arc<dyn PurchasesSdk>) -> Self {
        let StoreConfig {
            settings,
            host,
            ready,
            identity,
            dev_log,
            on_purchase_prompt_toggle,
            on_purchase_attempt,
        } = config;

        let inner = Arc::new(StoreInner {
            platform: host.platform(),
            host,
            sdk,
            gate: ReadinessGate::new(),
            setup: SetupState::new(),
            dev_log,
            on_purchase_prompt_toggle,
            on_purchase_attempt,
        });

        let products = settings
            .products
            .iter()
            .map(|(key, ids)| {
                let handle = ProductHandle {
                    key: key.clone(),
                    ids: ids.clone(),
                    inner: inner.clone(),
                };
                (key.clone(), handle)
            })
            .collect();

        tracing::info!(
            platform = %inner.platform,
            sdk = inner.sdk.name(),
            products = settings.products.len(),
            "initializing store"
        );

        tokio::spawn(listen_for_ready(
            inner.clone(),
            ready,
            identity,
            settings.api_keys,
            settings.sdk_log_level,
        ));

        Self { inner, products }
    }

    pub fn platform(&self) -> Platform {
        self.inner.platform
    }

    pub fn setup_phase(&self) -> SetupPhase {
        self.inner.setup.phase()
    }

    pub fn gate_state(&self) -> GateState {
        self.inner.gate.state()
    }

    /// Wait until setup has finished, successfully or not
    pub async fn ready(&self) -> Result<()> {
        self.inner.gate.wait().await
    }

    pub fn product(&self, key: &str) -> Option<&ProductHandle> {
        self.products.get(key)
    }

    pub fn products(&self) -> impl Iterator<Item = &ProductHandle> {
        self.products.values()
    }

    pub fn product_keys(&self) -> impl Iterator<Item = &str> {
        self.products.keys().map(String::as_str)
    }

    /// Open the store's subscription management page, if the customer has one.
    ///
    /// Returns the URL handed to the host.
    pub async fn go_to_subscription_management(&self) -> Option<String> {
        let inner = &self.inner;
        if !inner.ready_or_log("subscription management").await {
            return None;
        }

        let info = match inner.sdk.customer_info().await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch customer info");
                inner.trace(format!("Failed to fetch customer info: {e}"));
                return None;
            }
        };

        let Some(url) = info.management_url else {
            tracing::warn!("no management URL found");
            inner.trace("No management URL found.");
            return None;
        };

        inner.host.open_url(&url);
        Some(url)
    }

    /// Restore previous purchases. SDK failures are returned to the caller.
    pub async fn restore_purchases(&self) -> Result<()> {
        self.inner.gate.wait().await?;
        self.inner.sdk.restore_purchases().await?;
        Ok(())
    }
}

/// One purchasable catalog entry
#[derive(Clone)]
pub struct ProductHandle {
    key: String,
    ids: PlatformProductIds,
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for ProductHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductHandle")
            .field("key", &self.key)
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

impl ProductHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Vendor identifier on the current platform
    pub fn product_id(&self) -> Option<&str> {
        self.ids.for_platform(self.inner.platform)
    }

    /// Localized price, or `None` when the product is unavailable
    pub async fn get_localized_price(&self) -> Option<String> {
        let inner = &self.inner;
        if !inner.ready_or_log("price lookup").await {
            return None;
        }
        if inner.platform == Platform::Web {
            return Some(WEB_PLACEHOLDER_PRICE.to_string());
        }

        let product_id = self.product_id()?;
        match inner.lookup(product_id).await {
            Ok(product) => product.map(|p| p.price_string),
            Err(e) => {
                tracing::warn!(product = %self.key, error = %e, "price lookup failed");
                inner.trace(format!("Price lookup failed for {}: {e}", self.key));
                None
            }
        }
    }

    /// Run a purchase. Never fails; anything that goes wrong yields `None`.
    ///
    /// The prompt toggle fires `true` first and `false` exactly once after
    /// the attempt settles, even if this future is dropped early.
    pub async fn purchase(&self) -> Option<PurchaseResult> {
        let _prompt = PromptGuard::show(self.inner.on_purchase_prompt_toggle.clone());
        tokio::spawn(log_purchased_products(self.inner.clone()));
        self.attempt_purchase().await
    }

    async fn attempt_purchase(&self) -> Option<PurchaseResult> {
        let inner = &self.inner;
        inner.trace("Attempting to purchase subscription...");
        if !inner.ready_or_log("purchase").await {
            return None;
        }

        let Some(product_id) = self.product_id() else {
            inner.trace(format!(
                "Product not available on platform {}. Could not start purchase.",
                inner.platform
            ));
            return None;
        };

        match self.purchase_product(product_id).await {
            Ok(Some(result)) => {
                if let Some(on_attempt) = &inner.on_purchase_attempt {
                    on_attempt();
                }
                tracing::info!(product = %self.key, "purchase completed");
                inner.trace("Purchase completed.");
                Some(result)
            }
            Ok(None) => {
                inner.trace("Product not found");
                None
            }
            Err(e) => {
                tracing::warn!(product = %self.key, error = %e, "purchase failed");
                inner.trace(format!("Error: {e}"));
                None
            }
        }
    }

    async fn purchase_product(&self, product_id: &str) -> Result<Option<PurchaseResult>> {
        let Some(product) = self.inner.lookup(product_id).await? else {
            return Ok(None);
        };
        let result = self.inner.sdk.purchase_store_product(&product).await?;
        Ok(Some(result))
    }
}

/// Brackets a purchase attempt with prompt-visibility signals
struct PromptGuard(Option<PromptToggle>);

impl PromptGuard {
    fn show(toggle: Option<PromptToggle>) -> Self {
        if let Some(toggle) = &toggle {
            toggle(true);
        }
        Self(toggle)
    }
}

impl Drop for PromptGuard {
    fn drop(&mut self) {
        if let Some(toggle) = self.0.take() {
            toggle(false);
        }
    }
}

/// Detached diagnostic: dev-log what the customer already owns
async fn log_purchased_products(inner: Arc<StoreInner>) {
    if inner.gate.wait().await.is_err() {
        return;
    }
    match inner.sdk.customer_info().await {
        Ok(info) => {
            let owned = serde_json::to_string_pretty(&info.all_purchased_product_identifiers)
                .unwrap_or_default();
            inner.trace(format!("Purchases: {owned}"));
        }
        Err(e) => tracing::debug!(error = %e, "diagnostic customer info fetch failed"),
    }
}

async fn listen_for_ready(
    inner: Arc<StoreInner>,
    mut ready: ReadyListener,
    identity: IdentityUpdates,
    api_keys: ApiKeys,
    log_level: SdkLogLevel,
) {
    let mut identity = Some(identity);

    while ready.recv().await.is_some() {
        tracing::debug!("platform ready signal received");
        inner.trace("deviceready triggered");
        if !inner.setup.try_start() {
            continue;
        }
        run_setup(&inner, identity.take(), &api_keys, log_level).await;
    }

    if inner.setup.phase() == SetupPhase::NotStarted {
        tracing::warn!("platform ready signal closed before it fired");
        inner.gate.resolve(GateState::Failed(
            "platform ready signal closed before it fired".into(),
        ));
    }
}

async fn run_setup(
    inner: &Arc<StoreInner>,
    identity: Option<IdentityUpdates>,
    api_keys: &ApiKeys,
    log_level: SdkLogLevel,
) {
    if !inner.platform.has_store() {
        inner.gate.resolve(GateState::Ready);
        inner.setup.finish();
        tracing::info!(platform = %inner.platform, "store initialized without purchasing SDK");
        return;
    }

    if let Err(e) = configure_sdk(inner, api_keys, log_level).await {
        tracing::warn!(error = %e, "purchasing SDK setup failed");
        inner.trace(format!("Purchasing SDK setup failed: {e}"));
        inner.gate.resolve(GateState::Failed(e.to_string()));
        inner.setup.finish();
        return;
    }

    inner.trace("About to start identity watcher.");
    if let Some(updates) = identity {
        tokio::spawn(forward_identity(inner.clone(), updates));
    }

    inner.gate.resolve(GateState::Ready);
    inner.setup.finish();
    tracing::info!(platform = %inner.platform, sdk = inner.sdk.name(), "store initialized");
}

async fn configure_sdk(
    inner: &StoreInner,
    api_keys: &ApiKeys,
    log_level: SdkLogLevel,
) -> Result<()> {
    let api_key = api_keys.for_platform(inner.platform).ok_or_else(|| {
        StoreError::Config(format!("no API key for platform {}", inner.platform))
    })?;

    inner.sdk.set_log_level(log_level).await?;
    inner.sdk.configure(api_key).await?;
    Ok(())
}

/// Mirror identity changes into SDK login/logout.
///
/// Each change gets its own task; calls may overlap and finish out of order.
async fn forward_identity(inner: Arc<StoreInner>, mut updates: IdentityUpdates) {
    while let Some(user_id) = updates.recv().await {
        inner.trace(format!(
            "Identity: {}",
            user_id.as_deref().unwrap_or("<anonymous>")
        ));
        tokio::spawn(sync_identity(inner.clone(), user_id));
    }
    tracing::debug!("identity feed closed");
}

async fn sync_identity(inner: Arc<StoreInner>, user_id: Option<String>) {
    if let Some(user_id) = user_id {
        inner.trace(format!("Logging in as {user_id}."));
        if let Err(e) = inner.sdk.log_in(&user_id).await {
            tracing::warn!(error = %e, "failed to log in to purchasing SDK");
            inner.trace("Failed to log in.");
        }
        return;
    }

    inner.trace("Logging out.");
    match inner.sdk.is_anonymous().await {
        Ok(true) => {}
        Ok(false) => {
            if let Err(e) = inner.sdk.log_out().await {
                tracing::warn!(error = %e, "failed to log out of purchasing SDK");
                inner.trace("Failed to log out.");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to query anonymous state");
            inner.trace("Failed to log out.");
        }
    }
}
