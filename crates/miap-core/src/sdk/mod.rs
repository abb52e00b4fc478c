//! Purchasing SDK Integration
//!
//! The vendor purchasing SDK is an opaque remote service. The store only
//! talks to it through [`PurchasesSdk`], so native bridges, web stubs and
//! test doubles are interchangeable.

mod mock;

pub use mock::{MockPurchases, SdkCall, SdkOperation};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{CustomerInfo, LogInResult, PurchaseResult, SdkLogLevel, StoreProduct};

/// Purchasing SDK trait (Strategy pattern)
///
/// Implement this for each vendor binding.
#[async_trait]
pub trait PurchasesSdk: Send + Sync {
    /// Set the SDK's own diagnostic verbosity
    async fn set_log_level(&self, level: SdkLogLevel) -> Result<()>;

    /// Configure the SDK with a platform API key
    async fn configure(&self, api_key: &str) -> Result<()>;

    /// Identify the current customer
    async fn log_in(&self, app_user_id: &str) -> Result<LogInResult>;

    /// Drop back to an anonymous customer
    async fn log_out(&self) -> Result<CustomerInfo>;

    /// Whether the current customer is anonymous
    async fn is_anonymous(&self) -> Result<bool>;

    async fn customer_info(&self) -> Result<CustomerInfo>;

    /// Look up store products by identifier. Unknown identifiers are skipped.
    async fn products(&self, product_ids: &[String]) -> Result<Vec<StoreProduct>>;

    async fn purchase_store_product(&self, product: &StoreProduct) -> Result<PurchaseResult>;

    async fn restore_purchases(&self) -> Result<CustomerInfo>;

    /// SDK name, for logs
    fn name(&self) -> &str;
}
