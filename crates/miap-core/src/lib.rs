//! # miap-core
//!
//! Cross-platform in-app-purchase store over a vendor purchasing SDK.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  ready / identity  ┌──────────────────────────────┐
//! │     Host     │───────────────────▶│         StoreAdapter         │
//! │ (app shell)  │◀───────────────────│  ┌──────────┐  ┌──────────┐  │
//! └──────────────┘  open_url, prompt  │  │ Readiness│──│ Products │  │
//!                                     │  │   Gate   │  │ handles  │  │
//!                                     │  └────┬─────┘  └────┬─────┘  │
//!                                     └───────┼─────────────┼────────┘
//!                                             ▼             ▼
//!                                     ┌──────────────────────────────┐
//!                                     │   PurchasesSdk (Strategy)    │
//!                                     └──────────────────────────────┘
//! ```
//!
//! The `PurchasesSdk` trait hides the vendor binding; iOS and Android get
//! a configured SDK, web gets stubbed prices and no-op purchases.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use miap_core::{identity_channel, platform_ready_channel, StoreAdapter, StoreConfig};
//!
//! let (ready, ready_listener) = platform_ready_channel();
//! let (identity, identity_updates) = identity_channel();
//!
//! let config = StoreConfig::new(settings, host, ready_listener, identity_updates)
//!     .with_purchase_prompt_toggle(|showing| println!("prompt visible: {showing}"));
//! let store = StoreAdapter::new(config, sdk);
//!
//! ready.fire();
//! identity.push(Some("user-42".into()));
//!
//! let price = store.product("pro").unwrap().get_localized_price().await;
//! ```

pub mod config;
pub mod error;
pub mod gate;
pub mod host;
pub mod model;
pub mod sdk;
pub mod store;

pub use config::{ApiKeys, StoreConfig, StoreSettings};
pub use error::{Result, StoreError};
pub use gate::{GateState, SetupPhase};
pub use host::{
    identity_channel, platform_ready_channel, Host, IdentityFeed, IdentityUpdates,
    PlatformReady, ReadyListener, RecordingHost,
};
pub use model::{
    CustomerInfo, LogInResult, Platform, PlatformProductIds, ProductCatalog, PurchaseResult,
    SdkLogLevel, StoreProduct,
};
pub use sdk::{MockPurchases, PurchasesSdk, SdkCall, SdkOperation};
pub use store::{ProductHandle, StoreAdapter, WEB_PLACEHOLDER_PRICE};
