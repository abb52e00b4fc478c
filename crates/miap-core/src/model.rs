//! Domain Models
//!
//! Platforms, the product catalog, and the shapes returned by the purchasing SDK.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Host platform the store runs on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

impl Platform {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Web => "web",
        }
    }

    /// Whether a real purchasing backend exists on this platform
    pub const fn has_store(&self) -> bool {
        !matches!(self, Self::Web)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ios" => Ok(Self::Ios),
            "android" => Ok(Self::Android),
            "web" => Ok(Self::Web),
            other => Err(StoreError::Config(format!("unknown platform: {other}"))),
        }
    }
}

/// Vendor product identifiers for one product key
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformProductIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ios: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<String>,
}

impl PlatformProductIds {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ios(mut self, product_id: impl Into<String>) -> Self {
        self.ios = Some(product_id.into());
        self
    }

    #[must_use]
    pub fn with_android(mut self, product_id: impl Into<String>) -> Self {
        self.android = Some(product_id.into());
        self
    }

    /// Web never has an identifier.
    pub fn for_platform(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Ios => self.ios.as_deref(),
            Platform::Android => self.android.as_deref(),
            Platform::Web => None,
        }
    }
}

/// Product key -> per-platform vendor identifiers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductCatalog(BTreeMap<String, PlatformProductIds>);

impl ProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_product(mut self, key: impl Into<String>, ids: PlatformProductIds) -> Self {
        self.0.insert(key.into(), ids);
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PlatformProductIds)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Diagnostic verbosity of the purchasing SDK
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SdkLogLevel {
    Verbose,
    #[default]
    Debug,
    Info,
    Warn,
    Error,
}

/// Customer state as reported by the SDK
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub original_app_user_id: String,

    /// Where the customer manages their subscriptions, if the store has one
    #[serde(rename = "managementURL", default)]
    pub management_url: Option<String>,

    #[serde(default)]
    pub active_subscriptions: Vec<String>,

    #[serde(default)]
    pub all_purchased_product_identifiers: Vec<String>,
}

/// A product as the platform store describes it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreProduct {
    pub identifier: String,
    pub title: String,
    pub description: String,
    pub price: Decimal,

    /// Price formatted for the customer's locale, e.g. `$4.99`
    pub price_string: String,
    pub currency_code: String,
}

impl StoreProduct {
    pub fn new(
        identifier: impl Into<String>,
        title: impl Into<String>,
        price: Decimal,
        currency_code: impl Into<String>,
    ) -> Self {
        let currency_code = currency_code.into();
        let price_string = match currency_code.as_str() {
            "USD" => format!("${:.2}", price),
            "EUR" => format!("€{:.2}", price),
            "GBP" => format!("£{:.2}", price),
            other => format!("{:.2} {}", price, other),
        };

        Self {
            identifier: identifier.into(),
            title: title.into(),
            description: String::new(),
            price,
            price_string,
            currency_code,
        }
    }
}

/// Outcome of a completed purchase
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResult {
    pub product_identifier: String,
    pub transaction_identifier: String,
    pub purchase_date: DateTime<Utc>,
    pub customer_info: CustomerInfo,
}

/// Outcome of logging an identity into the SDK
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogInResult {
    pub customer_info: CustomerInfo,

    /// Whether the SDK created a new customer for this identity
    pub created: bool,
}
