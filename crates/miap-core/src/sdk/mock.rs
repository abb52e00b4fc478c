//! Mock Purchases SDK
//!
//! In-memory SDK for testing and sandbox use. Records every call and can be
//! told to fail any operation.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::PurchasesSdk;
use crate::error::{Result, StoreError};
use crate::model::{
    CustomerInfo, LogInResult, Platform, ProductCatalog, PurchaseResult, SdkLogLevel,
    StoreProduct,
};

const ANONYMOUS_PREFIX: &str = "$RCAnonymousID:";

/// SDK operations, used to target failure injection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SdkOperation {
    SetLogLevel,
    Configure,
    LogIn,
    LogOut,
    IsAnonymous,
    CustomerInfo,
    Products,
    Purchase,
    RestorePurchases,
}

impl SdkOperation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SetLogLevel => "setLogLevel",
            Self::Configure => "configure",
            Self::LogIn => "logIn",
            Self::LogOut => "logOut",
            Self::IsAnonymous => "isAnonymous",
            Self::CustomerInfo => "getCustomerInfo",
            Self::Products => "getProducts",
            Self::Purchase => "purchaseStoreProduct",
            Self::RestorePurchases => "restorePurchases",
        }
    }
}

/// A recorded SDK call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SdkCall {
    SetLogLevel(SdkLogLevel),
    Configure(String),
    LogIn(String),
    LogOut,
    IsAnonymous,
    CustomerInfo,
    Products(Vec<String>),
    Purchase(String),
    RestorePurchases,
}

impl SdkCall {
    pub const fn operation(&self) -> SdkOperation {
        match self {
            Self::SetLogLevel(_) => SdkOperation::SetLogLevel,
            Self::Configure(_) => SdkOperation::Configure,
            Self::LogIn(_) => SdkOperation::LogIn,
            Self::LogOut => SdkOperation::LogOut,
            Self::IsAnonymous => SdkOperation::IsAnonymous,
            Self::CustomerInfo => SdkOperation::CustomerInfo,
            Self::Products(_) => SdkOperation::Products,
            Self::Purchase(_) => SdkOperation::Purchase,
            Self::RestorePurchases => SdkOperation::RestorePurchases,
        }
    }
}

struct MockState {
    products: HashMap<String, StoreProduct>,
    app_user_id: String,
    management_url: Option<String>,
    purchased: Vec<String>,
    failing: HashSet<SdkOperation>,
    calls: Vec<SdkCall>,
}

/// Mock purchasing SDK with an in-memory product table
pub struct MockPurchases {
    state: Mutex<MockState>,
}

impl Default for MockPurchases {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPurchases {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                products: HashMap::new(),
                app_user_id: anonymous_id(),
                management_url: None,
                purchased: Vec::new(),
                failing: HashSet::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// Stock every catalog product available on `platform` at one price
    pub fn from_catalog(
        catalog: &ProductCatalog,
        platform: Platform,
        price: Decimal,
        currency_code: &str,
    ) -> Self {
        let mock = Self::new();
        for (key, ids) in catalog.iter() {
            if let Some(product_id) = ids.for_platform(platform) {
                mock.add_product(StoreProduct::new(
                    product_id,
                    key.as_str(),
                    price,
                    currency_code,
                ));
            }
        }
        mock
    }

    #[must_use]
    pub fn with_product(self, product: StoreProduct) -> Self {
        self.add_product(product);
        self
    }

    #[must_use]
    pub fn with_management_url(self, url: impl Into<String>) -> Self {
        self.lock().management_url = Some(url.into());
        self
    }

    /// Start with an identified (non-anonymous) customer
    #[must_use]
    pub fn with_user(self, app_user_id: impl Into<String>) -> Self {
        self.lock().app_user_id = app_user_id.into();
        self
    }

    pub fn add_product(&self, product: StoreProduct) {
        self.lock()
            .products
            .insert(product.identifier.clone(), product);
    }

    /// Make every future call to `operation` fail
    pub fn fail(&self, operation: SdkOperation) {
        self.lock().failing.insert(operation);
    }

    pub fn recover(&self, operation: SdkOperation) {
        self.lock().failing.remove(&operation);
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<SdkCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, operation: SdkOperation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `call`, then fail if its operation is marked failing
    fn record(&self, call: SdkCall) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        let operation = call.operation();
        state.calls.push(call);
        if state.failing.contains(&operation) {
            return Err(StoreError::vendor(operation.as_str(), "injected failure"));
        }
        Ok(state)
    }
}

impl MockState {
    fn customer_info(&self) -> CustomerInfo {
        let mut active = self.purchased.clone();
        active.sort();
        active.dedup();
        CustomerInfo {
            original_app_user_id: self.app_user_id.clone(),
            management_url: self.management_url.clone(),
            active_subscriptions: active,
            all_purchased_product_identifiers: self.purchased.clone(),
        }
    }
}

fn anonymous_id() -> String {
    format!("{ANONYMOUS_PREFIX}{}", Uuid::new_v4().simple())
}

#[async_trait]
impl PurchasesSdk for MockPurchases {
    async fn set_log_level(&self, level: SdkLogLevel) -> Result<()> {
        drop(self.record(SdkCall::SetLogLevel(level))?);
        Ok(())
    }

    async fn configure(&self, api_key: &str) -> Result<()> {
        drop(self.record(SdkCall::Configure(api_key.to_string()))?);
        Ok(())
    }

    async fn log_in(&self, app_user_id: &str) -> Result<LogInResult> {
        let mut state = self.record(SdkCall::LogIn(app_user_id.to_string()))?;
        let created = state.app_user_id != app_user_id;
        state.app_user_id = app_user_id.to_string();
        Ok(LogInResult {
            customer_info: state.customer_info(),
            created,
        })
    }

    async fn log_out(&self) -> Result<CustomerInfo> {
        let mut state = self.record(SdkCall::LogOut)?;
        if state.app_user_id.starts_with(ANONYMOUS_PREFIX) {
            return Err(StoreError::vendor(
                SdkOperation::LogOut.as_str(),
                "current customer is already anonymous",
            ));
        }
        state.app_user_id = anonymous_id();
        state.purchased.clear();
        Ok(state.customer_info())
    }

    async fn is_anonymous(&self) -> Result<bool> {
        let state = self.record(SdkCall::IsAnonymous)?;
        Ok(state.app_user_id.starts_with(ANONYMOUS_PREFIX))
    }

    async fn customer_info(&self) -> Result<CustomerInfo> {
        let state = self.record(SdkCall::CustomerInfo)?;
        Ok(state.customer_info())
    }

    async fn products(&self, product_ids: &[String]) -> Result<Vec<StoreProduct>> {
        let state = self.record(SdkCall::Products(product_ids.to_vec()))?;
        Ok(product_ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn purchase_store_product(&self, product: &StoreProduct) -> Result<PurchaseResult> {
        let mut state = self.record(SdkCall::Purchase(product.identifier.clone()))?;
        if !state.products.contains_key(&product.identifier) {
            return Err(StoreError::vendor(
                SdkOperation::Purchase.as_str(),
                format!("unknown product {}", product.identifier),
            ));
        }

        state.purchased.push(product.identifier.clone());
        Ok(PurchaseResult {
            product_identifier: product.identifier.clone(),
            transaction_identifier: Uuid::new_v4().to_string(),
            purchase_date: Utc::now(),
            customer_info: state.customer_info(),
        })
    }

    async fn restore_purchases(&self) -> Result<CustomerInfo> {
        let state = self.record(SdkCall::RestorePurchases)?;
        Ok(state.customer_info())
    }

    fn name(&self) -> &str {
        "MockPurchases"
    }
}
