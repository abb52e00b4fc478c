//! Store adapter behaviour against the mock purchasing SDK.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use miap_core::{
    identity_channel, platform_ready_channel, ApiKeys, IdentityFeed, MockPurchases, Platform,
    PlatformProductIds, PlatformReady, ProductCatalog, RecordingHost, SdkCall, SdkLogLevel,
    SdkOperation, SetupPhase, StoreAdapter, StoreConfig, StoreError, StoreProduct,
    StoreSettings, WEB_PLACEHOLDER_PRICE,
};
use rust_decimal_macros::dec;

struct Harness {
    store: StoreAdapter,
    sdk: Arc<MockPurchases>,
    host: Arc<RecordingHost>,
    ready: PlatformReady,
    identity: IdentityFeed,
    /// (showing, purchase calls seen at the time of the toggle)
    toggles: Arc<Mutex<Vec<(bool, usize)>>>,
    attempts: Arc<AtomicUsize>,
    logs: Arc<Mutex<Vec<String>>>,
}

fn catalog() -> ProductCatalog {
    ProductCatalog::new()
        .with_product(
            "pro",
            PlatformProductIds::new()
                .with_ios("pro_ios")
                .with_android("pro_android"),
        )
        .with_product("lifetime", PlatformProductIds::new().with_ios("lifetime_ios"))
        .with_product("delisted", PlatformProductIds::new().with_ios("delisted_ios"))
}

fn stocked_sdk() -> MockPurchases {
    MockPurchases::new()
        .with_product(StoreProduct::new("pro_ios", "Pro", dec!(4.99), "USD"))
        .with_product(StoreProduct::new("pro_android", "Pro", dec!(4.79), "EUR"))
        .with_product(StoreProduct::new("lifetime_ios", "Lifetime", dec!(49.99), "USD"))
}

fn harness(platform: Platform, sdk: MockPurchases) -> Harness {
    let sdk = Arc::new(sdk);
    let host = Arc::new(RecordingHost::new(platform));
    let (ready, ready_listener) = platform_ready_channel();
    let (identity, identity_updates) = identity_channel();

    let toggles = Arc::new(Mutex::new(Vec::new()));
    let attempts = Arc::new(AtomicUsize::new(0));
    let logs = Arc::new(Mutex::new(Vec::new()));

    let settings = StoreSettings::new(ApiKeys::new("appl_key", "goog_key"), catalog());
    let config = StoreConfig::new(settings, host.clone(), ready_listener, identity_updates)
        .with_dev_log({
            let logs = logs.clone();
            move |msg: &str| logs.lock().unwrap().push(msg.to_string())
        })
        .with_purchase_prompt_toggle({
            let toggles = toggles.clone();
            let sdk = sdk.clone();
            move |showing: bool| {
                let purchases = sdk.count(SdkOperation::Purchase);
                toggles.lock().unwrap().push((showing, purchases));
            }
        })
        .with_purchase_attempt({
            let attempts = attempts.clone();
            move || {
                attempts.fetch_add(1, Ordering::SeqCst);
            }
        });

    let store = StoreAdapter::new(config, sdk.clone());

    Harness {
        store,
        sdk,
        host,
        ready,
        identity,
        toggles,
        attempts,
        logs,
    }
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

#[tokio::test]
async fn test_setup_runs_once_for_repeated_ready_signals() {
    let h = harness(Platform::Ios, stocked_sdk());

    for _ in 0..5 {
        assert!(h.ready.fire());
    }
    h.store.ready().await.unwrap();

    h.identity.push(Some("user-1".into()));
    eventually(|| h.sdk.count(SdkOperation::LogIn) == 1).await;

    // Let the remaining ready signals drain
    tokio::time::sleep(Duration::from_millis(20)).await;

    let calls = h.sdk.calls();
    assert_eq!(calls[0], SdkCall::SetLogLevel(SdkLogLevel::Debug));
    assert_eq!(calls[1], SdkCall::Configure("appl_key".into()));
    assert_eq!(h.sdk.count(SdkOperation::Configure), 1);
    assert_eq!(h.sdk.count(SdkOperation::SetLogLevel), 1);
    assert_eq!(h.sdk.count(SdkOperation::LogIn), 1);
    assert_eq!(h.store.setup_phase(), SetupPhase::Done);

    let ready_logs = h
        .logs
        .lock()
        .unwrap()
        .iter()
        .filter(|msg| *msg == "deviceready triggered")
        .count();
    assert_eq!(ready_logs, 5);
}

#[tokio::test]
async fn test_android_configures_with_android_key() {
    let h = harness(Platform::Android, stocked_sdk());
    h.ready.fire();
    h.store.ready().await.unwrap();

    assert!(h.sdk.calls().contains(&SdkCall::Configure("goog_key".into())));
    let price = h.store.product("pro").unwrap().get_localized_price().await;
    assert_eq!(price.as_deref(), Some("€4.79"));
}

#[tokio::test]
async fn test_web_never_touches_sdk_setup_or_identity() {
    let h = harness(Platform::Web, stocked_sdk());
    h.ready.fire();
    h.store.ready().await.unwrap();

    h.identity.push(Some("user-1".into()));
    h.identity.push(None);

    let pro = h.store.product("pro").unwrap();
    assert_eq!(
        pro.get_localized_price().await.as_deref(),
        Some(WEB_PLACEHOLDER_PRICE)
    );
    assert!(pro.purchase().await.is_none());
    assert_eq!(*h.toggles.lock().unwrap(), vec![(true, 0), (false, 0)]);

    tokio::time::sleep(Duration::from_millis(20)).await;
    for operation in [
        SdkOperation::SetLogLevel,
        SdkOperation::Configure,
        SdkOperation::LogIn,
        SdkOperation::LogOut,
        SdkOperation::Products,
        SdkOperation::Purchase,
    ] {
        assert_eq!(h.sdk.count(operation), 0, "{operation:?} called on web");
    }
    assert_eq!(h.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_web_restore_is_forwarded() {
    let h = harness(Platform::Web, stocked_sdk());
    h.ready.fire();

    h.store.restore_purchases().await.unwrap();
    assert_eq!(h.sdk.calls(), vec![SdkCall::RestorePurchases]);
}

#[tokio::test]
async fn test_operations_wait_for_setup() {
    let h = harness(Platform::Ios, stocked_sdk());

    let pro = h.store.product("pro").unwrap().clone();
    let purchase = tokio::spawn({
        let pro = pro.clone();
        async move { pro.purchase().await }
    });
    let price = tokio::spawn(async move { pro.get_localized_price().await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.sdk.calls().is_empty());
    assert_eq!(h.store.setup_phase(), SetupPhase::NotStarted);

    h.ready.fire();
    let purchase = purchase.await.unwrap();
    let price = price.await.unwrap();

    assert_eq!(purchase.unwrap().product_identifier, "pro_ios");
    assert_eq!(price.as_deref(), Some("$4.99"));

    let calls = h.sdk.calls();
    assert_eq!(calls[0], SdkCall::SetLogLevel(SdkLogLevel::Debug));
    assert_eq!(calls[1], SdkCall::Configure("appl_key".into()));
}

#[tokio::test]
async fn test_restore_and_management_wait_for_setup() {
    let sdk = stocked_sdk().with_management_url("https://play.google.com/store/account");
    let h = harness(Platform::Ios, sdk);
    let store = Arc::new(h.store);

    let manage = tokio::spawn({
        let store = store.clone();
        async move { store.go_to_subscription_management().await }
    });
    let restore = tokio::spawn({
        let store = store.clone();
        async move { store.restore_purchases().await }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.sdk.calls().is_empty());
    assert!(h.host.opened_urls().is_empty());

    h.ready.fire();
    assert_eq!(
        manage.await.unwrap().as_deref(),
        Some("https://play.google.com/store/account")
    );
    restore.await.unwrap().unwrap();

    let calls = h.sdk.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0], SdkCall::SetLogLevel(SdkLogLevel::Debug));
    assert_eq!(calls[1], SdkCall::Configure("appl_key".into()));
    assert!(calls[2..].contains(&SdkCall::CustomerInfo));
    assert!(calls[2..].contains(&SdkCall::RestorePurchases));
}

#[tokio::test]
async fn test_signed_in_customer_is_logged_out_on_first_anonymous_push() {
    let h = harness(Platform::Ios, stocked_sdk().with_user("carol"));
    h.ready.fire();
    h.store.ready().await.unwrap();

    h.identity.push(None);
    eventually(|| h.sdk.count(SdkOperation::LogOut) == 1).await;

    let calls = h.sdk.calls();
    assert_eq!(&calls[2..], &[SdkCall::IsAnonymous, SdkCall::LogOut]);
}

#[tokio::test]
async fn test_identity_changes_mirror_into_login_and_logout() {
    let h = harness(Platform::Ios, stocked_sdk());
    h.ready.fire();
    h.store.ready().await.unwrap();

    h.identity.push(Some("alice".into()));
    eventually(|| h.sdk.count(SdkOperation::LogIn) == 1).await;

    h.identity.push(None);
    eventually(|| h.sdk.count(SdkOperation::LogOut) == 1).await;

    // Already anonymous: checked, but no logout
    h.identity.push(None);
    eventually(|| h.sdk.count(SdkOperation::IsAnonymous) == 2).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.sdk.count(SdkOperation::LogOut), 1);

    h.identity.push(Some("bob".into()));
    eventually(|| h.sdk.count(SdkOperation::LogIn) == 2).await;

    h.identity.push(None);
    eventually(|| h.sdk.count(SdkOperation::LogOut) == 2).await;

    assert!(h.sdk.calls().contains(&SdkCall::LogIn("alice".into())));
    assert!(h.sdk.calls().contains(&SdkCall::LogIn("bob".into())));
    assert_eq!(h.sdk.count(SdkOperation::IsAnonymous), 3);
}

#[tokio::test]
async fn test_identity_failures_are_swallowed() {
    let sdk = stocked_sdk();
    sdk.fail(SdkOperation::LogIn);
    let h = harness(Platform::Ios, sdk);
    h.ready.fire();

    h.identity.push(Some("alice".into()));
    eventually(|| h.sdk.count(SdkOperation::LogIn) == 1).await;
    eventually(|| h.logs.lock().unwrap().iter().any(|m| m == "Failed to log in.")).await;

    // Store keeps working
    let price = h.store.product("pro").unwrap().get_localized_price().await;
    assert_eq!(price.as_deref(), Some("$4.99"));
}

#[tokio::test]
async fn test_purchase_brackets_prompt_on_success() {
    let h = harness(Platform::Ios, stocked_sdk());
    h.ready.fire();

    let result = h.store.product("pro").unwrap().purchase().await.unwrap();
    assert_eq!(result.product_identifier, "pro_ios");
    assert_eq!(
        result.customer_info.all_purchased_product_identifiers,
        vec!["pro_ios".to_string()]
    );

    assert_eq!(*h.toggles.lock().unwrap(), vec![(true, 0), (false, 1)]);
    assert_eq!(h.attempts.load(Ordering::SeqCst), 1);
    assert!(h.logs.lock().unwrap().iter().any(|m| m == "Purchase completed."));
}

#[tokio::test]
async fn test_purchase_failure_returns_none_and_still_brackets() {
    let sdk = stocked_sdk();
    sdk.fail(SdkOperation::Purchase);
    let h = harness(Platform::Ios, sdk);
    h.ready.fire();

    let result = h.store.product("pro").unwrap().purchase().await;
    assert!(result.is_none());
    assert_eq!(*h.toggles.lock().unwrap(), vec![(true, 0), (false, 1)]);
    assert_eq!(h.attempts.load(Ordering::SeqCst), 0);
    assert!(h.logs.lock().unwrap().iter().any(|m| m.starts_with("Error: ")));
}

#[tokio::test]
async fn test_purchase_of_unlisted_product_returns_none() {
    let h = harness(Platform::Ios, stocked_sdk());
    h.ready.fire();

    let delisted = h.store.product("delisted").unwrap();
    assert!(delisted.purchase().await.is_none());
    assert!(delisted.get_localized_price().await.is_none());

    assert_eq!(h.sdk.count(SdkOperation::Purchase), 0);
    assert_eq!(*h.toggles.lock().unwrap(), vec![(true, 0), (false, 0)]);
    assert!(h.logs.lock().unwrap().iter().any(|m| m == "Product not found"));
}

#[tokio::test]
async fn test_missing_platform_id_skips_sdk() {
    let h = harness(Platform::Android, stocked_sdk());
    h.ready.fire();

    let lifetime = h.store.product("lifetime").unwrap();
    assert_eq!(lifetime.product_id(), None);
    assert!(lifetime.get_localized_price().await.is_none());
    assert!(lifetime.purchase().await.is_none());

    assert_eq!(h.sdk.count(SdkOperation::Products), 0);
    assert_eq!(h.sdk.count(SdkOperation::Purchase), 0);
    assert_eq!(*h.toggles.lock().unwrap(), vec![(true, 0), (false, 0)]);
    assert!(
        h.logs
            .lock()
            .unwrap()
            .iter()
            .any(|m| m == "Product not available on platform android. Could not start purchase.")
    );
}

#[tokio::test]
async fn test_purchase_logs_owned_products() {
    let h = harness(Platform::Ios, stocked_sdk());
    h.ready.fire();

    h.store.product("pro").unwrap().purchase().await.unwrap();
    eventually(|| h.sdk.count(SdkOperation::CustomerInfo) == 1).await;
    eventually(|| {
        h.logs
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.starts_with("Purchases: ["))
    })
    .await;
}

#[tokio::test]
async fn test_restore_propagates_vendor_failure() {
    let h = harness(Platform::Ios, stocked_sdk());
    h.ready.fire();

    h.store.restore_purchases().await.unwrap();

    h.sdk.fail(SdkOperation::RestorePurchases);
    let err = h.store.restore_purchases().await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Vendor {
            operation: "restorePurchases",
            ..
        }
    ));
}

#[tokio::test]
async fn test_management_url_absent_is_silent() {
    let h = harness(Platform::Ios, stocked_sdk());
    h.ready.fire();

    assert_eq!(h.store.go_to_subscription_management().await, None);
    assert!(h.host.opened_urls().is_empty());
    assert!(h.logs.lock().unwrap().iter().any(|m| m == "No management URL found."));
}

#[tokio::test]
async fn test_management_url_opens_in_host() {
    let sdk = stocked_sdk().with_management_url("https://apps.apple.com/account/subscriptions");
    let h = harness(Platform::Ios, sdk);
    h.ready.fire();

    let opened = h.store.go_to_subscription_management().await;
    assert_eq!(opened, h.host.last_opened());
    assert_eq!(
        opened.as_deref(),
        Some("https://apps.apple.com/account/subscriptions")
    );
}

#[tokio::test]
async fn test_failed_setup_degrades_operations() {
    let sdk = stocked_sdk();
    sdk.fail(SdkOperation::Configure);
    let h = harness(Platform::Ios, sdk);
    h.ready.fire();

    assert!(matches!(h.store.ready().await, Err(StoreError::SetupFailed(_))));

    let pro = h.store.product("pro").unwrap();
    assert!(pro.get_localized_price().await.is_none());
    assert!(pro.purchase().await.is_none());
    assert_eq!(*h.toggles.lock().unwrap(), vec![(true, 0), (false, 0)]);

    assert_eq!(h.store.go_to_subscription_management().await, None);
    assert!(matches!(
        h.store.restore_purchases().await,
        Err(StoreError::SetupFailed(_))
    ));

    // Identity forwarding never started
    h.identity.push(Some("alice".into()));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.sdk.count(SdkOperation::LogIn), 0);
    assert_eq!(h.sdk.count(SdkOperation::Products), 0);
}

#[tokio::test]
async fn test_ready_signal_dropped_before_firing() {
    let h = harness(Platform::Ios, stocked_sdk());
    drop(h.ready);

    assert!(matches!(
        h.store.restore_purchases().await,
        Err(StoreError::SetupFailed(_))
    ));
    assert!(h.sdk.calls().is_empty());
}

#[test]
fn test_product_handles_follow_catalog_keys() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let _guard = runtime.enter();

    let h = harness(Platform::Ios, MockPurchases::new());
    assert_eq!(
        h.store.product_keys().collect::<Vec<_>>(),
        vec!["delisted", "lifetime", "pro"]
    );
    assert!(h.store.product("missing").is_none());
    assert_eq!(h.store.platform(), Platform::Ios);
}
