use super::*;
use shared::domain::CheckoutContext;
use std::sync::Arc;
use storage::{MemoryStore, Storage, UnavailableStore};

fn context_at(location: &str) -> NavigationContext<HistoryNavigator> {
    NavigationContext::new(
        HistoryNavigator::new(location),
        StorageAccessor::new(Arc::new(MemoryStore::new())),
    )
}

#[tokio::test]
async fn redirect_then_back_returns_to_origin_and_clears_memory() {
    let mut ctx = context_at("/profile/7");

    ctx.redirect(PAYMENT_PURCHASE_ROUTE).await;
    assert_eq!(ctx.navigator().current_location(), "/payment/purchase");
    assert_eq!(
        ctx.memory().await.before_url.as_deref(),
        Some("/profile/7")
    );

    let outcome = ctx.back().await;
    assert_eq!(outcome, BackOutcome::Remembered("/profile/7".into()));
    assert_eq!(ctx.navigator().current_location(), "/profile/7");
    assert_eq!(ctx.memory().await.before_url, None);
}

#[tokio::test]
async fn second_back_falls_back_to_platform_navigation() {
    let mut ctx = context_at("/home");
    ctx.navigator.navigate("/profile/7");

    ctx.redirect(PAYMENT_PURCHASE_ROUTE).await;
    assert_eq!(
        ctx.back().await,
        BackOutcome::Remembered("/profile/7".into())
    );
    assert_eq!(ctx.back().await, BackOutcome::PlatformBack);
    assert_eq!(ctx.navigator().current_location(), "/payment/purchase");
}

#[tokio::test]
async fn back_without_redirect_uses_platform_history() {
    let mut ctx = context_at("/home");
    ctx.navigator.navigate("/matches");

    assert_eq!(ctx.back().await, BackOutcome::PlatformBack);
    assert_eq!(ctx.navigator().current_location(), "/home");
}

#[tokio::test]
async fn repeated_redirects_keep_the_last_origin() {
    let mut ctx = context_at("/home");
    ctx.redirect("/profile/edit").await;
    ctx.redirect(PAYMENT_PURCHASE_ROUTE).await;

    assert_eq!(
        ctx.back().await,
        BackOutcome::Remembered("/profile/edit".into())
    );
}

#[tokio::test]
async fn payload_is_single_use() {
    let mut ctx = context_at("/shop");
    let checkout = CheckoutContext {
        product_id: "heart-30".into(),
        amount: 9_900,
        order_id: None,
    };

    ctx.redirect_with(PAYMENT_PURCHASE_ROUTE, &checkout).await;
    assert_eq!(
        ctx.memory().await.redirect_payload,
        Some(serde_json::to_value(&checkout).expect("json"))
    );

    assert_eq!(ctx.take_payload::<CheckoutContext>().await, Some(checkout));
    assert_eq!(ctx.take_payload::<CheckoutContext>().await, None);
}

#[tokio::test]
async fn redirect_without_payload_drops_previous_payload() {
    let mut ctx = context_at("/shop");
    ctx.redirect_with(PAYMENT_PURCHASE_ROUTE, &serde_json::json!({ "coupon": "WELCOME" }))
        .await;
    ctx.back().await;

    ctx.redirect(PAYMENT_PURCHASE_ROUTE).await;
    assert_eq!(ctx.memory().await.redirect_payload, None);
}

#[tokio::test]
async fn mismatched_payload_shape_reads_as_none_and_is_consumed() {
    let mut ctx = context_at("/shop");
    ctx.redirect_with(PAYMENT_PURCHASE_ROUTE, &serde_json::json!([1, 2, 3]))
        .await;

    assert_eq!(ctx.take_payload::<CheckoutContext>().await, None);
    assert_eq!(ctx.memory().await.redirect_payload, None);
}

#[tokio::test]
async fn unavailable_storage_degrades_to_platform_back() {
    let mut ctx = NavigationContext::new(
        HistoryNavigator::new("/home"),
        StorageAccessor::new(Arc::new(UnavailableStore)),
    );
    ctx.navigator.navigate("/profile/7");

    ctx.redirect(PAYMENT_PURCHASE_ROUTE).await;
    assert_eq!(ctx.navigator().current_location(), "/payment/purchase");

    assert_eq!(ctx.back().await, BackOutcome::PlatformBack);
    assert_eq!(ctx.navigator().current_location(), "/profile/7");
}

#[tokio::test]
async fn memory_survives_a_new_session_on_the_same_store() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let accessor = StorageAccessor::new(Arc::new(storage));

    let mut leaving = NavigationContext::new(HistoryNavigator::new("/matches"), accessor.clone());
    leaving.redirect(PAYMENT_PURCHASE_ROUTE).await;
    drop(leaving);

    let mut returning =
        NavigationContext::new(HistoryNavigator::new(PAYMENT_SUCCESS_ROUTE), accessor);
    assert_eq!(
        returning.back().await,
        BackOutcome::Remembered("/matches".into())
    );
    assert_eq!(returning.navigator().history(), ["/payment/success", "/matches"]);
}

#[tokio::test]
async fn failed_payment_return_hands_back_checkout_and_origin() {
    let accessor = StorageAccessor::new(Arc::new(MemoryStore::new()));
    let checkout = CheckoutContext {
        product_id: "boost-30".into(),
        amount: 9_900,
        order_id: None,
    };

    let mut leaving = NavigationContext::new(HistoryNavigator::new("/shop"), accessor.clone());
    leaving.redirect_with(PAYMENT_PURCHASE_ROUTE, &checkout).await;
    drop(leaving);

    let mut returning =
        NavigationContext::new(HistoryNavigator::new(PAYMENT_FAIL_ROUTE), accessor);
    assert_eq!(returning.navigator().current_location(), "/payment/fail");
    assert_eq!(
        returning.take_payload::<CheckoutContext>().await,
        Some(checkout)
    );
    assert_eq!(
        returning.back().await,
        BackOutcome::Remembered("/shop".into())
    );
    assert_eq!(returning.memory().await, RedirectMemory::default());
}

#[test]
fn history_navigator_never_pops_its_first_entry() {
    let mut navigator = HistoryNavigator::new("home");
    navigator.go_back();
    assert_eq!(navigator.current_location(), "/home");
    navigator.navigate("https://pay.example.com/checkout");
    assert_eq!(navigator.current_location(), "https://pay.example.com/checkout");
}
