use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::domain::RedirectMemory;
use storage::StorageAccessor;
use tracing::{debug, warn};

pub const BEFORE_REDIRECT_URL_KEY: &str = "before_redirect_url";
pub const REDIRECT_PAYLOAD_KEY: &str = "redirect_payload";

pub const PAYMENT_PURCHASE_ROUTE: &str = "payment/purchase";
pub const PAYMENT_SUCCESS_ROUTE: &str = "payment/success";
pub const PAYMENT_FAIL_ROUTE: &str = "payment/fail";

pub trait Navigator: Send {
    fn current_location(&self) -> String;
    fn navigate(&mut self, route: &str);
    /// Platform-default "previous page".
    fn go_back(&mut self);
}

/// In-memory history stack. The first entry is never popped.
#[derive(Debug, Clone)]
pub struct HistoryNavigator {
    entries: Vec<String>,
}

impl HistoryNavigator {
    pub fn new(start: &str) -> Self {
        Self {
            entries: vec![normalize_route(start)],
        }
    }

    pub fn history(&self) -> &[String] {
        &self.entries
    }
}

impl Navigator for HistoryNavigator {
    fn current_location(&self) -> String {
        self.entries.last().cloned().unwrap_or_else(|| "/".into())
    }

    fn navigate(&mut self, route: &str) {
        self.entries.push(normalize_route(route));
    }

    fn go_back(&mut self) {
        if self.entries.len() > 1 {
            self.entries.pop();
        }
    }
}

fn normalize_route(route: &str) -> String {
    let route = route.trim();
    if route.starts_with('/') || route.contains("://") {
        route.to_string()
    } else {
        format!("/{route}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackOutcome {
    Remembered(String),
    PlatformBack,
}

/// Session-scoped redirect memory: where the user was before a side flow
/// and an optional single-use payload for that flow.
///
/// Both values live in the accessor's store so they survive a restart of
/// the process that drives navigation.
pub struct NavigationContext<N> {
    navigator: N,
    storage: StorageAccessor,
}

impl<N: Navigator> NavigationContext<N> {
    pub fn new(navigator: N, storage: StorageAccessor) -> Self {
        Self { navigator, storage }
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn into_navigator(self) -> N {
        self.navigator
    }

    /// Remembers the current location, drops any earlier payload, and moves
    /// to `target`.
    pub async fn redirect(&mut self, target: &str) {
        self.redirect_inner(target, None).await;
    }

    /// Like [`redirect`](Self::redirect), attaching `payload` for the
    /// destination to pick up with [`take_payload`](Self::take_payload).
    pub async fn redirect_with<T: Serialize + ?Sized>(&mut self, target: &str, payload: &T) {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(%error, target, "redirect payload is not serializable; dropping it");
                None
            }
        };
        self.redirect_inner(target, payload).await;
    }

    async fn redirect_inner(&mut self, target: &str, payload: Option<Value>) {
        let before = self.navigator.current_location();
        self.storage.write(BEFORE_REDIRECT_URL_KEY, &before).await;
        match &payload {
            Some(value) => self.storage.write(REDIRECT_PAYLOAD_KEY, value).await,
            None => self.storage.remove(REDIRECT_PAYLOAD_KEY).await,
        }
        debug!(%before, target, has_payload = payload.is_some(), "redirecting");
        self.navigator.navigate(target);
    }

    /// Returns to the remembered location, or falls back to the platform's
    /// back navigation. The remembered location is cleared either way.
    pub async fn back(&mut self) -> BackOutcome {
        let before = self
            .storage
            .read::<String>(BEFORE_REDIRECT_URL_KEY)
            .await
            .filter(|url| !url.trim().is_empty());

        let outcome = match before {
            Some(url) => {
                self.navigator.navigate(&url);
                BackOutcome::Remembered(url)
            }
            None => {
                self.navigator.go_back();
                BackOutcome::PlatformBack
            }
        };
        self.storage.remove(BEFORE_REDIRECT_URL_KEY).await;
        debug!(?outcome, "navigated back");
        outcome
    }

    /// Reads and clears the redirect payload.
    pub async fn take_payload<T: DeserializeOwned>(&self) -> Option<T> {
        let value = self.storage.read::<Value>(REDIRECT_PAYLOAD_KEY).await?;
        self.storage.remove(REDIRECT_PAYLOAD_KEY).await;
        match serde_json::from_value(value) {
            Ok(payload) => Some(payload),
            Err(error) => {
                warn!(%error, "redirect payload has an unexpected shape");
                None
            }
        }
    }

    pub async fn memory(&self) -> RedirectMemory {
        RedirectMemory {
            before_url: self.storage.read(BEFORE_REDIRECT_URL_KEY).await,
            redirect_payload: self.storage.read(REDIRECT_PAYLOAD_KEY).await,
        }
    }
}

#[cfg(test)]
#[path = "tests/navigation_tests.rs"]
mod tests;
