use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client-side view of the backend's batch matching flag.
///
/// `status == None` means the flag has not been loaded yet (or the backend
/// reported no value). Never persisted; the backend owns the real value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchState {
    pub status: Option<bool>,
    pub loading: bool,
    pub error: Option<String>,
}

impl BatchState {
    pub fn phase(&self) -> BatchPhase {
        if self.loading {
            BatchPhase::Loading
        } else if let Some(error) = &self.error {
            BatchPhase::Failed(error.clone())
        } else if let Some(status) = self.status {
            BatchPhase::Loaded(status)
        } else {
            BatchPhase::Idle
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchPhase {
    Idle,
    Loading,
    Loaded(bool),
    Failed(String),
}

/// Snapshot of what is persisted around a side-flow redirect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectMemory {
    pub before_url: Option<String>,
    pub redirect_payload: Option<Value>,
}

/// Context carried across the hand-off to the payment checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutContext {
    pub product_id: String,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_prefers_loading_then_error_then_status() {
        let mut state = BatchState::default();
        assert_eq!(state.phase(), BatchPhase::Idle);

        state.status = Some(true);
        assert_eq!(state.phase(), BatchPhase::Loaded(true));

        state.error = Some("offline".into());
        assert_eq!(state.phase(), BatchPhase::Failed("offline".into()));

        state.loading = true;
        assert_eq!(state.phase(), BatchPhase::Loading);
    }

    #[test]
    fn redirect_memory_uses_camel_case_keys() {
        let memory = RedirectMemory {
            before_url: Some("/profile/7".into()),
            redirect_payload: None,
        };
        assert_eq!(
            serde_json::to_value(&memory).unwrap(),
            serde_json::json!({ "beforeUrl": "/profile/7", "redirectPayload": null })
        );
    }
}
