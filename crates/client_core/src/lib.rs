pub mod backend;
pub mod batch;
pub mod error;
pub mod navigation;
pub mod schedule;

pub use backend::{BatchStatusApi, HttpAdminApi, MatchingApi, DEFAULT_REQUEST_TIMEOUT};
pub use batch::BatchStatusController;
pub use error::BackendError;
pub use navigation::{BackOutcome, HistoryNavigator, NavigationContext, Navigator};
pub use schedule::{DailySchedule, MatchingTrigger, TriggerOutcome};
