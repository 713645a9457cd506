pub mod change;
pub mod key;
pub mod orchestrator;
pub mod planner;

pub use change::{ChangeDetector, SyncDirection};
pub use key::KeyMapper;
pub use orchestrator::{BatchReport, TransferFailure, TransferOrchestrator, TransferProgress};
pub use planner::{SyncPlan, SyncPlanner, TransferItem};
