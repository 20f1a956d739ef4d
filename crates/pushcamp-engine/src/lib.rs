//! # Pushcamp Engine
//!
//! The campaign orchestration core. Data flows one way:
//!
//! ```text
//! ProviderGateway → directory (paginated snapshot)
//!   → select   (user list / groups / resume+ignore / active)
//!   → eligibility (push-capable device choice per account)
//!   → scheduler (fixed-size batches, bounded worker pool, pacing)
//!       → retry (per-account challenge loop → terminal outcome)
//!   → results  (append-only CSV, doubles as resume/dedup state)
//! ```
//!
//! The engine owns no I/O beyond the result log; everything provider-side
//! goes through the `ProviderGateway` trait.

pub mod directory;
pub mod eligibility;
pub mod lists;
pub mod results;
pub mod retry;
pub mod run;
pub mod scheduler;
pub mod select;

#[cfg(test)]
pub(crate) mod testutil;

pub use eligibility::DispatchPlan;
pub use lists::UserListEntry;
pub use results::{ResultLog, ResultRow};
pub use retry::RetryPolicy;
pub use run::run_campaign;
pub use scheduler::{BatchScheduler, CancelFlag, RunStats};
pub use select::{SelectionCriteria, Target};
