//! LiveFlow reconciliation core
//!
//! This crate provides the entity-agnostic half of LiveFlow: the contract a
//! resource reconciler satisfies, and the pieces every reconciler shares.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  LiveFlow CLI                    │
//! │          (liveflow plan / apply / destroy)        │
//! └─────────────────┬───────────────────────────────┘
//!                   │ desired state + records
//! ┌─────────────────▼───────────────────────────────┐
//! │                liveflow-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │         Reconciler Abstraction            │   │
//! │  │  trait Resource { create/read/update/... }│   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌────────────┐ ┌────────────┐ ┌────────────┐   │
//! │  │ Validation │ │ Tags diff  │ │ Retry/wait │   │
//! │  └────────────┘ └────────────┘ └────────────┘   │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼────────────┐   ┌────────────────────────┐
//! │ liveflow-medialive │──▶│ MediaLiveApi (injected)│
//! │  security groups,  │   │  aws sdk / in-memory   │
//! │  inputs, channels  │   └────────────────────────┘
//! └────────────────────┘
//! ```

pub mod action;
pub mod error;
pub mod resource;
pub mod retry;
pub mod state;
pub mod tags;
pub mod validation;
pub mod wait;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary, plan_change};
pub use error::{CloudError, Result};
pub use resource::{DesiredState, Diff, Resource};
pub use retry::{RetryConfig, RetryFailure, retry};
pub use state::{GlobalState, ResourceRecord, StateLock, StateManager};
pub use tags::{IgnoreTags, TagDiff, Tags};
pub use validation::{Validate, Validator, Violation};
pub use wait::{DELETED_STATUS, Observation, wait_for_deletion};
pub use tokio_util::sync::CancellationToken;
